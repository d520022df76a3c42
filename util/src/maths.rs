//! Utility maths functions

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use num_traits::Float;

/// Saturate a value into the closed range `[min, max]`.
pub fn clamp<T>(value: T, min: T, max: T) -> T
where
    T: Float,
{
    let mut ret = value;

    if ret > max {
        ret = max
    }
    if ret < min {
        ret = min
    }

    ret
}

/// Move a value towards zero by `step`, snapping to zero if its magnitude is below `step`.
///
/// `step` must be non-negative.
pub fn decay_toward_zero<T>(value: T, step: T) -> T
where
    T: Float,
{
    if value.abs() < step {
        T::zero()
    } else if value > T::zero() {
        value - step
    } else if value < T::zero() {
        value + step
    } else {
        value
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_clamp() {
        assert_eq!(clamp(2.0, -1.0, 1.0), 1.0);
        assert_eq!(clamp(-2.0, -1.0, 1.0), -1.0);
        assert_eq!(clamp(0.25, -1.0, 1.0), 0.25);
    }

    #[test]
    fn test_decay_toward_zero() {
        assert_eq!(decay_toward_zero(0.5, 0.25), 0.25);
        assert_eq!(decay_toward_zero(-0.5, 0.25), -0.25);
        assert_eq!(decay_toward_zero(0.1, 0.25), 0.0);
        assert_eq!(decay_toward_zero(0.0, 0.25), 0.0);

        // Magnitude exactly equal to the step still steps, landing on zero
        assert_eq!(decay_toward_zero(0.25, 0.25), 0.0);
    }
}
