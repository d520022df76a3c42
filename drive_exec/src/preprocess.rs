//! # Image preprocessing
//!
//! Turns a raw camera image into the feature tensor consumed by the steering model: the road
//! region is cropped out, resized to the model's input size and converted to YUV.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use image::{
    imageops::{self, FilterType},
    Rgb, RgbImage,
};
use ndarray::Array3;

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// First image column of the region of interest.
pub const ROI_X: u32 = 40;

/// First image row of the region of interest.
pub const ROI_Y: u32 = 60;

/// Width of the region of interest.
pub const ROI_WIDTH: u32 = 240;

/// Height of the region of interest.
pub const ROI_HEIGHT: u32 = 80;

/// Width of the feature tensor.
pub const FEATURE_WIDTH: u32 = 200;

/// Height of the feature tensor.
pub const FEATURE_HEIGHT: u32 = 66;

/// Number of colour channels in the feature tensor.
pub const FEATURE_CHANNELS: usize = 3;

/// Number of values in one feature tensor.
pub const FEATURE_LEN: usize =
    FEATURE_WIDTH as usize * FEATURE_HEIGHT as usize * FEATURE_CHANNELS;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Preprocessed image, indexed `[row, column, channel]` with channels Y, U, V in `[0, 255]`.
pub type Features = Array3<f32>;

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PreprocessError {
    #[error(
        "Image of {width}x{height} is smaller than the region of interest ({}x{})",
        ROI_X + ROI_WIDTH,
        ROI_Y + ROI_HEIGHT
    )]
    ImageTooSmall { width: u32, height: u32 },
}

// ---------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ---------------------------------------------------------------------------

/// Preprocess a camera image into model features.
pub fn preprocess(image: &RgbImage) -> Result<Features, PreprocessError> {
    let (width, height) = image.dimensions();

    if width < ROI_X + ROI_WIDTH || height < ROI_Y + ROI_HEIGHT {
        return Err(PreprocessError::ImageTooSmall { width, height });
    }

    let roi = imageops::crop_imm(image, ROI_X, ROI_Y, ROI_WIDTH, ROI_HEIGHT);
    let resized = imageops::resize(&roi, FEATURE_WIDTH, FEATURE_HEIGHT, FilterType::Triangle);

    let mut features = Features::zeros((
        FEATURE_HEIGHT as usize,
        FEATURE_WIDTH as usize,
        FEATURE_CHANNELS,
    ));

    for (x, y, px) in resized.enumerate_pixels() {
        let yuv = rgb_to_yuv(px);
        for (c, v) in yuv.iter().enumerate() {
            features[[y as usize, x as usize, c]] = *v;
        }
    }

    Ok(features)
}

// ---------------------------------------------------------------------------
// PRIVATE FUNCTIONS
// ---------------------------------------------------------------------------

/// Convert an 8 bit RGB pixel into YUV, with U and V offset by 128.
fn rgb_to_yuv(px: &Rgb<u8>) -> [f32; 3] {
    let r = px[0] as f32;
    let g = px[1] as f32;
    let b = px[2] as f32;

    let y = 0.299 * r + 0.587 * g + 0.114 * b;
    let u = 0.492 * (b - y) + 128.0;
    let v = 0.877 * (r - y) + 128.0;

    [y, u.max(0.0).min(255.0), v.max(0.0).min(255.0)]
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_feature_shape() {
        let img = RgbImage::from_pixel(320, 160, Rgb([128, 128, 128]));
        let f = preprocess(&img).unwrap();

        assert_eq!(f.shape(), &[66, 200, 3]);
        assert_eq!(f.len(), FEATURE_LEN);

        // Grey has no chroma
        assert!((f[[10, 10, 0]] - 128.0).abs() < 0.5);
        assert!((f[[10, 10, 1]] - 128.0).abs() < 0.5);
        assert!((f[[10, 10, 2]] - 128.0).abs() < 0.5);
    }

    #[test]
    fn test_crop_region() {
        // Red only outside the region of interest
        let mut img = RgbImage::from_pixel(320, 160, Rgb([255, 0, 0]));
        for y in ROI_Y..ROI_Y + ROI_HEIGHT {
            for x in ROI_X..ROI_X + ROI_WIDTH {
                img.put_pixel(x, y, Rgb([0, 0, 0]));
            }
        }

        let f = preprocess(&img).unwrap();
        assert!(f.iter().step_by(3).all(|y| *y < 0.5));
    }

    #[test]
    fn test_too_small() {
        let img = RgbImage::new(100, 100);
        assert_eq!(
            preprocess(&img),
            Err(PreprocessError::ImageTooSmall {
                width: 100,
                height: 100
            })
        );
    }
}
