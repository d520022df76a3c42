//! Host platform utility functions

use std::path::PathBuf;

/// Environment variable pointing at the root of the software checkout. Parameter files are read
/// from `$LIVE_TRAINER_ROOT/params` and sessions are written below it.
pub const SW_ROOT_ENV: &str = "LIVE_TRAINER_ROOT";

/// Retrieve the software root directory.
pub fn get_sw_root() -> Result<PathBuf, std::env::VarError> {
    std::env::var(SW_ROOT_ENV).map(PathBuf::from)
}
