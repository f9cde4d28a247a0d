//! Host platform (linux for example) utility functions

use std::path::PathBuf;

/// Retrieve uname information.
pub fn get_uname() -> std::io::Result<String> {
    Ok("HOST INFO NOT YET AVAILABLE".to_string())
}

/// Get the root directory of the hexapod software installation.
pub fn get_sw_root() -> Result<PathBuf, std::env::VarError> {
    match std::env::var("HEXAPOD_SW_ROOT") {
        Ok(s) => Ok(s.into()),
        Err(e) => Err(e),
    }
}
