pub mod artifacts;
pub mod format;
pub mod module;

use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::{Error, Result};

/// Creates the directory a run writes into and returns its absolute path.
///
/// Without `out` a fresh temporary directory is made and left on disk for
/// the build step. Reusing `out` overwrites whatever an earlier run wrote.
pub fn build_dir(out: Option<&Path>) -> Result<PathBuf> {
    let dir = match out {
        Some(out) => {
            fs::create_dir_all(out).map_err(|e| Error::io(out, e))?;
            std::path::absolute(out).map_err(|e| Error::io(out, e))?
        }
        None => {
            let tmp = std::env::temp_dir();
            tempfile::Builder::new()
                .prefix("plrs-")
                .tempdir()
                .map_err(|e| Error::io(&tmp, e))?
                .keep()
        }
    };
    debug!("build directory {}", dir.display());
    Ok(dir)
}
