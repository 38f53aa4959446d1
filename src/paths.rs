//! Path helpers for working directories named in manifests and on the
//! command line.

use std::fs::DirBuilder;
use std::os::unix::fs::DirBuilderExt;

use camino::{Utf8Path, Utf8PathBuf};

use crate::error::ShelloutError;

/// Permission bits for directories created by [`ensure_dir`].
const DIR_MODE: u32 = 0o744;

/// Replaces the first `~` in `path` with the value of `HOME`.
///
/// An unset `HOME` expands to the empty string.
pub fn expand_user(path: &str) -> Utf8PathBuf {
    let home = std::env::var("HOME").unwrap_or_default();
    expand_user_with(path, &home)
}

/// Replaces the first `~` in `path` with `home`.
pub fn expand_user_with(path: &str, home: &str) -> Utf8PathBuf {
    Utf8PathBuf::from(path.replacen('~', home, 1))
}

/// Makes sure `dir` exists, creating it and any missing parents.
///
/// An empty path is accepted and does nothing.
///
/// # Errors
///
/// Returns `ShelloutError::Io` if the path cannot be inspected or created,
/// and `ShelloutError::Validation` if it exists but is not a directory.
pub fn ensure_dir(dir: &Utf8Path) -> Result<(), ShelloutError> {
    if dir.as_str().is_empty() {
        return Ok(());
    }

    match std::fs::metadata(dir) {
        Ok(metadata) if metadata.is_dir() => Ok(()),
        Ok(_) => Err(ShelloutError::Validation(format!(
            "path exists but is not a directory: {}",
            dir
        ))),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            tracing::debug!("creating directory: {}", dir);
            DirBuilder::new()
                .recursive(true)
                .mode(DIR_MODE)
                .create(dir)
                .map_err(|e| ShelloutError::io(format!("failed to create directory: {}", dir), e))
        }
        Err(e) => Err(ShelloutError::io(format!("failed to read metadata: {}", dir), e)),
    }
}
