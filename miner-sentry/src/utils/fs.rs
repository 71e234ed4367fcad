//! Filesystem helpers shared across modules.
//!
//! Every helper attaches the operation and path to IO errors.

use std::path::{Path, PathBuf};
use std::time::SystemTime;

use crate::{Error, Result};

/// Ensure a directory exists, creating it (recursively) if needed.
pub fn ensure_dir_all(path: &Path) -> Result<()> {
    std::fs::create_dir_all(path).map_err(|e| Error::io_path("creating directory", path, e))
}

/// Ensure the parent directory of a file path exists.
pub fn ensure_parent_dir(path: &Path) -> Result<()> {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => ensure_dir_all(parent),
        _ => Ok(()),
    }
}

/// Replace `path` with `contents` so readers never observe a half-written file.
///
/// The data goes to `<path>.tmp` first and is then renamed over the target.
pub fn write_atomic(path: &Path, contents: &[u8]) -> Result<()> {
    ensure_parent_dir(path)?;
    let tmp = tmp_path(path);

    std::fs::write(&tmp, contents).map_err(|e| Error::io_path("writing", &tmp, e))?;
    if let Err(e) = std::fs::rename(&tmp, path) {
        let _ = std::fs::remove_file(&tmp);
        return Err(Error::io_path("renaming", path, e));
    }
    Ok(())
}

/// Last modification time of `path`, or `None` if it cannot be read.
pub fn modified_at(path: &Path) -> Option<SystemTime> {
    std::fs::metadata(path).and_then(|m| m.modified()).ok()
}

fn tmp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}
