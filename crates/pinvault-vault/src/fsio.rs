//! Whole-file atomic writes.
//!
//! Every file PinVault owns (`salt.bin`, `vault.enc`, the config) is written
//! through [`write_atomic`]: temp file next to the target, `fsync`, owner-only
//! permissions, rename over the target. A crash leaves either the old file or
//! the new one, never a prefix.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Write `data` to `path` atomically with `0600` permissions on Unix.
///
/// # Errors
///
/// Returns the underlying `io::Error`; the temp file is removed on failure
/// and the previous contents of `path` are untouched.
pub(crate) fn write_atomic(path: &Path, data: &[u8]) -> std::io::Result<()> {
    let tmp = tmp_path(path);
    let result = write_synced(&tmp, data).and_then(|()| fs::rename(&tmp, path));
    if result.is_err() {
        let _ = fs::remove_file(&tmp);
        return result;
    }
    sync_parent_best_effort(path);
    Ok(())
}

/// Write `data` to `path` completely and `fsync` it, without renaming.
/// Used for staged files that are renamed into place later.
pub(crate) fn write_synced(path: &Path, data: &[u8]) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let mut file = fs::OpenOptions::new()
        .create(true)
        .truncate(true)
        .write(true)
        .open(path)?;
    restrict_permissions(path)?;
    file.write_all(data)?;
    file.sync_all()?;
    Ok(())
}

/// Remove `path`, treating "already gone" as success.
pub(crate) fn remove_if_exists(path: &Path) -> std::io::Result<()> {
    match fs::remove_file(path) {
        Err(e) if e.kind() != std::io::ErrorKind::NotFound => Err(e),
        _ => Ok(()),
    }
}

/// Flush the directory entry after a rename. Not every platform supports
/// opening a directory, so failures are ignored.
pub(crate) fn sync_parent_best_effort(path: &Path) {
    #[cfg(unix)]
    if let Some(parent) = path.parent() {
        if let Ok(dir) = fs::File::open(parent) {
            let _ = dir.sync_all();
        }
    }
    #[cfg(not(unix))]
    let _ = path;
}

fn tmp_path(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map_or_else(|| "pinvault".into(), |n| n.to_string_lossy().into_owned());
    path.with_file_name(format!(".{name}.tmp"))
}

#[cfg(unix)]
fn restrict_permissions(path: &Path) -> std::io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(0o600))
}

#[cfg(not(unix))]
#[allow(clippy::unnecessary_wraps)]
const fn restrict_permissions(_path: &Path) -> std::io::Result<()> {
    Ok(())
}
