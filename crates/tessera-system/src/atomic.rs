//! Crash-safe file replacement

use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::SystemError;

/// Replace `path` with `data` so readers see either the old or the new
/// contents, never a torn file.
///
/// The data goes to `<path>.new`, is flushed and synced, then renamed over
/// the target. On Unix the parent directory is synced afterwards so the
/// rename itself is durable.
pub fn atomic_write(path: impl AsRef<Path>, data: &[u8]) -> Result<(), SystemError> {
    let path = path.as_ref();
    let staging = staging_path(path);

    let mut file = File::create(&staging).map_err(|e| SystemError::io(&staging, e))?;
    let written = file
        .write_all(data)
        .and_then(|()| file.flush())
        .and_then(|()| file.sync_all());
    drop(file);

    // The staging file never outlives a failed write
    if let Err(e) = written {
        let _ = fs::remove_file(&staging);
        return Err(SystemError::io(&staging, e));
    }
    if let Err(e) = fs::rename(&staging, path) {
        let _ = fs::remove_file(&staging);
        return Err(SystemError::io(path, e));
    }
    sync_parent(path)?;

    tracing::debug!("atomic write of {} bytes to {}", data.len(), path.display());
    Ok(())
}

fn staging_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".new");
    PathBuf::from(name)
}

#[cfg(unix)]
fn sync_parent(path: &Path) -> Result<(), SystemError> {
    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    File::open(parent)
        .and_then(|dir| dir.sync_all())
        .map_err(|e| SystemError::io(parent, e))
}

#[cfg(not(unix))]
fn sync_parent(_path: &Path) -> Result<(), SystemError> {
    Ok(())
}
