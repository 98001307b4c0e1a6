//! Crash-safe filesystem primitives.
//!
//! Every persistent mutation in the workspace goes through `write_atomic`:
//! write to a `.<uuid>.tmp` sibling on the same filesystem, fsync the
//! descriptor, then rename over the final path. A crash mid-write leaves
//! either the old state or the complete new state, never a torn file.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::os::unix::fs::PermissionsExt;
use std::path::Path;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::warn;
use uuid::Uuid;

use engram_core::error::{EngramError, Result};

/// Directory mode for chain and quarantine directories.
pub const MODE_DIR: u32 = 0o700;
/// Default block/file mode.
pub const MODE_FILE: u32 = 0o644;
/// Mode for vault blocks and security files.
pub const MODE_SECRET: u32 = 0o600;

fn io_err(path: &Path, source: std::io::Error) -> EngramError {
    EngramError::io(path.display().to_string(), source)
}

/// Create a directory (and parents) with `MODE_DIR` permissions.
pub fn create_dir_private(path: &Path) -> Result<()> {
    fs::create_dir_all(path).map_err(|e| io_err(path, e))?;
    fs::set_permissions(path, fs::Permissions::from_mode(MODE_DIR))
        .map_err(|e| io_err(path, e))?;
    Ok(())
}

/// Write `bytes` to `path` atomically: temp file + fsync + rename.
///
/// The temp file lives in the target's directory so the rename never
/// crosses a filesystem boundary. On any error the temp file is unlinked;
/// a failed cleanup is logged and non-fatal.
pub fn write_atomic(path: &Path, bytes: &[u8], mode: u32) -> Result<()> {
    let dir = path
        .parent()
        .ok_or_else(|| EngramError::invalid_argument("path", "no parent directory"))?;
    let tmp = dir.join(format!(".{}.tmp", Uuid::new_v4()));

    let outcome = write_and_rename(&tmp, path, bytes, mode);
    if outcome.is_err() {
        if let Err(cleanup) = fs::remove_file(&tmp) {
            if cleanup.kind() != std::io::ErrorKind::NotFound {
                warn!(tmp = %tmp.display(), error = %cleanup, "failed to remove temp file");
            }
        }
    }
    outcome
}

fn write_and_rename(tmp: &Path, path: &Path, bytes: &[u8], mode: u32) -> Result<()> {
    let mut file = OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(tmp)
        .map_err(|e| io_err(tmp, e))?;
    file.write_all(bytes).map_err(|e| io_err(tmp, e))?;
    file.sync_all().map_err(|_| EngramError::FsyncFailed {
        path: tmp.display().to_string(),
    })?;
    file.set_permissions(fs::Permissions::from_mode(mode))
        .map_err(|e| io_err(tmp, e))?;
    fs::rename(tmp, path).map_err(|e| io_err(path, e))?;
    Ok(())
}

/// Serialize a value as compact JSON and write it atomically.
pub fn write_json_atomic<T: Serialize>(path: &Path, value: &T, mode: u32) -> Result<()> {
    let bytes = serde_json::to_vec(value)?;
    write_atomic(path, &bytes, mode)
}

/// Read and parse a JSON file.
pub fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let bytes = fs::read(path).map_err(|e| io_err(path, e))?;
    Ok(serde_json::from_slice(&bytes)?)
}
