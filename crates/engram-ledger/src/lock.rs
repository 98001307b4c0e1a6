//! Cross-process writer exclusion.
//!
//! A real advisory flock on `<chain>/.lock`, held for the duration of an
//! append. Contention is immediate `ChainLocked` — there is no queueing,
//! matching the one-active-writer-per-chain model. Readers never touch the
//! lock.

use std::fs::{File, OpenOptions};
use std::path::Path;

use fs2::FileExt;

use engram_core::error::{EngramError, Result};

/// RAII guard over the chain's advisory lock file.
///
/// The flock is released on drop; the `.lock` file itself is left in place.
#[derive(Debug)]
pub struct ChainLock {
    file: File,
}

impl ChainLock {
    /// Try to take the exclusive lock. Never blocks.
    pub fn acquire(path: &Path, chain: &str) -> Result<Self> {
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .open(path)
            .map_err(|e| EngramError::io(path.display().to_string(), e))?;
        file.try_lock_exclusive()
            .map_err(|_| EngramError::ChainLocked {
                chain: chain.to_string(),
            })?;
        Ok(Self { file })
    }
}

impl Drop for ChainLock {
    fn drop(&mut self) {
        let _ = self.file.unlock();
    }
}
