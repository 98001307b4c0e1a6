//! On-disk layout of an Engram home directory.
//!
//! ```text
//! <home>/
//!   security.json
//!   chains/<chain>/{000000.json, 000001.json, .lock}
//!   chains/.quarantine/<chain>/<stamp>/<index>.json
//!   embeddings/<chain>/{index.json, blocks/<index>.json}
//!   embeddings/cache.json
//!   daemon-state.json
//! ```
//!
//! All path arithmetic lives here so the storage crates never concatenate
//! paths ad hoc.

use std::path::{Path, PathBuf};

use crate::error::{EngramError, Result};

pub const QUARANTINE_DIR: &str = ".quarantine";
pub const LOCK_FILE: &str = ".lock";

/// Root of one Engram home and the paths derived from it.
#[derive(Debug, Clone)]
pub struct HomeLayout {
    root: PathBuf,
}

impl HomeLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn chains_root(&self) -> PathBuf {
        self.root.join("chains")
    }

    pub fn chain_dir(&self, chain: &str) -> PathBuf {
        self.chains_root().join(chain)
    }

    /// Block filename: zero-padded six-digit index, so lexical filename
    /// order equals ascending index order.
    pub fn block_path(&self, chain: &str, index: u64) -> PathBuf {
        self.chain_dir(chain).join(format!("{index:06}.json"))
    }

    pub fn lock_path(&self, chain: &str) -> PathBuf {
        self.chain_dir(chain).join(LOCK_FILE)
    }

    pub fn quarantine_dir(&self, chain: &str, stamp: &str) -> PathBuf {
        self.chains_root().join(QUARANTINE_DIR).join(chain).join(stamp)
    }

    pub fn embeddings_root(&self) -> PathBuf {
        self.root.join("embeddings")
    }

    pub fn embedding_chain_dir(&self, chain: &str) -> PathBuf {
        self.embeddings_root().join(chain)
    }

    pub fn embedding_manifest(&self, chain: &str) -> PathBuf {
        self.embedding_chain_dir(chain).join("index.json")
    }

    pub fn embedding_block_path(&self, chain: &str, index: u64) -> PathBuf {
        self.embedding_chain_dir(chain)
            .join("blocks")
            .join(format!("{index}.json"))
    }

    pub fn embedding_cache_path(&self) -> PathBuf {
        self.embeddings_root().join("cache.json")
    }

    pub fn security_path(&self) -> PathBuf {
        self.root.join("security.json")
    }

    pub fn daemon_state_path(&self) -> PathBuf {
        self.root.join("daemon-state.json")
    }
}

/// Validate a chain name before it touches the filesystem.
///
/// ASCII identifier: lowercase alphanumeric plus `-` and `_`, non-empty,
/// at most 64 chars. Leading dots are impossible by construction, which
/// keeps `.lock` and `.quarantine` out of the chain namespace.
pub fn validate_chain_name(name: &str) -> Result<()> {
    if name.is_empty() || name.len() > 64 {
        return Err(EngramError::invalid_argument(
            "chain",
            "name must be 1..=64 chars",
        ));
    }
    let ok = name
        .bytes()
        .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'-' || b == b'_');
    if !ok {
        return Err(EngramError::invalid_argument(
            "chain",
            format!("'{name}' is not a lowercase ascii identifier"),
        ));
    }
    Ok(())
}
