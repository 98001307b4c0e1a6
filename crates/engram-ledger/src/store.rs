//! The per-chain log store.
//!
//! One directory per chain, one JSON file per block, zero-padded six-digit
//! filenames so lexical order equals index order. Within a process, appends
//! to one chain are serialized by a per-chain async mutex; across processes
//! by the advisory flock. Readers are lock-free and observe any consistent
//! snapshot up to the atomic rename of the newest block.

use std::fs;
use std::path::Path;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, info};

use engram_core::block::{Block, Payload, PayloadKind};
use engram_core::error::{EngramError, Result};
use engram_core::home::{validate_chain_name, HomeLayout, QUARANTINE_DIR};

use crate::builder::BlockBuilder;
use crate::fsio;
use crate::lock::ChainLock;
use crate::soul;

/// Summary counters for one chain.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChainStats {
    pub blocks: u64,
    pub first: Option<DateTime<Utc>>,
    pub last: Option<DateTime<Utc>>,
}

/// Append-only store over one Engram home.
pub struct ChainStore {
    home: HomeLayout,
    /// Per-chain append mutexes, created lazily.
    mutexes: DashMap<String, Arc<Mutex<()>>>,
}

impl ChainStore {
    pub fn new(home: HomeLayout) -> Self {
        Self {
            home,
            mutexes: DashMap::new(),
        }
    }

    pub fn home(&self) -> &HomeLayout {
        &self.home
    }

    pub(crate) fn chain_mutex(&self, chain: &str) -> Arc<Mutex<()>> {
        self.mutexes
            .entry(chain.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Append a payload to `chain`, creating the chain on first use.
    ///
    /// The candidate is built from the current tail, SOUL-checked, and
    /// persisted with a fresh `{index:06}.json` file — never an overwrite,
    /// so a crash mid-append leaves either no new block or a complete one.
    ///
    /// # Errors
    /// `SoulViolation` on invariant breach, `ChainLocked` when another
    /// writer holds the chain, `IoError`/`FsyncFailed` on persistence
    /// failure.
    pub async fn append_block(&self, chain: &str, payload: Payload) -> Result<Block> {
        validate_chain_name(chain)?;

        let mutex = self.chain_mutex(chain);
        let _serial = mutex.lock().await;

        let dir = self.home.chain_dir(chain);
        fsio::create_dir_private(&dir)?;
        let _flock = ChainLock::acquire(&self.home.lock_path(chain), chain)?;

        let tail = self.head(chain)?;
        let block = BlockBuilder::next(chain, tail.as_ref(), payload)?;

        let violations = soul::check_block(&block, tail.as_ref());
        if let Some(first) = violations.into_iter().next() {
            return Err(first.into());
        }

        let path = self.home.block_path(chain, block.index);
        if path.exists() {
            return Err(EngramError::internal(format!(
                "refusing to overwrite existing block file {}",
                path.display()
            )));
        }
        let mode = if block.data.kind() == PayloadKind::Vault {
            fsio::MODE_SECRET
        } else {
            fsio::MODE_FILE
        };
        fsio::write_json_atomic(&path, &block, mode)?;

        info!(chain, index = block.index, kind = %block.data.kind(), "appended block");
        Ok(block)
    }

    /// The newest block of `chain`, or `None` for an empty/absent chain.
    pub fn head(&self, chain: &str) -> Result<Option<Block>> {
        validate_chain_name(chain)?;
        let dir = self.home.chain_dir(chain);
        let Some(last) = block_files(&dir)?.into_iter().last() else {
            return Ok(None);
        };
        let (index, name) = last;
        let block = read_block(&dir.join(&name), chain, index)?;
        Ok(Some(block))
    }

    /// Read the full chain, strictly.
    ///
    /// Unparseable files and filename/index mismatches surface
    /// `CorruptBlock` — the lenient walk lives in the repair routine.
    pub fn read_chain(&self, chain: &str) -> Result<Vec<Block>> {
        validate_chain_name(chain)?;
        let dir = self.home.chain_dir(chain);
        let mut blocks = Vec::new();
        for (index, name) in block_files(&dir)? {
            blocks.push(read_block(&dir.join(&name), chain, index)?);
        }
        Ok(blocks)
    }

    /// All chain names, sorted. Quarantine and other dotted entries are
    /// not chains.
    pub fn list_chains(&self) -> Result<Vec<String>> {
        let root = self.home.chains_root();
        if !root.exists() {
            return Ok(Vec::new());
        }
        let mut chains = Vec::new();
        let entries =
            fs::read_dir(&root).map_err(|e| EngramError::io(root.display().to_string(), e))?;
        for entry in entries {
            let entry = entry.map_err(|e| EngramError::io(root.display().to_string(), e))?;
            let name = entry.file_name().to_string_lossy().into_owned();
            if name.starts_with('.') || name == QUARANTINE_DIR {
                continue;
            }
            if entry.path().is_dir() {
                chains.push(name);
            }
        }
        chains.sort();
        Ok(chains)
    }

    pub fn chain_stats(&self, chain: &str) -> Result<ChainStats> {
        let blocks = self.read_chain(chain)?;
        Ok(ChainStats {
            blocks: blocks.len() as u64,
            first: blocks.first().map(|b| b.timestamp),
            last: blocks.last().map(|b| b.timestamp),
        })
    }
}

/// Enumerate `(index, filename)` pairs for a chain directory, lexically
/// sorted — which equals ascending index order by construction.
pub(crate) fn block_files(dir: &Path) -> Result<Vec<(u64, String)>> {
    if !dir.exists() {
        return Ok(Vec::new());
    }
    let entries =
        fs::read_dir(dir).map_err(|e| EngramError::io(dir.display().to_string(), e))?;
    let mut files = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| EngramError::io(dir.display().to_string(), e))?;
        let name = entry.file_name().to_string_lossy().into_owned();
        if name.starts_with('.') || !name.ends_with(".json") {
            continue;
        }
        let stem = name.trim_end_matches(".json");
        if let Ok(index) = stem.parse::<u64>() {
            files.push((index, name));
        } else {
            debug!(file = %name, "skipping non-block file in chain directory");
        }
    }
    files.sort_by(|a, b| a.1.cmp(&b.1));
    Ok(files)
}

fn read_block(path: &Path, chain: &str, index: u64) -> Result<Block> {
    let block: Block = fsio::read_json(path).map_err(|_| EngramError::CorruptBlock {
        chain: chain.to_string(),
        index,
    })?;
    if block.index != index || block.chain != chain {
        return Err(EngramError::CorruptBlock {
            chain: chain.to_string(),
            index,
        });
    }
    Ok(block)
}
