//! Persistent per-chain embedding index.
//!
//! Layout: `embeddings/<chain>/index.json` lists `{blockIndex, hash,
//! updatedAt}` entries; `embeddings/<chain>/blocks/<index>.json` holds the
//! vector payload. Upserts are idempotent on `(chain, blockIndex)` and only
//! rewrite when the block hash changed. Vector dimensionality is fixed by
//! the first write into a chain directory.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

use engram_core::block::BlockHash;
use engram_core::error::{EngramError, Result};
use engram_core::home::{validate_chain_name, HomeLayout};
use engram_ledger::fsio;

/// One manifest row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManifestEntry {
    pub block_index: u64,
    pub hash: String,
    pub updated_at: DateTime<Utc>,
}

/// On-disk vector payload for one block.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VectorRecord {
    pub hash: String,
    pub vector: Vec<f32>,
    pub created_at: DateTime<Utc>,
}

/// In-memory view of one indexed block.
#[derive(Debug, Clone)]
pub struct EmbeddingEntry {
    pub block_index: u64,
    pub hash: String,
    pub vector: Vec<f32>,
}

pub struct EmbeddingIndex {
    home: HomeLayout,
}

impl EmbeddingIndex {
    pub fn new(home: HomeLayout) -> Self {
        Self { home }
    }

    /// True when the chain has a manifest on disk.
    pub fn has_index(&self, chain: &str) -> bool {
        self.home.embedding_manifest(chain).exists()
    }

    fn read_manifest(&self, chain: &str) -> Result<Vec<ManifestEntry>> {
        let path = self.home.embedding_manifest(chain);
        if !path.exists() {
            return Ok(Vec::new());
        }
        fsio::read_json(&path)
    }

    /// Insert or replace the vector for `(chain, block_index)`.
    ///
    /// Returns `false` when the stored hash already matches — the index is
    /// left byte-identical.
    pub fn upsert(
        &self,
        chain: &str,
        block_index: u64,
        hash: &BlockHash,
        vector: Vec<f32>,
    ) -> Result<bool> {
        validate_chain_name(chain)?;
        let mut manifest = self.read_manifest(chain)?;

        if let Some(entry) = manifest.iter().find(|e| e.block_index == block_index) {
            if entry.hash == hash.0 {
                return Ok(false);
            }
        }

        // Dimensionality is fixed per chain directory by the first vector.
        if let Some(first) = manifest.iter().find(|e| e.block_index != block_index) {
            let existing: VectorRecord =
                fsio::read_json(&self.home.embedding_block_path(chain, first.block_index))?;
            if existing.vector.len() != vector.len() {
                return Err(EngramError::invalid_argument(
                    "vector",
                    format!(
                        "dimension {} does not match chain dimension {}",
                        vector.len(),
                        existing.vector.len()
                    ),
                ));
            }
        }

        let block_path = self.home.embedding_block_path(chain, block_index);
        if let Some(parent) = block_path.parent() {
            fsio::create_dir_private(parent)?;
        }
        let record = VectorRecord {
            hash: hash.0.clone(),
            vector,
            created_at: Utc::now(),
        };
        fsio::write_json_atomic(&block_path, &record, fsio::MODE_FILE)?;

        manifest.retain(|e| e.block_index != block_index);
        manifest.push(ManifestEntry {
            block_index,
            hash: hash.0.clone(),
            updated_at: Utc::now(),
        });
        manifest.sort_by_key(|e| e.block_index);
        fsio::write_json_atomic(
            &self.home.embedding_manifest(chain),
            &manifest,
            fsio::MODE_FILE,
        )?;
        Ok(true)
    }

    /// Load every indexed vector for a chain, manifest-driven.
    ///
    /// A manifest row whose vector file is missing or stale is skipped with
    /// a warning rather than failing the whole lookup.
    pub fn lookup(&self, chain: &str) -> Result<Vec<EmbeddingEntry>> {
        let manifest = self.read_manifest(chain)?;
        let mut entries = Vec::with_capacity(manifest.len());
        for row in manifest {
            let path = self.home.embedding_block_path(chain, row.block_index);
            let record: VectorRecord = match fsio::read_json(&path) {
                Ok(record) => record,
                Err(e) => {
                    warn!(chain, block = row.block_index, error = %e, "skipping unreadable vector");
                    continue;
                }
            };
            if record.hash != row.hash {
                warn!(chain, block = row.block_index, "skipping stale vector record");
                continue;
            }
            entries.push(EmbeddingEntry {
                block_index: row.block_index,
                hash: row.hash,
                vector: record.vector,
            });
        }
        Ok(entries)
    }
}
