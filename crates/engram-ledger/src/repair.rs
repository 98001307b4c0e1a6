//! Revise — damage detection and quarantine-based repair.
//!
//! Unlike the strict read path, the reviser walks leniently: it parses each
//! block file in turn and stops at the first one that is unparseable,
//! violates SOUL, fails hash verification, or breaks index continuity. In
//! apply mode the offending file and every later file are renamed into a
//! timestamped quarantine directory — bytes are preserved for forensics,
//! and the healthy prefix becomes the new chain head.

use std::fs;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use engram_core::block::Block;
use engram_core::error::{EngramError, Result};
use engram_core::home::validate_chain_name;

use crate::fsio;
use crate::lock::ChainLock;
use crate::soul;
use crate::store::{block_files, ChainStore};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReviseMode {
    /// Report what would be quarantined without touching the chain.
    DryRun,
    /// Move the damaged tail into quarantine.
    Apply,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReviseStatus {
    /// The whole chain verified; nothing to do.
    Ok,
    /// A damaged tail was (or would be) quarantined; a valid prefix remains.
    Fixed,
    /// No valid prefix existed — the chain is damaged from block 0.
    Broken,
}

/// Outcome of revising one chain.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReviseReport {
    pub chain: String,
    pub status: ReviseStatus,
    /// Index of the surviving head, if any block survived.
    pub head: Option<u64>,
    /// Number of block files quarantined (or counted, in dry-run).
    pub quarantined: u64,
    pub errors: Vec<String>,
}

/// Walk outcome: position of the first damaged file, if any.
struct WalkOutcome {
    stop_at: Option<usize>,
    last_valid: Option<u64>,
    errors: Vec<String>,
}

pub struct Reviser<'a> {
    store: &'a ChainStore,
}

impl<'a> Reviser<'a> {
    pub fn new(store: &'a ChainStore) -> Self {
        Self { store }
    }

    /// Revise one chain.
    pub async fn revise(&self, chain: &str, mode: ReviseMode) -> Result<ReviseReport> {
        validate_chain_name(chain)?;

        // Apply mode mutates the chain directory — take both writer locks.
        let mutex = self.store.chain_mutex(chain);
        let _serial = mutex.lock().await;
        let _flock = if mode == ReviseMode::Apply && self.store.home().chain_dir(chain).exists() {
            Some(ChainLock::acquire(
                &self.store.home().lock_path(chain),
                chain,
            )?)
        } else {
            None
        };

        let dir = self.store.home().chain_dir(chain);
        let files = block_files(&dir)?;
        let outcome = walk(chain, &files, &dir);

        let Some(stop) = outcome.stop_at else {
            return Ok(ReviseReport {
                chain: chain.to_string(),
                status: ReviseStatus::Ok,
                head: outcome.last_valid,
                quarantined: 0,
                errors: Vec::new(),
            });
        };

        let doomed = &files[stop..];
        let status = if outcome.last_valid.is_some() {
            ReviseStatus::Fixed
        } else {
            ReviseStatus::Broken
        };

        if mode == ReviseMode::Apply {
            let stamp = Utc::now().format("%Y-%m-%dT%H-%M-%S%.3fZ").to_string();
            let qdir = self.store.home().quarantine_dir(chain, &stamp);
            fsio::create_dir_private(&qdir)?;
            for (_, name) in doomed {
                let from = dir.join(name);
                let to = qdir.join(name);
                fs::rename(&from, &to)
                    .map_err(|e| EngramError::io(from.display().to_string(), e))?;
            }
            info!(
                chain,
                quarantined = doomed.len(),
                head = ?outcome.last_valid,
                dir = %qdir.display(),
                "quarantined damaged tail"
            );
        } else {
            info!(
                chain,
                would_quarantine = doomed.len(),
                "dry-run revise found damage"
            );
        }

        Ok(ReviseReport {
            chain: chain.to_string(),
            status,
            head: outcome.last_valid,
            quarantined: doomed.len() as u64,
            errors: outcome.errors,
        })
    }

    /// Revise every chain in the store.
    pub async fn revise_all(&self, mode: ReviseMode) -> Result<Vec<ReviseReport>> {
        let mut reports = Vec::new();
        for chain in self.store.list_chains()? {
            reports.push(self.revise(&chain, mode).await?);
        }
        Ok(reports)
    }
}

/// Lenient walk from index 0; never propagates a parse failure.
fn walk(chain: &str, files: &[(u64, String)], dir: &std::path::Path) -> WalkOutcome {
    let mut predecessor: Option<Block> = None;
    let mut errors = Vec::new();

    for (pos, (index, name)) in files.iter().enumerate() {
        if *index != pos as u64 {
            errors.push(format!("index gap: expected {pos}, found file for {index}"));
            return stop_at(pos, predecessor, errors);
        }

        let block: Block = match fsio::read_json(&dir.join(name)) {
            Ok(block) => block,
            Err(e) => {
                errors.push(format!("block {index}: unparseable ({e})"));
                return stop_at(pos, predecessor, errors);
            }
        };
        if block.index != *index || block.chain != chain {
            errors.push(format!("block {index}: file/body identity mismatch"));
            return stop_at(pos, predecessor, errors);
        }

        match block.verify_hash() {
            Ok(true) => {}
            _ => {
                errors.push(format!("block {index}: hash verification failed"));
                return stop_at(pos, predecessor, errors);
            }
        }

        let violations = soul::check_block(&block, predecessor.as_ref());
        if !violations.is_empty() {
            for v in &violations {
                errors.push(format!("block {index}: [{}] {}", v.rule, v.detail));
            }
            warn!(chain, index, "soul violations during revise walk");
            return stop_at(pos, predecessor, errors);
        }

        predecessor = Some(block);
    }

    WalkOutcome {
        stop_at: None,
        last_valid: predecessor.map(|b| b.index),
        errors,
    }
}

fn stop_at(pos: usize, predecessor: Option<Block>, errors: Vec<String>) -> WalkOutcome {
    WalkOutcome {
        stop_at: Some(pos),
        last_valid: predecessor.map(|b| b.index),
        errors,
    }
}
