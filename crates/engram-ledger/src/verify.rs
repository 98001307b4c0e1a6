//! Full-chain verification.
//!
//! A chain is valid iff every block verifies structurally (hash
//! recomputation) and against SOUL. Verification walks from index 0 and
//! stops at the first broken block; everything before it is a healthy
//! prefix the repair routine can preserve.

use serde::{Deserialize, Serialize};

use engram_core::block::Block;
use engram_core::error::Result;

use crate::soul::{self, SoulError};

/// Result of verifying one chain.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChainReport {
    pub valid: bool,
    /// Index of the first broken block, when invalid.
    pub broken_at: Option<u64>,
    pub soul_errors: Vec<SoulError>,
}

impl ChainReport {
    fn valid_report() -> Self {
        Self {
            valid: true,
            broken_at: None,
            soul_errors: Vec::new(),
        }
    }
}

/// Verify one block structurally: stored hash equals the recomputed hash.
pub fn verify_block(block: &Block) -> Result<bool> {
    block.verify_hash()
}

/// Verify an ordered chain of blocks.
///
/// Empty and single-block chains verify as valid (the single block still
/// goes through the genesis rules and hash recomputation).
pub fn verify_chain(blocks: &[Block]) -> ChainReport {
    let mut predecessor: Option<&Block> = None;
    for block in blocks {
        let mut errors = soul::check_block(block, predecessor);

        match block.verify_hash() {
            Ok(true) => {}
            Ok(false) => errors.push(SoulError {
                rule: crate::soul::SoulRule::HashFormat,
                detail: format!("stored hash does not match recomputed hash at {}", block.index),
            }),
            Err(e) => errors.push(SoulError {
                rule: crate::soul::SoulRule::HashFormat,
                detail: format!("hash recomputation failed at {}: {e}", block.index),
            }),
        }

        if !errors.is_empty() {
            return ChainReport {
                valid: false,
                broken_at: Some(block.index),
                soul_errors: errors,
            };
        }
        predecessor = Some(block);
    }
    ChainReport::valid_report()
}
