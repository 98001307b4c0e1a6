//! Candidate block construction.
//!
//! Applies the genesis rules and computes the embedded hash. Timestamps are
//! clamped to `max(now, tail.timestamp + 1ms)` so the chain's non-decreasing
//! timestamp invariant holds even across backward clock jumps — the builder
//! can never produce a block that SOUL's monotonicity rule rejects.

use chrono::{Duration, Utc};

use engram_core::block::{Block, BlockHash, Payload};
use engram_core::error::Result;

pub struct BlockBuilder;

impl BlockBuilder {
    /// Build the next block for `chain` on top of `tail`.
    ///
    /// Empty chain: index 0, all-zero `prev_hash`. Otherwise the candidate
    /// links to the tail's hash at `tail.index + 1`.
    pub fn next(chain: &str, tail: Option<&Block>, data: Payload) -> Result<Block> {
        let now = Utc::now();
        let (index, prev_hash, timestamp) = match tail {
            None => (0, BlockHash::genesis(), now),
            Some(tail) => {
                let floor = tail.timestamp + Duration::milliseconds(1);
                (tail.index + 1, tail.hash.clone(), now.max(floor))
            }
        };

        let mut block = Block {
            index,
            timestamp,
            chain: chain.to_string(),
            data,
            prev_hash,
            hash: BlockHash(String::new()),
        };
        block.hash = block.compute_hash()?;
        Ok(block)
    }
}
