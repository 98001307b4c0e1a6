//! `engram-hooks` — Post-write hooks over the chain store.
//!
//! # Design
//! - Decision detection and autosummarization run after `append_block`
//!   returns, in a detached task with a bounded deadline
//! - Hook output re-enters the ledger through the ordinary append path
//!   (and therefore SOUL)
//! - Hook errors never reach the ingester: at most one `system` diagnostic
//!   block records them
//! - Completion providers are a strategy list; the first configured wins

pub mod detector;
pub mod router;
pub mod runner;
pub mod summarizer;

pub use detector::{DecisionDetector, CONFIDENCE_THRESHOLD, WINDOW_SIZE};
pub use router::CompletionRouter;
pub use runner::{HookRunner, DEFAULT_DEADLINE};
pub use summarizer::{Autosummarizer, SUMMARY_INTERVAL};

use engram_core::block::Block;
use engram_core::error::Result;
use engram_ledger::store::ChainStore;

/// Up to `size` blocks of context preceding `before` in a chain,
/// chronological order.
pub fn query_window(store: &ChainStore, chain: &str, before: u64, size: usize) -> Result<Vec<Block>> {
    let blocks = store.read_chain(chain)?;
    let mut window: Vec<Block> = blocks
        .into_iter()
        .filter(|b| b.index < before)
        .rev()
        .take(size)
        .collect();
    window.reverse();
    Ok(window)
}
