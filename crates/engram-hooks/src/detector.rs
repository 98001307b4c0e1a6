//! Decision detection over freshly appended blocks.
//!
//! After a journal or ask block lands, the classifier capability looks at
//! its content plus a small window of recent blocks. A confident hit is
//! turned into a `decision` block whose content is the serialized decision
//! record, with `source_ref` pointing back at the trigger. The detector is
//! a fixed point: its own output is a `decision` block and derived blocks
//! carry a `source_ref`, so neither is ever classified again.

use std::sync::Arc;

use tracing::{debug, info};

use engram_core::block::{Block, BlockRef, Payload, PayloadMeta, TextBody};
use engram_core::capability::{Classifier, DecisionHint};
use engram_core::decision::{DecisionMode, DecisionRecord};
use engram_core::error::Result;
use engram_ledger::store::ChainStore;

use crate::query_window;

pub const CONFIDENCE_THRESHOLD: f64 = 0.6;
pub const WINDOW_SIZE: usize = 5;

pub struct DecisionDetector {
    store: Arc<ChainStore>,
    classifier: Arc<dyn Classifier>,
}

impl DecisionDetector {
    pub fn new(store: Arc<ChainStore>, classifier: Arc<dyn Classifier>) -> Self {
        Self { store, classifier }
    }

    /// Inspect one appended block; append a derived decision block when the
    /// classifier is confident enough.
    ///
    /// Returns the appended decision block, or `None` when the block is not
    /// a candidate or the classifier declined.
    pub async fn inspect(&self, block: &Block) -> Result<Option<Block>> {
        if !block.data.is_text_bearing() {
            return Ok(None);
        }
        if block.data.source_ref().is_some() {
            // Derived blocks never feed back into detection.
            return Ok(None);
        }
        let Some(content) = block.data.content_text() else {
            return Ok(None);
        };

        let window = query_window(&self.store, &block.chain, block.index, WINDOW_SIZE)?;
        let hint = self.classifier.classify(content, &window).await?;
        if !hint.is_decision || hint.confidence < CONFIDENCE_THRESHOLD {
            debug!(
                chain = %block.chain,
                index = block.index,
                confidence = hint.confidence,
                "no decision detected"
            );
            return Ok(None);
        }

        let record = build_record(&hint, content)?;
        let payload = Payload::Decision(TextBody {
            content: record.to_content()?,
            tags: vec!["decision".into(), "auto".into()],
            meta: PayloadMeta {
                source_ref: Some(BlockRef {
                    chain: block.chain.clone(),
                    index: block.index,
                    hash: block.hash.clone(),
                }),
                ..PayloadMeta::default()
            },
        });
        let appended = self.store.append_block(&block.chain, payload).await?;
        info!(
            chain = %block.chain,
            source = block.index,
            decision = appended.index,
            "decision block derived"
        );
        Ok(Some(appended))
    }
}

/// Turn a classifier hint into a validated record, filling gaps from the
/// source content.
fn build_record(hint: &DecisionHint, content: &str) -> Result<DecisionRecord> {
    let title = hint
        .title
        .clone()
        .unwrap_or_else(|| content.chars().take(80).collect());
    let chosen = hint
        .chosen
        .clone()
        .or_else(|| hint.options.first().cloned())
        .unwrap_or_else(|| title.clone());
    let mut options = hint.options.clone();
    if options.is_empty() {
        options.push(chosen.clone());
    }

    let mut record = DecisionRecord::new(title, options, chosen, DecisionMode::Inferred);
    record.reasoning = hint.reasoning.clone().unwrap_or_default();
    record.confidence = hint.confidence.clamp(0.0, 1.0);
    record.validate()?;
    Ok(record)
}
