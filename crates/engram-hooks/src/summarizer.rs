//! Threshold-driven range summarization.
//!
//! Every N appends to a text chain (or on force), the uncovered range
//! `(last_summary.to, head]` is condensed through the summarizer capability
//! into one `summary` block carrying the range, a ref to every source
//! block, and a monotonically increasing version. Re-running over a covered
//! range is a no-op unless forced. Long-horizon digests may consume prior
//! summary blocks instead of the raw blocks they cover.

use std::sync::Arc;

use tracing::{debug, info};

use engram_core::block::{Block, BlockRef, Payload, PayloadKind, PayloadMeta, SummaryBody, SummaryRange};
use engram_core::capability::Summarizer;
use engram_core::error::Result;
use engram_ledger::store::ChainStore;

pub const SUMMARY_INTERVAL: u64 = 50;
/// Rough character budget per summarizer call; longer ranges are chunked.
pub const CHUNK_CHARS: usize = 8_000;

pub struct Autosummarizer {
    store: Arc<ChainStore>,
    summarizer: Arc<dyn Summarizer>,
    interval: u64,
    prefer_summaries: bool,
}

impl Autosummarizer {
    pub fn new(store: Arc<ChainStore>, summarizer: Arc<dyn Summarizer>) -> Self {
        Self {
            store,
            summarizer,
            interval: SUMMARY_INTERVAL,
            prefer_summaries: false,
        }
    }

    pub fn with_interval(mut self, interval: u64) -> Self {
        self.interval = interval.max(1);
        self
    }

    /// Prefer prior summary blocks over the raw blocks they cover when
    /// building long-horizon digests.
    pub fn with_prefer_summaries(mut self, prefer: bool) -> Self {
        self.prefer_summaries = prefer;
        self
    }

    /// Summarize the uncovered tail of `chain` if it is due (or forced).
    ///
    /// Returns the appended summary block, or `None` when the range is
    /// already covered or below the trigger threshold.
    pub async fn maybe_summarize(&self, chain: &str, force: bool) -> Result<Option<Block>> {
        let blocks = self.store.read_chain(chain)?;
        let Some(head) = blocks.last() else {
            return Ok(None);
        };

        let last_covered = last_summary_to(&blocks, chain);
        let from = last_covered.map(|to| to + 1).unwrap_or(0);
        let to = head.index;
        if from > to {
            return Ok(None);
        }

        let sources = self.select_sources(&blocks, from, to);
        if sources.is_empty() {
            return Ok(None);
        }
        let uncovered = to - from + 1;
        if !force && uncovered < self.interval {
            debug!(chain, uncovered, interval = self.interval, "summary not due");
            return Ok(None);
        }

        let digest = self.digest(chain, from, to, &sources).await?;
        let version = format!("v{}", summary_count(&blocks, chain) + 1);
        let refs: Vec<BlockRef> = sources
            .iter()
            .map(|b| BlockRef {
                chain: b.chain.clone(),
                index: b.index,
                hash: b.hash.clone(),
            })
            .collect();

        let payload = Payload::Summary(SummaryBody {
            content: digest,
            tags: vec!["summary".into(), "auto".into()],
            summary_range: SummaryRange {
                chain: chain.to_string(),
                from,
                to,
            },
            summary_refs: refs,
            summary_version: version.clone(),
            meta: PayloadMeta::default(),
        });
        let appended = self.store.append_block(chain, payload).await?;
        info!(chain, from, to, version, "summary block appended");
        Ok(Some(appended))
    }

    /// Source blocks for the range: content-bearing blocks, with summary
    /// blocks either excluded or (in prefer-summaries mode) replacing the
    /// raw blocks they cover.
    fn select_sources<'a>(&self, blocks: &'a [Block], from: u64, to: u64) -> Vec<&'a Block> {
        let in_range = |b: &Block| b.index >= from && b.index <= to;
        if !self.prefer_summaries {
            return blocks
                .iter()
                .filter(|b| in_range(b))
                .filter(|b| b.data.kind() != PayloadKind::Summary)
                .filter(|b| b.data.content_text().is_some())
                .collect();
        }

        let covered: Vec<(u64, u64)> = blocks
            .iter()
            .filter(|b| in_range(b))
            .filter_map(|b| match &b.data {
                Payload::Summary(body) => Some((body.summary_range.from, body.summary_range.to)),
                _ => None,
            })
            .collect();
        blocks
            .iter()
            .filter(|b| in_range(b))
            .filter(|b| b.data.content_text().is_some())
            .filter(|b| match b.data.kind() {
                PayloadKind::Summary => true,
                _ => !covered.iter().any(|(cf, ct)| b.index >= *cf && b.index <= *ct),
            })
            .collect()
    }

    /// Run the summarizer capability, chunking long ranges and combining
    /// the partial digests with a second pass.
    async fn digest(&self, chain: &str, from: u64, to: u64, sources: &[&Block]) -> Result<String> {
        let texts: Vec<String> = sources
            .iter()
            .filter_map(|b| b.data.content_text().map(str::to_string))
            .collect();

        let mut chunks: Vec<Vec<String>> = vec![Vec::new()];
        let mut current_len = 0usize;
        for text in texts {
            if current_len + text.len() > CHUNK_CHARS && !chunks.last().map(Vec::is_empty).unwrap_or(true) {
                chunks.push(Vec::new());
                current_len = 0;
            }
            current_len += text.len();
            if let Some(last) = chunks.last_mut() {
                last.push(text);
            }
        }

        let hint = format!("chain '{chain}' blocks {from}..={to}");
        if chunks.len() == 1 {
            return self.summarizer.summarize(&chunks[0], &hint).await;
        }

        let total = chunks.len();
        let mut partials = Vec::with_capacity(total);
        for (i, chunk) in chunks.iter().enumerate() {
            let part_hint = format!("{hint} (part {}/{total})", i + 1);
            partials.push(self.summarizer.summarize(chunk, &part_hint).await?);
        }
        self.summarizer
            .summarize(&partials, &format!("{hint} (combined)"))
            .await
    }
}

/// Highest covered index among the chain's own summary blocks.
fn last_summary_to(blocks: &[Block], chain: &str) -> Option<u64> {
    blocks
        .iter()
        .filter_map(|b| match &b.data {
            Payload::Summary(body) if body.summary_range.chain == chain => {
                Some(body.summary_range.to)
            }
            _ => None,
        })
        .max()
}

fn summary_count(blocks: &[Block], chain: &str) -> usize {
    blocks
        .iter()
        .filter(|b| match &b.data {
            Payload::Summary(body) => body.summary_range.chain == chain,
            _ => false,
        })
        .count()
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use engram_core::block::TextBody;
    use engram_core::home::HomeLayout;
    use engram_ledger::verify::verify_chain;

    /// Joins inputs with a marker so tests can see what was consumed.
    struct JoiningSummarizer;

    #[async_trait]
    impl Summarizer for JoiningSummarizer {
        async fn summarize(&self, texts: &[String], _hint: &str) -> Result<String> {
            Ok(format!("digest[{}]", texts.join(" | ")))
        }
    }

    fn journal(content: &str) -> Payload {
        Payload::Journal(TextBody::new(content, vec![]))
    }

    async fn seeded(dir: &std::path::Path, n: usize) -> (Arc<ChainStore>, Autosummarizer) {
        let store = Arc::new(ChainStore::new(HomeLayout::new(dir)));
        for i in 0..n {
            store
                .append_block("journal", journal(&format!("entry {i}")))
                .await
                .unwrap();
        }
        let auto =
            Autosummarizer::new(store.clone(), Arc::new(JoiningSummarizer)).with_interval(3);
        (store, auto)
    }

    #[tokio::test]
    async fn test_below_threshold_is_noop() {
        let dir = tempfile::tempdir().unwrap();
        let (_store, auto) = seeded(dir.path(), 2).await;
        assert!(auto.maybe_summarize("journal", false).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_threshold_triggers_summary() {
        let dir = tempfile::tempdir().unwrap();
        let (store, auto) = seeded(dir.path(), 3).await;
        let summary = auto
            .maybe_summarize("journal", false)
            .await
            .unwrap()
            .unwrap();

        let Payload::Summary(body) = &summary.data else {
            panic!("expected summary payload");
        };
        assert_eq!(body.summary_range.from, 0);
        assert_eq!(body.summary_range.to, 2);
        assert_eq!(body.summary_refs.len(), 3);
        assert_eq!(body.summary_version, "v1");
        assert!(body.content.contains("entry 0"));

        assert!(verify_chain(&store.read_chain("journal").unwrap()).valid);
    }

    #[tokio::test]
    async fn test_covered_range_not_resummarized() {
        let dir = tempfile::tempdir().unwrap();
        let (store, auto) = seeded(dir.path(), 3).await;
        auto.maybe_summarize("journal", false).await.unwrap().unwrap();
        // Second run: only the summary block itself is uncovered — no-op.
        assert!(auto.maybe_summarize("journal", false).await.unwrap().is_none());
        let summaries = store
            .read_chain("journal")
            .unwrap()
            .iter()
            .filter(|b| b.data.kind() == PayloadKind::Summary)
            .count();
        assert_eq!(summaries, 1);
    }

    #[tokio::test]
    async fn test_force_summarizes_short_range() {
        let dir = tempfile::tempdir().unwrap();
        let (_store, auto) = seeded(dir.path(), 1).await;
        let summary = auto.maybe_summarize("journal", true).await.unwrap().unwrap();
        let Payload::Summary(body) = &summary.data else {
            panic!("expected summary payload");
        };
        assert_eq!(body.summary_range.to, 0);
    }

    #[tokio::test]
    async fn test_versions_increase_monotonically() {
        let dir = tempfile::tempdir().unwrap();
        let (store, auto) = seeded(dir.path(), 3).await;
        auto.maybe_summarize("journal", false).await.unwrap().unwrap();
        for i in 0..3 {
            store
                .append_block("journal", journal(&format!("later {i}")))
                .await
                .unwrap();
        }
        let second = auto.maybe_summarize("journal", false).await.unwrap().unwrap();
        let Payload::Summary(body) = &second.data else {
            panic!("expected summary payload");
        };
        assert_eq!(body.summary_version, "v2");
        // The second range picks up right after the covered range; the
        // prior summary block sits inside it but is not a source.
        assert_eq!(body.summary_range.from, 3);
        assert_eq!(body.summary_range.to, 6);
        assert_eq!(body.summary_refs.len(), 3);
    }

    #[tokio::test]
    async fn test_prefer_summaries_consumes_prior_digest() {
        let dir = tempfile::tempdir().unwrap();
        let (store, auto) = seeded(dir.path(), 3).await;
        auto.maybe_summarize("journal", false).await.unwrap().unwrap();
        store
            .append_block("journal", journal("fresh entry"))
            .await
            .unwrap();

        let long_horizon = Autosummarizer::new(store.clone(), Arc::new(JoiningSummarizer))
            .with_interval(1)
            .with_prefer_summaries(true);
        // Force a digest over everything from 0: the prior summary stands
        // in for blocks 0..=2.
        let blocks = store.read_chain("journal").unwrap();
        let sources = long_horizon.select_sources(&blocks, 0, 4);
        let indices: Vec<u64> = sources.iter().map(|b| b.index).collect();
        assert_eq!(indices, vec![3, 4]); // summary block + fresh entry
    }
}
