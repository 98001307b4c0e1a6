//! Fire-and-forget post-write hooks.
//!
//! Hooks run in a detached task after `append_block` returns, so caller
//! latency never includes them. Every hook call is bounded by a deadline;
//! expiry is a silent skip. Hook errors are swallowed into at most one
//! `system` diagnostic block per trigger — and if even that append fails,
//! the failure is only logged.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::timeout;
use tracing::{debug, warn};

use engram_core::block::{Block, Payload, TextBody};
use engram_core::error::EngramError;
use engram_ledger::store::ChainStore;

use crate::detector::DecisionDetector;
use crate::summarizer::Autosummarizer;

pub const DEFAULT_DEADLINE: Duration = Duration::from_secs(10);

pub struct HookRunner {
    store: Arc<ChainStore>,
    detector: Option<Arc<DecisionDetector>>,
    summarizer: Option<Arc<Autosummarizer>>,
    deadline: Duration,
}

impl HookRunner {
    pub fn new(store: Arc<ChainStore>) -> Self {
        Self {
            store,
            detector: None,
            summarizer: None,
            deadline: DEFAULT_DEADLINE,
        }
    }

    pub fn with_detector(mut self, detector: Arc<DecisionDetector>) -> Self {
        self.detector = Some(detector);
        self
    }

    pub fn with_summarizer(mut self, summarizer: Arc<Autosummarizer>) -> Self {
        self.summarizer = Some(summarizer);
        self
    }

    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = deadline;
        self
    }

    /// Kick off the post-write hooks for a freshly appended block.
    ///
    /// Returns the task handle; production callers drop it, tests await it.
    pub fn notify(&self, block: &Block) -> JoinHandle<()> {
        let store = self.store.clone();
        let detector = self.detector.clone();
        let summarizer = self.summarizer.clone();
        let deadline = self.deadline;
        let block = block.clone();

        tokio::spawn(async move {
            if let Some(detector) = detector {
                match timeout(deadline, detector.inspect(&block)).await {
                    Err(_) => debug!(chain = %block.chain, "decision hook deadline expired"),
                    Ok(Err(e)) => diagnose(&store, &block.chain, "decision detection", &e).await,
                    Ok(Ok(_)) => {}
                }
            }
            if let Some(summarizer) = summarizer {
                match timeout(deadline, summarizer.maybe_summarize(&block.chain, false)).await {
                    Err(_) => debug!(chain = %block.chain, "summary hook deadline expired"),
                    Ok(Err(e)) => diagnose(&store, &block.chain, "autosummary", &e).await,
                    Ok(Ok(_)) => {}
                }
            }
        })
    }
}

/// Best-effort diagnostic block; its own failure is only logged.
async fn diagnose(store: &ChainStore, chain: &str, hook: &str, error: &EngramError) {
    warn!(chain, hook, error = %error, "post-write hook failed");
    let payload = Payload::System(TextBody::new(
        format!("{hook} hook failed: {error}"),
        vec!["diagnostic".into()],
    ));
    if let Err(e) = store.append_block(chain, payload).await {
        warn!(chain, error = %e, "failed to append hook diagnostic block");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use engram_core::block::PayloadKind;
    use engram_core::capability::{Classifier, DecisionHint, Summarizer};
    use engram_core::error::Result;
    use engram_core::home::HomeLayout;

    struct KeywordClassifier;

    #[async_trait]
    impl Classifier for KeywordClassifier {
        async fn classify(&self, content: &str, _window: &[Block]) -> Result<DecisionHint> {
            Ok(DecisionHint {
                is_decision: content.contains("decided"),
                title: Some("choice".into()),
                chosen: Some("yes".into()),
                options: vec!["yes".into(), "no".into()],
                reasoning: None,
                confidence: 0.9,
            })
        }
    }

    struct FailingClassifier;

    #[async_trait]
    impl Classifier for FailingClassifier {
        async fn classify(&self, _content: &str, _window: &[Block]) -> Result<DecisionHint> {
            Err(EngramError::internal("model unavailable"))
        }
    }

    struct SlowClassifier;

    #[async_trait]
    impl Classifier for SlowClassifier {
        async fn classify(&self, _content: &str, _window: &[Block]) -> Result<DecisionHint> {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(DecisionHint::default())
        }
    }

    struct JoiningSummarizer;

    #[async_trait]
    impl Summarizer for JoiningSummarizer {
        async fn summarize(&self, texts: &[String], _hint: &str) -> Result<String> {
            Ok(format!("digest of {} texts", texts.len()))
        }
    }

    fn journal(content: &str) -> Payload {
        Payload::Journal(TextBody::new(content, vec![]))
    }

    fn make_store(dir: &std::path::Path) -> Arc<ChainStore> {
        Arc::new(ChainStore::new(HomeLayout::new(dir)))
    }

    #[tokio::test]
    async fn test_detection_fixed_point_end_to_end() {
        let dir = tempfile::tempdir().unwrap();
        let store = make_store(dir.path());
        let runner = HookRunner::new(store.clone()).with_detector(Arc::new(
            DecisionDetector::new(store.clone(), Arc::new(KeywordClassifier)),
        ));

        let trigger = store
            .append_block("journal", journal("decided to ship on friday"))
            .await
            .unwrap();
        runner.notify(&trigger).await.unwrap();

        let chain = store.read_chain("journal").unwrap();
        assert_eq!(chain.len(), 2);
        let derived = &chain[1];
        assert_eq!(derived.data.kind(), PayloadKind::Decision);
        assert_eq!(derived.data.source_ref().unwrap().index, trigger.index);

        // Notifying on the derived block appends nothing further.
        runner.notify(derived).await.unwrap();
        assert_eq!(store.read_chain("journal").unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_hook_failure_leaves_system_diagnostic() {
        let dir = tempfile::tempdir().unwrap();
        let store = make_store(dir.path());
        let runner = HookRunner::new(store.clone()).with_detector(Arc::new(
            DecisionDetector::new(store.clone(), Arc::new(FailingClassifier)),
        ));

        let trigger = store
            .append_block("journal", journal("an ordinary entry"))
            .await
            .unwrap();
        runner.notify(&trigger).await.unwrap();

        let chain = store.read_chain("journal").unwrap();
        assert_eq!(chain.len(), 2);
        assert_eq!(chain[1].data.kind(), PayloadKind::System);
        assert!(chain[1]
            .data
            .content_text()
            .unwrap()
            .contains("model unavailable"));
    }

    #[tokio::test]
    async fn test_deadline_expiry_is_silent_skip() {
        let dir = tempfile::tempdir().unwrap();
        let store = make_store(dir.path());
        let runner = HookRunner::new(store.clone())
            .with_detector(Arc::new(DecisionDetector::new(
                store.clone(),
                Arc::new(SlowClassifier),
            )))
            .with_deadline(Duration::from_millis(10));

        let trigger = store
            .append_block("journal", journal("entry"))
            .await
            .unwrap();
        runner.notify(&trigger).await.unwrap();

        // No decision block, no diagnostic — just the trigger.
        assert_eq!(store.read_chain("journal").unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_summary_hook_fires_on_threshold() {
        let dir = tempfile::tempdir().unwrap();
        let store = make_store(dir.path());
        let auto = Autosummarizer::new(store.clone(), Arc::new(JoiningSummarizer))
            .with_interval(3);
        let runner = HookRunner::new(store.clone()).with_summarizer(Arc::new(auto));

        for i in 0..3 {
            let block = store
                .append_block("journal", journal(&format!("entry {i}")))
                .await
                .unwrap();
            runner.notify(&block).await.unwrap();
        }

        let chain = store.read_chain("journal").unwrap();
        assert_eq!(chain.last().unwrap().data.kind(), PayloadKind::Summary);
    }
}
