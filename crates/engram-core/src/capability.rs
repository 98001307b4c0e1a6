//! Capability traits consumed by the core.
//!
//! Embedding, classification, summarization, and completion are provided by
//! external collaborators (LLM adapters, local models). The core sees only
//! these seams: pure, cancellable async calls with no visibility into ledger
//! internals. Implementations must honor their own deadlines; the core
//! additionally bounds post-write hook calls with a timeout.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::block::Block;
use crate::error::Result;

/// Text → vector embedding provider.
#[async_trait]
pub trait Embedder: Send + Sync {
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Model name, used as the cache key component.
    fn name(&self) -> &str;

    /// Vector dimensionality, fixed per model.
    fn dim(&self) -> usize;
}

/// Classifier output for a candidate decision.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DecisionHint {
    pub is_decision: bool,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub chosen: Option<String>,
    #[serde(default)]
    pub options: Vec<String>,
    #[serde(default)]
    pub reasoning: Option<String>,
    #[serde(default)]
    pub confidence: f64,
}

/// Decides whether a text block records a decision.
#[async_trait]
pub trait Classifier: Send + Sync {
    /// Classify `content` given a small window of recent blocks for context.
    async fn classify(&self, content: &str, window: &[Block]) -> Result<DecisionHint>;
}

/// Condenses a set of texts into a digest.
#[async_trait]
pub trait Summarizer: Send + Sync {
    /// `hint` describes what is being summarized (chain name, range).
    async fn summarize(&self, texts: &[String], hint: &str) -> Result<String>;
}

/// Plain prompt → completion provider.
///
/// Providers form a strategy list; the core only ever talks to the first
/// configured one (see the hooks crate's completion router).
#[async_trait]
pub trait Completion: Send + Sync {
    async fn complete(&self, prompt: &str) -> Result<String>;

    /// True when the provider has everything it needs (keys, endpoint).
    fn is_configured(&self) -> bool;

    fn name(&self) -> &str;
}
