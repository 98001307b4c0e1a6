//! `engram-recall` — Hybrid lexical + semantic recall.
//!
//! # Design
//! - Additive token/substring lexical scoring with a 30-day recency bonus
//! - Cosine similarity over a persistent per-chain embedding index
//! - Blend `final = (1-w)·lexical + w·semantic`, deterministic total order
//! - Query embeddings cached in a bounded LRU, persisted opportunistically

pub mod cache;
pub mod engine;
pub mod index;
pub mod lexical;
pub mod query;

pub use cache::{CacheStats, EmbedCache};
pub use engine::RecallEngine;
pub use index::{EmbeddingEntry, EmbeddingIndex, ManifestEntry, VectorRecord};
pub use query::{snippet, truncate, RecallHit, RecallQuery, DEFAULT_LIMIT, SNIPPET_LEN};
