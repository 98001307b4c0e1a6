//! The hybrid recall pipeline.
//!
//! Scope → filter → lexical score → optional semantic merge → total order.
//! Lexical scores are normalized into `[0, 1]`; semantic scores are cosine
//! similarity mapped `[-1, 1] → [0, 1]`; the blend is
//! `final = (1-w)·lexical + w·semantic`. Ordering is total (score desc,
//! timestamp desc, then `(chain, index)` asc) so recall is deterministic.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, warn};

use engram_core::block::{Block, PayloadKind};
use engram_core::capability::Embedder;
use engram_core::error::Result;
use engram_core::home::HomeLayout;
use engram_ledger::store::ChainStore;

use crate::cache::{EmbedCache, DEFAULT_CAPACITY};
use crate::index::EmbeddingIndex;
use crate::lexical;
use crate::query::{snippet, RecallHit, RecallQuery};

pub struct RecallEngine {
    store: Arc<ChainStore>,
    index: EmbeddingIndex,
    cache: Arc<EmbedCache>,
    embedder: Option<Arc<dyn Embedder>>,
}

impl RecallEngine {
    pub fn new(store: Arc<ChainStore>, embedder: Option<Arc<dyn Embedder>>) -> Self {
        let home: HomeLayout = store.home().clone();
        let cache = Arc::new(EmbedCache::new(&home, DEFAULT_CAPACITY));
        Self {
            store,
            index: EmbeddingIndex::new(home),
            cache,
            embedder,
        }
    }

    pub fn cache(&self) -> &EmbedCache {
        &self.cache
    }

    pub fn index(&self) -> &EmbeddingIndex {
        &self.index
    }

    /// Run one recall pass.
    ///
    /// A chain whose directory read fails is skipped with a warning — read
    /// errors in one chain never poison cross-chain recall.
    pub async fn recall(&self, query: &RecallQuery) -> Result<Vec<RecallHit>> {
        let chains = match &query.chain {
            Some(chain) => vec![chain.clone()],
            None => self.store.list_chains()?,
        };

        let terms = query
            .text
            .as_deref()
            .map(lexical::tokenize)
            .unwrap_or_default();
        let query_vector = self.query_vector(query, &terms).await;
        let now = Utc::now();

        let mut scored: Vec<(f64, RecallHit)> = Vec::new();
        for chain in &chains {
            let blocks = match self.store.read_chain(chain) {
                Ok(blocks) => blocks,
                Err(e) => {
                    warn!(chain, error = %e, "skipping unreadable chain during recall");
                    continue;
                }
            };
            if !query.include_vault && is_vault_chain(&blocks) {
                continue;
            }

            let vectors: HashMap<u64, Vec<f32>> = match &query_vector {
                Some(_) if self.index.has_index(chain) => self
                    .index
                    .lookup(chain)?
                    .into_iter()
                    .map(|e| (e.block_index, e.vector))
                    .collect(),
                _ => HashMap::new(),
            };

            for block in blocks {
                if !matches_filters(&block, query) {
                    continue;
                }
                let Some(content) = block.data.content_text() else {
                    continue;
                };

                let haystack = format!("{} {}", content, block.data.tags().join(" "));
                let age_days =
                    (now - block.timestamp).num_seconds().max(0) as f64 / 86_400.0;
                let raw = lexical::lexical_score(&terms, &haystack, age_days);
                let lex = lexical::normalize(raw, terms.len());

                let sem = query_vector
                    .as_ref()
                    .and_then(|qv| vectors.get(&block.index).map(|v| cosine(qv, v)))
                    .map(|cos| (cos + 1.0) / 2.0);

                let weight = if query.semantic_only {
                    1.0
                } else if sem.is_some() {
                    query.semantic_weight.clamp(0.0, 1.0)
                } else {
                    0.0
                };
                let score = (1.0 - weight) * lex + weight * sem.unwrap_or(0.0);

                scored.push((
                    score,
                    RecallHit {
                        chain: block.chain.clone(),
                        index: block.index,
                        kind: block.data.kind(),
                        score: 0.0, // rounded below
                        snippet: snippet(content),
                        timestamp: block.timestamp,
                        tags: block.data.tags().to_vec(),
                    },
                ));
            }
        }

        // Total order: score desc, timestamp desc, (chain, index) asc.
        scored.sort_by(|a, b| {
            b.0.partial_cmp(&a.0)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| b.1.timestamp.cmp(&a.1.timestamp))
                .then_with(|| a.1.chain.cmp(&b.1.chain))
                .then_with(|| a.1.index.cmp(&b.1.index))
        });
        scored.truncate(query.limit);

        debug!(hits = scored.len(), "recall complete");
        Ok(scored
            .into_iter()
            .map(|(score, mut hit)| {
                hit.score = (score * 100.0).round() / 100.0;
                hit
            })
            .collect())
    }

    /// Embed the query text through the cache, when the semantic side is on.
    async fn query_vector(&self, query: &RecallQuery, terms: &[String]) -> Option<Vec<f32>> {
        if query.no_semantic || terms.is_empty() {
            return None;
        }
        let embedder = self.embedder.as_ref()?;
        if !query.semantic_only && query.semantic_weight <= 0.0 {
            return None;
        }
        let text = query.text.as_deref()?;
        if let Some(vector) = self.cache.get(text, embedder.name()) {
            return Some(vector);
        }
        match embedder.embed(text).await {
            Ok(vector) => {
                self.cache.put(text, embedder.name(), vector.clone());
                if let Err(e) = self.cache.persist() {
                    debug!(error = %e, "embed cache persist skipped");
                }
                Some(vector)
            }
            Err(e) => {
                warn!(error = %e, "query embedding failed; falling back to lexical");
                None
            }
        }
    }
}

fn matches_filters(block: &Block, query: &RecallQuery) -> bool {
    if !query.include_vault && block.data.kind() == PayloadKind::Vault {
        return false;
    }
    if let Some(kind) = query.kind {
        if block.data.kind() != kind {
            return false;
        }
    }
    if let Some(tag) = &query.tag {
        if !block.data.tags().iter().any(|t| t == tag) {
            return false;
        }
    }
    if let Some(since) = query.since {
        if block.timestamp < since {
            return false;
        }
    }
    if let Some(until) = query.until {
        if block.timestamp > until {
            return false;
        }
    }
    true
}

/// A chain is a vault chain when its blocks are vault blocks.
fn is_vault_chain(blocks: &[Block]) -> bool {
    blocks
        .last()
        .map(|b| b.data.kind() == PayloadKind::Vault)
        .unwrap_or(false)
}

/// Cosine similarity; zero when either vector is degenerate.
fn cosine(a: &[f32], b: &[f32]) -> f64 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let (mut dot, mut na, mut nb) = (0.0f64, 0.0f64, 0.0f64);
    for (x, y) in a.iter().zip(b) {
        dot += (*x as f64) * (*y as f64);
        na += (*x as f64) * (*x as f64);
        nb += (*y as f64) * (*y as f64);
    }
    if na == 0.0 || nb == 0.0 {
        return 0.0;
    }
    dot / (na.sqrt() * nb.sqrt())
}
