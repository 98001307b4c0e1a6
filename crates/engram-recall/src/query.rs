//! Recall query and hit types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use engram_core::block::PayloadKind;

pub const DEFAULT_LIMIT: usize = 20;
pub const DEFAULT_SEMANTIC_WEIGHT: f64 = 0.5;
pub const SNIPPET_LEN: usize = 200;

/// Parameters for one recall pass.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecallQuery {
    /// Free-text query. Empty or absent means "newest first".
    pub text: Option<String>,
    /// Restrict to one chain; otherwise all non-vault chains.
    pub chain: Option<String>,
    pub kind: Option<PayloadKind>,
    pub tag: Option<String>,
    pub since: Option<DateTime<Utc>>,
    pub until: Option<DateTime<Utc>>,
    pub limit: usize,
    pub include_vault: bool,
    /// Rank purely by semantic similarity (`weight = 1.0`).
    pub semantic_only: bool,
    /// Disable the semantic merge even when an index exists.
    pub no_semantic: bool,
    /// Blend weight `w` in `final = (1-w)·lexical + w·semantic`.
    pub semantic_weight: f64,
}

impl Default for RecallQuery {
    fn default() -> Self {
        Self {
            text: None,
            chain: None,
            kind: None,
            tag: None,
            since: None,
            until: None,
            limit: DEFAULT_LIMIT,
            include_vault: false,
            semantic_only: false,
            no_semantic: false,
            semantic_weight: DEFAULT_SEMANTIC_WEIGHT,
        }
    }
}

impl RecallQuery {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            ..Self::default()
        }
    }

    pub fn in_chain(mut self, chain: impl Into<String>) -> Self {
        self.chain = Some(chain.into());
        self
    }

    pub fn semantic_only(mut self) -> Self {
        self.semantic_only = true;
        self
    }
}

/// One scored result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecallHit {
    pub chain: String,
    pub index: u64,
    pub kind: PayloadKind,
    /// Blended score, rounded to two decimals.
    pub score: f64,
    pub snippet: String,
    pub timestamp: DateTime<Utc>,
    pub tags: Vec<String>,
}

/// Truncate to at most `n` code points, appending `…` only when shortened.
pub fn truncate(s: &str, n: usize) -> String {
    if s.chars().count() <= n {
        return s.to_string();
    }
    let mut out: String = s.chars().take(n).collect();
    out.push('…');
    out
}

/// First `SNIPPET_LEN` chars of content with newlines collapsed to spaces.
pub fn snippet(content: &str) -> String {
    let collapsed: String = content
        .split(['\n', '\r'])
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(" ");
    truncate(collapsed.trim(), SNIPPET_LEN)
}
