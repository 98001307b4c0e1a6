//! SOUL — the per-block and cross-block invariants.
//!
//! The rules are enumerated once and enforced on every write and on every
//! full-chain verify. Two of them (S5 allowed payload type, S6 tags is a
//! list) are discharged by the typed payload parser: a file violating them
//! never becomes a `Block` and surfaces as `CorruptBlock` at read time.
//! Evaluation collects every violated rule rather than stopping at the
//! first, so verify reports are complete.

use serde::{Deserialize, Serialize};
use std::fmt;

use engram_core::block::{Block, BlockHash, Payload};
use engram_core::error::EngramError;

/// The enumerated rule set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SoulRule {
    /// S1 — `hash` and `prev_hash` are 64 lowercase hex chars.
    HashFormat,
    /// S2 — `prev_hash` equals the predecessor's hash (zeros at genesis).
    PrevHashLink,
    /// S3 — timestamp is non-decreasing along the chain.
    TimestampOrder,
    /// S4 — text variants carry a non-empty `content`.
    ContentPresent,
    /// S5 — `data.type` is in the allowed set (parser-enforced).
    KnownType,
    /// S6 — `data.tags` is a list (parser-enforced).
    TagsShape,
    /// S7 — `index` equals predecessor index + 1 (zero at genesis).
    IndexContinuity,
    /// S8 — vault payloads carry `iv`, and `encrypted` unless genesis or revoked.
    VaultFields,
    /// S9 — credential payloads carry `schema`, `issuer`, `holder`.
    CredentialFields,
}

impl SoulRule {
    pub fn id(&self) -> &'static str {
        match self {
            Self::HashFormat => "S1",
            Self::PrevHashLink => "S2",
            Self::TimestampOrder => "S3",
            Self::ContentPresent => "S4",
            Self::KnownType => "S5",
            Self::TagsShape => "S6",
            Self::IndexContinuity => "S7",
            Self::VaultFields => "S8",
            Self::CredentialFields => "S9",
        }
    }
}

impl fmt::Display for SoulRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

/// One violated rule with its detail.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SoulError {
    pub rule: SoulRule,
    pub detail: String,
}

impl SoulError {
    fn new(rule: SoulRule, detail: impl Into<String>) -> Self {
        Self {
            rule,
            detail: detail.into(),
        }
    }
}

impl From<SoulError> for EngramError {
    fn from(err: SoulError) -> Self {
        EngramError::SoulViolation {
            rule: err.rule.id().to_string(),
            detail: err.detail,
        }
    }
}

/// Check one candidate against its predecessor.
///
/// Returns every violated rule; an empty vec means the block is sound.
pub fn check_block(candidate: &Block, predecessor: Option<&Block>) -> Vec<SoulError> {
    let mut errors = Vec::new();

    // S1 — hash formats.
    if !candidate.hash.is_valid() {
        errors.push(SoulError::new(
            SoulRule::HashFormat,
            format!("hash '{}' is not 64 lowercase hex chars", candidate.hash),
        ));
    }
    if !candidate.prev_hash.is_valid() {
        errors.push(SoulError::new(
            SoulRule::HashFormat,
            format!(
                "prev_hash '{}' is not 64 lowercase hex chars",
                candidate.prev_hash
            ),
        ));
    }

    // S2 / S7 — linkage and index continuity, genesis rules included.
    match predecessor {
        None => {
            if candidate.prev_hash != BlockHash::genesis() {
                errors.push(SoulError::new(
                    SoulRule::PrevHashLink,
                    "genesis block must have an all-zero prev_hash",
                ));
            }
            if candidate.index != 0 {
                errors.push(SoulError::new(
                    SoulRule::IndexContinuity,
                    format!("genesis block must have index 0, got {}", candidate.index),
                ));
            }
        }
        Some(prev) => {
            if candidate.prev_hash != prev.hash {
                errors.push(SoulError::new(
                    SoulRule::PrevHashLink,
                    format!(
                        "prev_hash {} does not match predecessor hash {}",
                        candidate.prev_hash, prev.hash
                    ),
                ));
            }
            if candidate.index != prev.index + 1 {
                errors.push(SoulError::new(
                    SoulRule::IndexContinuity,
                    format!(
                        "expected index {}, got {}",
                        prev.index + 1,
                        candidate.index
                    ),
                ));
            }
            // S3 — timestamps never regress.
            if candidate.timestamp < prev.timestamp {
                errors.push(SoulError::new(
                    SoulRule::TimestampOrder,
                    format!(
                        "timestamp {} is earlier than predecessor {}",
                        candidate.timestamp, prev.timestamp
                    ),
                ));
            }
        }
    }

    // S4 — text variants need content.
    if candidate.data.is_text_variant()
        && candidate
            .data
            .content_text()
            .map(|c| c.trim().is_empty())
            .unwrap_or(true)
    {
        errors.push(SoulError::new(
            SoulRule::ContentPresent,
            "content must be a non-empty string",
        ));
    }

    // S8 — vault field requirements.
    if let Payload::Vault(body) = &candidate.data {
        if body.iv.is_empty() {
            errors.push(SoulError::new(SoulRule::VaultFields, "vault block missing iv"));
        }
        let exempt = candidate.index == 0 || body.revoked;
        if !exempt && body.encrypted.as_deref().unwrap_or("").is_empty() {
            errors.push(SoulError::new(
                SoulRule::VaultFields,
                "non-genesis vault block missing encrypted payload",
            ));
        }
    }

    // S9 — credential field requirements.
    if let Payload::Credential(body) = &candidate.data {
        for (field, value) in [
            ("schema", &body.schema),
            ("issuer", &body.issuer),
            ("holder", &body.holder),
        ] {
            if value.trim().is_empty() {
                errors.push(SoulError::new(
                    SoulRule::CredentialFields,
                    format!("credential block missing {field}"),
                ));
            }
        }
    }

    errors
}
