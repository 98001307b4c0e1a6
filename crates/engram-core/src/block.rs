//! Block and payload domain model.
//!
//! A chain is an ordered log of immutable `Block`s, one JSON file per block.
//! Blocks are SHA-256 hash-chained: each block's `prev_hash` is the hash of
//! its predecessor, and its own `hash` is computed over the canonical JSON
//! of all remaining fields. Canonical means: serde struct field order (the
//! order declared here is the on-disk contract), no extra whitespace, UTF-8,
//! minimal number encoding. Writer and verifier share this serializer.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

use crate::error::{EngramError, Result};

/// SHA-256 hash represented as 64 lowercase hex chars.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BlockHash(pub String);

impl BlockHash {
    /// Genesis predecessor hash — all zeros.
    #[must_use]
    pub fn genesis() -> Self {
        Self("0".repeat(64))
    }

    /// True when the value is 64 lowercase hex chars.
    pub fn is_valid(&self) -> bool {
        self.0.len() == 64
            && self
                .0
                .bytes()
                .all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b))
    }
}

impl fmt::Display for BlockHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Compact pointer to a block in some chain.
///
/// Used by `source_ref`, `context_refs`, and `summary_refs`. Targets always
/// have a strictly smaller index than the referring block, so no reference
/// cycle is possible.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockRef {
    pub chain: String,
    pub index: u64,
    pub hash: BlockHash,
}

/// Index range covered by a summary block, inclusive on both ends.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SummaryRange {
    pub chain: String,
    pub from: u64,
    pub to: u64,
}

fn is_false(b: &bool) -> bool {
    !*b
}

/// Optional fields shared by payload variants.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PayloadMeta {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tokens_used: Option<u64>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub context_refs: Vec<BlockRef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_ref: Option<BlockRef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub supersedes: Option<String>,
}

/// Free-text payload body used by journal/build/adr/ops/ask/system entries,
/// and by decision blocks (whose `content` is a serialized decision record).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TextBody {
    pub content: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(flatten)]
    pub meta: PayloadMeta,
}

impl TextBody {
    pub fn new(content: impl Into<String>, tags: Vec<String>) -> Self {
        Self {
            content: content.into(),
            tags,
            meta: PayloadMeta::default(),
        }
    }
}

/// Derived payload summarizing a range of source blocks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummaryBody {
    pub content: String,
    #[serde(default)]
    pub tags: Vec<String>,
    pub summary_range: SummaryRange,
    pub summary_refs: Vec<BlockRef>,
    pub summary_version: String,
    #[serde(flatten)]
    pub meta: PayloadMeta,
}

/// Encrypted secret payload. `content` is a non-secret label; the secret
/// lives in `encrypted` as a base64 envelope. Revocation tombstones carry
/// no ciphertext.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VaultBody {
    pub content: String,
    pub key_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub encrypted: Option<String>,
    pub iv: String,
    #[serde(default, skip_serializing_if = "is_false")]
    pub revoked: bool,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(flatten)]
    pub meta: PayloadMeta,
}

/// Verifiable-credential payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CredentialBody {
    pub schema: String,
    pub issuer: String,
    pub holder: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub proof: Option<String>,
    #[serde(default, skip_serializing_if = "is_false")]
    pub revoked: bool,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(flatten)]
    pub meta: PayloadMeta,
}

/// Tagged payload union keyed by `type`.
///
/// Unknown tags are rejected at deserialization, which is where the store's
/// "unknown variants are rejected" rule lives.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Payload {
    Journal(TextBody),
    Build(TextBody),
    Adr(TextBody),
    Ops(TextBody),
    Ask(TextBody),
    System(TextBody),
    Decision(TextBody),
    Summary(SummaryBody),
    Vault(VaultBody),
    Credential(CredentialBody),
}

/// Discriminant of a payload, used for filters and validation messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PayloadKind {
    Journal,
    Build,
    Adr,
    Ops,
    Ask,
    System,
    Decision,
    Summary,
    Vault,
    Credential,
}

impl PayloadKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Journal => "journal",
            Self::Build => "build",
            Self::Adr => "adr",
            Self::Ops => "ops",
            Self::Ask => "ask",
            Self::System => "system",
            Self::Decision => "decision",
            Self::Summary => "summary",
            Self::Vault => "vault",
            Self::Credential => "credential",
        }
    }
}

impl std::str::FromStr for PayloadKind {
    type Err = EngramError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "journal" => Ok(Self::Journal),
            "build" => Ok(Self::Build),
            "adr" => Ok(Self::Adr),
            "ops" => Ok(Self::Ops),
            "ask" => Ok(Self::Ask),
            "system" => Ok(Self::System),
            "decision" => Ok(Self::Decision),
            "summary" => Ok(Self::Summary),
            "vault" => Ok(Self::Vault),
            "credential" => Ok(Self::Credential),
            other => Err(EngramError::invalid_argument(
                "type",
                format!("unknown payload type '{other}'"),
            )),
        }
    }
}

impl fmt::Display for PayloadKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Payload {
    pub fn kind(&self) -> PayloadKind {
        match self {
            Self::Journal(_) => PayloadKind::Journal,
            Self::Build(_) => PayloadKind::Build,
            Self::Adr(_) => PayloadKind::Adr,
            Self::Ops(_) => PayloadKind::Ops,
            Self::Ask(_) => PayloadKind::Ask,
            Self::System(_) => PayloadKind::System,
            Self::Decision(_) => PayloadKind::Decision,
            Self::Summary(_) => PayloadKind::Summary,
            Self::Vault(_) => PayloadKind::Vault,
            Self::Credential(_) => PayloadKind::Credential,
        }
    }

    /// The searchable text of this payload, if it has one.
    ///
    /// Credentials carry no free text; vault labels are searchable but the
    /// recall engine excludes vault chains by default.
    pub fn content_text(&self) -> Option<&str> {
        match self {
            Self::Journal(b)
            | Self::Build(b)
            | Self::Adr(b)
            | Self::Ops(b)
            | Self::Ask(b)
            | Self::System(b)
            | Self::Decision(b) => Some(&b.content),
            Self::Summary(b) => Some(&b.content),
            Self::Vault(b) => Some(&b.content),
            Self::Credential(_) => None,
        }
    }

    pub fn tags(&self) -> &[String] {
        match self {
            Self::Journal(b)
            | Self::Build(b)
            | Self::Adr(b)
            | Self::Ops(b)
            | Self::Ask(b)
            | Self::System(b)
            | Self::Decision(b) => &b.tags,
            Self::Summary(b) => &b.tags,
            Self::Vault(b) => &b.tags,
            Self::Credential(b) => &b.tags,
        }
    }

    pub fn meta(&self) -> &PayloadMeta {
        match self {
            Self::Journal(b)
            | Self::Build(b)
            | Self::Adr(b)
            | Self::Ops(b)
            | Self::Ask(b)
            | Self::System(b)
            | Self::Decision(b) => &b.meta,
            Self::Summary(b) => &b.meta,
            Self::Vault(b) => &b.meta,
            Self::Credential(b) => &b.meta,
        }
    }

    pub fn source_ref(&self) -> Option<&BlockRef> {
        self.meta().source_ref.as_ref()
    }

    /// Variants whose free text must be a non-empty string.
    pub fn is_text_variant(&self) -> bool {
        matches!(
            self,
            Self::Journal(_)
                | Self::Build(_)
                | Self::Adr(_)
                | Self::Ops(_)
                | Self::Ask(_)
                | Self::System(_)
        )
    }

    /// Variants that trigger decision detection after append.
    pub fn is_text_bearing(&self) -> bool {
        matches!(self, Self::Journal(_) | Self::Ask(_))
    }
}

/// One immutable record in a chain.
///
/// Field declaration order here is the canonical JSON order; `hash` is
/// computed over the serialization of all other fields in this order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Block {
    pub index: u64,
    pub timestamp: DateTime<Utc>,
    pub chain: String,
    pub data: Payload,
    pub prev_hash: BlockHash,
    pub hash: BlockHash,
}

/// Hash preimage — every block field except `hash`, in canonical order.
#[derive(Serialize)]
struct Preimage<'a> {
    index: u64,
    timestamp: &'a DateTime<Utc>,
    chain: &'a str,
    data: &'a Payload,
    prev_hash: &'a BlockHash,
}

impl Block {
    /// Canonical JSON of the full block, including `hash`.
    pub fn canonical_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Canonical JSON of the hash preimage (block minus `hash`).
    pub fn preimage_json(&self) -> Result<Vec<u8>> {
        let preimage = Preimage {
            index: self.index,
            timestamp: &self.timestamp,
            chain: &self.chain,
            data: &self.data,
            prev_hash: &self.prev_hash,
        };
        Ok(serde_json::to_vec(&preimage)?)
    }

    /// Recompute the block hash from the preimage.
    pub fn compute_hash(&self) -> Result<BlockHash> {
        let bytes = self.preimage_json()?;
        let mut hasher = Sha256::new();
        hasher.update(&bytes);
        Ok(BlockHash(hex::encode(hasher.finalize())))
    }

    /// True when the stored `hash` matches the recomputed preimage hash.
    pub fn verify_hash(&self) -> Result<bool> {
        Ok(self.compute_hash()? == self.hash)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_block(index: u64, prev_hash: BlockHash) -> Block {
        let mut block = Block {
            index,
            timestamp: Utc::now(),
            chain: "journal".into(),
            data: Payload::Journal(TextBody::new("wrote some rust", vec!["code".into()])),
            prev_hash,
            hash: BlockHash(String::new()),
        };
        block.hash = block.compute_hash().unwrap();
        block
    }

    #[test]
    fn test_genesis_hash_is_valid() {
        let h = BlockHash::genesis();
        assert_eq!(h.0.len(), 64);
        assert!(h.is_valid());
    }

    #[test]
    fn test_uppercase_hex_rejected() {
        let h = BlockHash("A".repeat(64));
        assert!(!h.is_valid());
    }

    #[test]
    fn test_hash_is_deterministic() {
        let block = make_block(0, BlockHash::genesis());
        assert_eq!(
            block.compute_hash().unwrap(),
            block.compute_hash().unwrap()
        );
        assert!(block.verify_hash().unwrap());
    }

    #[test]
    fn test_tampered_content_changes_hash() {
        let mut block = make_block(0, BlockHash::genesis());
        if let Payload::Journal(body) = &mut block.data {
            body.content = "HACKED".into();
        }
        assert!(!block.verify_hash().unwrap());
    }

    #[test]
    fn test_canonical_roundtrip() {
        let block = make_block(3, BlockHash("a".repeat(64)));
        let json = block.canonical_json().unwrap();
        let parsed: Block = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, block);
        // Re-serialization is byte-identical — determinism is load-bearing.
        assert_eq!(parsed.canonical_json().unwrap(), json);
        assert!(parsed.verify_hash().unwrap());
    }

    #[test]
    fn test_canonical_field_order() {
        let block = make_block(0, BlockHash::genesis());
        let json = block.canonical_json().unwrap();
        let idx = |needle: &str| json.find(needle).unwrap();
        assert!(idx("\"index\"") < idx("\"timestamp\""));
        assert!(idx("\"timestamp\"") < idx("\"chain\""));
        assert!(idx("\"chain\"") < idx("\"data\""));
        assert!(idx("\"data\"") < idx("\"prev_hash\""));
        assert!(idx("\"prev_hash\"") < idx("\"hash\""));
    }

    #[test]
    fn test_payload_tag_serialization() {
        let payload = Payload::Ask(TextBody::new("which db?", vec![]));
        let json = serde_json::to_string(&payload).unwrap();
        assert!(json.starts_with("{\"type\":\"ask\""));
    }

    #[test]
    fn test_unknown_payload_type_rejected() {
        let json = r#"{"type":"telepathy","content":"hello","tags":[]}"#;
        assert!(serde_json::from_str::<Payload>(json).is_err());
    }

    #[test]
    fn test_absent_meta_fields_stay_absent() {
        let payload = Payload::Journal(TextBody::new("entry", vec![]));
        let json = serde_json::to_string(&payload).unwrap();
        assert!(!json.contains("agent"));
        assert!(!json.contains("source_ref"));
    }

    #[test]
    fn test_vault_revoked_tombstone_roundtrip() {
        let payload = Payload::Vault(VaultBody {
            content: "api key".into(),
            key_id: "openai".into(),
            encrypted: None,
            iv: "00112233445566778899aabb".into(),
            revoked: true,
            tags: vec![],
            meta: PayloadMeta::default(),
        });
        let json = serde_json::to_string(&payload).unwrap();
        assert!(json.contains("\"revoked\":true"));
        assert!(!json.contains("encrypted"));
        let back: Payload = serde_json::from_str(&json).unwrap();
        assert_eq!(back, payload);
    }

    #[test]
    fn test_kind_parse_roundtrip() {
        for kind in [
            PayloadKind::Journal,
            PayloadKind::Decision,
            PayloadKind::Vault,
        ] {
            let parsed: PayloadKind = kind.as_str().parse().unwrap();
            assert_eq!(parsed, kind);
        }
        assert!("telepathy".parse::<PayloadKind>().is_err());
    }
}
