//! `engram-core` — Shared kernel for the Engram cognitive ledger.
//!
//! This crate owns the domain types used across the workspace.
//! No business logic lives here — only pure types, traits, and errors.
//!
//! # Module Map
//! - [`block`] — Block, BlockHash, tagged Payload union, canonical hashing
//! - [`decision`] — DecisionRecord (`decision:v1`) and its validation
//! - [`error`] — EngramError enum + ErrorCode + ErrorEnvelope
//! - [`capability`] — Embedder, Classifier, Summarizer, Completion seams
//! - [`home`] — on-disk layout path arithmetic

pub mod block;
pub mod capability;
pub mod decision;
pub mod error;
pub mod home;

// Re-export most commonly used items at crate root.
pub use block::{
    Block, BlockHash, BlockRef, CredentialBody, Payload, PayloadKind, PayloadMeta, SummaryBody,
    SummaryRange, TextBody, VaultBody,
};
pub use capability::{Classifier, Completion, DecisionHint, Embedder, Summarizer};
pub use decision::{DecisionMode, DecisionRecord, DecisionScope, DecisionStatus};
pub use error::{EngramError, ErrorCode, ErrorEnvelope, Result};
pub use home::{validate_chain_name, HomeLayout};
