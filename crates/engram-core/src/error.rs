//! Structured error hierarchy for the Engram ledger core.
//!
//! One central `thiserror` enum for all crates, with a stable `ErrorCode`
//! for machine consumers, an `ErrorEnvelope` for serialized transport, and
//! process exit-code mapping for the (out-of-scope) CLI layer.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Stable string identifiers for error classes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    // Structural
    CorruptBlock,
    ChainBroken,
    IndexGap,
    HashMismatch,
    BadGenesis,
    // Validation
    SoulViolation,
    // Concurrency
    ChainLocked,
    Cancelled,
    // I/O
    IoError,
    FsyncFailed,
    // Crypto
    AuthFail,
    BadPassword,
    KdfFailed,
    VaultKeyNotFound,
    // Schema
    DecisionParseError,
    InvalidChoice,
    // Generic
    InvalidArgument,
    SerializationError,
    Internal,
}

/// Machine-readable error envelope.
///
/// Errors crossing a process boundary (CLI output, daemon IPC) are wrapped
/// in this type. Stack traces are never part of the envelope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorEnvelope {
    pub code: ErrorCode,
    pub message: String,
    pub suggestion: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl ErrorEnvelope {
    /// Build an envelope from an `EngramError`.
    pub fn from_error(err: &EngramError) -> Self {
        Self {
            code: err.code(),
            message: err.to_string(),
            suggestion: err.suggestion().map(str::to_owned),
            timestamp: Utc::now(),
        }
    }
}

/// Primary error type for all Engram crates.
#[derive(Error, Debug)]
pub enum EngramError {
    // Structural — the on-disk chain is damaged.
    #[error("corrupt block {index} in chain '{chain}'")]
    CorruptBlock { chain: String, index: u64 },

    #[error("chain '{chain}' broken at block {at}")]
    ChainBroken { chain: String, at: u64 },

    #[error("index gap: expected {expected}, got {got}")]
    IndexGap { expected: u64, got: u64 },

    #[error("hash mismatch at block {index}")]
    HashMismatch { index: u64 },

    #[error("bad genesis block: {0}")]
    BadGenesis(String),

    // Validation
    #[error("soul violation [{rule}]: {detail}")]
    SoulViolation { rule: String, detail: String },

    // Concurrency
    #[error("chain '{chain}' is locked by another writer")]
    ChainLocked { chain: String },

    #[error("operation cancelled")]
    Cancelled,

    // I/O
    #[error("io error at {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("fsync failed for {path}")]
    FsyncFailed { path: String },

    // Crypto
    #[error("authentication failed")]
    AuthFail,

    #[error("bad password: {0}")]
    BadPassword(String),

    #[error("key derivation failed")]
    KdfFailed,

    #[error("vault key not found: {key}")]
    VaultKeyNotFound { key: String },

    // Schema
    #[error("decision parse error: {0}")]
    DecisionParseError(String),

    #[error("chosen value '{chosen}' is not among the options {options:?}")]
    InvalidChoice {
        chosen: String,
        options: Vec<String>,
    },

    // Generic
    #[error("invalid argument {what}: {reason}")]
    InvalidArgument { what: String, reason: String },

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl EngramError {
    /// Return the stable error code.
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::CorruptBlock { .. } => ErrorCode::CorruptBlock,
            Self::ChainBroken { .. } => ErrorCode::ChainBroken,
            Self::IndexGap { .. } => ErrorCode::IndexGap,
            Self::HashMismatch { .. } => ErrorCode::HashMismatch,
            Self::BadGenesis(_) => ErrorCode::BadGenesis,
            Self::SoulViolation { .. } => ErrorCode::SoulViolation,
            Self::ChainLocked { .. } => ErrorCode::ChainLocked,
            Self::Cancelled => ErrorCode::Cancelled,
            Self::Io { .. } => ErrorCode::IoError,
            Self::FsyncFailed { .. } => ErrorCode::FsyncFailed,
            Self::AuthFail => ErrorCode::AuthFail,
            Self::BadPassword(_) => ErrorCode::BadPassword,
            Self::KdfFailed => ErrorCode::KdfFailed,
            Self::VaultKeyNotFound { .. } => ErrorCode::VaultKeyNotFound,
            Self::DecisionParseError(_) => ErrorCode::DecisionParseError,
            Self::InvalidChoice { .. } => ErrorCode::InvalidChoice,
            Self::InvalidArgument { .. } => ErrorCode::InvalidArgument,
            Self::Serialization(_) => ErrorCode::SerializationError,
            Self::Internal(_) => ErrorCode::Internal,
        }
    }

    /// Actionable next step for user-facing failures, when one exists.
    pub fn suggestion(&self) -> Option<&'static str> {
        match self {
            Self::CorruptBlock { .. }
            | Self::ChainBroken { .. }
            | Self::IndexGap { .. }
            | Self::HashMismatch { .. }
            | Self::BadGenesis(_) => Some("run repair to quarantine the damaged tail"),
            Self::ChainLocked { .. } => Some("another writer holds this chain; retry shortly"),
            Self::AuthFail => Some("check the vault password"),
            Self::BadPassword(_) => Some("initialize or correct the security password"),
            Self::VaultKeyNotFound { .. } => Some("list vault keys to see what is stored"),
            Self::InvalidChoice { .. } => Some("pick 'chosen' from the listed options"),
            _ => None,
        }
    }

    /// Process exit code for the CLI layer.
    ///
    /// 0 success, 1 generic, 2 ledger broken, 3 authentication failure,
    /// 4 invalid argument.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::CorruptBlock { .. }
            | Self::ChainBroken { .. }
            | Self::IndexGap { .. }
            | Self::HashMismatch { .. }
            | Self::BadGenesis(_)
            | Self::SoulViolation { .. } => 2,
            Self::AuthFail | Self::BadPassword(_) | Self::KdfFailed => 3,
            Self::InvalidArgument { .. }
            | Self::InvalidChoice { .. }
            | Self::DecisionParseError(_) => 4,
            _ => 1,
        }
    }

    /// Helpers for common cases.
    pub fn io(path: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub fn invalid_argument(what: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidArgument {
            what: what.into(),
            reason: reason.into(),
        }
    }

    pub fn internal(msg: impl ToString) -> Self {
        Self::Internal(msg.to_string())
    }
}

impl From<serde_json::Error> for EngramError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

/// Alias for `Result<T, EngramError>`.
pub type Result<T> = std::result::Result<T, EngramError>;
