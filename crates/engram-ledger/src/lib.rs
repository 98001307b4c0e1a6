//! `engram-ledger` — Append-only hash-linked chain store.
//!
//! # Design
//! - One JSON file per block, zero-padded filenames, lexical order = index order
//! - SHA-256 hash chain for tamper detection; SOUL invariants on every write
//! - Crash-safe persistence: temp file + fsync + rename, never an overwrite
//! - Per-chain async mutex in-process, advisory flock across processes
//! - Repair quarantines a damaged tail while preserving the healthy prefix

pub mod builder;
pub mod fsio;
pub mod lock;
pub mod repair;
pub mod soul;
pub mod state;
pub mod store;
pub mod verify;

pub use builder::BlockBuilder;
pub use lock::ChainLock;
pub use repair::{ReviseMode, ReviseReport, ReviseStatus, Reviser};
pub use soul::{check_block, SoulError, SoulRule};
pub use state::{Checkpoint, DaemonState};
pub use store::{ChainStats, ChainStore};
pub use verify::{verify_block, verify_chain, ChainReport};
