//! `engram-vault` — Encrypted secrets inside the ordinary chain format.
//!
//! # Design
//! - AES-256-GCM, key derived per block via PBKDF2-HMAC-SHA512 (100k rounds)
//! - Envelope `base64(IV ‖ SALT ‖ TAG ‖ CT)`, fixed 12/16/16-byte segments
//! - Wrong password and tampered ciphertext are indistinguishable (`AuthFail`)
//! - `security.json` gates UX; raw passwords feed key derivation

pub mod cipher;
pub mod security;
pub mod vault;

pub use cipher::{open, seal, Sealed, PBKDF2_ITERATIONS};
pub use security::{SecurityPolicy, SecurityRecord};
pub use vault::{Vault, VAULT_CHAIN};
