//! Vault access layer — secrets living inside the ordinary chain format.
//!
//! Each secret is one `vault` block: authenticated-encrypted envelope plus
//! a public `key_id` and label. Rotation is just another append; revocation
//! is a tombstone block with no ciphertext. The newest block for a key
//! decides its state, so a key can be revoked and later set again.

use std::sync::Arc;

use rand::RngCore;
use tracing::info;
use zeroize::Zeroizing;

use engram_core::block::{Block, Payload, PayloadMeta, VaultBody};
use engram_core::error::{EngramError, Result};
use engram_ledger::store::ChainStore;

use crate::cipher;

/// Default chain that vault blocks live in.
pub const VAULT_CHAIN: &str = "vault";

pub struct Vault {
    store: Arc<ChainStore>,
    chain: String,
}

impl Vault {
    pub fn new(store: Arc<ChainStore>) -> Self {
        Self {
            store,
            chain: VAULT_CHAIN.to_string(),
        }
    }

    /// Use a non-default vault chain.
    pub fn with_chain(store: Arc<ChainStore>, chain: impl Into<String>) -> Self {
        Self {
            store,
            chain: chain.into(),
        }
    }

    /// Encrypt `secret` under `password` and append it as a vault block.
    pub async fn set(&self, key: &str, secret: &str, password: &str) -> Result<Block> {
        let secret = Zeroizing::new(secret.as_bytes().to_vec());
        let sealed = cipher::seal(&secret, password)?;
        let payload = Payload::Vault(VaultBody {
            content: format!("vault entry '{key}'"),
            key_id: key.to_string(),
            encrypted: Some(sealed.envelope),
            iv: sealed.iv,
            revoked: false,
            tags: Vec::new(),
            meta: PayloadMeta::default(),
        });
        let block = self.store.append_block(&self.chain, payload).await?;
        info!(key, index = block.index, "vault entry stored");
        Ok(block)
    }

    /// Decrypt the current value of `key`.
    ///
    /// The newest block carrying `key_id` decides: a live block is
    /// decrypted, a tombstone means the key is gone.
    ///
    /// # Errors
    /// `VaultKeyNotFound` for absent or revoked keys, `AuthFail` for a
    /// wrong password or damaged ciphertext.
    pub fn get(&self, key: &str, password: &str) -> Result<String> {
        let blocks = self.store.read_chain(&self.chain)?;
        for block in blocks.iter().rev() {
            let Payload::Vault(body) = &block.data else {
                continue;
            };
            if body.key_id != key {
                continue;
            }
            if body.revoked {
                break;
            }
            let Some(envelope) = body.encrypted.as_deref() else {
                continue;
            };
            let plain = Zeroizing::new(cipher::open(envelope, password)?);
            return String::from_utf8(plain.to_vec()).map_err(|_| EngramError::AuthFail);
        }
        Err(EngramError::VaultKeyNotFound {
            key: key.to_string(),
        })
    }

    /// Append a revocation tombstone for `key`.
    ///
    /// The tombstone carries a fresh IV but no ciphertext.
    pub async fn revoke(&self, key: &str) -> Result<Block> {
        let mut iv = [0u8; cipher::IV_LEN];
        rand::rngs::OsRng.fill_bytes(&mut iv);
        let payload = Payload::Vault(VaultBody {
            content: format!("revoked '{key}'"),
            key_id: key.to_string(),
            encrypted: None,
            iv: hex::encode(iv),
            revoked: true,
            tags: Vec::new(),
            meta: PayloadMeta::default(),
        });
        let block = self.store.append_block(&self.chain, payload).await?;
        info!(key, index = block.index, "vault entry revoked");
        Ok(block)
    }

    /// Public labels of every key currently live in the vault.
    pub fn list_keys(&self) -> Result<Vec<String>> {
        let blocks = self.store.read_chain(&self.chain)?;
        let mut live: Vec<String> = Vec::new();
        for block in &blocks {
            let Payload::Vault(body) = &block.data else {
                continue;
            };
            live.retain(|k| k != &body.key_id);
            if !body.revoked && body.encrypted.is_some() {
                live.push(body.key_id.clone());
            }
        }
        live.sort();
        Ok(live)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use engram_core::home::HomeLayout;
    use engram_ledger::verify::verify_chain;

    fn make_vault(dir: &std::path::Path) -> Vault {
        Vault::new(Arc::new(ChainStore::new(HomeLayout::new(dir))))
    }

    #[tokio::test]
    async fn test_set_get_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let vault = make_vault(dir.path());
        vault.set("openai", "sk-abc", "pw").await.unwrap();
        assert_eq!(vault.get("openai", "pw").unwrap(), "sk-abc");
    }

    #[tokio::test]
    async fn test_wrong_password_is_auth_fail() {
        let dir = tempfile::tempdir().unwrap();
        let vault = make_vault(dir.path());
        vault.set("openai", "sk-abc", "pw").await.unwrap();
        let err = vault.get("openai", "bad").unwrap_err();
        assert!(matches!(err, EngramError::AuthFail));
    }

    #[tokio::test]
    async fn test_missing_key_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let vault = make_vault(dir.path());
        vault.set("openai", "sk-abc", "pw").await.unwrap();
        let err = vault.get("anthropic", "pw").unwrap_err();
        assert!(matches!(err, EngramError::VaultKeyNotFound { .. }));
    }

    #[tokio::test]
    async fn test_newest_value_wins() {
        let dir = tempfile::tempdir().unwrap();
        let vault = make_vault(dir.path());
        vault.set("openai", "sk-old", "pw").await.unwrap();
        vault.set("openai", "sk-new", "pw").await.unwrap();
        assert_eq!(vault.get("openai", "pw").unwrap(), "sk-new");
    }

    #[tokio::test]
    async fn test_revoke_hides_key_until_reset() {
        let dir = tempfile::tempdir().unwrap();
        let vault = make_vault(dir.path());
        vault.set("openai", "sk-abc", "pw").await.unwrap();
        vault.revoke("openai").await.unwrap();
        assert!(matches!(
            vault.get("openai", "pw").unwrap_err(),
            EngramError::VaultKeyNotFound { .. }
        ));

        vault.set("openai", "sk-next", "pw").await.unwrap();
        assert_eq!(vault.get("openai", "pw").unwrap(), "sk-next");
    }

    #[tokio::test]
    async fn test_vault_chain_verifies_like_any_chain() {
        let dir = tempfile::tempdir().unwrap();
        let vault = make_vault(dir.path());
        let store = Arc::new(ChainStore::new(HomeLayout::new(dir.path())));
        vault.set("a", "1", "pw").await.unwrap();
        vault.set("b", "2", "pw").await.unwrap();
        vault.revoke("a").await.unwrap();
        let report = verify_chain(&store.read_chain(VAULT_CHAIN).unwrap());
        assert!(report.valid);
    }

    #[tokio::test]
    async fn test_list_keys_tracks_live_entries() {
        let dir = tempfile::tempdir().unwrap();
        let vault = make_vault(dir.path());
        vault.set("a", "1", "pw").await.unwrap();
        vault.set("b", "2", "pw").await.unwrap();
        vault.revoke("a").await.unwrap();
        assert_eq!(vault.list_keys().unwrap(), vec!["b"]);
    }
}
