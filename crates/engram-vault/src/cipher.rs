//! Symmetric encryption for vault payloads.
//!
//! AES-256-GCM with a per-block PBKDF2-HMAC-SHA512 derived key. The
//! ciphertext envelope is `base64(IV ‖ SALT ‖ TAG ‖ CT)` with fixed
//! 12/16/16-byte segments. Every failure mode of `open` — bad base64,
//! short envelope, wrong password, flipped ciphertext bit — surfaces the
//! same `AuthFail`, indistinguishable to the caller.

use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Key, Nonce};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use pbkdf2::pbkdf2_hmac;
use rand::rngs::OsRng;
use rand::RngCore;
use sha2::Sha512;
use zeroize::Zeroizing;

use engram_core::error::{EngramError, Result};

pub const PBKDF2_ITERATIONS: u32 = 100_000;
pub const IV_LEN: usize = 12;
pub const SALT_LEN: usize = 16;
pub const TAG_LEN: usize = 16;
pub const KEY_LEN: usize = 32;

/// A sealed secret: the envelope plus the IV exposed for the block's
/// `iv` field.
#[derive(Debug, Clone)]
pub struct Sealed {
    /// `base64(IV ‖ SALT ‖ TAG ‖ CT)`.
    pub envelope: String,
    /// Hex of the 12-byte IV.
    pub iv: String,
}

fn derive_key(password: &[u8], salt: &[u8]) -> Result<Zeroizing<[u8; KEY_LEN]>> {
    if salt.len() != SALT_LEN {
        return Err(EngramError::KdfFailed);
    }
    let mut key = Zeroizing::new([0u8; KEY_LEN]);
    pbkdf2_hmac::<Sha512>(password, salt, PBKDF2_ITERATIONS, key.as_mut());
    Ok(key)
}

/// Encrypt `plaintext` under `password`.
pub fn seal(plaintext: &[u8], password: &str) -> Result<Sealed> {
    let password = Zeroizing::new(password.as_bytes().to_vec());

    let mut iv = [0u8; IV_LEN];
    let mut salt = [0u8; SALT_LEN];
    OsRng.fill_bytes(&mut iv);
    OsRng.fill_bytes(&mut salt);

    let key = derive_key(&password, &salt)?;
    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key.as_ref()));
    let ct_and_tag = cipher
        .encrypt(Nonce::from_slice(&iv), plaintext)
        .map_err(|_| EngramError::internal("aes-gcm encryption failed"))?;

    // aes-gcm appends the tag; the envelope stores it before the ciphertext.
    let split = ct_and_tag.len() - TAG_LEN;
    let (ct, tag) = ct_and_tag.split_at(split);

    let mut envelope = Vec::with_capacity(IV_LEN + SALT_LEN + TAG_LEN + ct.len());
    envelope.extend_from_slice(&iv);
    envelope.extend_from_slice(&salt);
    envelope.extend_from_slice(tag);
    envelope.extend_from_slice(ct);

    Ok(Sealed {
        envelope: BASE64.encode(&envelope),
        iv: hex::encode(iv),
    })
}

/// Decrypt an envelope under `password`.
///
/// # Errors
/// `AuthFail` on any malformed envelope, tag mismatch, or wrong password —
/// no partial plaintext is ever returned.
pub fn open(envelope: &str, password: &str) -> Result<Vec<u8>> {
    let password = Zeroizing::new(password.as_bytes().to_vec());

    let bytes = BASE64.decode(envelope).map_err(|_| EngramError::AuthFail)?;
    if bytes.len() < IV_LEN + SALT_LEN + TAG_LEN {
        return Err(EngramError::AuthFail);
    }
    let (iv, rest) = bytes.split_at(IV_LEN);
    let (salt, rest) = rest.split_at(SALT_LEN);
    let (tag, ct) = rest.split_at(TAG_LEN);

    let key = derive_key(&password, salt).map_err(|_| EngramError::AuthFail)?;
    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key.as_ref()));

    let mut ct_and_tag = Vec::with_capacity(ct.len() + TAG_LEN);
    ct_and_tag.extend_from_slice(ct);
    ct_and_tag.extend_from_slice(tag);

    cipher
        .decrypt(Nonce::from_slice(iv), ct_and_tag.as_slice())
        .map_err(|_| EngramError::AuthFail)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seal_open_roundtrip() {
        let sealed = seal(b"sk-abc", "pw").unwrap();
        let plain = open(&sealed.envelope, "pw").unwrap();
        assert_eq!(plain, b"sk-abc");
    }

    #[test]
    fn test_wrong_password_is_auth_fail() {
        let sealed = seal(b"sk-abc", "pw").unwrap();
        let err = open(&sealed.envelope, "bad").unwrap_err();
        assert!(matches!(err, EngramError::AuthFail));
    }

    #[test]
    fn test_tampered_envelope_is_auth_fail() {
        let sealed = seal(b"sk-abc", "pw").unwrap();
        let mut bytes = BASE64.decode(&sealed.envelope).unwrap();
        let last = bytes.len() - 1;
        bytes[last] ^= 0x01;
        let tampered = BASE64.encode(&bytes);
        assert!(matches!(
            open(&tampered, "pw").unwrap_err(),
            EngramError::AuthFail
        ));
    }

    #[test]
    fn test_garbage_envelope_is_auth_fail() {
        for bad in ["not base64 !!!", "", "AAAA"] {
            assert!(matches!(
                open(bad, "pw").unwrap_err(),
                EngramError::AuthFail
            ));
        }
    }

    #[test]
    fn test_envelope_layout() {
        let sealed = seal(b"payload", "pw").unwrap();
        let bytes = BASE64.decode(&sealed.envelope).unwrap();
        // IV + SALT + TAG + 7 bytes of ciphertext.
        assert_eq!(bytes.len(), IV_LEN + SALT_LEN + TAG_LEN + 7);
        assert_eq!(hex::encode(&bytes[..IV_LEN]), sealed.iv);
    }

    #[test]
    fn test_fresh_randomness_per_seal() {
        let a = seal(b"same", "pw").unwrap();
        let b = seal(b"same", "pw").unwrap();
        assert_ne!(a.envelope, b.envelope);
        assert_ne!(a.iv, b.iv);
    }

    #[test]
    fn test_empty_plaintext_roundtrip() {
        let sealed = seal(b"", "pw").unwrap();
        assert_eq!(open(&sealed.envelope, "pw").unwrap(), b"");
    }
}
