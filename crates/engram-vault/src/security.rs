//! Password policy — `security.json`.
//!
//! At init the home either records a password (stored as a SHA-256 hash,
//! 0600 file) or explicitly allows an empty one. The hash gates local UX
//! only; vault key derivation always uses the raw password per block via
//! its salt.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use engram_core::error::{EngramError, Result};
use engram_core::home::HomeLayout;
use engram_ledger::fsio;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SecurityRecord {
    pub password_set: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password_hash: Option<String>,
    #[serde(default)]
    pub allow_empty: bool,
    pub created_at: DateTime<Utc>,
}

fn sha256_hex(input: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(input.as_bytes());
    hex::encode(hasher.finalize())
}

/// Gatekeeper over the home's security record.
pub struct SecurityPolicy {
    home: HomeLayout,
}

impl SecurityPolicy {
    pub fn new(home: HomeLayout) -> Self {
        Self { home }
    }

    /// Initialize the security record. Fails if one already exists.
    pub fn init(&self, password: Option<&str>) -> Result<SecurityRecord> {
        let path = self.home.security_path();
        if path.exists() {
            return Err(EngramError::invalid_argument(
                "security",
                "security.json already initialized",
            ));
        }
        let record = match password {
            Some(pw) if !pw.is_empty() => SecurityRecord {
                password_set: true,
                password_hash: Some(sha256_hex(pw)),
                allow_empty: false,
                created_at: Utc::now(),
            },
            _ => SecurityRecord {
                password_set: false,
                password_hash: None,
                allow_empty: true,
                created_at: Utc::now(),
            },
        };
        if let Some(parent) = path.parent() {
            fsio::create_dir_private(parent)?;
        }
        fsio::write_json_atomic(&path, &record, fsio::MODE_SECRET)?;
        Ok(record)
    }

    pub fn load(&self) -> Result<Option<SecurityRecord>> {
        let path = self.home.security_path();
        if !path.exists() {
            return Ok(None);
        }
        Ok(Some(fsio::read_json(&path)?))
    }

    /// Check a password attempt against the record.
    ///
    /// # Errors
    /// `BadPassword` when the home is uninitialized, a required password is
    /// missing, or the hash does not match.
    pub fn check(&self, password: Option<&str>) -> Result<()> {
        let Some(record) = self.load()? else {
            return Err(EngramError::BadPassword(
                "security.json is not initialized".into(),
            ));
        };
        if !record.password_set {
            return if record.allow_empty {
                Ok(())
            } else {
                Err(EngramError::BadPassword("a password is required".into()))
            };
        }
        match password {
            Some(pw) if Some(sha256_hex(pw)) == record.password_hash => Ok(()),
            Some(_) => Err(EngramError::BadPassword("password mismatch".into())),
            None => Err(EngramError::BadPassword("a password is required".into())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_policy(dir: &std::path::Path) -> SecurityPolicy {
        SecurityPolicy::new(HomeLayout::new(dir))
    }

    #[test]
    fn test_init_with_password() {
        let dir = tempfile::tempdir().unwrap();
        let policy = make_policy(dir.path());
        let record = policy.init(Some("hunter2")).unwrap();
        assert!(record.password_set);
        assert!(!record.allow_empty);
        assert!(policy.check(Some("hunter2")).is_ok());
        assert!(policy.check(Some("wrong")).is_err());
        assert!(policy.check(None).is_err());
    }

    #[test]
    fn test_init_empty_allows_no_password() {
        let dir = tempfile::tempdir().unwrap();
        let policy = make_policy(dir.path());
        let record = policy.init(None).unwrap();
        assert!(!record.password_set);
        assert!(record.allow_empty);
        assert!(policy.check(None).is_ok());
    }

    #[test]
    fn test_double_init_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let policy = make_policy(dir.path());
        policy.init(Some("pw")).unwrap();
        assert!(policy.init(Some("pw")).is_err());
    }

    #[test]
    fn test_file_mode_is_0600() {
        use std::os::unix::fs::PermissionsExt;
        let dir = tempfile::tempdir().unwrap();
        let policy = make_policy(dir.path());
        policy.init(Some("pw")).unwrap();
        let mode = std::fs::metadata(HomeLayout::new(dir.path()).security_path())
            .unwrap()
            .permissions()
            .mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[test]
    fn test_uninitialized_check_is_bad_password() {
        let dir = tempfile::tempdir().unwrap();
        let policy = make_policy(dir.path());
        let err = policy.check(Some("pw")).unwrap_err();
        assert!(matches!(err, EngramError::BadPassword(_)));
        assert_eq!(err.exit_code(), 3);
    }

    #[test]
    fn test_record_roundtrip_is_camel_case() {
        let dir = tempfile::tempdir().unwrap();
        let policy = make_policy(dir.path());
        policy.init(Some("pw")).unwrap();
        let raw =
            std::fs::read_to_string(HomeLayout::new(dir.path()).security_path()).unwrap();
        assert!(raw.contains("\"passwordSet\":true"));
        assert!(raw.contains("\"passwordHash\""));
        assert!(raw.contains("\"createdAt\""));
    }
}
