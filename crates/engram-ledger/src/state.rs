//! Collector checkpoints — `daemon-state.json`.
//!
//! External collectors (git log, shell history, heartbeat) are ordinary
//! ingesters; the core owns only their checkpoint file so restarts resume
//! where the last run stopped. The file is a flat map of collector name to
//! cursor, replaced atomically on every update.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use engram_core::error::Result;
use engram_core::home::HomeLayout;

use crate::fsio;

/// One collector's resume position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Checkpoint {
    /// Opaque cursor — a commit hash, a byte offset, whatever the
    /// collector needs.
    pub cursor: String,
    pub updated_at: DateTime<Utc>,
}

/// Persistent checkpoint map for external collectors.
pub struct DaemonState {
    path: PathBuf,
    entries: Mutex<HashMap<String, Checkpoint>>,
}

impl DaemonState {
    /// Load existing state, or start empty when the file is absent.
    pub fn load(home: &HomeLayout) -> Result<Self> {
        let path = home.daemon_state_path();
        let entries = if path.exists() {
            fsio::read_json(&path)?
        } else {
            HashMap::new()
        };
        Ok(Self {
            path,
            entries: Mutex::new(entries),
        })
    }

    pub fn get(&self, collector: &str) -> Option<Checkpoint> {
        self.entries
            .lock()
            .ok()
            .and_then(|entries| entries.get(collector).cloned())
    }

    /// Record a new cursor and persist the whole map atomically.
    pub fn set(&self, collector: &str, cursor: impl Into<String>) -> Result<()> {
        let mut entries = self
            .entries
            .lock()
            .map_err(|e| engram_core::error::EngramError::internal(format!("state lock poisoned: {e}")))?;
        entries.insert(
            collector.to_string(),
            Checkpoint {
                cursor: cursor.into(),
                updated_at: Utc::now(),
            },
        );
        fsio::write_json_atomic(&self.path, &*entries, fsio::MODE_FILE)
    }
}
