//! Decision record model — the `decision:v1` document stored inside
//! `decision`-type blocks.
//!
//! The record is a logical overlay on `data.content`: it is serialized to a
//! JSON string and carried as block text, so the ledger format stays uniform
//! while decisions remain structurally queryable after parsing.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::error::{EngramError, Result};

pub const DECISION_SCHEMA: &str = "decision:v1";
pub const DEFAULT_CONFIDENCE: f64 = 0.7;

/// How the decision entered the ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DecisionMode {
    /// Recorded deliberately by the user.
    Conscious,
    /// Derived from a text block by the decision detector.
    Inferred,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DecisionStatus {
    Active,
    Revised,
    Deprecated,
    Contradicted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DecisionScope {
    Personal,
    Project,
    Life,
}

/// Supporting evidence attached to a decision.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Evidence {
    #[serde(default)]
    pub refs: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

fn default_confidence() -> f64 {
    DEFAULT_CONFIDENCE
}

/// A structured decision document.
///
/// `decision_id` is stable across revisions of the same decision;
/// `record_id` is fresh per record. A revision points at the record it
/// replaces via `supersedes`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DecisionRecord {
    pub schema: String,
    pub decision_id: String,
    pub record_id: String,
    pub created_at: DateTime<Utc>,
    pub mode: DecisionMode,
    pub status: DecisionStatus,
    pub scope: DecisionScope,
    pub title: String,
    pub options: Vec<String>,
    pub chosen: String,
    #[serde(default)]
    pub reasoning: String,
    #[serde(default = "default_confidence")]
    pub confidence: f64,
    #[serde(default)]
    pub links: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub evidence: Option<Evidence>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub supersedes: Option<String>,
}

impl DecisionRecord {
    /// Build a new active record with derived ids and defaulted fields.
    pub fn new(
        title: impl Into<String>,
        options: Vec<String>,
        chosen: impl Into<String>,
        mode: DecisionMode,
    ) -> Self {
        let title = title.into();
        let now = Utc::now();
        Self {
            schema: DECISION_SCHEMA.to_string(),
            decision_id: derive_decision_id(now.date_naive(), &title),
            record_id: Uuid::new_v4().to_string(),
            created_at: now,
            mode,
            status: DecisionStatus::Active,
            scope: DecisionScope::Personal,
            title,
            options,
            chosen: chosen.into(),
            reasoning: String::new(),
            confidence: DEFAULT_CONFIDENCE,
            links: Vec::new(),
            evidence: None,
            supersedes: None,
        }
    }

    /// Parse a record from block content.
    pub fn parse(content: &str) -> Result<Self> {
        let record: Self = serde_json::from_str(content)
            .map_err(|e| EngramError::DecisionParseError(e.to_string()))?;
        record.validate()?;
        Ok(record)
    }

    /// Serialize for storage as block content.
    pub fn to_content(&self) -> Result<String> {
        self.validate()?;
        Ok(serde_json::to_string(self)?)
    }

    /// Enforce the record invariants.
    pub fn validate(&self) -> Result<()> {
        if self.schema != DECISION_SCHEMA {
            return Err(EngramError::DecisionParseError(format!(
                "unsupported schema '{}'",
                self.schema
            )));
        }
        if self.title.trim().is_empty() {
            return Err(EngramError::DecisionParseError("empty title".into()));
        }
        if self.options.is_empty() {
            return Err(EngramError::DecisionParseError(
                "at least one option is required".into(),
            ));
        }
        if !(0.0..=1.0).contains(&self.confidence) {
            return Err(EngramError::DecisionParseError(format!(
                "confidence {} outside [0, 1]",
                self.confidence
            )));
        }
        // `chosen` must match an option under case-insensitive trim.
        let chosen = normalize_choice(&self.chosen);
        if !self.options.iter().any(|o| normalize_choice(o) == chosen) {
            return Err(EngramError::InvalidChoice {
                chosen: self.chosen.clone(),
                options: self.options.clone(),
            });
        }
        Ok(())
    }
}

fn normalize_choice(s: &str) -> String {
    s.trim().to_lowercase()
}

/// Stable decision id: first 16 hex chars of SHA-256 over `YYYY-MM-DD + title`.
pub fn derive_decision_id(date: NaiveDate, title: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(date.format("%Y-%m-%d").to_string().as_bytes());
    hasher.update(title.as_bytes());
    hex::encode(hasher.finalize())[..16].to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_record() -> DecisionRecord {
        DecisionRecord::new(
            "pick a database",
            vec!["sqlite".into(), "postgres".into()],
            "sqlite",
            DecisionMode::Conscious,
        )
    }

    #[test]
    fn test_new_record_validates() {
        assert!(make_record().validate().is_ok());
    }

    #[test]
    fn test_decision_id_is_16_hex() {
        let id = derive_decision_id(
            NaiveDate::from_ymd_opt(2026, 8, 1).unwrap(),
            "pick a database",
        );
        assert_eq!(id.len(), 16);
        assert!(id.bytes().all(|b| b.is_ascii_hexdigit()));
    }

    #[test]
    fn test_decision_id_stable_for_same_day_and_title() {
        let day = NaiveDate::from_ymd_opt(2026, 8, 1).unwrap();
        assert_eq!(
            derive_decision_id(day, "pick a database"),
            derive_decision_id(day, "pick a database")
        );
        assert_ne!(
            derive_decision_id(day, "pick a database"),
            derive_decision_id(day, "pick an editor")
        );
    }

    #[test]
    fn test_chosen_matches_case_insensitive_trim() {
        let mut record = make_record();
        record.chosen = "  SQLite ".into();
        assert!(record.validate().is_ok());
    }

    #[test]
    fn test_chosen_outside_options_rejected() {
        let mut record = make_record();
        record.chosen = "mysql".into();
        let err = record.validate().unwrap_err();
        assert!(matches!(err, EngramError::InvalidChoice { .. }));
    }

    #[test]
    fn test_empty_options_rejected() {
        let mut record = make_record();
        record.options.clear();
        assert!(record.validate().is_err());
    }

    #[test]
    fn test_confidence_bounds() {
        let mut record = make_record();
        record.confidence = 1.5;
        assert!(record.validate().is_err());
        record.confidence = 0.0;
        assert!(record.validate().is_ok());
    }

    #[test]
    fn test_content_roundtrip() {
        let record = make_record();
        let content = record.to_content().unwrap();
        assert!(content.contains("\"decisionId\""));
        assert!(content.contains("\"createdAt\""));
        let parsed = DecisionRecord::parse(&content).unwrap();
        assert_eq!(parsed, record);
    }

    #[test]
    fn test_parse_defaults_confidence() {
        let content = r#"{
            "schema": "decision:v1",
            "decisionId": "abcdef0123456789",
            "recordId": "r-1",
            "createdAt": "2026-08-01T00:00:00Z",
            "mode": "inferred",
            "status": "active",
            "scope": "project",
            "title": "ship it",
            "options": ["yes", "no"],
            "chosen": "yes"
        }"#;
        let record = DecisionRecord::parse(content).unwrap();
        assert!((record.confidence - DEFAULT_CONFIDENCE).abs() < f64::EPSILON);
    }

    #[test]
    fn test_garbage_content_is_parse_error() {
        let err = DecisionRecord::parse("not json at all").unwrap_err();
        assert!(matches!(err, EngramError::DecisionParseError(_)));
    }
}
