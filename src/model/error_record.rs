//! `ValidationError`: a single Data-kind finding appended to the Error Sink.
//! Never a Rust `Error` — see `crate::error` for the System/Configuration
//! taxonomy.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
    Error,
    Critical,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorKind {
    Table,
    Schema,
    Geometry,
    Relation,
    Attribute,
    System,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub x: f64,
    pub y: f64,
    pub epsg: Option<i32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationError {
    pub error_id: Uuid,
    pub job_id: String,
    pub stage: u8,
    pub rule_id: String,
    pub code: String,
    pub message: String,
    pub table_id: String,
    pub table_name: String,
    pub field: Option<String>,
    pub feature_id: Option<i64>,
    pub severity: Severity,
    pub kind: ErrorKind,
    pub location: Option<Location>,
    pub metadata: HashMap<String, String>,
    pub observed_at: DateTime<Utc>,
}

/// Fields that make up the determinism keyset from spec.md §8 ("running the
/// same job on the same input twice yields identical error multisets by
/// `rule_id + code + table_id + feature_id + metadata` keyset").
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ErrorDedupeKey {
    pub rule_id: String,
    pub code: String,
    pub table_id: String,
    pub feature_id: Option<i64>,
    pub metadata: Vec<(String, String)>,
}

impl ValidationError {
    pub fn dedupe_key(&self) -> ErrorDedupeKey {
        let mut metadata: Vec<(String, String)> = self
            .metadata
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        metadata.sort();
        ErrorDedupeKey {
            rule_id: self.rule_id.clone(),
            code: self.code.clone(),
            table_id: self.table_id.clone(),
            feature_id: self.feature_id,
            metadata,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> ValidationError {
        ValidationError {
            error_id: Uuid::nil(),
            job_id: "val_x".into(),
            stage: 3,
            rule_id: "r1".into(),
            code: "GEO_OVERLAP".into(),
            message: "overlap".into(),
            table_id: "tn_buld".into(),
            table_name: "Buildings".into(),
            field: None,
            feature_id: Some(20),
            severity: Severity::Error,
            kind: ErrorKind::Geometry,
            location: None,
            metadata: HashMap::from([("overlap_area".to_string(), "5.0".to_string())]),
            observed_at: Utc::now(),
        }
    }

    #[test]
    fn dedupe_key_ignores_error_id_and_timestamp() {
        let mut a = sample();
        let mut b = sample();
        a.error_id = Uuid::new_v4();
        b.error_id = Uuid::new_v4();
        a.observed_at = Utc::now();
        b.observed_at = a.observed_at + chrono::Duration::seconds(1);
        assert_eq!(a.dedupe_key(), b.dedupe_key());
    }

    #[test]
    fn dedupe_key_differs_on_metadata() {
        let a = sample();
        let mut b = sample();
        b.metadata.insert("overlap_area".to_string(), "6.0".to_string());
        assert_ne!(a.dedupe_key(), b.dedupe_key());
    }
}
