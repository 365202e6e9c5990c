//! `RelationContext`: the read-only handle every `CaseType` strategy
//! receives (mirrors `stages::context::CheckContext` for Stage 4).

use std::collections::HashMap;

use chrono::Utc;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::filter::CompiledFilter;
use crate::model::error_record::{ErrorKind, Location, Severity, ValidationError};

#[derive(Clone)]
pub struct RelationContext {
    pub job_id: String,
    pub rule_id: String,
    pub main_table: String,
    pub main_table_name: String,
    pub related_table: String,
    pub related_table_name: String,
    pub filter: Option<CompiledFilter>,
    pub tolerance: f64,
    pub params: HashMap<String, String>,
    pub cancellation: CancellationToken,
}

impl RelationContext {
    #[cfg(test)]
    pub fn for_test(tolerance: f64) -> Self {
        Self {
            job_id: "val_test".into(),
            rule_id: "r1".into(),
            main_table: "tn_main".into(),
            main_table_name: "Main".into(),
            related_table: "tn_related".into(),
            related_table_name: "Related".into(),
            filter: None,
            tolerance,
            params: HashMap::new(),
            cancellation: CancellationToken::new(),
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancellation.is_cancelled()
    }

    pub fn param(&self, key: &str) -> Option<&str> {
        self.params.get(key).map(|s| s.as_str())
    }

    pub fn error(&self, code: impl Into<String>, message: impl Into<String>, severity: Severity) -> RelationErrorBuilder<'_> {
        RelationErrorBuilder {
            ctx: self,
            code: code.into(),
            message: message.into(),
            severity,
            feature_id: None,
            field: None,
            location: None,
            metadata: HashMap::new(),
        }
    }
}

pub struct RelationErrorBuilder<'a> {
    ctx: &'a RelationContext,
    code: String,
    message: String,
    severity: Severity,
    feature_id: Option<i64>,
    field: Option<String>,
    location: Option<Location>,
    metadata: HashMap<String, String>,
}

impl<'a> RelationErrorBuilder<'a> {
    pub fn feature_id(mut self, fid: i64) -> Self {
        self.feature_id = Some(fid);
        self
    }

    pub fn field(mut self, field: impl Into<String>) -> Self {
        self.field = Some(field.into());
        self
    }

    pub fn location(mut self, x: f64, y: f64) -> Self {
        self.location = Some(Location { x, y, epsg: None });
        self
    }

    pub fn metadata(mut self, key: impl Into<String>, value: impl std::fmt::Display) -> Self {
        self.metadata.insert(key.into(), value.to_string());
        self
    }

    pub fn build(self) -> ValidationError {
        ValidationError {
            error_id: Uuid::new_v4(),
            job_id: self.ctx.job_id.clone(),
            stage: 4,
            rule_id: self.ctx.rule_id.clone(),
            code: self.code,
            message: self.message,
            table_id: self.ctx.main_table.clone(),
            table_name: self.ctx.main_table_name.clone(),
            field: self.field,
            feature_id: self.feature_id,
            severity: self.severity,
            kind: ErrorKind::Relation,
            location: self.location,
            metadata: self.metadata,
            observed_at: Utc::now(),
        }
    }
}
