//! `CheckContext`: the read-only handle every geometry/relation/attribute
//! strategy receives (spec.md §3 "Ownership", §9 "Cancellation"). Strategies
//! never mutate `Job` directly; they report progress and cancellation
//! through this context and append findings through the Error Sink.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::model::criteria::GeometryCriteria;
use crate::model::error_record::{ErrorKind, Location, Severity, ValidationError};

/// Default stride for progress callbacks (spec.md §4.4: "every N features,
/// N = 100 by default").
pub const PROGRESS_STRIDE: u64 = 100;

#[derive(Clone)]
pub struct CheckContext {
    pub job_id: String,
    pub stage: u8,
    pub rule_id: String,
    pub table_id: String,
    pub table_name: String,
    pub cancellation: CancellationToken,
    pub criteria: GeometryCriteria,
    on_progress: Arc<dyn Fn(u64) + Send + Sync>,
}

impl CheckContext {
    pub fn new(
        job_id: impl Into<String>,
        stage: u8,
        rule_id: impl Into<String>,
        table_id: impl Into<String>,
        table_name: impl Into<String>,
        cancellation: CancellationToken,
        criteria: GeometryCriteria,
        on_progress: Arc<dyn Fn(u64) + Send + Sync>,
    ) -> Self {
        Self {
            job_id: job_id.into(),
            stage,
            rule_id: rule_id.into(),
            table_id: table_id.into(),
            table_name: table_name.into(),
            cancellation,
            criteria,
            on_progress,
        }
    }

    #[cfg(test)]
    pub fn for_test(criteria: GeometryCriteria) -> Self {
        Self::new(
            "val_test",
            3,
            "r1",
            "tn_test",
            "Test Table",
            CancellationToken::new(),
            criteria,
            Arc::new(|_| {}),
        )
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancellation.is_cancelled()
    }

    /// Strategies call this every `PROGRESS_STRIDE` features; the stride
    /// check is the caller's responsibility so hot loops avoid a function
    /// call per feature.
    pub fn report_progress(&self, processed: u64) {
        (self.on_progress)(processed);
    }

    pub fn error(&self, code: impl Into<String>, message: impl Into<String>, severity: Severity, kind: ErrorKind) -> ErrorBuilder<'_> {
        ErrorBuilder {
            ctx: self,
            code: code.into(),
            message: message.into(),
            severity,
            kind,
            feature_id: None,
            field: None,
            location: None,
            metadata: HashMap::new(),
        }
    }
}

pub struct ErrorBuilder<'a> {
    ctx: &'a CheckContext,
    code: String,
    message: String,
    severity: Severity,
    kind: ErrorKind,
    feature_id: Option<i64>,
    field: Option<String>,
    location: Option<Location>,
    metadata: HashMap<String, String>,
}

impl<'a> ErrorBuilder<'a> {
    pub fn feature_id(mut self, fid: i64) -> Self {
        self.feature_id = Some(fid);
        self
    }

    pub fn field(mut self, field: impl Into<String>) -> Self {
        self.field = Some(field.into());
        self
    }

    pub fn location(mut self, x: f64, y: f64, epsg: Option<i32>) -> Self {
        self.location = Some(Location { x, y, epsg });
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
            stage: self.ctx.stage,
            rule_id: self.ctx.rule_id.clone(),
            code: self.code,
            message: self.message,
            table_id: self.ctx.table_id.clone(),
            table_name: self.ctx.table_name.clone(),
            field: self.field,
            feature_id: self.feature_id,
            severity: self.severity,
            kind: self.kind,
            location: self.location,
            metadata: self.metadata,
            observed_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::criteria::GeometryCriteria;

    #[test]
    fn error_builder_carries_context_fields() {
        let ctx = CheckContext::for_test(GeometryCriteria::default());
        let err = ctx
            .error("GEO_OVERLAP", "overlap found", Severity::Error, ErrorKind::Geometry)
            .feature_id(20)
            .metadata("overlap_area", 5.0)
            .build();
        assert_eq!(err.rule_id, "r1");
        assert_eq!(err.feature_id, Some(20));
        assert_eq!(err.metadata.get("overlap_area").unwrap(), "5");
    }
}
