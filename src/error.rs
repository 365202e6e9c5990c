//! Crate-level error taxonomy.
//!
//! Mirrors the *System* / *Configuration* split of the error handling design:
//! `ValidationError` (in [`crate::model::error_record`]) covers *Data*
//! findings and is never a Rust error, only a record appended to the sink.

use thiserror::Error;

/// Result type for fallible engine operations that are not per-feature data
/// findings.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
#[non_exhaustive]
pub enum Error {
    /// The source path does not exist.
    #[error("path not found: {0}")]
    PathNotFound(String),

    /// The directory exists but none of the supported backends recognize it.
    #[error("unsupported driver for source: {0}")]
    UnsupportedDriver(String),

    /// The source was recognized but is structurally broken.
    #[error("corrupt source at {path}: {detail}")]
    Corrupt { path: String, detail: String },

    /// A rule failed to parse/compile at load time (bad regex, unknown
    /// CodeSetId, malformed `IfCode*` grammar, …). Fails only that rule.
    #[error("configuration error in rule {rule_id}: {detail}")]
    Configuration { rule_id: String, detail: String },

    /// An engine invariant was violated outside any single feature's scope.
    #[error("invariant violation: {0}")]
    Invariant(String),

    /// I/O failure underneath the reader, sink, or rule loader.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// CSV/rule-table parsing failure.
    #[error("csv error: {0}")]
    Csv(#[from] polars::error::PolarsError),

    /// Regex compilation failure (surfaced as Configuration for the owning
    /// rule; kept distinct here for `#[from]` ergonomics).
    #[error("regex error: {0}")]
    Regex(#[from] regex::Error),

    /// Error record (de)serialization failure in the sink.
    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    /// Job does not exist in the registry.
    #[error("unknown job: {0}")]
    UnknownJob(String),

    /// Job exists but is not in a state that allows the requested operation
    /// (e.g. calling `start` twice).
    #[error("invalid job state for {job_id}: {detail}")]
    InvalidJobState { job_id: String, detail: String },
}

impl Error {
    /// `System` errors abort the affected stage (and the job, if raised
    /// during setup); `Configuration` errors only fail the owning rule.
    pub fn is_system(&self) -> bool {
        !matches!(self, Error::Configuration { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn configuration_errors_are_not_system() {
        let err = Error::Configuration {
            rule_id: "r1".into(),
            detail: "bad regex".into(),
        };
        assert!(!err.is_system());
    }

    #[test]
    fn path_not_found_is_system() {
        let err = Error::PathNotFound("/no/such/path".into());
        assert!(err.is_system());
    }

    #[test]
    fn display_includes_rule_id() {
        let err = Error::Configuration {
            rule_id: "r42".into(),
            detail: "unknown CodeSetId".into(),
        };
        assert!(err.to_string().contains("r42"));
    }
}
