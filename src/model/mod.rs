//! Core data model (spec.md §3): `Feature`, `LayerInfo`, the rule families,
//! `GeometryCriteria`, `ValidationError`, and `Job`.

pub mod criteria;
pub mod error_record;
pub mod feature;
pub mod job;
pub mod layer;
pub mod rule;

pub use criteria::GeometryCriteria;
pub use error_record::{ErrorKind, Severity, ValidationError};
pub use feature::{AttrValue, Feature, GeometryKind};
pub use job::{Job, JobRequest, JobState, StageProgress, StageStatus};
pub use layer::{FieldDef, LayerInfo};
pub use rule::{
    AttributeCheckType, AttributeRule, CaseType, CheckType, DataType, GeometryRule, RelationRule,
    RuleMeta, SchemaRule, TableRule,
};
