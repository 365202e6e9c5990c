//! Stage runners (spec.md §4.3): Stage 1 Tables, Stage 2 Schema, Stage 3
//! Geometry, Stage 4 Relations, Stage 5 Attributes, plus the `PipelineRunner`
//! that sequences them under the gating rule ("if stage 1 fails and the job
//! was started with `stop_on_table_check_failure=true`, subsequent stages
//! are marked Blocked and skipped").

pub mod attributes;
pub mod context;
pub mod geometry;
pub mod relations;
pub mod runner;
pub mod schema;
pub mod tables;

pub use runner::PipelineRunner;

use crate::model::feature::GeometryKind;
use crate::model::LayerInfo;

/// Layer name prefixes excluded from table-existence matching, "extra
/// layer" reporting, and wildcard (`table_id = "*"`) expansion (spec.md
/// §4.3: "the archival prefix").
const ARCHIVAL_PREFIXES: [&str; 2] = ["ORG_", "QC_"];

pub(crate) fn is_archival(id: &str) -> bool {
    let upper = id.to_ascii_uppercase();
    ARCHIVAL_PREFIXES.iter().any(|p| upper.starts_with(p))
}

/// Resolves a rule's `table_id` against the layer catalog, expanding the
/// `"*"` wildcard to every non-archival layer whose geometry kind matches
/// `kind_hint` (spec.md §4.3). `kind_hint = None` means "any kind".
pub(crate) fn expand_table(table_id: &str, layers: &[LayerInfo], kind_hint: Option<GeometryKind>) -> Vec<String> {
    if table_id != "*" {
        return vec![table_id.to_string()];
    }
    layers
        .iter()
        .filter(|l| !is_archival(&l.id))
        .filter(|l| kind_hint.is_none_or(|k| l.geometry_type == k))
        .map(|l| l.id.clone())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Extent;

    fn layer(id: &str, kind: GeometryKind) -> LayerInfo {
        LayerInfo { id: id.into(), display_name: id.into(), geometry_type: kind, epsg: None, field_defs: vec![], extent: None::<Extent>, feature_count: 0 }
    }

    #[test]
    fn wildcard_expands_to_matching_non_archival_layers() {
        let layers = vec![layer("tn_road", GeometryKind::LineString), layer("tn_buld", GeometryKind::Polygon), layer("ORG_tn_road", GeometryKind::LineString)];
        let expanded = expand_table("*", &layers, Some(GeometryKind::LineString));
        assert_eq!(expanded, vec!["tn_road".to_string()]);
    }

    #[test]
    fn literal_table_id_passes_through() {
        assert_eq!(expand_table("tn_buld", &[], None), vec!["tn_buld".to_string()]);
    }
}
