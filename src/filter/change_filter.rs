//! Pre-pass change filter (spec.md §4.2): layers carrying a well-known
//! status column may mark unchanged features as skipped for this run.

use crate::model::feature::{AttrValue, Feature};

/// Name of the well-known object-change status column, and the set of
/// values considered "unchanged" (case-insensitive).
const CHANGE_STATUS_FIELD: &str = "chg_cde";
const UNCHANGED_VALUES: &[&str] = &["0", "N", "UNCHANGED"];

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChangeFilterOutcome {
    pub applied: bool,
    pub excluded_count: u64,
}

/// Scans `features` for the change-status column; if present on any
/// feature, every feature carrying an "unchanged" value is reported as
/// excluded. `table_id`/`phase` are accepted for call-site symmetry with
/// the spec's `apply_change_filter(layer, phase, table_id)` signature and
/// included in the tracing span for observability.
pub fn apply_change_filter(features: &[Feature], phase: &str, table_id: &str) -> ChangeFilterOutcome {
    let _span = tracing::debug_span!("apply_change_filter", phase, table_id).entered();

    let column_present = features
        .iter()
        .any(|f| f.attributes.contains_key(CHANGE_STATUS_FIELD));
    if !column_present {
        return ChangeFilterOutcome {
            applied: false,
            excluded_count: 0,
        };
    }

    let excluded_count = features
        .iter()
        .filter(|f| is_unchanged(f.get(CHANGE_STATUS_FIELD)))
        .count() as u64;

    ChangeFilterOutcome {
        applied: true,
        excluded_count,
    }
}

fn is_unchanged(value: Option<&AttrValue>) -> bool {
    match value {
        Some(AttrValue::Text(s)) => UNCHANGED_VALUES.iter().any(|u| s.eq_ignore_ascii_case(u)),
        Some(AttrValue::Integer(0)) => true,
        Some(AttrValue::Bool(false)) => true,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_applied_when_column_absent() {
        let features = vec![Feature::new(1, None)];
        let outcome = apply_change_filter(&features, "pre_stage1", "tn_buld");
        assert!(!outcome.applied);
        assert_eq!(outcome.excluded_count, 0);
    }

    #[test]
    fn counts_unchanged_features() {
        let mut changed = Feature::new(1, None);
        changed
            .attributes
            .insert(CHANGE_STATUS_FIELD.to_string(), AttrValue::Text("1".into()));
        let mut unchanged = Feature::new(2, None);
        unchanged
            .attributes
            .insert(CHANGE_STATUS_FIELD.to_string(), AttrValue::Text("0".into()));

        let outcome = apply_change_filter(&[changed, unchanged], "pre_stage1", "tn_buld");
        assert!(outcome.applied);
        assert_eq!(outcome.excluded_count, 1);
    }
}
