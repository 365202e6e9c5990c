//! Stage 1 — Table Existence & Metadata (spec.md §4.3).

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::model::error_record::{ErrorKind, Severity, ValidationError};
use crate::model::rule::TableRule;
use crate::model::{GeometryCriteria, LayerInfo};
use crate::reader::DataSource;
use crate::stages::context::CheckContext;
use crate::stages::is_archival;
use crate::Result;

pub struct TableStageOutcome {
    pub errors: Vec<ValidationError>,
    /// `false` iff any rule produced an `Error`/`Critical` finding — the
    /// signal the Stage-1 gate (`stop_on_table_check_failure`) acts on.
    pub passed: bool,
}

fn no_op_progress() -> Arc<dyn Fn(u64) + Send + Sync> {
    Arc::new(|_| {})
}

pub fn run(job_id: &str, source: &dyn DataSource, rules: &[TableRule], cancellation: CancellationToken) -> Result<TableStageOutcome> {
    let layers = source.list_layers()?;
    let by_id: HashMap<String, &LayerInfo> = layers.iter().filter(|l| !is_archival(&l.id)).map(|l| (l.id.to_ascii_lowercase(), l)).collect();

    let mut errors = Vec::new();
    let mut matched: HashSet<String> = HashSet::new();

    for rule in rules.iter().filter(|r| r.meta.enabled) {
        if cancellation.is_cancelled() {
            break;
        }
        let ctx = CheckContext::new(job_id, 1, rule.meta.rule_id.clone(), rule.table_id.clone(), rule.table_name.clone(), cancellation.clone(), GeometryCriteria::default(), no_op_progress());
        let key = rule.table_id.to_ascii_lowercase();
        let Some(layer) = by_id.get(&key) else {
            errors.push(ctx.error("TBL001", format!("table {} ({}) not found", rule.table_name, rule.table_id), Severity::Error, ErrorKind::Table).build());
            continue;
        };
        matched.insert(key);

        if layer.geometry_type != rule.expected_geom_type {
            errors.push(
                ctx.error(
                    "TBL001",
                    format!("{} has geometry type {:?}, expected {:?}", rule.table_name, layer.geometry_type, rule.expected_geom_type),
                    Severity::Error,
                    ErrorKind::Table,
                )
                .metadata("actual_geom_type", format!("{:?}", layer.geometry_type))
                .metadata("expected_geom_type", format!("{:?}", rule.expected_geom_type))
                .build(),
            );
        }

        if let (Some(expected_epsg), Some(actual_epsg)) = (rule.expected_epsg, layer.epsg) {
            if actual_epsg != expected_epsg {
                errors.push(
                    ctx.error("TBL002", format!("{} has EPSG {actual_epsg}, expected {expected_epsg}", rule.table_name), Severity::Error, ErrorKind::Table)
                        .metadata("actual_epsg", actual_epsg)
                        .metadata("expected_epsg", expected_epsg)
                        .build(),
                );
            }
        }
    }

    for layer in layers.iter().filter(|l| !is_archival(&l.id)) {
        if cancellation.is_cancelled() {
            break;
        }
        if matched.contains(&layer.id.to_ascii_lowercase()) {
            continue;
        }
        let ctx = CheckContext::new(job_id, 1, "tbl-extra-layer", layer.id.clone(), layer.display_name.clone(), cancellation.clone(), GeometryCriteria::default(), no_op_progress());
        errors.push(ctx.error("TBL_EXTRA_LAYER", format!("layer {} is present but not referenced by any table rule", layer.id), Severity::Warning, ErrorKind::Table).build());
    }

    let passed = !errors.iter().any(|e| matches!(e.severity, Severity::Error | Severity::Critical));
    Ok(TableStageOutcome { errors, passed })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::feature::GeometryKind;
    use crate::model::rule::RuleMeta;
    use crate::model::{Extent, FieldDef};
    use crate::reader::LayerCursor;

    struct FakeSource {
        layers: Vec<LayerInfo>,
    }

    impl DataSource for FakeSource {
        fn list_layers(&self) -> Result<Vec<LayerInfo>> {
            Ok(self.layers.clone())
        }
        fn open_layer(&self, _id: &str) -> Result<Box<dyn LayerCursor>> {
            unimplemented!("not needed for table-stage tests")
        }
    }

    fn layer(id: &str, geometry_type: GeometryKind) -> LayerInfo {
        LayerInfo {
            id: id.into(),
            display_name: id.into(),
            geometry_type,
            epsg: Some(5186),
            field_defs: Vec::<FieldDef>::new(),
            extent: None::<Extent>,
            feature_count: 0,
        }
    }

    fn table_rule(id: &str, name: &str, kind: GeometryKind) -> TableRule {
        TableRule {
            meta: RuleMeta { rule_id: "r1".into(), enabled: true, note: None },
            table_id: id.into(),
            table_name: name.into(),
            expected_geom_type: kind,
            expected_epsg: Some(5186),
        }
    }

    #[test]
    fn missing_table_fails_stage() {
        let source = FakeSource { layers: vec![] };
        let rules = vec![table_rule("tn_buld", "Buildings", GeometryKind::Polygon)];
        let outcome = run("val_1", &source, &rules, CancellationToken::new()).unwrap();
        assert!(!outcome.passed);
        assert_eq!(outcome.errors.len(), 1);
        assert_eq!(outcome.errors[0].code, "TBL001");
        assert_eq!(outcome.errors[0].table_id, "tn_buld");
    }

    #[test]
    fn extra_layer_warns_without_failing() {
        let source = FakeSource {
            layers: vec![layer("tn_buld", GeometryKind::Polygon), layer("tn_foo", GeometryKind::Polygon)],
        };
        let rules = vec![table_rule("tn_buld", "Buildings", GeometryKind::Polygon)];
        let outcome = run("val_1", &source, &rules, CancellationToken::new()).unwrap();
        assert!(outcome.passed);
        assert_eq!(outcome.errors.len(), 1);
        assert_eq!(outcome.errors[0].severity, Severity::Warning);
        assert_eq!(outcome.errors[0].table_id, "tn_foo");
    }

    #[test]
    fn archival_layers_are_never_extras() {
        let source = FakeSource {
            layers: vec![layer("tn_buld", GeometryKind::Polygon), layer("ORG_tn_buld", GeometryKind::Polygon)],
        };
        let rules = vec![table_rule("tn_buld", "Buildings", GeometryKind::Polygon)];
        let outcome = run("val_1", &source, &rules, CancellationToken::new()).unwrap();
        assert!(outcome.errors.is_empty());
    }
}
