//! Stage 2 — Schema (spec.md §4.3).

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::model::error_record::{ErrorKind, Severity, ValidationError};
use crate::model::feature::AttrValue;
use crate::model::rule::SchemaRule;
use crate::model::{GeometryCriteria, LayerInfo};
use crate::reader::DataSource;
use crate::stages::context::CheckContext;
use crate::Result;

fn no_op_progress() -> Arc<dyn Fn(u64) + Send + Sync> {
    Arc::new(|_| {})
}

fn stringify(value: &AttrValue) -> Option<String> {
    match value {
        AttrValue::Null => None,
        AttrValue::Text(s) => Some(s.clone()),
        AttrValue::Integer(i) => Some(i.to_string()),
        AttrValue::Real(f) => Some(f.to_string()),
        AttrValue::Bool(b) => Some(b.to_string()),
    }
}

/// Builds the referenced-value set for one foreign-key rule by streaming
/// the referenced table's cursor once (spec.md §4.3: "streamed hash set").
fn load_fk_set(source: &dyn DataSource, ref_table: &str, ref_field: &str) -> Result<HashSet<String>> {
    let mut cursor = source.open_layer(ref_table)?;
    cursor.reset()?;
    let mut set = HashSet::new();
    while let Some(feature) = cursor.next()? {
        if let Some(value) = feature.get(ref_field).and_then(stringify) {
            set.insert(value);
        }
    }
    Ok(set)
}

pub fn run(job_id: &str, source: &dyn DataSource, rules: &[SchemaRule], cancellation: CancellationToken) -> Result<Vec<ValidationError>> {
    let layers = source.list_layers()?;
    let layer_by_id: HashMap<String, &LayerInfo> = layers.iter().map(|l| (l.id.to_ascii_lowercase(), l)).collect();

    let mut by_table: HashMap<&str, Vec<&SchemaRule>> = HashMap::new();
    for rule in rules.iter().filter(|r| r.meta.enabled) {
        by_table.entry(rule.table_id.as_str()).or_default().push(rule);
    }

    let mut errors = Vec::new();

    for (table_id, table_rules) in by_table {
        if cancellation.is_cancelled() {
            break;
        }
        let Some(layer) = layer_by_id.get(&table_id.to_ascii_lowercase()) else {
            continue;
        };

        for rule in &table_rules {
            let ctx = CheckContext::new(job_id, 2, rule.meta.rule_id.clone(), rule.table_id.clone(), layer.display_name.clone(), cancellation.clone(), GeometryCriteria::default(), no_op_progress());
            let Some(field) = layer.field(&rule.field_name) else {
                errors.push(ctx.error("SCH001", format!("column {} missing from {}", rule.field_name, rule.table_id), Severity::Error, ErrorKind::Schema).field(&rule.field_name).build());
                continue;
            };
            if field.data_type != rule.data_type {
                errors.push(
                    ctx.error("SCH002", format!("{} is {:?}, expected {:?}", rule.field_name, field.data_type, rule.data_type), Severity::Error, ErrorKind::Schema)
                        .field(&rule.field_name)
                        .metadata("actual_type", format!("{:?}", field.data_type))
                        .metadata("expected_type", format!("{:?}", rule.data_type))
                        .build(),
                );
            }
        }

        let needs_scan = table_rules.iter().any(|r| r.is_pk || r.is_uk || r.is_fk || r.is_not_null);
        if !needs_scan || cancellation.is_cancelled() {
            continue;
        }

        let mut fk_sets: HashMap<(String, String), HashSet<String>> = HashMap::new();
        for rule in table_rules.iter().filter(|r| r.is_fk) {
            let (Some(ref_table), Some(ref_field)) = (&rule.ref_table, &rule.ref_field) else { continue };
            let key = (ref_table.clone(), ref_field.clone());
            if let std::collections::hash_map::Entry::Vacant(e) = fk_sets.entry(key.clone()) {
                e.insert(load_fk_set(source, ref_table, ref_field)?);
            }
        }

        let mut seen_values: HashMap<&str, HashMap<String, Vec<i64>>> = HashMap::new();
        let mut cursor = source.open_layer(table_id)?;
        cursor.reset()?;
        while let Some(feature) = cursor.next()? {
            if cancellation.is_cancelled() {
                break;
            }
            for rule in &table_rules {
                let ctx = CheckContext::new(job_id, 2, rule.meta.rule_id.clone(), rule.table_id.clone(), layer.display_name.clone(), cancellation.clone(), GeometryCriteria::default(), no_op_progress());
                let value = feature.get(&rule.field_name);
                let is_null = value.is_none_or(|v| v.is_null());

                if rule.is_not_null && is_null {
                    errors.push(ctx.error("SCH003", format!("{} is null", rule.field_name), Severity::Error, ErrorKind::Schema).field(&rule.field_name).feature_id(feature.fid).build());
                }

                if (rule.is_pk || rule.is_uk) && is_null {
                    errors.push(ctx.error("SCH004", format!("{} (primary/unique key) is empty", rule.field_name), Severity::Error, ErrorKind::Schema).field(&rule.field_name).feature_id(feature.fid).build());
                } else if rule.is_pk || rule.is_uk {
                    if let Some(s) = value.and_then(stringify) {
                        seen_values.entry(rule.field_name.as_str()).or_default().entry(s).or_default().push(feature.fid);
                    }
                }

                if rule.is_fk && !is_null {
                    let Some(text) = value.and_then(stringify) else { continue };
                    let (Some(ref_table), Some(ref_field)) = (&rule.ref_table, &rule.ref_field) else { continue };
                    let set = fk_sets.get(&(ref_table.clone(), ref_field.clone()));
                    if !set.is_some_and(|s| s.contains(&text)) {
                        errors.push(
                            ctx.error("SCH005", format!("{} = {text:?} has no matching {ref_table}.{ref_field}", rule.field_name), Severity::Error, ErrorKind::Schema)
                                .field(&rule.field_name)
                                .feature_id(feature.fid)
                                .metadata("value", &text)
                                .build(),
                        );
                    }
                }
            }
        }

        for rule in table_rules.iter().filter(|r| r.is_pk || r.is_uk) {
            let Some(values) = seen_values.get(rule.field_name.as_str()) else { continue };
            let ctx = CheckContext::new(job_id, 2, rule.meta.rule_id.clone(), rule.table_id.clone(), layer.display_name.clone(), cancellation.clone(), GeometryCriteria::default(), no_op_progress());
            for (value, fids) in values.iter().filter(|(_, fids)| fids.len() > 1) {
                errors.push(
                    ctx.error("SCH006", format!("{} = {value:?} is duplicated across {} features", rule.field_name, fids.len()), Severity::Error, ErrorKind::Schema)
                        .field(&rule.field_name)
                        .feature_id(fids[0])
                        .metadata("duplicate_fids", fids.iter().map(i64::to_string).collect::<Vec<_>>().join(","))
                        .build(),
                );
            }
        }
    }

    Ok(errors)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::feature::{Feature, GeometryKind};
    use crate::model::rule::{DataType, RuleMeta};
    use crate::model::{Extent, FieldDef};
    use crate::reader::LayerCursor;
    use std::sync::Mutex;

    struct VecCursor {
        features: Vec<Feature>,
        pos: usize,
    }

    impl LayerCursor for VecCursor {
        fn reset(&mut self) -> Result<()> {
            self.pos = 0;
            Ok(())
        }
        fn next(&mut self) -> Result<Option<Feature>> {
            let item = self.features.get(self.pos).cloned();
            self.pos += 1;
            Ok(item)
        }
        fn count(&mut self, _force_scan: bool) -> Result<i64> {
            Ok(self.features.len() as i64)
        }
        fn extent(&self) -> Option<Extent> {
            None
        }
    }

    struct FakeSource {
        layers: Vec<LayerInfo>,
        cursors: Mutex<HashMap<String, Vec<Feature>>>,
    }

    impl DataSource for FakeSource {
        fn list_layers(&self) -> Result<Vec<LayerInfo>> {
            Ok(self.layers.clone())
        }
        fn open_layer(&self, id: &str) -> Result<Box<dyn LayerCursor>> {
            let features = self.cursors.lock().unwrap().get(id).cloned().unwrap_or_default();
            Ok(Box::new(VecCursor { features, pos: 0 }))
        }
    }

    fn field(name: &str, data_type: DataType) -> FieldDef {
        FieldDef { name: name.into(), data_type, width: None, precision: None, nullable: true }
    }

    fn rule(field_name: &str, data_type: DataType) -> SchemaRule {
        SchemaRule {
            meta: RuleMeta { rule_id: "r1".into(), enabled: true, note: None },
            table_id: "tn_buld".into(),
            field_name: field_name.into(),
            data_type,
            is_pk: false,
            is_uk: false,
            is_fk: false,
            is_not_null: false,
            ref_table: None,
            ref_field: None,
        }
    }

    #[test]
    fn missing_column_is_sch001() {
        let source = FakeSource {
            layers: vec![LayerInfo { id: "tn_buld".into(), display_name: "Buildings".into(), geometry_type: GeometryKind::Polygon, epsg: None, field_defs: vec![], extent: None::<Extent>, feature_count: 0 }],
            cursors: Mutex::new(HashMap::new()),
        };
        let rules = vec![rule("bldg_se", DataType::Text(10))];
        let errors = run("val_1", &source, &rules, CancellationToken::new()).unwrap();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].code, "SCH001");
    }

    #[test]
    fn not_null_violation_is_reported() {
        let source = FakeSource {
            layers: vec![LayerInfo {
                id: "tn_buld".into(),
                display_name: "Buildings".into(),
                geometry_type: GeometryKind::Polygon,
                epsg: None,
                field_defs: vec![field("bldg_se", DataType::Text(10))],
                extent: None::<Extent>,
                feature_count: 1,
            }],
            cursors: Mutex::new(HashMap::from([("tn_buld".to_string(), vec![Feature::new(1, None)])])),
        };
        let mut r = rule("bldg_se", DataType::Text(10));
        r.is_not_null = true;
        let errors = run("val_1", &source, &[r], CancellationToken::new()).unwrap();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].code, "SCH003");
    }

    #[test]
    fn duplicate_primary_key_values_are_reported() {
        let mut a = Feature::new(1, None);
        a.attributes.insert("id".into(), AttrValue::Text("X1".into()));
        let mut b = Feature::new(2, None);
        b.attributes.insert("id".into(), AttrValue::Text("X1".into()));
        let source = FakeSource {
            layers: vec![LayerInfo {
                id: "tn_buld".into(),
                display_name: "Buildings".into(),
                geometry_type: GeometryKind::Polygon,
                epsg: None,
                field_defs: vec![field("id", DataType::Text(10))],
                extent: None::<Extent>,
                feature_count: 2,
            }],
            cursors: Mutex::new(HashMap::from([("tn_buld".to_string(), vec![a, b])])),
        };
        let mut r = rule("id", DataType::Text(10));
        r.is_pk = true;
        let errors = run("val_1", &source, &[r], CancellationToken::new()).unwrap();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].code, "SCH006");
    }
}
