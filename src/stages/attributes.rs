//! Stage 5 — Attributes (spec.md §4.3/§4.6): dispatches each
//! `AttributeRule` by `AttributeCheckType`, expanding `table_id = "*"` to
//! every non-archival layer. A rule that fails to load (bad regex, unknown
//! `CodeSetId`, malformed `IfCode*` grammar) is logged and skipped without
//! aborting the stage (spec.md §7).

use std::collections::HashMap;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::attributes::AttributeRegistry;
use crate::codelist::CodelistStore;
use crate::model::error_record::ValidationError;
use crate::model::feature::Feature;
use crate::model::rule::AttributeRule;
use crate::model::{GeometryCriteria, LayerInfo};
use crate::reader::DataSource;
use crate::stages::context::CheckContext;
use crate::stages::expand_table;
use crate::Result;

fn drain_layer(source: &dyn DataSource, table_id: &str) -> Result<Vec<Feature>> {
    let mut cursor = source.open_layer(table_id)?;
    cursor.reset()?;
    let mut features = Vec::new();
    while let Some(feature) = cursor.next()? {
        features.push(feature);
    }
    Ok(features)
}

pub fn run(job_id: &str, source: &dyn DataSource, rules: &[AttributeRule], registry: &AttributeRegistry, codelist: &CodelistStore, cancellation: CancellationToken) -> Result<Vec<ValidationError>> {
    let layers = source.list_layers()?;
    let layer_by_id: HashMap<String, &LayerInfo> = layers.iter().map(|l| (l.id.to_ascii_lowercase(), l)).collect();
    let mut layer_cache: HashMap<String, Arc<Vec<Feature>>> = HashMap::new();
    let mut errors = Vec::new();

    for rule in rules.iter().filter(|r| r.meta.enabled) {
        if cancellation.is_cancelled() {
            break;
        }
        let Some(strategy) = registry.get(rule.check_type) else { continue };

        for table_id in expand_table(&rule.table_id, &layers, None) {
            if cancellation.is_cancelled() {
                break;
            }
            let Some(layer) = layer_by_id.get(&table_id.to_ascii_lowercase()) else { continue };
            let features = match layer_cache.get(&table_id) {
                Some(f) => f.clone(),
                None => {
                    let drained = Arc::new(drain_layer(source, &table_id)?);
                    layer_cache.insert(table_id.clone(), drained.clone());
                    drained
                }
            };

            let ctx = CheckContext::new(job_id, 5, rule.meta.rule_id.clone(), table_id.clone(), layer.display_name.clone(), cancellation.clone(), GeometryCriteria::default(), Arc::new(|_| {}));
            match strategy.run(&features, rule, codelist, &ctx) {
                Ok(found) => errors.extend(found),
                Err(err) => warn!(rule_id = %rule.meta.rule_id, table_id = %table_id, error = %err, "attribute rule failed to load; skipping"),
            }
        }
    }

    Ok(errors)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::feature::{AttrValue, GeometryKind};
    use crate::model::rule::{AttributeCheckType, RuleMeta};
    use crate::model::Extent;
    use crate::reader::LayerCursor;
    use std::collections::HashMap as StdHashMap;

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
        features: StdHashMap<String, Vec<Feature>>,
    }

    impl DataSource for FakeSource {
        fn list_layers(&self) -> Result<Vec<LayerInfo>> {
            Ok(self.layers.clone())
        }
        fn open_layer(&self, id: &str) -> Result<Box<dyn LayerCursor>> {
            Ok(Box::new(VecCursor { features: self.features.get(id).cloned().unwrap_or_default(), pos: 0 }))
        }
    }

    #[test]
    fn not_null_rule_flags_missing_field() {
        let layer = LayerInfo { id: "tn_buld".into(), display_name: "Buildings".into(), geometry_type: GeometryKind::Polygon, epsg: None, field_defs: vec![], extent: None::<Extent>, feature_count: 1 };
        let mut f = Feature::new(1, None);
        f.attributes.insert("bldg_se".into(), AttrValue::Null);
        let source = FakeSource { layers: vec![layer], features: StdHashMap::from([("tn_buld".to_string(), vec![f])]) };

        let rule = AttributeRule {
            meta: RuleMeta { rule_id: "r1".into(), enabled: true, note: None },
            table_id: "tn_buld".into(),
            field: "bldg_se".into(),
            check_type: AttributeCheckType::NotNull,
            params: StdHashMap::new(),
        };
        let registry = AttributeRegistry::new();
        let codelist = CodelistStore::new();
        let errors = run("val_1", &source, &[rule], &registry, &codelist, CancellationToken::new()).unwrap();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].code, "ATTR_NOT_NULL");
    }

    #[test]
    fn unknown_code_set_is_logged_and_skipped_not_fatal() {
        let layer = LayerInfo { id: "tn_buld".into(), display_name: "Buildings".into(), geometry_type: GeometryKind::Polygon, epsg: None, field_defs: vec![], extent: None::<Extent>, feature_count: 1 };
        let f = Feature::new(1, None);
        let source = FakeSource { layers: vec![layer], features: StdHashMap::from([("tn_buld".to_string(), vec![f])]) };

        let rule = AttributeRule {
            meta: RuleMeta { rule_id: "r1".into(), enabled: true, note: None },
            table_id: "tn_buld".into(),
            field: "bldg_se".into(),
            check_type: AttributeCheckType::CodeList,
            params: StdHashMap::from([("code_set_id".to_string(), "건물구분".to_string())]),
        };
        let registry = AttributeRegistry::new();
        let codelist = CodelistStore::new();
        let errors = run("val_1", &source, &[rule], &registry, &codelist, CancellationToken::new()).unwrap();
        assert!(errors.is_empty());
    }
}
