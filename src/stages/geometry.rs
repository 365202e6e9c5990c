//! Stage 3 — Geometry (spec.md §4.3/§4.4): dispatches each enabled
//! `CheckType` flag on a `GeometryRule` to the matching `CheckStrategy`,
//! reusing one drained feature list and one spatial index per layer across
//! every strategy that touches it this stage.

use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use ahash::AHasher;
use geo::BoundingRect;
use tokio_util::sync::CancellationToken;

use crate::checks::CheckRegistry;
use crate::filter::{should_skip, CompiledFilter, UnknownFieldWarnings};
use crate::index::SpatialIndexCache;
use crate::model::error_record::ValidationError;
use crate::model::feature::Feature;
use crate::model::rule::GeometryRule;
use crate::model::GeometryCriteria;
use crate::reader::DataSource;
use crate::stages::context::{CheckContext, PROGRESS_STRIDE};
use crate::Result;

fn fingerprint(table_id: &str, feature_count: usize) -> u64 {
    let mut hasher = AHasher::default();
    table_id.hash(&mut hasher);
    feature_count.hash(&mut hasher);
    hasher.finish()
}

fn drain_layer(source: &dyn DataSource, table_id: &str) -> Result<Vec<Feature>> {
    let mut cursor = source.open_layer(table_id)?;
    cursor.reset()?;
    let mut features = Vec::new();
    while let Some(feature) = cursor.next()? {
        features.push(feature);
    }
    Ok(features)
}

#[allow(clippy::too_many_arguments)]
pub async fn run(
    job_id: &str,
    source: &dyn DataSource,
    rules: &[GeometryRule],
    registry: &CheckRegistry,
    index_cache: &SpatialIndexCache,
    criteria: GeometryCriteria,
    cancellation: CancellationToken,
    on_progress: Arc<dyn Fn(u64) + Send + Sync>,
) -> Result<Vec<ValidationError>> {
    let warnings = UnknownFieldWarnings::default();
    let mut layer_cache: HashMap<&str, Arc<Vec<Feature>>> = HashMap::new();
    let mut errors = Vec::new();

    for rule in rules.iter().filter(|r| r.meta.enabled) {
        if cancellation.is_cancelled() {
            break;
        }
        let all_features = match layer_cache.get(rule.table_id.as_str()) {
            Some(f) => f.clone(),
            None => {
                let drained = Arc::new(drain_layer(source, &rule.table_id)?);
                layer_cache.insert(rule.table_id.as_str(), drained.clone());
                drained
            }
        };

        let filter = rule.filter.as_deref().map(CompiledFilter::compile);
        let features: Vec<Feature> = all_features
            .iter()
            .filter(|f| f.has_usable_geometry())
            .filter(|f| match &filter {
                Some(compiled) => !should_skip(compiled, f, &rule.meta.rule_id, &warnings).0,
                None => true,
            })
            .cloned()
            .collect();

        let items = features.iter().filter_map(|f| f.geometry.as_ref().and_then(|g| g.bounding_rect()).map(|r| (f.fid, r)));
        let index = index_cache.get_or_build(job_id, &rule.table_id, fingerprint(&rule.table_id, features.len()), || items.collect()).await;

        for check_type in &rule.flags {
            if cancellation.is_cancelled() {
                break;
            }
            let Some(strategy) = registry.get(*check_type) else { continue };
            let ctx = CheckContext::new(job_id, 3, rule.meta.rule_id.clone(), rule.table_id.clone(), rule.table_id.clone(), cancellation.clone(), criteria, on_progress.clone());
            errors.extend(strategy.run(&features, &index, &ctx));
            if features.len() as u64 % PROGRESS_STRIDE == 0 {
                ctx.report_progress(features.len() as u64);
            }
        }
    }

    Ok(errors)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::feature::GeometryKind;
    use crate::model::rule::{CheckType, RuleMeta};
    use crate::model::{Extent, LayerInfo};
    use crate::reader::LayerCursor;
    use geo::{point, Geometry};
    use std::collections::HashSet;

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
        features: Vec<Feature>,
    }

    impl DataSource for FakeSource {
        fn list_layers(&self) -> Result<Vec<LayerInfo>> {
            Ok(vec![])
        }
        fn open_layer(&self, _id: &str) -> Result<Box<dyn LayerCursor>> {
            Ok(Box::new(VecCursor { features: self.features.clone(), pos: 0 }))
        }
    }

    #[tokio::test]
    async fn min_vertex_count_flags_degenerate_line() {
        let source = FakeSource {
            features: vec![Feature::new(1, Some(Geometry::LineString(geo::LineString(vec![point!(x:0.0,y:0.0).0, point!(x:1.0,y:0.0).0]))))],
        };
        let rule = GeometryRule {
            meta: RuleMeta { rule_id: "r1".into(), enabled: true, note: None },
            table_id: "tn_road".into(),
            geom_type: GeometryKind::LineString,
            flags: HashSet::from([CheckType::MinVertexCount]),
            filter: None,
        };
        let registry = CheckRegistry::new();
        let cache = SpatialIndexCache::new();
        let errors = run("val_1", &source, &[rule], &registry, &cache, GeometryCriteria::default(), CancellationToken::new(), Arc::new(|_| {})).await.unwrap();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].code, "GEO_MIN_VERTEX_COUNT");
    }
}
