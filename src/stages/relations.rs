//! Stage 4 — Relations (spec.md §4.3/§4.5): dispatches each `RelationRule`
//! by `CaseType`, expanding `table_id = "*"` on either side to every
//! non-archival layer compatible with the strategy's geometry expectations.

use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use ahash::AHasher;
use geo::BoundingRect;
use tokio_util::sync::CancellationToken;

use crate::filter::CompiledFilter;
use crate::index::SpatialIndexCache;
use crate::model::error_record::ValidationError;
use crate::model::feature::{Feature, GeometryKind};
use crate::model::rule::{CaseType, RelationRule};
use crate::model::LayerInfo;
use crate::reader::DataSource;
use crate::relations::{RelationContext, RelationRegistry};
use crate::stages::expand_table;
use crate::Result;

/// Geometry-kind hints for wildcard expansion, `(main, related)`. `None`
/// means the strategy accepts any kind on that side (spec.md §4.5 lists a
/// few — `PolygonContainsObjects`, `DefectiveConnection`,
/// `AttributeSpatialMismatch` — whose related side is explicitly "any").
fn geometry_hints(case_type: CaseType) -> (Option<GeometryKind>, Option<GeometryKind>) {
    use CaseType::*;
    use GeometryKind::{LineString as Line, Point, Polygon};
    match case_type {
        PolygonNotOverlap | PolygonWithinPolygon | PolygonNotWithinPolygon | PolygonIntersectionWithAttribute | HoleDuplicateCheck => (Some(Polygon), Some(Polygon)),
        PolygonMissingLine | PolygonBoundaryMatch | PolygonNotIntersectLine | BridgeRiverNameMatch => (Some(Polygon), Some(Line)),
        PolygonContainsObjects => (Some(Polygon), None),
        LineWithinPolygon | LineEndpointWithinPolygon => (Some(Line), Some(Polygon)),
        PolygonNotContainPoint => (Some(Polygon), Some(Point)),
        PointInsidePolygon => (Some(Point), Some(Polygon)),
        LineConnectivity | LineConnectivityWithFilter | LineDisconnection | LineDisconnectionWithAttribute | LineIntersectionWithAttribute | RoadSharpBend | ContourSharpBend | ContourIntersection | CenterlineAttributeMismatch | ConnectedLinesSameAttribute => (Some(Line), Some(Line)),
        DefectiveConnection => (Some(Line), None),
        AttributeSpatialMismatch => (None, None),
        PointSpacingCheck => (Some(Point), Some(Point)),
    }
}

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
pub async fn run(job_id: &str, source: &dyn DataSource, rules: &[RelationRule], registry: &RelationRegistry, index_cache: &SpatialIndexCache, cancellation: CancellationToken) -> Result<Vec<ValidationError>> {
    let layers = source.list_layers()?;
    let layer_by_id: HashMap<String, &LayerInfo> = layers.iter().map(|l| (l.id.to_ascii_lowercase(), l)).collect();
    let mut layer_cache: HashMap<String, Arc<Vec<Feature>>> = HashMap::new();
    let mut errors = Vec::new();

    for rule in rules.iter().filter(|r| r.meta.enabled) {
        if cancellation.is_cancelled() {
            break;
        }
        let Some(strategy) = registry.get(rule.case_type) else { continue };
        let (main_hint, related_hint) = geometry_hints(rule.case_type);
        let main_tables = expand_table(&rule.main_table, &layers, main_hint);
        let related_tables = expand_table(&rule.related_table, &layers, related_hint);

        for main_id in &main_tables {
            if cancellation.is_cancelled() {
                break;
            }
            let Some(main_info) = layer_by_id.get(&main_id.to_ascii_lowercase()) else { continue };
            let main_features = match layer_cache.get(main_id) {
                Some(f) => f.clone(),
                None => {
                    let drained = Arc::new(drain_layer(source, main_id)?);
                    layer_cache.insert(main_id.clone(), drained.clone());
                    drained
                }
            };
            let main_items = main_features.iter().filter_map(|f| f.geometry.as_ref().and_then(|g| g.bounding_rect()).map(|r| (f.fid, r)));
            let main_index = index_cache.get_or_build(job_id, main_id, fingerprint(main_id, main_features.len()), || main_items.collect()).await;

            for related_id in &related_tables {
                if cancellation.is_cancelled() {
                    break;
                }
                let Some(related_info) = layer_by_id.get(&related_id.to_ascii_lowercase()) else { continue };
                let related_features = match layer_cache.get(related_id) {
                    Some(f) => f.clone(),
                    None => {
                        let drained = Arc::new(drain_layer(source, related_id)?);
                        layer_cache.insert(related_id.clone(), drained.clone());
                        drained
                    }
                };
                let related_items = related_features.iter().filter_map(|f| f.geometry.as_ref().and_then(|g| g.bounding_rect()).map(|r| (f.fid, r)));
                let related_index = index_cache.get_or_build(job_id, related_id, fingerprint(related_id, related_features.len()), || related_items.collect()).await;

                let ctx = RelationContext {
                    job_id: job_id.to_string(),
                    rule_id: rule.meta.rule_id.clone(),
                    main_table: main_id.clone(),
                    main_table_name: main_info.display_name.clone(),
                    related_table: related_id.clone(),
                    related_table_name: related_info.display_name.clone(),
                    filter: rule.filter.as_deref().map(CompiledFilter::compile),
                    tolerance: rule.tolerance,
                    params: rule.params.clone(),
                    cancellation: cancellation.clone(),
                };
                errors.extend(strategy.run(&main_features, &main_index, &related_features, &related_index, &ctx));
            }
        }
    }

    Ok(errors)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::rule::RuleMeta;
    use crate::model::{Extent, GeometryCriteria};
    use crate::reader::LayerCursor;
    use geo::{point, Geometry};
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

    fn point_feature(fid: i64, x: f64, y: f64) -> Feature {
        Feature::new(fid, Some(Geometry::Point(point!(x: x, y: y))))
    }

    #[tokio::test]
    async fn point_spacing_dispatches_through_the_stage() {
        let layer = LayerInfo { id: "tn_point".into(), display_name: "Points".into(), geometry_type: GeometryKind::Point, epsg: None, field_defs: vec![], extent: None::<Extent>, feature_count: 2 };
        let source = FakeSource {
            layers: vec![layer],
            features: StdHashMap::from([("tn_point".to_string(), vec![point_feature(1, 0.0, 0.0), point_feature(2, 0.5, 0.0)])]),
        };
        let rule = RelationRule {
            meta: RuleMeta { rule_id: "r1".into(), enabled: true, note: None },
            case_type: CaseType::PointSpacingCheck,
            main_table: "tn_point".into(),
            related_table: "tn_point".into(),
            filter: None,
            tolerance: 1.0,
            params: StdHashMap::from([("min_spacing_m".to_string(), "1.0".to_string())]),
        };
        let registry = RelationRegistry::new();
        let cache = SpatialIndexCache::new();
        let errors = run("val_1", &source, &[rule], &registry, &cache, CancellationToken::new()).await.unwrap();
        assert!(!errors.is_empty());
        assert_eq!(errors[0].code, "REL_POINT_SPACING_CHECK");
    }

    #[test]
    fn point_in_polygon_hints_are_swapped_from_polygon_not_contain_point() {
        assert_eq!(geometry_hints(CaseType::PointInsidePolygon), (Some(GeometryKind::Point), Some(GeometryKind::Polygon)));
        assert_eq!(geometry_hints(CaseType::PolygonNotContainPoint), (Some(GeometryKind::Polygon), Some(GeometryKind::Point)));
    }
}
