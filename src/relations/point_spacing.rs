//! `PointSpacingCheck` (spec.md §4.5): flags a main point whose nearest
//! neighbor (within the same layer, or a related layer) falls below a
//! configurable minimum spacing. Fully driven by rule `params` rather than a
//! hardcoded feature-class classifier, since the distilled spec left the
//! classification scheme unspecified.

use geoqc_index::SpatialIndex;

use crate::checks::geomutil::dist;
use crate::model::error_record::{Severity, ValidationError};
use crate::model::feature::Feature;
use crate::model::rule::CaseType;
use crate::relations::util::{by_fid, candidates};
use crate::relations::{RelationContext, RelationStrategy};

pub struct PointSpacingCheck;

impl RelationStrategy for PointSpacingCheck {
    fn case_type(&self) -> CaseType {
        CaseType::PointSpacingCheck
    }

    fn run(&self, main: &[Feature], _main_index: &SpatialIndex, related: &[Feature], related_index: &SpatialIndex, ctx: &RelationContext) -> Vec<ValidationError> {
        let min_spacing: f64 = ctx.param("min_spacing_m").and_then(|s| s.parse().ok()).unwrap_or(ctx.tolerance);
        let same_layer = ctx.main_table == ctx.related_table;
        let related_by_fid = by_fid(related);
        let mut errors = Vec::new();

        for m in main {
            if ctx.is_cancelled() {
                break;
            }
            let Some(geo::Geometry::Point(p)) = &m.geometry else { continue };

            let nearest = candidates(m, related_index, &related_by_fid, min_spacing, same_layer)
                .into_iter()
                .filter_map(|r| match &r.geometry {
                    Some(geo::Geometry::Point(q)) => Some(dist(p.0, q.0)),
                    _ => None,
                })
                .fold(f64::INFINITY, f64::min);

            if nearest < min_spacing {
                errors.push(
                    ctx.error(
                        CaseType::PointSpacingCheck.code(),
                        format!("point {} is only {nearest:.2}m from its nearest neighbor (minimum {min_spacing}m)", m.fid),
                        Severity::Warning,
                    )
                    .feature_id(m.fid)
                    .location(p.x(), p.y())
                    .metadata("spacing_m", nearest)
                    .build(),
                );
            }
        }

        errors
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::relations::context::RelationContext;

    fn point_feature(fid: i64, x: f64, y: f64) -> Feature {
        Feature::new(fid, Some(geo::Geometry::Point(geo::Point::new(x, y))))
    }

    #[test]
    fn close_points_are_flagged() {
        let main = vec![point_feature(1, 0.0, 0.0), point_feature(2, 1.0, 0.0)];
        let index = SpatialIndex::build(main.iter().filter_map(|f| f.geometry.as_ref().map(|g| (f.fid, geo::BoundingRect::bounding_rect(g).unwrap()))));
        let mut ctx = RelationContext::for_test(5.0);
        ctx.related_table = ctx.main_table.clone();
        ctx.params.insert("min_spacing_m".into(), "5".into());

        let errors = PointSpacingCheck.run(&main, &index, &main, &index, &ctx);
        assert_eq!(errors.len(), 2);
    }

    #[test]
    fn far_points_are_not_flagged() {
        let main = vec![point_feature(1, 0.0, 0.0), point_feature(2, 100.0, 0.0)];
        let index = SpatialIndex::build(main.iter().filter_map(|f| f.geometry.as_ref().map(|g| (f.fid, geo::BoundingRect::bounding_rect(g).unwrap()))));
        let mut ctx = RelationContext::for_test(5.0);
        ctx.related_table = ctx.main_table.clone();
        ctx.params.insert("min_spacing_m".into(), "5".into());

        let errors = PointSpacingCheck.run(&main, &index, &main, &index, &ctx);
        assert!(errors.is_empty());
    }
}
