//! Point vs polygon relation strategies (spec.md §4.5): `PointInsidePolygon`
//! and its negation `PolygonNotContainPoint`.

use geo::Contains;
use geoqc_index::SpatialIndex;

use crate::checks::geomutil::polygons_of;
use crate::model::error_record::{Severity, ValidationError};
use crate::model::feature::Feature;
use crate::model::rule::CaseType;
use crate::relations::util::{by_fid, candidates};
use crate::relations::{RelationContext, RelationStrategy};

fn points_of(geom: &geo::Geometry<f64>) -> Vec<geo::Point<f64>> {
    match geom {
        geo::Geometry::Point(p) => vec![*p],
        geo::Geometry::MultiPoint(mp) => mp.0.clone(),
        _ => Vec::new(),
    }
}

pub struct PointInsidePolygon;

impl RelationStrategy for PointInsidePolygon {
    fn case_type(&self) -> CaseType {
        CaseType::PointInsidePolygon
    }

    fn run(&self, main: &[Feature], _main_index: &SpatialIndex, related: &[Feature], related_index: &SpatialIndex, ctx: &RelationContext) -> Vec<ValidationError> {
        let same_layer = ctx.main_table == ctx.related_table;
        let related_by_fid = by_fid(related);
        let mut errors = Vec::new();

        for m in main {
            if ctx.is_cancelled() {
                break;
            }
            let Some(mg) = &m.geometry else { continue };
            for point in points_of(mg) {
                let inside = candidates(m, related_index, &related_by_fid, 0.0, same_layer)
                    .into_iter()
                    .any(|r| r.geometry.as_ref().is_some_and(|rg| polygons_of(rg).iter().any(|p| p.contains(&point))));

                if !inside {
                    errors.push(
                        ctx.error(
                            CaseType::PointInsidePolygon.code(),
                            format!("point {} is not inside any related polygon", m.fid),
                            Severity::Error,
                        )
                        .feature_id(m.fid)
                        .location(point.x(), point.y())
                        .build(),
                    );
                }
            }
        }

        errors
    }
}

pub struct PolygonNotContainPoint;

impl RelationStrategy for PolygonNotContainPoint {
    fn case_type(&self) -> CaseType {
        CaseType::PolygonNotContainPoint
    }

    fn run(&self, main: &[Feature], _main_index: &SpatialIndex, related: &[Feature], related_index: &SpatialIndex, ctx: &RelationContext) -> Vec<ValidationError> {
        let same_layer = ctx.main_table == ctx.related_table;
        let related_by_fid = by_fid(related);
        let mut errors = Vec::new();

        for m in main {
            if ctx.is_cancelled() {
                break;
            }
            let Some(mg) = &m.geometry else { continue };
            let main_polys = polygons_of(mg);
            if main_polys.is_empty() {
                continue;
            }

            for r in candidates(m, related_index, &related_by_fid, 0.0, same_layer) {
                let Some(rg) = &r.geometry else { continue };
                for point in points_of(rg) {
                    if main_polys.iter().any(|p| p.contains(&point)) {
                        errors.push(
                            ctx.error(
                                CaseType::PolygonNotContainPoint.code(),
                                format!("polygon {} contains disallowed point {}", m.fid, r.fid),
                                Severity::Error,
                            )
                            .feature_id(m.fid)
                            .metadata("other_fid", r.fid)
                            .location(point.x(), point.y())
                            .build(),
                        );
                    }
                }
            }
        }

        errors
    }
}
