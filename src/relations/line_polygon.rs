//! Line/feature vs polygon relation strategies (spec.md §4.5):
//! `PolygonMissingLine`, `PolygonContainsObjects`, `PolygonBoundaryMatch`,
//! `LineWithinPolygon`, `LineEndpointWithinPolygon`.

use geo::{Contains, Intersects};
use geoqc_index::SpatialIndex;

use crate::checks::geomutil::{lines_of, point_to_segment_distance, polygons_of};
use crate::model::error_record::{Severity, ValidationError};
use crate::model::feature::Feature;
use crate::model::rule::CaseType;
use crate::relations::util::{by_fid, candidates};
use crate::relations::{RelationContext, RelationStrategy};

pub struct PolygonMissingLine;

impl RelationStrategy for PolygonMissingLine {
    fn case_type(&self) -> CaseType {
        CaseType::PolygonMissingLine
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

            let has_interior_line = candidates(m, related_index, &related_by_fid, 0.0, same_layer).into_iter().any(|r| {
                r.geometry
                    .as_ref()
                    .is_some_and(|rg| lines_of(rg).iter().any(|l| main_polys.iter().any(|mp| mp.intersects(*l))))
            });

            if !has_interior_line {
                errors.push(
                    ctx.error(
                        CaseType::PolygonMissingLine.code(),
                        format!("polygon {} has no matching related line through its interior", m.fid),
                        Severity::Error,
                    )
                    .feature_id(m.fid)
                    .build(),
                );
            }
        }

        errors
    }
}

pub struct PolygonContainsObjects;

impl RelationStrategy for PolygonContainsObjects {
    fn case_type(&self) -> CaseType {
        CaseType::PolygonContainsObjects
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
                if main_polys.iter().any(|mp| mp.intersects(rg)) {
                    errors.push(
                        ctx.error(
                            CaseType::PolygonContainsObjects.code(),
                            format!("polygon {} contains disallowed related feature {}", m.fid, r.fid),
                            Severity::Error,
                        )
                        .feature_id(m.fid)
                        .metadata("other_fid", r.fid)
                        .build(),
                    );
                }
            }
        }

        errors
    }
}

pub struct PolygonBoundaryMatch;

impl RelationStrategy for PolygonBoundaryMatch {
    fn case_type(&self) -> CaseType {
        CaseType::PolygonBoundaryMatch
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

            for mp in &main_polys {
                let boundary = mp.exterior();
                let mut max_dev: f64 = 0.0;
                let mut any_nearby_line = false;

                for r in candidates(m, related_index, &related_by_fid, ctx.tolerance, same_layer) {
                    let Some(rg) = &r.geometry else { continue };
                    for line in lines_of(rg) {
                        any_nearby_line = true;
                        for v in &boundary.0 {
                            let nearest = line.0.windows(2).map(|w| point_to_segment_distance(*v, w[0], w[1])).fold(f64::INFINITY, f64::min);
                            max_dev = max_dev.max(nearest);
                        }
                    }
                }

                if any_nearby_line && max_dev > ctx.tolerance {
                    errors.push(
                        ctx.error(
                            CaseType::PolygonBoundaryMatch.code(),
                            format!("polygon {} boundary deviates {max_dev} from related linework", m.fid),
                            Severity::Warning,
                        )
                        .feature_id(m.fid)
                        .metadata("max_deviation", max_dev)
                        .build(),
                    );
                }
            }
        }

        errors
    }
}

pub struct LineWithinPolygon;

impl RelationStrategy for LineWithinPolygon {
    fn case_type(&self) -> CaseType {
        CaseType::LineWithinPolygon
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
            let main_lines = lines_of(mg);
            if main_lines.is_empty() {
                continue;
            }

            for line in &main_lines {
                let mut max_dev: f64 = 0.0;
                let mut covered = false;

                for r in candidates(m, related_index, &related_by_fid, ctx.tolerance, same_layer) {
                    let Some(rg) = &r.geometry else { continue };
                    for poly in polygons_of(rg) {
                        if poly.contains(*line) {
                            covered = true;
                        }
                        for v in &line.0 {
                            if !poly.contains(&geo::Point::from(*v)) {
                                let nearest = poly
                                    .exterior()
                                    .0
                                    .windows(2)
                                    .map(|w| point_to_segment_distance(*v, w[0], w[1]))
                                    .fold(f64::INFINITY, f64::min);
                                max_dev = max_dev.max(nearest);
                            }
                        }
                    }
                }

                if !covered && max_dev > ctx.tolerance {
                    errors.push(
                        ctx.error(
                            CaseType::LineWithinPolygon.code(),
                            format!("line {} deviates {max_dev} outside its containing polygon", m.fid),
                            Severity::Error,
                        )
                        .feature_id(m.fid)
                        .metadata("max_deviation", max_dev)
                        .build(),
                    );
                }
            }
        }

        errors
    }
}

pub struct LineEndpointWithinPolygon;

impl RelationStrategy for LineEndpointWithinPolygon {
    fn case_type(&self) -> CaseType {
        CaseType::LineEndpointWithinPolygon
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
            for line in lines_of(mg) {
                let (Some(start), Some(end)) = (line.0.first(), line.0.last()) else { continue };
                let start_pt = geo::Point::from(*start);
                let end_pt = geo::Point::from(*end);
                let both_inside = candidates(m, related_index, &related_by_fid, 0.0, same_layer).into_iter().any(|r| {
                    r.geometry
                        .as_ref()
                        .is_some_and(|rg| polygons_of(rg).iter().any(|p| p.contains(&start_pt) && p.contains(&end_pt)))
                });

                if !both_inside {
                    errors.push(
                        ctx.error(
                            CaseType::LineEndpointWithinPolygon.code(),
                            format!("line {} has an endpoint outside every related polygon", m.fid),
                            Severity::Error,
                        )
                        .feature_id(m.fid)
                        .build(),
                    );
                }
            }
        }

        errors
    }
}
