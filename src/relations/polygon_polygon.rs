//! Polygon vs polygon relation strategies (spec.md §4.5): `PolygonNotOverlap`,
//! `PolygonWithinPolygon`, `PolygonNotWithinPolygon`,
//! `PolygonIntersectionWithAttribute`, `PolygonNotIntersectLine`.

use geo::Intersects;
use geoqc_index::predicate::{covers, overlap_area};
use geoqc_index::SpatialIndex;

use crate::checks::geomutil::polygons_of;
use crate::model::error_record::{Severity, ValidationError};
use crate::model::feature::Feature;
use crate::model::rule::CaseType;
use crate::relations::util::{by_fid, candidates};
use crate::relations::{RelationContext, RelationStrategy};

pub struct PolygonNotOverlap;

impl RelationStrategy for PolygonNotOverlap {
    fn case_type(&self) -> CaseType {
        CaseType::PolygonNotOverlap
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
                // Symmetric tie-break: only the feature with the higher fid reports.
                if same_layer && m.fid < r.fid {
                    continue;
                }
                let Some(rg) = &r.geometry else { continue };
                let related_polys = polygons_of(rg);
                let mut total = 0.0;
                for a in &main_polys {
                    for b in &related_polys {
                        total += overlap_area(a, b);
                    }
                }
                if total > ctx.tolerance {
                    errors.push(
                        ctx.error(
                            CaseType::PolygonNotOverlap.code(),
                            format!("polygon {} overlaps related polygon {} by {total}", m.fid, r.fid),
                            Severity::Error,
                        )
                        .feature_id(m.fid)
                        .metadata("other_fid", r.fid)
                        .metadata("overlap_area", total)
                        .build(),
                    );
                }
            }
        }

        errors
    }
}

pub struct PolygonWithinPolygon;

impl RelationStrategy for PolygonWithinPolygon {
    fn case_type(&self) -> CaseType {
        CaseType::PolygonWithinPolygon
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

            let mut contained = false;
            for r in candidates(m, related_index, &related_by_fid, ctx.tolerance, same_layer) {
                let Some(rg) = &r.geometry else { continue };
                let related_polys = polygons_of(rg);
                if main_polys.iter().all(|mp| related_polys.iter().any(|rp| covers(rp, mp))) {
                    contained = true;
                    break;
                }
            }

            if !contained {
                errors.push(
                    ctx.error(
                        CaseType::PolygonWithinPolygon.code(),
                        format!("polygon {} is not fully within any related polygon", m.fid),
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

/// Flags a main polygon as wrongly-contained when it lies entirely inside a
/// related polygon *without sharing any vertex* with it (a sign the two
/// polygons were digitized independently rather than sharing a boundary).
pub struct PolygonNotWithinPolygon;

impl RelationStrategy for PolygonNotWithinPolygon {
    fn case_type(&self) -> CaseType {
        CaseType::PolygonNotWithinPolygon
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
                let related_polys = polygons_of(rg);
                for mp in &main_polys {
                    for rp in &related_polys {
                        if covers(rp, mp) && !shares_vertex(mp, rp) {
                            errors.push(
                                ctx.error(
                                    CaseType::PolygonNotWithinPolygon.code(),
                                    format!("polygon {} lies inside {} with no shared vertex", m.fid, r.fid),
                                    Severity::Error,
                                )
                                .feature_id(m.fid)
                                .metadata("other_fid", r.fid)
                                .build(),
                            );
                        }
                    }
                }
            }
        }

        errors
    }
}

fn shares_vertex(a: &geo::Polygon<f64>, b: &geo::Polygon<f64>) -> bool {
    const QUANT: f64 = 1e7;
    let quant = |c: geo::Coord<f64>| ((c.x * QUANT).round() as i64, (c.y * QUANT).round() as i64);
    let b_verts: std::collections::HashSet<(i64, i64)> = b.exterior().0.iter().map(|c| quant(*c)).collect();
    a.exterior().0.iter().any(|c| b_verts.contains(&quant(*c)))
}

pub struct PolygonIntersectionWithAttribute;

impl RelationStrategy for PolygonIntersectionWithAttribute {
    fn case_type(&self) -> CaseType {
        CaseType::PolygonIntersectionWithAttribute
    }

    fn run(&self, main: &[Feature], _main_index: &SpatialIndex, related: &[Feature], related_index: &SpatialIndex, ctx: &RelationContext) -> Vec<ValidationError> {
        let same_layer = ctx.main_table == ctx.related_table;
        let related_by_fid = by_fid(related);
        let field = ctx.param("field").unwrap_or_default();
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
            let main_value = m.get(field);

            for r in candidates(m, related_index, &related_by_fid, 0.0, same_layer) {
                if same_layer && m.fid < r.fid {
                    continue;
                }
                let (Some(mv), Some(rv)) = (main_value, r.get(field)) else { continue };
                if mv != rv {
                    continue;
                }
                let Some(rg) = &r.geometry else { continue };
                let related_polys = polygons_of(rg);
                let mut total = 0.0;
                for a in &main_polys {
                    for b in &related_polys {
                        total += overlap_area(a, b);
                    }
                }
                if total > ctx.tolerance {
                    errors.push(
                        ctx.error(
                            CaseType::PolygonIntersectionWithAttribute.code(),
                            format!("polygon {} shares attribute {field} with {} and intersects it", m.fid, r.fid),
                            Severity::Error,
                        )
                        .feature_id(m.fid)
                        .field(field)
                        .metadata("other_fid", r.fid)
                        .metadata("overlap_area", total)
                        .build(),
                    );
                }
            }
        }

        errors
    }
}

pub struct PolygonNotIntersectLine;

impl RelationStrategy for PolygonNotIntersectLine {
    fn case_type(&self) -> CaseType {
        CaseType::PolygonNotIntersectLine
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
                for line in crate::checks::geomutil::lines_of(rg) {
                    for mp in &main_polys {
                        if mp.intersects(line) {
                            errors.push(
                                ctx.error(
                                    CaseType::PolygonNotIntersectLine.code(),
                                    format!("polygon {} intersects related line {}", m.fid, r.fid),
                                    Severity::Error,
                                )
                                .feature_id(m.fid)
                                .metadata("other_fid", r.fid)
                                .build(),
                            );
                        }
                    }
                }
            }
        }

        errors
    }
}
