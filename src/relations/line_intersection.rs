//! `LineIntersectionWithAttribute` and `ContourIntersection` (spec.md §4.5):
//! cross-feature line intersection, the former scoped to a shared attribute
//! group, the latter unconditional.

use geo::Intersects;
use geoqc_index::SpatialIndex;

use crate::checks::geomutil::lines_of;
use crate::model::error_record::{Severity, ValidationError};
use crate::model::feature::Feature;
use crate::model::rule::CaseType;
use crate::relations::util::{by_fid, candidates};
use crate::relations::{RelationContext, RelationStrategy};

pub struct LineIntersectionWithAttribute;

impl RelationStrategy for LineIntersectionWithAttribute {
    fn case_type(&self) -> CaseType {
        CaseType::LineIntersectionWithAttribute
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
            let main_lines = lines_of(mg);
            if main_lines.is_empty() {
                continue;
            }
            let main_value = m.get(field);

            for r in candidates(m, related_index, &related_by_fid, 0.0, same_layer) {
                if same_layer && m.fid < r.fid {
                    continue;
                }
                if main_value.is_some() && main_value != r.get(field) {
                    continue;
                }
                let Some(rg) = &r.geometry else { continue };
                for rl in lines_of(rg) {
                    if main_lines.iter().any(|ml| ml.intersects(rl)) {
                        errors.push(
                            ctx.error(
                                CaseType::LineIntersectionWithAttribute.code(),
                                format!("line {} intersects related line {} sharing {field}", m.fid, r.fid),
                                Severity::Error,
                            )
                            .feature_id(m.fid)
                            .field(field)
                            .metadata("other_fid", r.fid)
                            .build(),
                        );
                    }
                }
            }
        }

        errors
    }
}

pub struct ContourIntersection;

impl RelationStrategy for ContourIntersection {
    fn case_type(&self) -> CaseType {
        CaseType::ContourIntersection
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

            for r in candidates(m, related_index, &related_by_fid, 0.0, same_layer) {
                if same_layer && m.fid < r.fid {
                    continue;
                }
                let Some(rg) = &r.geometry else { continue };
                for rl in lines_of(rg) {
                    if main_lines.iter().any(|ml| ml.intersects(rl)) {
                        errors.push(
                            ctx.error(
                                CaseType::ContourIntersection.code(),
                                format!("contour {} intersects contour {}", m.fid, r.fid),
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

        errors
    }
}
