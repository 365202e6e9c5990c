//! `RoadSharpBend` / `ContourSharpBend` (spec.md §4.5): interior-angle
//! threshold on line vertices, scoped by rule `params.angle_threshold`.
//! Distinct `CaseType`s so rule authors can tune road vs. contour
//! thresholds independently even though the underlying math is identical.

use geoqc_index::angle::line_interior_angles;
use geoqc_index::SpatialIndex;

use crate::checks::geomutil::lines_of;
use crate::model::error_record::{Severity, ValidationError};
use crate::model::feature::Feature;
use crate::model::rule::CaseType;
use crate::relations::{RelationContext, RelationStrategy};

fn run_sharp_bend(case_type: CaseType, main: &[Feature], ctx: &RelationContext) -> Vec<ValidationError> {
    let angle_threshold: f64 = ctx.param("angle_threshold").and_then(|s| s.parse().ok()).unwrap_or(15.0);
    let mut errors = Vec::new();

    'feature: for f in main {
        if ctx.is_cancelled() {
            break;
        }
        let Some(g) = &f.geometry else { continue };
        for line in lines_of(g) {
            for (vertex_index, angle) in line_interior_angles(line) {
                if angle < angle_threshold {
                    let v = line.0[vertex_index];
                    errors.push(
                        ctx.error(case_type.code(), format!("feature {} has a sharp bend at vertex {vertex_index} ({angle} deg)", f.fid), Severity::Warning)
                            .feature_id(f.fid)
                            .location(v.x, v.y)
                            .metadata("angle_deg", angle)
                            .metadata("vertex_index", vertex_index)
                            .build(),
                    );
                    continue 'feature;
                }
            }
        }
    }

    errors
}

pub struct RoadSharpBend;

impl RelationStrategy for RoadSharpBend {
    fn case_type(&self) -> CaseType {
        CaseType::RoadSharpBend
    }

    fn run(&self, main: &[Feature], _main_index: &SpatialIndex, _related: &[Feature], _related_index: &SpatialIndex, ctx: &RelationContext) -> Vec<ValidationError> {
        run_sharp_bend(CaseType::RoadSharpBend, main, ctx)
    }
}

pub struct ContourSharpBend;

impl RelationStrategy for ContourSharpBend {
    fn case_type(&self) -> CaseType {
        CaseType::ContourSharpBend
    }

    fn run(&self, main: &[Feature], _main_index: &SpatialIndex, _related: &[Feature], _related_index: &SpatialIndex, ctx: &RelationContext) -> Vec<ValidationError> {
        run_sharp_bend(CaseType::ContourSharpBend, main, ctx)
    }
}
