//! Spike (spec.md §4.4): interior angle below `criteria.spike_angle_deg` at
//! any ring/line vertex.

use geoqc_index::angle::{line_interior_angles, ring_interior_angles};
use geoqc_index::SpatialIndex;

use crate::checks::geomutil::{lines_of, polygons_of};
use crate::checks::CheckStrategy;
use crate::model::error_record::{ErrorKind, Severity, ValidationError};
use crate::model::feature::Feature;
use crate::model::rule::CheckType;
use crate::stages::context::{CheckContext, PROGRESS_STRIDE};

pub struct SpikeCheck;

impl CheckStrategy for SpikeCheck {
    fn check_type(&self) -> CheckType {
        CheckType::Spike
    }

    fn run(&self, features: &[Feature], _index: &SpatialIndex, ctx: &CheckContext) -> Vec<ValidationError> {
        let mut errors = Vec::new();

        'feature: for (i, feature) in features.iter().enumerate() {
            if ctx.is_cancelled() {
                break;
            }
            if i as u64 % PROGRESS_STRIDE == 0 {
                ctx.report_progress(i as u64);
            }

            let Some(geometry) = &feature.geometry else { continue };

            for poly in polygons_of(geometry) {
                for ring in std::iter::once(poly.exterior()).chain(poly.interiors().iter()) {
                    for (vertex_index, angle) in ring_interior_angles(ring) {
                        if angle < ctx.criteria.spike_angle_deg {
                            let v = ring.0[vertex_index];
                            errors.push(
                                ctx.error(
                                    CheckType::Spike.code(),
                                    format!("feature {} has a spike vertex at {vertex_index} ({angle} deg)", feature.fid),
                                    Severity::Warning,
                                    ErrorKind::Geometry,
                                )
                                .feature_id(feature.fid)
                                .location(v.x, v.y, None)
                                .metadata("angle_deg", angle)
                                .metadata("vertex_index", vertex_index)
                                .build(),
                            );
                            continue 'feature;
                        }
                    }
                }
            }

            for line in lines_of(geometry) {
                for (vertex_index, angle) in line_interior_angles(line) {
                    if angle < ctx.criteria.spike_angle_deg {
                        let v = line.0[vertex_index];
                        errors.push(
                            ctx.error(
                                CheckType::Spike.code(),
                                format!("feature {} has a spike vertex at {vertex_index} ({angle} deg)", feature.fid),
                                Severity::Warning,
                                ErrorKind::Geometry,
                            )
                            .feature_id(feature.fid)
                            .location(v.x, v.y, None)
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
}
