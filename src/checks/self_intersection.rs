//! SelfIntersection (spec.md §4.4): a polygon ring is invalid if any two
//! non-adjacent segments cross. Reports the first invalid ring found and
//! the index of its first crossing segment as the location.

use geoqc_index::SpatialIndex;

use crate::checks::geomutil::{first_self_intersection, polygons_of};
use crate::checks::CheckStrategy;
use crate::model::error_record::{ErrorKind, Severity, ValidationError};
use crate::model::feature::Feature;
use crate::model::rule::CheckType;
use crate::stages::context::{CheckContext, PROGRESS_STRIDE};

pub struct SelfIntersectionCheck;

impl CheckStrategy for SelfIntersectionCheck {
    fn check_type(&self) -> CheckType {
        CheckType::SelfIntersection
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
            for (ring_index, poly) in polygons_of(geometry).into_iter().enumerate() {
                let rings = std::iter::once(poly.exterior()).chain(poly.interiors().iter());
                for (sub_index, ring) in rings.enumerate() {
                    if let Some(segment_index) = first_self_intersection(ring) {
                        let vertex = ring.0[segment_index];
                        errors.push(
                            ctx.error(
                                CheckType::SelfIntersection.code(),
                                format!("feature {} has a self-intersecting ring", feature.fid),
                                Severity::Error,
                                ErrorKind::Geometry,
                            )
                            .feature_id(feature.fid)
                            .location(vertex.x, vertex.y, None)
                            .metadata("invalid_ring_index", format!("{ring_index}.{sub_index}"))
                            .metadata("segment_index", segment_index)
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
