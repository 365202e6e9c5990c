//! MinVertexCount (spec.md §4.4): vertex count below `criteria.min_vertex_count`,
//! checked per ring (polygons) or per line (lines).

use geoqc_index::SpatialIndex;

use crate::checks::geomutil::{lines_of, polygons_of, vertex_count};
use crate::checks::CheckStrategy;
use crate::model::error_record::{ErrorKind, Severity, ValidationError};
use crate::model::feature::Feature;
use crate::model::rule::CheckType;
use crate::stages::context::{CheckContext, PROGRESS_STRIDE};

pub struct MinVertexCountCheck;

impl CheckStrategy for MinVertexCountCheck {
    fn check_type(&self) -> CheckType {
        CheckType::MinVertexCount
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
                let count = vertex_count(poly.exterior());
                if count < ctx.criteria.min_vertex_count {
                    let first = poly.exterior().0.first().copied();
                    let mut builder = ctx
                        .error(
                            CheckType::MinVertexCount.code(),
                            format!("feature {} has only {count} vertices", feature.fid),
                            Severity::Error,
                            ErrorKind::Geometry,
                        )
                        .feature_id(feature.fid)
                        .metadata("vertex_count", count);
                    if let Some(v) = first {
                        builder = builder.location(v.x, v.y, None);
                    }
                    errors.push(builder.build());
                    continue 'feature;
                }
            }

            for line in lines_of(geometry) {
                let count = vertex_count(line);
                if count < ctx.criteria.min_vertex_count {
                    let first = line.0.first().copied();
                    let mut builder = ctx
                        .error(
                            CheckType::MinVertexCount.code(),
                            format!("feature {} has only {count} vertices", feature.fid),
                            Severity::Error,
                            ErrorKind::Geometry,
                        )
                        .feature_id(feature.fid)
                        .metadata("vertex_count", count);
                    if let Some(v) = first {
                        builder = builder.location(v.x, v.y, None);
                    }
                    errors.push(builder.build());
                    continue 'feature;
                }
            }
        }

        errors
    }
}
