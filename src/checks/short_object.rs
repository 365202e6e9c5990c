//! ShortObject (spec.md §4.4): line length below `criteria.min_line_length`.

use geoqc_index::SpatialIndex;

use crate::checks::geomutil::{line_length, line_to_wkt, lines_of};
use crate::checks::CheckStrategy;
use crate::model::error_record::{ErrorKind, Severity, ValidationError};
use crate::model::feature::Feature;
use crate::model::rule::CheckType;
use crate::stages::context::{CheckContext, PROGRESS_STRIDE};

pub struct ShortObjectCheck;

impl CheckStrategy for ShortObjectCheck {
    fn check_type(&self) -> CheckType {
        CheckType::ShortObject
    }

    fn run(&self, features: &[Feature], _index: &SpatialIndex, ctx: &CheckContext) -> Vec<ValidationError> {
        let mut errors = Vec::new();

        for (i, feature) in features.iter().enumerate() {
            if ctx.is_cancelled() {
                break;
            }
            if i as u64 % PROGRESS_STRIDE == 0 {
                ctx.report_progress(i as u64);
            }

            let Some(geometry) = &feature.geometry else { continue };
            for line in lines_of(geometry) {
                let length = line_length(line);
                if length < ctx.criteria.min_line_length {
                    let first = line.0.first().copied();
                    let mut builder = ctx
                        .error(
                            CheckType::ShortObject.code(),
                            format!("feature {} has length {length} below threshold", feature.fid),
                            Severity::Warning,
                            ErrorKind::Geometry,
                        )
                        .feature_id(feature.fid)
                        .metadata("length", length)
                        .metadata("wkt", line_to_wkt(line));
                    if let Some(v) = first {
                        builder = builder.location(v.x, v.y, None);
                    }
                    errors.push(builder.build());
                    break;
                }
            }
        }

        errors
    }
}
