//! SmallArea (spec.md §4.4): polygon area below `criteria.min_polygon_area`.

use geoqc_index::SpatialIndex;

use crate::checks::geomutil::{polygon_area, polygon_to_wkt, polygons_of};
use crate::checks::CheckStrategy;
use crate::model::error_record::{ErrorKind, Severity, ValidationError};
use crate::model::feature::Feature;
use crate::model::rule::CheckType;
use crate::stages::context::{CheckContext, PROGRESS_STRIDE};

pub struct SmallAreaCheck;

impl CheckStrategy for SmallAreaCheck {
    fn check_type(&self) -> CheckType {
        CheckType::SmallArea
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
            for poly in polygons_of(geometry) {
                let area = polygon_area(poly);
                if area < ctx.criteria.min_polygon_area {
                    let first = poly.exterior().0.first().copied();
                    let mut builder = ctx
                        .error(
                            CheckType::SmallArea.code(),
                            format!("feature {} has area {area} below threshold", feature.fid),
                            Severity::Warning,
                            ErrorKind::Geometry,
                        )
                        .feature_id(feature.fid)
                        .metadata("area", area)
                        .metadata("wkt", polygon_to_wkt(poly));
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
