//! Sliver (spec.md §4.4): polygon area / perimeter² below `criteria.sliver_ratio`.

use geoqc_index::SpatialIndex;

use crate::checks::geomutil::{polygon_area, polygon_to_wkt, polygons_of, ring_perimeter};
use crate::checks::CheckStrategy;
use crate::model::error_record::{ErrorKind, Severity, ValidationError};
use crate::model::feature::Feature;
use crate::model::rule::CheckType;
use crate::stages::context::{CheckContext, PROGRESS_STRIDE};

pub struct SliverCheck;

impl CheckStrategy for SliverCheck {
    fn check_type(&self) -> CheckType {
        CheckType::Sliver
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
                let perimeter = ring_perimeter(poly.exterior());
                if perimeter == 0.0 {
                    continue;
                }
                let ratio = area / (perimeter * perimeter);
                if ratio < ctx.criteria.sliver_ratio {
                    let first = poly.exterior().0.first().copied();
                    let mut builder = ctx
                        .error(
                            CheckType::Sliver.code(),
                            format!("feature {} is a sliver polygon (ratio {ratio})", feature.fid),
                            Severity::Warning,
                            ErrorKind::Geometry,
                        )
                        .feature_id(feature.fid)
                        .metadata("area", area)
                        .metadata("perimeter", perimeter)
                        .metadata("ratio", ratio)
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
