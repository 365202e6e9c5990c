//! HoleTopology (spec.md §4.4): every inner ring must lie within the outer
//! ring and must not intersect any other inner ring of the same polygon.

use geo::{Intersects, Polygon};
use geoqc_index::predicate::covers;
use geoqc_index::SpatialIndex;

use crate::checks::geomutil::polygons_of;
use crate::checks::CheckStrategy;
use crate::model::error_record::{ErrorKind, Severity, ValidationError};
use crate::model::feature::Feature;
use crate::model::rule::CheckType;
use crate::stages::context::{CheckContext, PROGRESS_STRIDE};

pub struct HoleTopologyCheck;

impl CheckStrategy for HoleTopologyCheck {
    fn check_type(&self) -> CheckType {
        CheckType::HoleTopology
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
            for (poly_index, poly) in polygons_of(geometry).into_iter().enumerate() {
                let interiors = poly.interiors();
                let exterior_only = Polygon::new(poly.exterior().clone(), vec![]);

                for (h, hole) in interiors.iter().enumerate() {
                    let hole_poly = Polygon::new(hole.clone(), vec![]);
                    if !covers(&exterior_only, &hole_poly) {
                        errors.push(
                            ctx.error(
                                CheckType::HoleTopology.code(),
                                format!("feature {} has a hole outside its outer ring", feature.fid),
                                Severity::Error,
                                ErrorKind::Geometry,
                            )
                            .feature_id(feature.fid)
                            .metadata("which_ring", format!("{poly_index}.hole{h}"))
                            .build(),
                        );
                        continue 'feature;
                    }
                    for (k, other_hole) in interiors.iter().enumerate().skip(h + 1) {
                        if hole.intersects(other_hole) {
                            errors.push(
                                ctx.error(
                                    CheckType::HoleTopology.code(),
                                    format!("feature {} has intersecting holes", feature.fid),
                                    Severity::Error,
                                    ErrorKind::Geometry,
                                )
                                .feature_id(feature.fid)
                                .metadata("which_ring", format!("{poly_index}.hole{h}x{k}"))
                                .build(),
                            );
                            continue 'feature;
                        }
                    }
                }
            }
        }

        errors
    }
}
