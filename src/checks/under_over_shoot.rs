//! UnderOverShoot (spec.md §4.4): a line endpoint lying within tolerance of
//! another line but not touching it is a dangle — classified as undershoot
//! (nearly reaches, doesn't touch) using `criteria.undershoot_tolerance`.

use geo::{Coord, Intersects};
use geoqc_index::SpatialIndex;

use crate::checks::geomutil::{lines_of, point_to_segment_distance};
use crate::checks::CheckStrategy;
use crate::model::error_record::{ErrorKind, Severity, ValidationError};
use crate::model::feature::Feature;
use crate::model::rule::CheckType;
use crate::stages::context::{CheckContext, PROGRESS_STRIDE};

pub struct UnderOverShootCheck;

impl CheckStrategy for UnderOverShootCheck {
    fn check_type(&self) -> CheckType {
        CheckType::UnderOverShoot
    }

    fn run(&self, features: &[Feature], index: &SpatialIndex, ctx: &CheckContext) -> Vec<ValidationError> {
        let mut errors = Vec::new();
        let tol = ctx.criteria.undershoot_tolerance;

        'feature: for (i, feature) in features.iter().enumerate() {
            if ctx.is_cancelled() {
                break;
            }
            if i as u64 % PROGRESS_STRIDE == 0 {
                ctx.report_progress(i as u64);
            }

            let Some(geometry) = &feature.geometry else { continue };
            let endpoints: Vec<Coord<f64>> = lines_of(geometry)
                .iter()
                .filter_map(|l| Some((*l.0.first()?, *l.0.last()?)))
                .flat_map(|(a, b)| [a, b])
                .collect();
            if endpoints.is_empty() {
                continue;
            }

            for endpoint in endpoints {
                let probe = geo::Rect::new(endpoint, endpoint);
                for other_fid in index.candidates(probe, tol) {
                    if other_fid == feature.fid {
                        continue;
                    }
                    let Some(other) = features.iter().find(|f| f.fid == other_fid) else { continue };
                    let Some(other_geom) = &other.geometry else { continue };

                    let point = geo::Point::from(endpoint);
                    for other_line in lines_of(other_geom) {
                        if point.intersects(other_line) {
                            continue; // actually touches, not a dangle
                        }
                        let nearest = other_line
                            .0
                            .windows(2)
                            .map(|w| point_to_segment_distance(endpoint, w[0], w[1]))
                            .fold(f64::INFINITY, f64::min);
                        if nearest <= tol {
                            errors.push(
                                ctx.error(
                                    CheckType::UnderOverShoot.code(),
                                    format!("feature {} has a dangling endpoint near feature {other_fid}", feature.fid),
                                    Severity::Warning,
                                    ErrorKind::Geometry,
                                )
                                .feature_id(feature.fid)
                                .location(endpoint.x, endpoint.y, None)
                                .metadata("other_fid", other_fid)
                                .metadata("distance_to_nearest", nearest)
                                .metadata("classification", "undershoot")
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
