//! Overlap (spec.md §4.4): probe the shared R-tree for candidate polygon
//! pairs; any pair whose intersection area exceeds `criteria.overlap_area_tol`
//! emits one error on the feature with the higher fid (the tie-break every
//! symmetric relation in this engine uses, spec.md §4.4/§9).

use std::collections::HashMap;

use geo::BoundingRect;
use geoqc_index::predicate::overlap_area;
use geoqc_index::SpatialIndex;

use crate::checks::geomutil::polygons_of;
use crate::checks::CheckStrategy;
use crate::model::error_record::{ErrorKind, Severity, ValidationError};
use crate::model::feature::Feature;
use crate::model::rule::CheckType;
use crate::stages::context::{CheckContext, PROGRESS_STRIDE};

pub struct OverlapCheck;

impl CheckStrategy for OverlapCheck {
    fn check_type(&self) -> CheckType {
        CheckType::Overlap
    }

    fn run(&self, features: &[Feature], index: &SpatialIndex, ctx: &CheckContext) -> Vec<ValidationError> {
        let by_fid: HashMap<i64, &Feature> = features.iter().map(|f| (f.fid, f)).collect();
        let mut errors = Vec::new();

        for (i, feature) in features.iter().enumerate() {
            if ctx.is_cancelled() {
                break;
            }
            if i as u64 % PROGRESS_STRIDE == 0 {
                ctx.report_progress(i as u64);
            }

            let Some(geometry) = &feature.geometry else { continue };
            let polys = polygons_of(geometry);
            if polys.is_empty() {
                continue;
            }
            let Some(rect) = geometry.bounding_rect() else { continue };

            for other_fid in index.candidates(rect, 0.0) {
                if other_fid == feature.fid {
                    continue;
                }
                // Report once per unordered pair, on the higher fid.
                let (reporter, other) = if feature.fid > other_fid {
                    (feature.fid, other_fid)
                } else {
                    continue;
                };
                let Some(other_feature) = by_fid.get(&other) else { continue };
                let Some(other_geometry) = &other_feature.geometry else { continue };
                let other_polys = polygons_of(other_geometry);

                let mut total = 0.0;
                for a in &polys {
                    for b in &other_polys {
                        total += overlap_area(a, b);
                    }
                }

                if total > ctx.criteria.overlap_area_tol {
                    errors.push(
                        ctx.error(
                            CheckType::Overlap.code(),
                            format!("feature {reporter} overlaps feature {other} by {total}"),
                            Severity::Error,
                            ErrorKind::Geometry,
                        )
                        .feature_id(reporter)
                        .metadata("other_fid", other)
                        .metadata("overlap_area", total)
                        .build(),
                    );
                }
            }
        }

        errors
    }
}
