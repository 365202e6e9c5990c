//! Duplicate (spec.md §4.4): canonical hash of each feature's vertex
//! sequence; any hash shared by ≥ 2 features emits one error per non-first
//! member, pointing back at the first member's fid.

use std::collections::HashMap;

use geoqc_index::SpatialIndex;

use crate::checks::geomutil::geometry_hash;
use crate::checks::CheckStrategy;
use crate::model::error_record::{ErrorKind, Severity, ValidationError};
use crate::model::feature::Feature;
use crate::model::rule::CheckType;
use crate::stages::context::CheckContext;

pub struct DuplicateCheck;

impl CheckStrategy for DuplicateCheck {
    fn check_type(&self) -> CheckType {
        CheckType::Duplicate
    }

    fn run(&self, features: &[Feature], _index: &SpatialIndex, ctx: &CheckContext) -> Vec<ValidationError> {
        let mut by_hash: HashMap<u64, i64> = HashMap::new();
        let mut errors = Vec::new();

        for (i, feature) in features.iter().enumerate() {
            if ctx.is_cancelled() {
                break;
            }
            if i as u64 % crate::stages::context::PROGRESS_STRIDE == 0 {
                ctx.report_progress(i as u64);
            }

            let Some(geometry) = &feature.geometry else { continue };
            if !feature.has_usable_geometry() {
                continue;
            }
            let hash = geometry_hash(geometry);

            match by_hash.get(&hash) {
                Some(&first_fid) if first_fid != feature.fid => {
                    errors.push(
                        ctx.error(
                            CheckType::Duplicate.code(),
                            format!("feature {} duplicates geometry of feature {}", feature.fid, first_fid),
                            Severity::Error,
                            ErrorKind::Geometry,
                        )
                        .feature_id(feature.fid)
                        .metadata("duplicate_of_fid", first_fid)
                        .build(),
                    );
                }
                Some(_) => {}
                None => {
                    by_hash.insert(hash, feature.fid);
                }
            }
        }

        errors
    }
}
