//! `HoleDuplicateCheck` (spec.md §4.5 Open Question: no canonical reference
//! defined what "duplicate" means for a hole vs. a neighboring polygon).
//! Decided: a hole is a duplicate of a related polygon's outer ring when
//! either their canonical hashes match exactly, or every hole vertex lies
//! within `tolerance` of the related polygon's boundary (a near-duplicate
//! trace), matching the `Duplicate` check's canonical-hash-first approach
//! while tolerating the floating point noise a hole re-digitized by hand
//! commonly introduces.

use geo::Intersects;
use geoqc_index::hash::canonical_ring_hash;
use geoqc_index::SpatialIndex;

use crate::checks::geomutil::{point_to_segment_distance, polygons_of};
use crate::model::error_record::{Severity, ValidationError};
use crate::model::feature::Feature;
use crate::model::rule::CaseType;
use crate::relations::util::{by_fid, candidates};
use crate::relations::{RelationContext, RelationStrategy};

pub struct HoleDuplicateCheck;

impl RelationStrategy for HoleDuplicateCheck {
    fn case_type(&self) -> CaseType {
        CaseType::HoleDuplicateCheck
    }

    fn run(&self, main: &[Feature], _main_index: &SpatialIndex, related: &[Feature], related_index: &SpatialIndex, ctx: &RelationContext) -> Vec<ValidationError> {
        let same_layer = ctx.main_table == ctx.related_table;
        let related_by_fid = by_fid(related);
        let mut errors = Vec::new();

        'feature: for m in main {
            if ctx.is_cancelled() {
                break;
            }
            let Some(mg) = &m.geometry else { continue };
            for poly in polygons_of(mg) {
                for hole in poly.interiors() {
                    let hole_hash = canonical_ring_hash(hole);

                    for r in candidates(m, related_index, &related_by_fid, ctx.tolerance, same_layer) {
                        let Some(rg) = &r.geometry else { continue };
                        for rpoly in polygons_of(rg) {
                            let exact = canonical_ring_hash(rpoly.exterior()) == hole_hash;
                            let near = exact || hole_traces_boundary(hole, rpoly, ctx.tolerance);
                            if near {
                                let centroid = hole.0[0];
                                errors.push(
                                    ctx.error(
                                        CaseType::HoleDuplicateCheck.code(),
                                        format!("feature {} has a hole duplicating the boundary of feature {}", m.fid, r.fid),
                                        Severity::Warning,
                                    )
                                    .feature_id(m.fid)
                                    .location(centroid.x, centroid.y)
                                    .metadata("other_fid", r.fid)
                                    .metadata("exact_match", exact)
                                    .build(),
                                );
                                continue 'feature;
                            }
                        }
                    }
                }
            }
        }

        errors
    }
}

/// True iff every vertex of `hole` lies within `tolerance` of `poly`'s
/// exterior boundary, i.e. the hole retraces the related polygon's outline
/// rather than merely overlapping its interior.
fn hole_traces_boundary(hole: &geo::LineString<f64>, poly: &geo::Polygon<f64>, tolerance: f64) -> bool {
    if !poly.exterior().intersects(hole) && !poly.intersects(hole) {
        return false;
    }
    let segments: Vec<(geo::Coord<f64>, geo::Coord<f64>)> = poly.exterior().0.windows(2).map(|w| (w[0], w[1])).collect();
    if segments.is_empty() {
        return false;
    }
    hole.0.iter().all(|v| segments.iter().map(|(a, b)| point_to_segment_distance(*v, *a, *b)).fold(f64::INFINITY, f64::min) <= tolerance)
}
