//! SelfOverlap (spec.md §4.4): two non-adjacent segments of the same
//! feature's line(s) that run collinear and overlapping rather than merely
//! crossing at a point.

use geoqc_index::SpatialIndex;

use crate::checks::geomutil::dist;
use crate::checks::CheckStrategy;
use crate::model::error_record::{ErrorKind, Severity, ValidationError};
use crate::model::feature::Feature;
use crate::model::rule::CheckType;
use crate::stages::context::{CheckContext, PROGRESS_STRIDE};
use geo::Coord;

pub struct SelfOverlapCheck;

impl CheckStrategy for SelfOverlapCheck {
    fn check_type(&self) -> CheckType {
        CheckType::SelfOverlap
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
            let mut segments: Vec<(Coord<f64>, Coord<f64>)> = Vec::new();
            for line in crate::checks::geomutil::lines_of(geometry) {
                segments.extend(line.0.windows(2).map(|w| (w[0], w[1])));
            }
            for poly in crate::checks::geomutil::polygons_of(geometry) {
                for ring in std::iter::once(poly.exterior()).chain(poly.interiors().iter()) {
                    segments.extend(ring.0.windows(2).map(|w| (w[0], w[1])));
                }
            }

            let n = segments.len();
            for a in 0..n {
                for b in (a + 1)..n {
                    if b == a + 1 {
                        continue; // adjacent segments share an endpoint by construction
                    }
                    let (p1, p2) = segments[a];
                    let (p3, p4) = segments[b];
                    if let Some((overlap_a, overlap_b)) = collinear_overlap(p1, p2, p3, p4, ctx.criteria.self_overlap_tol) {
                        errors.push(
                            ctx.error(
                                CheckType::SelfOverlap.code(),
                                format!("feature {} has overlapping self segments", feature.fid),
                                Severity::Error,
                                ErrorKind::Geometry,
                            )
                            .feature_id(feature.fid)
                            .location(overlap_a.x, overlap_a.y, None)
                            .metadata("segment_pair", format!("{a}-{b}"))
                            .metadata("overlap_length", dist(overlap_a, overlap_b))
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

/// Returns the overlapping sub-segment of two collinear segments, if the
/// two lines are parallel within `tol` and their projections overlap by
/// more than `tol`. `None` for segments that merely cross or touch at a
/// single point.
fn collinear_overlap(p1: Coord<f64>, p2: Coord<f64>, p3: Coord<f64>, p4: Coord<f64>, tol: f64) -> Option<(Coord<f64>, Coord<f64>)> {
    let ux = p2.x - p1.x;
    let uy = p2.y - p1.y;
    let vx = p4.x - p3.x;
    let vy = p4.y - p3.y;

    // Cross product of direction vectors; near zero means parallel.
    let cross = ux * vy - uy * vx;
    let u_len = (ux * ux + uy * uy).sqrt();
    let v_len = (vx * vx + vy * vy).sqrt();
    if u_len == 0.0 || v_len == 0.0 {
        return None;
    }
    if (cross / (u_len * v_len)).abs() > 1e-6 {
        return None;
    }

    // Collinearity: p3 must lie on the line through p1-p2.
    let cross_p3 = ux * (p3.y - p1.y) - uy * (p3.x - p1.x);
    if (cross_p3 / u_len).abs() > tol.max(1e-9) {
        return None;
    }

    // Project every endpoint onto the shared direction and overlap the
    // resulting 1-D intervals.
    let t = |c: Coord<f64>| ((c.x - p1.x) * ux + (c.y - p1.y) * uy) / (u_len * u_len);
    let (t1, t2) = (0.0, 1.0);
    let (mut t3, mut t4) = (t(p3), t(p4));
    if t3 > t4 {
        std::mem::swap(&mut t3, &mut t4);
    }

    let lo = t1.max(t3);
    let hi = t2.min(t4);
    if hi - lo <= tol.max(0.0) / u_len {
        return None;
    }

    let at = |tt: f64| Coord {
        x: p1.x + tt * ux,
        y: p1.y + tt * uy,
    };
    Some((at(lo), at(hi)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn overlapping_collinear_segments_detected() {
        let p1 = Coord { x: 0.0, y: 0.0 };
        let p2 = Coord { x: 10.0, y: 0.0 };
        let p3 = Coord { x: 5.0, y: 0.0 };
        let p4 = Coord { x: 15.0, y: 0.0 };
        assert!(collinear_overlap(p1, p2, p3, p4, 0.0).is_some());
    }

    #[test]
    fn touching_endpoints_not_flagged() {
        let p1 = Coord { x: 0.0, y: 0.0 };
        let p2 = Coord { x: 10.0, y: 0.0 };
        let p3 = Coord { x: 10.0, y: 0.0 };
        let p4 = Coord { x: 20.0, y: 0.0 };
        assert!(collinear_overlap(p1, p2, p3, p4, 0.0).is_none());
    }
}
