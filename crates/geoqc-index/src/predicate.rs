//! DE-9IM-backed predicates shared by geometry and relation strategies.
//!
//! Mirrors the `relate()`-based rook-adjacency and overlap tests already
//! proven out for polygon layers, generalized to the pairs of geometry
//! variants the relation checks need (polygon/polygon, polygon/line,
//! line/line, polygon/point).

use geo::{Area, BooleanOps, Intersects, MultiPolygon, Polygon, Relate};

/// Area of the intersection of two polygons, in the layer's native units².
/// Returns `0.0` when the polygons do not overlap (touching-only included).
pub fn overlap_area(a: &Polygon<f64>, b: &Polygon<f64>) -> f64 {
    let mp_a = MultiPolygon(vec![a.clone()]);
    let mp_b = MultiPolygon(vec![b.clone()]);
    mp_a.intersection(&mp_b).unsigned_area()
}

/// True iff `a` and `b` share interior area (strict overlap, not merely
/// touching at a boundary).
pub fn areas_overlap(a: &Polygon<f64>, b: &Polygon<f64>) -> bool {
    let im = a.relate(b);
    im.is_intersects() && !im.is_touches()
}

/// Rook contiguity: `a` and `b` touch (no shared interior) and their shared
/// boundary has dimension 1 (a line, not just a point).
pub fn rook_adjacent(a: &Polygon<f64>, b: &Polygon<f64>) -> bool {
    let im = a.relate(b);
    im.is_touches() && im.matches("****1****").unwrap_or(false)
}

/// True iff `inner` lies entirely within `outer` (allowing boundary
/// touches), i.e. `outer` covers `inner`.
pub fn covers(outer: &Polygon<f64>, inner: &Polygon<f64>) -> bool {
    let im = inner.relate(outer);
    im.matches("T*F**F***").unwrap_or(false)
}

/// True iff `inner` lies strictly inside `outer` with no boundary contact.
pub fn strictly_within(outer: &Polygon<f64>, inner: &Polygon<f64>) -> bool {
    let im = inner.relate(outer);
    im.matches("T*F**FFF*").unwrap_or(false)
}

/// True iff the two geometries intersect at all (any shared point).
pub fn intersects<A, B>(a: &A, b: &B) -> bool
where
    A: Intersects<B>,
{
    a.intersects(b)
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::polygon;

    #[test]
    fn overlap_area_of_disjoint_squares_is_zero() {
        let a = polygon![(x: 0.0, y: 0.0), (x: 1.0, y: 0.0), (x: 1.0, y: 1.0), (x: 0.0, y: 1.0), (x: 0.0, y: 0.0)];
        let b = polygon![(x: 5.0, y: 5.0), (x: 6.0, y: 5.0), (x: 6.0, y: 6.0), (x: 5.0, y: 6.0), (x: 5.0, y: 5.0)];
        assert_eq!(overlap_area(&a, &b), 0.0);
        assert!(!areas_overlap(&a, &b));
    }

    #[test]
    fn overlap_area_of_overlapping_squares_is_positive() {
        let a = polygon![(x: 0.0, y: 0.0), (x: 10.0, y: 0.0), (x: 10.0, y: 10.0), (x: 0.0, y: 10.0), (x: 0.0, y: 0.0)];
        let b = polygon![(x: 5.0, y: 5.0), (x: 15.0, y: 5.0), (x: 15.0, y: 15.0), (x: 5.0, y: 15.0), (x: 5.0, y: 5.0)];
        let area = overlap_area(&a, &b);
        assert!((area - 25.0).abs() < 1e-6, "expected ~25.0 got {area}");
        assert!(areas_overlap(&a, &b));
    }

    #[test]
    fn rook_adjacent_detects_shared_edge() {
        let a = polygon![(x: 0.0, y: 0.0), (x: 1.0, y: 0.0), (x: 1.0, y: 1.0), (x: 0.0, y: 1.0), (x: 0.0, y: 0.0)];
        let b = polygon![(x: 1.0, y: 0.0), (x: 2.0, y: 0.0), (x: 2.0, y: 1.0), (x: 1.0, y: 1.0), (x: 1.0, y: 0.0)];
        assert!(rook_adjacent(&a, &b));
    }

    #[test]
    fn covers_detects_containment_with_boundary_touch() {
        let outer = polygon![(x: 0.0, y: 0.0), (x: 10.0, y: 0.0), (x: 10.0, y: 10.0), (x: 0.0, y: 10.0), (x: 0.0, y: 0.0)];
        let inner = polygon![(x: 0.0, y: 0.0), (x: 5.0, y: 0.0), (x: 5.0, y: 5.0), (x: 0.0, y: 5.0), (x: 0.0, y: 0.0)];
        assert!(covers(&outer, &inner));
    }
}
