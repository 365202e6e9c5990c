//! Shared geometry math for the Stage-3 check strategies. Kept deliberately
//! manual (shoelace area, segment distance, segment intersection) rather
//! than reaching for `geo`'s length/distance trait surface, so the one
//! canonical formula is easy to audit in one place.

use std::hash::{Hash, Hasher};

use ahash::AHasher;
use geo::{Coord, Geometry, LineString, MultiPolygon, Polygon};
use geoqc_index::hash::{canonical_line_hash, canonical_polygon_hash};

/// Every polygon ring a feature's geometry carries, polygon or multipolygon
/// alike, since most geometry checks operate per-polygon regardless of
/// whether the layer stores single or multi parts.
pub fn polygons_of(geom: &Geometry<f64>) -> Vec<&Polygon<f64>> {
    match geom {
        Geometry::Polygon(p) => vec![p],
        Geometry::MultiPolygon(mp) => mp.0.iter().collect(),
        _ => Vec::new(),
    }
}

/// Every line a feature's geometry carries, linestring or multilinestring.
pub fn lines_of(geom: &Geometry<f64>) -> Vec<&LineString<f64>> {
    match geom {
        Geometry::LineString(l) => vec![l],
        Geometry::MultiLineString(ml) => ml.0.iter().collect(),
        _ => Vec::new(),
    }
}

/// Unsigned area of a closed ring via the shoelace formula. Matches the
/// convention `geo::Area` uses (exterior minus holes), but computed directly
/// so callers that only have a single ring (not a full `Polygon`) can use
/// it too (HoleTopology, Sliver).
pub fn ring_area(ring: &LineString<f64>) -> f64 {
    let pts = &ring.0;
    if pts.len() < 4 {
        return 0.0;
    }
    let mut sum = 0.0;
    for w in pts.windows(2) {
        sum += w[0].x * w[1].y - w[1].x * w[0].y;
    }
    (sum / 2.0).abs()
}

/// Unsigned area of a polygon (exterior minus the sum of hole areas).
pub fn polygon_area(poly: &Polygon<f64>) -> f64 {
    let exterior = ring_area(poly.exterior());
    let holes: f64 = poly.interiors().iter().map(ring_area).sum();
    (exterior - holes).max(0.0)
}

/// Perimeter of a ring (sum of segment lengths); for a `Polygon`'s Sliver
/// ratio, only the exterior ring's perimeter is used.
pub fn ring_perimeter(ring: &LineString<f64>) -> f64 {
    ring.0.windows(2).map(|w| dist(w[0], w[1])).sum()
}

/// Total length of a (possibly open) line.
pub fn line_length(line: &LineString<f64>) -> f64 {
    line.0.windows(2).map(|w| dist(w[0], w[1])).sum()
}

pub fn vertex_count(line: &LineString<f64>) -> usize {
    line.0.len()
}

#[inline]
pub fn dist(a: Coord<f64>, b: Coord<f64>) -> f64 {
    let dx = a.x - b.x;
    let dy = a.y - b.y;
    (dx * dx + dy * dy).sqrt()
}

/// Shortest distance from `p` to the segment `a`-`b`.
pub fn point_to_segment_distance(p: Coord<f64>, a: Coord<f64>, b: Coord<f64>) -> f64 {
    let abx = b.x - a.x;
    let aby = b.y - a.y;
    let len_sq = abx * abx + aby * aby;
    if len_sq == 0.0 {
        return dist(p, a);
    }
    let t = ((p.x - a.x) * abx + (p.y - a.y) * aby) / len_sq;
    let t = t.clamp(0.0, 1.0);
    let proj = Coord {
        x: a.x + t * abx,
        y: a.y + t * aby,
    };
    dist(p, proj)
}

/// True iff segments `p1`-`p2` and `p3`-`p4` intersect at a single point that
/// is not shared endpoint-to-endpoint (used for SelfIntersection/SelfOverlap,
/// where adjacent segments of the same ring sharing an endpoint are expected
/// and must not be flagged).
pub fn segments_cross(p1: Coord<f64>, p2: Coord<f64>, p3: Coord<f64>, p4: Coord<f64>) -> bool {
    let d1 = cross(p3, p4, p1);
    let d2 = cross(p3, p4, p2);
    let d3 = cross(p1, p2, p3);
    let d4 = cross(p1, p2, p4);

    if ((d1 > 0.0 && d2 < 0.0) || (d1 < 0.0 && d2 > 0.0)) && ((d3 > 0.0 && d4 < 0.0) || (d3 < 0.0 && d4 > 0.0)) {
        return true;
    }
    if d1 == 0.0 && on_segment(p3, p4, p1) {
        return true;
    }
    if d2 == 0.0 && on_segment(p3, p4, p2) {
        return true;
    }
    if d3 == 0.0 && on_segment(p1, p2, p3) {
        return true;
    }
    if d4 == 0.0 && on_segment(p1, p2, p4) {
        return true;
    }
    false
}

#[inline]
fn cross(a: Coord<f64>, b: Coord<f64>, p: Coord<f64>) -> f64 {
    (b.x - a.x) * (p.y - a.y) - (b.y - a.y) * (p.x - a.x)
}

fn on_segment(a: Coord<f64>, b: Coord<f64>, p: Coord<f64>) -> bool {
    p.x >= a.x.min(b.x) && p.x <= a.x.max(b.x) && p.y >= a.y.min(b.y) && p.y <= a.y.max(b.y)
}

/// Finds the first pair of non-adjacent segments in `ring` that cross,
/// returning the lower segment index. Adjacent segments (sharing an
/// endpoint, including the ring's closing pair) are skipped since rings are
/// expected to share endpoints.
pub fn first_self_intersection(ring: &LineString<f64>) -> Option<usize> {
    let pts = &ring.0;
    if pts.len() < 4 {
        return None;
    }
    let n = pts.len() - 1; // open segment count, closing vertex duplicates pts[0]
    for i in 0..n {
        let (a1, a2) = (pts[i], pts[i + 1]);
        for j in (i + 1)..n {
            if j == i || j == i + 1 || (i == 0 && j == n - 1) {
                continue;
            }
            let (b1, b2) = (pts[j], pts[j + 1]);
            if segments_cross(a1, a2, b1, b2) {
                return Some(i);
            }
        }
    }
    None
}

const QUANT_SCALE: f64 = 1e7;

/// Canonical hash of any feature geometry (spec.md §4.4 Duplicate), built
/// on top of `geoqc_index::hash`'s ring/line canonicalization. Multi-part
/// geometries hash each part independently and combine the sorted
/// per-part hashes, so part ordering never defeats duplicate detection.
pub fn geometry_hash(geom: &Geometry<f64>) -> u64 {
    match geom {
        Geometry::Polygon(p) => canonical_polygon_hash(p),
        Geometry::MultiPolygon(mp) => combine_sorted(mp.0.iter().map(canonical_polygon_hash)),
        Geometry::LineString(l) => canonical_line_hash(l),
        Geometry::MultiLineString(ml) => combine_sorted(ml.0.iter().map(canonical_line_hash)),
        Geometry::Point(pt) => point_hash(pt.x(), pt.y()),
        Geometry::MultiPoint(mpt) => combine_sorted(mpt.0.iter().map(|p| point_hash(p.x(), p.y()))),
        _ => 0,
    }
}

fn point_hash(x: f64, y: f64) -> u64 {
    let mut hasher = AHasher::default();
    ((x * QUANT_SCALE).round() as i64, (y * QUANT_SCALE).round() as i64).hash(&mut hasher);
    hasher.finish()
}

fn combine_sorted(parts: impl Iterator<Item = u64>) -> u64 {
    let mut hashes: Vec<u64> = parts.collect();
    hashes.sort_unstable();
    let mut hasher = AHasher::default();
    for h in hashes {
        h.hash(&mut hasher);
    }
    hasher.finish()
}

/// WKT of a geometry, written manually rather than through a trait impl
/// whose exact signature varies across `geo`/`wkt` crate versions.
pub fn polygon_to_wkt(poly: &Polygon<f64>) -> String {
    let mp = MultiPolygon(vec![poly.clone()]);
    multi_polygon_to_wkt(&mp)
}

pub fn multi_polygon_to_wkt(mp: &MultiPolygon<f64>) -> String {
    let polys: Vec<String> = mp
        .0
        .iter()
        .map(|poly| {
            let exterior = ring_to_wkt(poly.exterior());
            let interiors: Vec<String> = poly.interiors().iter().map(ring_to_wkt).collect();
            if interiors.is_empty() {
                format!("({exterior})")
            } else {
                format!("({exterior}, {})", interiors.join(", "))
            }
        })
        .collect();
    format!("MULTIPOLYGON({})", polys.join(", "))
}

pub fn line_to_wkt(line: &LineString<f64>) -> String {
    format!("LINESTRING{}", ring_to_wkt(line))
}

fn ring_to_wkt(ring: &LineString<f64>) -> String {
    let coords: Vec<String> = ring.0.iter().map(|c| format!("{} {}", c.x, c.y)).collect();
    format!("({})", coords.join(", "))
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::polygon;

    #[test]
    fn ring_area_of_unit_square_is_one() {
        let ring = polygon![(x: 0.0, y: 0.0), (x: 1.0, y: 0.0), (x: 1.0, y: 1.0), (x: 0.0, y: 1.0), (x: 0.0, y: 0.0)].exterior().clone();
        assert!((ring_area(&ring) - 1.0).abs() < 1e-9);
    }

    #[test]
    fn polygon_area_subtracts_hole() {
        let poly = Polygon::new(
            LineString::from(vec![(0.0, 0.0), (10.0, 0.0), (10.0, 10.0), (0.0, 10.0), (0.0, 0.0)]),
            vec![LineString::from(vec![(2.0, 2.0), (4.0, 2.0), (4.0, 4.0), (2.0, 4.0), (2.0, 2.0)])],
        );
        assert!((polygon_area(&poly) - 96.0).abs() < 1e-9);
    }

    #[test]
    fn crossing_segments_detected() {
        let p1 = Coord { x: 0.0, y: 0.0 };
        let p2 = Coord { x: 2.0, y: 2.0 };
        let p3 = Coord { x: 0.0, y: 2.0 };
        let p4 = Coord { x: 2.0, y: 0.0 };
        assert!(segments_cross(p1, p2, p3, p4));
    }

    #[test]
    fn adjacent_segments_not_flagged_as_self_intersection() {
        let ring = LineString::from(vec![(0.0, 0.0), (1.0, 0.0), (1.0, 1.0), (0.0, 1.0), (0.0, 0.0)]);
        assert_eq!(first_self_intersection(&ring), None);
    }

    #[test]
    fn bowtie_ring_detects_self_intersection() {
        // Figure-eight / bowtie: segment (0,0)-(1,1) crosses (1,0)-(0,1).
        let ring = LineString::from(vec![(0.0, 0.0), (1.0, 1.0), (1.0, 0.0), (0.0, 1.0), (0.0, 0.0)]);
        assert_eq!(first_self_intersection(&ring), Some(0));
    }

    #[test]
    fn point_to_segment_distance_perpendicular() {
        let p = Coord { x: 1.0, y: 1.0 };
        let a = Coord { x: 0.0, y: 0.0 };
        let b = Coord { x: 2.0, y: 0.0 };
        assert!((point_to_segment_distance(p, a, b) - 1.0).abs() < 1e-9);
    }
}
