//! Interior-angle helpers for Spike and sharp-bend detection.

use geo::{Coord, LineString};

/// Interior angle at `vertex`, given its neighbors `prev` and `next`, in
/// degrees in `[0, 180]`. Degenerate (coincident) neighbors yield `180.0`
/// (treated as a straight, non-spiky vertex) rather than `NaN`.
pub fn interior_angle_deg(prev: Coord<f64>, vertex: Coord<f64>, next: Coord<f64>) -> f64 {
    let ux = prev.x - vertex.x;
    let uy = prev.y - vertex.y;
    let vx = next.x - vertex.x;
    let vy = next.y - vertex.y;

    let u_len = (ux * ux + uy * uy).sqrt();
    let v_len = (vx * vx + vy * vy).sqrt();
    if u_len == 0.0 || v_len == 0.0 {
        return 180.0;
    }

    let cos_theta = ((ux * vx + uy * vy) / (u_len * v_len)).clamp(-1.0, 1.0);
    cos_theta.acos().to_degrees()
}

/// Interior angle at each vertex of a closed ring (first == last vertex is
/// skipped as a duplicate index), paired with its vertex index in the ring.
pub fn ring_interior_angles(ring: &LineString<f64>) -> Vec<(usize, f64)> {
    let coords: Vec<Coord<f64>> = ring.0.clone();
    if coords.len() < 4 {
        // A closed ring needs at least 3 distinct vertices + the repeated
        // closing vertex to have a well-defined interior angle anywhere.
        return Vec::new();
    }
    let n = coords.len() - 1; // drop the duplicated closing vertex
    (0..n)
        .map(|i| {
            let prev = coords[(i + n - 1) % n];
            let vertex = coords[i];
            let next = coords[(i + 1) % n];
            (i, interior_angle_deg(prev, vertex, next))
        })
        .collect()
}

/// Smallest interior angle in the ring and the vertex index where it occurs.
pub fn min_interior_angle(ring: &LineString<f64>) -> Option<(usize, f64)> {
    ring_interior_angles(ring)
        .into_iter()
        .min_by(|(_, a), (_, b)| a.partial_cmp(b).expect("angle is never NaN"))
}

/// Interior angles along an open polyline (no wraparound at the endpoints).
pub fn line_interior_angles(line: &LineString<f64>) -> Vec<(usize, f64)> {
    let coords = &line.0;
    if coords.len() < 3 {
        return Vec::new();
    }
    (1..coords.len() - 1)
        .map(|i| (i, interior_angle_deg(coords[i - 1], coords[i], coords[i + 1])))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::line_string;

    #[test]
    fn right_angle_is_90_degrees() {
        let prev = Coord { x: 1.0, y: 0.0 };
        let vertex = Coord { x: 0.0, y: 0.0 };
        let next = Coord { x: 0.0, y: 1.0 };
        let angle = interior_angle_deg(prev, vertex, next);
        assert!((angle - 90.0).abs() < 1e-9);
    }

    #[test]
    fn straight_line_is_180_degrees() {
        let prev = Coord { x: -1.0, y: 0.0 };
        let vertex = Coord { x: 0.0, y: 0.0 };
        let next = Coord { x: 1.0, y: 0.0 };
        let angle = interior_angle_deg(prev, vertex, next);
        assert!((angle - 180.0).abs() < 1e-9);
    }

    #[test]
    fn min_interior_angle_finds_sharp_spike() {
        // A square with one vertex pulled in to create a near-180 spike.
        let ring = line_string![
            (x: 0.0, y: 0.0),
            (x: 10.0, y: 0.0),
            (x: 5.0, y: 0.1),
            (x: 10.0, y: 10.0),
            (x: 0.0, y: 10.0),
            (x: 0.0, y: 0.0),
        ];
        let (idx, angle) = min_interior_angle(&ring).unwrap();
        assert_eq!(idx, 2);
        assert!(angle < 10.0, "expected a sharp spike angle, got {angle}");
    }
}
