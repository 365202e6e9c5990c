//! Canonical geometry hashing for exact-duplicate and shape-similarity
//! checks (`Duplicate`, `HoleDuplicateCheck`).

use ahash::AHasher;
use geo::{Coord, LineString, Polygon};
use std::hash::{Hash, Hasher};

/// Quantize a coordinate to a fixed-precision grid so that hash equality
/// tolerates floating point noise from repeated reads of the same feature.
const QUANT_SCALE: f64 = 1e7;

#[inline]
fn quantize(c: Coord<f64>) -> (i64, i64) {
    ((c.x * QUANT_SCALE).round() as i64, (c.y * QUANT_SCALE).round() as i64)
}

/// Canonical hash of a ring's vertex sequence, rotation- and
/// direction-invariant: starts the hash at the lexicographically smallest
/// quantized vertex and always walks in the direction that visits the
/// second-smallest-adjacent vertex first, so the same physical ring hashes
/// identically regardless of which vertex a writer happened to start at or
/// whether its winding order was flipped.
pub fn canonical_ring_hash(ring: &LineString<f64>) -> u64 {
    let pts: Vec<(i64, i64)> = ring.0.iter().map(|c| quantize(*c)).collect();
    if pts.len() < 2 {
        return 0;
    }
    // Drop the duplicated closing vertex for a canonical open cycle.
    let open = &pts[..pts.len() - 1];
    if open.is_empty() {
        return 0;
    }

    let start = open
        .iter()
        .enumerate()
        .min_by_key(|(_, p)| **p)
        .map(|(i, _)| i)
        .unwrap_or(0);

    let n = open.len();
    let forward = |k: usize| open[(start + k) % n];
    let backward = |k: usize| open[(start + n - k) % n];

    let use_forward = if n > 1 {
        forward(1) <= backward(1)
    } else {
        true
    };

    let mut hasher = AHasher::default();
    for k in 0..n {
        let p = if use_forward { forward(k) } else { backward(k) };
        p.hash(&mut hasher);
    }
    hasher.finish()
}

/// Canonical hash of a polygon: exterior ring followed by interior rings in
/// a stable (sorted) order, so hole ordering differences do not defeat
/// duplicate detection.
pub fn canonical_polygon_hash(polygon: &Polygon<f64>) -> u64 {
    let mut hasher = AHasher::default();
    canonical_ring_hash(polygon.exterior()).hash(&mut hasher);

    let mut interior_hashes: Vec<u64> = polygon.interiors().iter().map(canonical_ring_hash).collect();
    interior_hashes.sort_unstable();
    for h in interior_hashes {
        h.hash(&mut hasher);
    }
    hasher.finish()
}

/// Canonical hash of a raw vertex sequence (used for line geometries, where
/// there is no ring to canonicalize rotation for — only direction).
pub fn canonical_line_hash(line: &LineString<f64>) -> u64 {
    let pts: Vec<(i64, i64)> = line.0.iter().map(|c| quantize(*c)).collect();
    if pts.is_empty() {
        return 0;
    }
    let reversed: Vec<(i64, i64)> = pts.iter().rev().copied().collect();
    let canonical = if pts <= reversed { &pts } else { &reversed };

    let mut hasher = AHasher::default();
    for p in canonical {
        p.hash(&mut hasher);
    }
    hasher.finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::line_string;

    #[test]
    fn rotated_ring_hashes_identically() {
        let a = line_string![
            (x: 0.0, y: 0.0), (x: 1.0, y: 0.0), (x: 1.0, y: 1.0), (x: 0.0, y: 1.0), (x: 0.0, y: 0.0),
        ];
        let b = line_string![
            (x: 1.0, y: 0.0), (x: 1.0, y: 1.0), (x: 0.0, y: 1.0), (x: 0.0, y: 0.0), (x: 1.0, y: 0.0),
        ];
        assert_eq!(canonical_ring_hash(&a), canonical_ring_hash(&b));
    }

    #[test]
    fn reversed_winding_hashes_identically() {
        let a = line_string![
            (x: 0.0, y: 0.0), (x: 1.0, y: 0.0), (x: 1.0, y: 1.0), (x: 0.0, y: 1.0), (x: 0.0, y: 0.0),
        ];
        let reversed = line_string![
            (x: 0.0, y: 0.0), (x: 0.0, y: 1.0), (x: 1.0, y: 1.0), (x: 1.0, y: 0.0), (x: 0.0, y: 0.0),
        ];
        assert_eq!(canonical_ring_hash(&a), canonical_ring_hash(&reversed));
    }

    #[test]
    fn different_shapes_hash_differently() {
        let a = line_string![
            (x: 0.0, y: 0.0), (x: 1.0, y: 0.0), (x: 1.0, y: 1.0), (x: 0.0, y: 1.0), (x: 0.0, y: 0.0),
        ];
        let b = line_string![
            (x: 0.0, y: 0.0), (x: 2.0, y: 0.0), (x: 2.0, y: 1.0), (x: 0.0, y: 1.0), (x: 0.0, y: 0.0),
        ];
        assert_ne!(canonical_ring_hash(&a), canonical_ring_hash(&b));
    }
}
