use geo::Rect;
use rstar::{RTree, RTreeObject, AABB};

/// A bounding box in an R-tree, associated with a feature by its fid.
#[derive(Debug, Clone, Copy)]
pub struct IndexedBox {
    fid: i64,
    bbox: Rect<f64>,
}

impl IndexedBox {
    pub fn new(fid: i64, bbox: Rect<f64>) -> Self {
        Self { fid, bbox }
    }

    #[inline]
    pub fn fid(&self) -> i64 {
        self.fid
    }

    #[inline]
    pub fn bbox(&self) -> Rect<f64> {
        self.bbox
    }
}

impl RTreeObject for IndexedBox {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        AABB::from_corners(self.bbox.min().into(), self.bbox.max().into())
    }
}

/// Bounding-box R-tree over a single layer, keyed by fid.
///
/// Built once per `(job, layer, fingerprint)` and reused by every strategy
/// that needs pair enumeration on that layer; never mutated after `build`.
#[derive(Debug, Default)]
pub struct SpatialIndex {
    rtree: RTree<IndexedBox>,
}

impl SpatialIndex {
    /// Bulk-load an index from `(fid, bbox)` pairs. Bulk loading keeps the
    /// tree balanced in O(n log n) rather than inserting one box at a time.
    pub fn build(items: impl IntoIterator<Item = (i64, Rect<f64>)>) -> Self {
        let boxes: Vec<IndexedBox> = items
            .into_iter()
            .map(|(fid, bbox)| IndexedBox::new(fid, bbox))
            .collect();
        Self {
            rtree: RTree::bulk_load(boxes),
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.rtree.size()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.rtree.size() == 0
    }

    /// Fids whose bounding box intersects `rect`, padded by `tolerance` on
    /// every side (use `0.0` for an exact-envelope probe).
    pub fn candidates(&self, rect: Rect<f64>, tolerance: f64) -> impl Iterator<Item = i64> + '_ {
        let search = AABB::from_corners(
            [rect.min().x - tolerance, rect.min().y - tolerance],
            [rect.max().x + tolerance, rect.max().y + tolerance],
        );
        self.rtree
            .locate_in_envelope_intersecting(&search)
            .map(|b| b.fid())
    }

    /// Fids of the `k` nearest bounding boxes to `point`, closest first.
    pub fn nearest(&self, point: [f64; 2], k: usize) -> Vec<i64> {
        self.rtree
            .nearest_neighbor_iter(&point)
            .take(k)
            .map(|b| b.fid())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::Coord;

    fn rect(minx: f64, miny: f64, maxx: f64, maxy: f64) -> Rect<f64> {
        Rect::new(Coord { x: minx, y: miny }, Coord { x: maxx, y: maxy })
    }

    #[test]
    fn candidates_finds_overlapping_boxes() {
        let idx = SpatialIndex::build([
            (1, rect(0.0, 0.0, 1.0, 1.0)),
            (2, rect(5.0, 5.0, 6.0, 6.0)),
        ]);
        let found: Vec<i64> = idx.candidates(rect(0.5, 0.5, 0.6, 0.6), 0.0).collect();
        assert_eq!(found, vec![1]);
    }

    #[test]
    fn candidates_respects_tolerance_padding() {
        let idx = SpatialIndex::build([(1, rect(0.0, 0.0, 1.0, 1.0))]);
        assert!(idx.candidates(rect(1.5, 1.5, 2.0, 2.0), 0.0).next().is_none());
        let found: Vec<i64> = idx.candidates(rect(1.5, 1.5, 2.0, 2.0), 1.0).collect();
        assert_eq!(found, vec![1]);
    }

    #[test]
    fn nearest_orders_by_distance() {
        let idx = SpatialIndex::build([
            (1, rect(10.0, 10.0, 10.0, 10.0)),
            (2, rect(0.0, 0.0, 0.0, 0.0)),
        ]);
        assert_eq!(idx.nearest([0.1, 0.1], 1), vec![2]);
    }
}
