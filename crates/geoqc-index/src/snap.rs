//! Tolerance-based endpoint connectivity, shared by every `Line*`
//! connectivity/disconnection relation check (§4.5).

use crate::bbox::SpatialIndex;
use geo::{Coord, Rect};

/// Union-find over a fixed number of points, merged by proximity within a
/// tolerance. Two points are connected iff there is a chain of points each
/// within `tolerance` of the next — exactly the "snapped at tolerance"
/// graph the spec's `LineDisconnection`/`LineConnectivity` family describes.
pub struct EndpointGraph {
    parent: Vec<usize>,
    rank: Vec<u8>,
}

impl EndpointGraph {
    /// Build the connectivity graph over `points` (indexed 0..points.len()),
    /// unioning any pair within `tolerance` of each other. Uses an R-tree so
    /// this is O(n log n) rather than the naive O(n^2) all-pairs scan.
    pub fn build(points: &[Coord<f64>], tolerance: f64) -> Self {
        let mut graph = Self {
            parent: (0..points.len()).collect(),
            rank: vec![0; points.len()],
        };

        let index = SpatialIndex::build(points.iter().enumerate().map(|(i, p)| {
            (i as i64, Rect::new(*p, *p))
        }));

        for (i, p) in points.iter().enumerate() {
            let probe = Rect::new(*p, *p);
            for j in index.candidates(probe, tolerance) {
                let j = j as usize;
                if j <= i {
                    continue;
                }
                let q = points[j];
                let dx = p.x - q.x;
                let dy = p.y - q.y;
                if (dx * dx + dy * dy).sqrt() <= tolerance {
                    graph.union(i, j);
                }
            }
        }

        graph
    }

    pub fn find(&mut self, x: usize) -> usize {
        if self.parent[x] != x {
            self.parent[x] = self.find(self.parent[x]);
        }
        self.parent[x]
    }

    pub fn union(&mut self, a: usize, b: usize) {
        let ra = self.find(a);
        let rb = self.find(b);
        if ra == rb {
            return;
        }
        match self.rank[ra].cmp(&self.rank[rb]) {
            std::cmp::Ordering::Less => self.parent[ra] = rb,
            std::cmp::Ordering::Greater => self.parent[rb] = ra,
            std::cmp::Ordering::Equal => {
                self.parent[rb] = ra;
                self.rank[ra] += 1;
            }
        }
    }

    pub fn same_component(&mut self, a: usize, b: usize) -> bool {
        self.find(a) == self.find(b)
    }

    /// Number of distinct connected components.
    pub fn component_count(&mut self) -> usize {
        let n = self.parent.len();
        (0..n).map(|i| self.find(i)).collect::<std::collections::HashSet<_>>().len()
    }

    /// Indices grouped by connected component, in arbitrary component order.
    pub fn components(&mut self) -> Vec<Vec<usize>> {
        let n = self.parent.len();
        let mut groups: std::collections::HashMap<usize, Vec<usize>> = std::collections::HashMap::new();
        for i in 0..n {
            let root = self.find(i);
            groups.entry(root).or_default().push(i);
        }
        groups.into_values().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn points_within_tolerance_connect() {
        let pts = vec![
            Coord { x: 0.0, y: 0.0 },
            Coord { x: 0.5, y: 0.0 },
            Coord { x: 10.0, y: 10.0 },
        ];
        let mut graph = EndpointGraph::build(&pts, 1.0);
        assert!(graph.same_component(0, 1));
        assert!(!graph.same_component(0, 2));
        assert_eq!(graph.component_count(), 2);
    }

    #[test]
    fn chain_of_near_points_forms_one_component() {
        let pts = vec![
            Coord { x: 0.0, y: 0.0 },
            Coord { x: 0.9, y: 0.0 },
            Coord { x: 1.8, y: 0.0 },
        ];
        let mut graph = EndpointGraph::build(&pts, 1.0);
        assert_eq!(graph.component_count(), 1);
    }
}
