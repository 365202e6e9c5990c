//! `GeometryCriteria`: numeric thresholds shared by geometry/relation
//! strategies (spec.md §3).

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeometryCriteria {
    pub min_line_length: f64,
    pub min_polygon_area: f64,
    pub sliver_ratio: f64,
    pub spike_angle_deg: f64,
    pub min_vertex_count: usize,
    pub undershoot_tolerance: f64,
    pub overlap_area_tol: f64,
    pub self_overlap_tol: f64,
}

impl Default for GeometryCriteria {
    fn default() -> Self {
        Self {
            min_line_length: 1.0,
            min_polygon_area: 1.0,
            sliver_ratio: 0.001,
            spike_angle_deg: 5.0,
            min_vertex_count: 4,
            undershoot_tolerance: 0.5,
            overlap_area_tol: 0.0,
            self_overlap_tol: 0.0,
        }
    }
}
