//! Relation Check Strategies (spec.md §4.5): 27 `CaseType` strategies, one
//! `RelationStrategy` impl each, dispatched by a registry built once at
//! startup (mirrors `checks::CheckRegistry`).

pub mod context;
mod util;

mod attribute_mismatch;
mod hole_duplicate;
mod line_connectivity;
mod line_intersection;
mod line_polygon;
mod point_polygon;
mod point_spacing;
mod polygon_polygon;
mod sharp_bend;

pub use context::RelationContext;

use std::collections::HashMap;

use geoqc_index::SpatialIndex;

use crate::model::error_record::ValidationError;
use crate::model::feature::Feature;
use crate::model::rule::CaseType;

pub trait RelationStrategy: Send + Sync {
    fn case_type(&self) -> CaseType;

    fn run(
        &self,
        main: &[Feature],
        main_index: &SpatialIndex,
        related: &[Feature],
        related_index: &SpatialIndex,
        ctx: &RelationContext,
    ) -> Vec<ValidationError>;
}

pub struct RelationRegistry {
    strategies: HashMap<CaseType, Box<dyn RelationStrategy>>,
}

impl RelationRegistry {
    pub fn new() -> Self {
        let list: Vec<Box<dyn RelationStrategy>> = vec![
            Box::new(polygon_polygon::PolygonNotOverlap),
            Box::new(polygon_polygon::PolygonWithinPolygon),
            Box::new(polygon_polygon::PolygonNotWithinPolygon),
            Box::new(polygon_polygon::PolygonIntersectionWithAttribute),
            Box::new(polygon_polygon::PolygonNotIntersectLine),
            Box::new(line_polygon::PolygonMissingLine),
            Box::new(line_polygon::PolygonContainsObjects),
            Box::new(line_polygon::PolygonBoundaryMatch),
            Box::new(line_polygon::LineWithinPolygon),
            Box::new(line_polygon::LineEndpointWithinPolygon),
            Box::new(point_polygon::PolygonNotContainPoint),
            Box::new(point_polygon::PointInsidePolygon),
            Box::new(line_connectivity::LineConnectivity),
            Box::new(line_connectivity::LineConnectivityWithFilter),
            Box::new(line_connectivity::LineDisconnection),
            Box::new(line_connectivity::LineDisconnectionWithAttribute),
            Box::new(line_connectivity::DefectiveConnection),
            Box::new(line_intersection::LineIntersectionWithAttribute),
            Box::new(sharp_bend::RoadSharpBend),
            Box::new(sharp_bend::ContourSharpBend),
            Box::new(line_intersection::ContourIntersection),
            Box::new(attribute_mismatch::CenterlineAttributeMismatch),
            Box::new(attribute_mismatch::ConnectedLinesSameAttribute),
            Box::new(attribute_mismatch::AttributeSpatialMismatch),
            Box::new(attribute_mismatch::BridgeRiverNameMatch),
            Box::new(point_spacing::PointSpacingCheck),
            Box::new(hole_duplicate::HoleDuplicateCheck),
        ];
        let strategies = list.into_iter().map(|s| (s.case_type(), s)).collect();
        Self { strategies }
    }

    pub fn get(&self, case_type: CaseType) -> Option<&dyn RelationStrategy> {
        self.strategies.get(&case_type).map(|b| b.as_ref())
    }
}

impl Default for RelationRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registry_has_all_twenty_seven_case_types() {
        let registry = RelationRegistry::new();
        for ct in CaseType::ALL {
            assert!(registry.get(ct).is_some(), "missing strategy for {ct:?}");
        }
    }
}
