//! Geometry Check Strategies (spec.md §4.4): one `CheckStrategy` per
//! `CheckType`, built once into a registry and dispatched by the Stage-3
//! runner for each enabled flag on a `GeometryRule`.

pub mod geomutil;

mod duplicate;
mod hole_topology;
mod min_vertex_count;
mod overlap;
mod self_intersection;
mod self_overlap;
mod short_object;
mod sliver;
mod small_area;
mod spike;
mod under_over_shoot;

use std::collections::HashMap;

use geoqc_index::SpatialIndex;

use crate::model::feature::Feature;
use crate::model::error_record::ValidationError;
use crate::model::rule::CheckType;
use crate::stages::context::CheckContext;

/// A single geometry check, run once per feature (or once per layer for
/// checks that compare features pairwise). Implementations never mutate
/// `features`; pairwise checks use `index` to avoid the full Cartesian
/// product (spec.md §9 "always enumerate candidate pairs through the
/// Spatial Index Service").
pub trait CheckStrategy: Send + Sync {
    fn check_type(&self) -> CheckType;

    fn run(&self, features: &[Feature], index: &SpatialIndex, ctx: &CheckContext) -> Vec<ValidationError>;
}

pub struct CheckRegistry {
    strategies: HashMap<CheckType, Box<dyn CheckStrategy>>,
}

impl CheckRegistry {
    /// Builds every strategy once; the registry is immutable after
    /// construction and shared read-only across jobs (spec.md §9 "Strategy
    /// plug-in model").
    pub fn new() -> Self {
        let list: Vec<Box<dyn CheckStrategy>> = vec![
            Box::new(duplicate::DuplicateCheck),
            Box::new(overlap::OverlapCheck),
            Box::new(self_intersection::SelfIntersectionCheck),
            Box::new(sliver::SliverCheck),
            Box::new(short_object::ShortObjectCheck),
            Box::new(small_area::SmallAreaCheck),
            Box::new(hole_topology::HoleTopologyCheck),
            Box::new(min_vertex_count::MinVertexCountCheck),
            Box::new(spike::SpikeCheck),
            Box::new(self_overlap::SelfOverlapCheck),
            Box::new(under_over_shoot::UnderOverShootCheck),
        ];
        let strategies = list.into_iter().map(|s| (s.check_type(), s)).collect();
        Self { strategies }
    }

    pub fn get(&self, check_type: CheckType) -> Option<&dyn CheckStrategy> {
        self.strategies.get(&check_type).map(|b| b.as_ref())
    }
}

impl Default for CheckRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registry_has_all_eleven_check_types() {
        let registry = CheckRegistry::new();
        for ct in CheckType::ALL {
            assert!(registry.get(ct).is_some(), "missing strategy for {ct:?}");
        }
    }
}
