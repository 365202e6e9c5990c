//! Shared cross-layer pair enumeration (spec.md §4.5 "Algorithmic
//! invariants"): always probe the related layer's R-tree, never compute a
//! Cartesian product, and exclude self-pairs when main and related are the
//! same layer.

use std::collections::HashMap;

use geo::{BoundingRect, Rect};
use geoqc_index::SpatialIndex;

use crate::model::feature::Feature;

/// Candidate related features for `main`, probed through `related_index`
/// padded by `tolerance`, excluding `main` itself when the two layers are
/// the same (`same_layer`).
pub fn candidates<'a>(
    main: &Feature,
    related_index: &SpatialIndex,
    related_by_fid: &'a HashMap<i64, &'a Feature>,
    tolerance: f64,
    same_layer: bool,
) -> Vec<&'a Feature> {
    let Some(geometry) = &main.geometry else { return Vec::new() };
    let Some(rect) = geometry.bounding_rect() else { return Vec::new() };
    related_index
        .candidates(rect, tolerance)
        .filter(|fid| !(same_layer && *fid == main.fid))
        .filter_map(|fid| related_by_fid.get(&fid).copied())
        .collect()
}

pub fn by_fid(features: &[Feature]) -> HashMap<i64, &Feature> {
    features.iter().map(|f| (f.fid, f)).collect()
}

pub fn probe_rect(point: geo::Coord<f64>) -> Rect<f64> {
    Rect::new(point, point)
}
