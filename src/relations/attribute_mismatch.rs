//! Attribute-agreement-along-connectivity strategies (spec.md §4.5):
//! `CenterlineAttributeMismatch`, `ConnectedLinesSameAttribute`,
//! `AttributeSpatialMismatch`, `BridgeRiverNameMatch`.

use geo::Intersects;
use geoqc_index::snap::EndpointGraph;
use geoqc_index::SpatialIndex;

use crate::checks::geomutil::lines_of;
use crate::model::error_record::{Severity, ValidationError};
use crate::model::feature::Feature;
use crate::model::rule::CaseType;
use crate::relations::util::{by_fid, candidates};
use crate::relations::{RelationContext, RelationStrategy};

/// Endpoint connectivity graph over `features`, snapped at
/// `intersection_threshold`, paired with each point's owning fid.
fn connectivity(features: &[Feature], tolerance: f64) -> (EndpointGraph, Vec<geo::Coord<f64>>, Vec<i64>) {
    let mut points = Vec::new();
    let mut owners = Vec::new();
    for f in features {
        let Some(g) = &f.geometry else { continue };
        for line in lines_of(g) {
            if let (Some(s), Some(e)) = (line.0.first(), line.0.last()) {
                points.push(*s);
                owners.push(f.fid);
                points.push(*e);
                owners.push(f.fid);
            }
        }
    }
    let graph = EndpointGraph::build(&points, tolerance);
    (graph, points, owners)
}

/// For every pair of features connected at the endpoint graph, checks that
/// each of `fields` agrees; reports the first disagreeing field per pair.
fn run_attribute_agreement(case_type: CaseType, main: &[Feature], ctx: &RelationContext, fields: &[String]) -> Vec<ValidationError> {
    let tolerance = ctx.param("intersection_threshold").and_then(|s| s.parse().ok()).unwrap_or(ctx.tolerance);
    let (mut graph, points, owners) = connectivity(main, tolerance);
    let by_fid_map = by_fid(main);
    let mut errors = Vec::new();
    let mut reported: std::collections::HashSet<(i64, i64)> = std::collections::HashSet::new();

    for i in 0..points.len() {
        for j in (i + 1)..points.len() {
            if owners[i] == owners[j] || !graph.same_component(i, j) {
                continue;
            }
            let pair = if owners[i] < owners[j] { (owners[i], owners[j]) } else { (owners[j], owners[i]) };
            if !reported.insert(pair) {
                continue;
            }
            let (Some(a), Some(b)) = (by_fid_map.get(&pair.0), by_fid_map.get(&pair.1)) else { continue };
            for field in fields {
                let (va, vb) = (a.get(field), b.get(field));
                if va.is_some() && va != vb {
                    errors.push(
                        ctx.error(case_type.code(), format!("connected features {} and {} disagree on {field}", pair.0, pair.1), Severity::Error)
                            .feature_id(pair.0)
                            .field(field)
                            .metadata("other_fid", pair.1)
                            .build(),
                    );
                    break;
                }
            }
        }
    }

    errors
}

pub struct CenterlineAttributeMismatch;

impl RelationStrategy for CenterlineAttributeMismatch {
    fn case_type(&self) -> CaseType {
        CaseType::CenterlineAttributeMismatch
    }

    fn run(&self, main: &[Feature], _main_index: &SpatialIndex, _related: &[Feature], _related_index: &SpatialIndex, ctx: &RelationContext) -> Vec<ValidationError> {
        let fields: Vec<String> = ctx.param("fields").map(|s| s.split(',').map(|f| f.trim().to_string()).collect()).unwrap_or_default();
        run_attribute_agreement(CaseType::CenterlineAttributeMismatch, main, ctx, &fields)
    }
}

pub struct ConnectedLinesSameAttribute;

impl RelationStrategy for ConnectedLinesSameAttribute {
    fn case_type(&self) -> CaseType {
        CaseType::ConnectedLinesSameAttribute
    }

    fn run(&self, main: &[Feature], _main_index: &SpatialIndex, _related: &[Feature], _related_index: &SpatialIndex, ctx: &RelationContext) -> Vec<ValidationError> {
        let field = ctx.param("field").unwrap_or_default().to_string();
        run_attribute_agreement(CaseType::ConnectedLinesSameAttribute, main, ctx, &[field])
    }
}

pub struct AttributeSpatialMismatch;

impl RelationStrategy for AttributeSpatialMismatch {
    fn case_type(&self) -> CaseType {
        CaseType::AttributeSpatialMismatch
    }

    fn run(&self, main: &[Feature], _main_index: &SpatialIndex, related: &[Feature], related_index: &SpatialIndex, ctx: &RelationContext) -> Vec<ValidationError> {
        let same_layer = ctx.main_table == ctx.related_table;
        let related_by_fid = by_fid(related);
        let main_field = ctx.param("main_field").unwrap_or_default();
        let related_field = ctx.param("related_field").unwrap_or(main_field);
        let mut errors = Vec::new();

        for m in main {
            if ctx.is_cancelled() {
                break;
            }
            if m.geometry.is_none() {
                continue;
            }
            let main_value = m.get(main_field);
            for r in candidates(m, related_index, &related_by_fid, ctx.tolerance, same_layer) {
                let Some(mg) = &m.geometry else { continue };
                let Some(rg) = &r.geometry else { continue };
                if !mg.intersects(rg) {
                    continue;
                }
                if main_value.is_some() && main_value != r.get(related_field) {
                    errors.push(
                        ctx.error(
                            CaseType::AttributeSpatialMismatch.code(),
                            format!("feature {} overlaps {} with mismatched {main_field}/{related_field}", m.fid, r.fid),
                            Severity::Error,
                        )
                        .feature_id(m.fid)
                        .field(main_field)
                        .metadata("other_fid", r.fid)
                        .build(),
                    );
                }
            }
        }

        errors
    }
}

pub struct BridgeRiverNameMatch;

impl RelationStrategy for BridgeRiverNameMatch {
    fn case_type(&self) -> CaseType {
        CaseType::BridgeRiverNameMatch
    }

    fn run(&self, main: &[Feature], _main_index: &SpatialIndex, related: &[Feature], related_index: &SpatialIndex, ctx: &RelationContext) -> Vec<ValidationError> {
        let same_layer = ctx.main_table == ctx.related_table;
        let related_by_fid = by_fid(related);
        let bridge_field = ctx.param("bridge_field").unwrap_or("name");
        let river_field = ctx.param("river_field").unwrap_or("name");
        let mut errors = Vec::new();

        for m in main {
            if ctx.is_cancelled() {
                break;
            }
            let Some(mg) = &m.geometry else { continue };
            let Some(bridge_name) = m.get(bridge_field).and_then(|v| v.as_str()) else { continue };

            for r in candidates(m, related_index, &related_by_fid, ctx.tolerance, same_layer) {
                let Some(rg) = &r.geometry else { continue };
                if !mg.intersects(rg) {
                    continue;
                }
                let Some(river_name) = r.get(river_field).and_then(|v| v.as_str()) else { continue };
                if !names_share_substring(bridge_name, river_name) {
                    errors.push(
                        ctx.error(
                            CaseType::BridgeRiverNameMatch.code(),
                            format!("bridge {} name does not match crossing river {}", m.fid, r.fid),
                            Severity::Warning,
                        )
                        .feature_id(m.fid)
                        .field(bridge_field)
                        .metadata("other_fid", r.fid)
                        .build(),
                    );
                }
            }
        }

        errors
    }
}

fn names_share_substring(a: &str, b: &str) -> bool {
    let (a, b) = (a.trim(), b.trim());
    !a.is_empty() && !b.is_empty() && (a.contains(b) || b.contains(a))
}
