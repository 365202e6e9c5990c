//! Line connectivity strategies (spec.md §4.5): `LineConnectivity`,
//! `LineConnectivityWithFilter`, `LineDisconnection`,
//! `LineDisconnectionWithAttribute`, `DefectiveConnection`.

use std::collections::HashMap;

use geoqc_index::snap::EndpointGraph;
use geoqc_index::SpatialIndex;

use crate::checks::geomutil::{lines_of, polygons_of};
use crate::filter::{should_skip, UnknownFieldWarnings};
use crate::model::error_record::{Severity, ValidationError};
use crate::model::feature::Feature;
use crate::model::rule::CaseType;
use crate::relations::{RelationContext, RelationStrategy};

/// Collects every feature's line endpoints, tagged with the owning fid.
fn all_endpoints(features: &[Feature]) -> (Vec<geo::Coord<f64>>, Vec<i64>) {
    let mut points = Vec::new();
    let mut owners = Vec::new();
    for f in features {
        let Some(g) = &f.geometry else { continue };
        for line in lines_of(g) {
            if let (Some(start), Some(end)) = (line.0.first(), line.0.last()) {
                points.push(*start);
                owners.push(f.fid);
                points.push(*end);
                owners.push(f.fid);
            }
        }
    }
    (points, owners)
}

pub struct LineConnectivity;

impl RelationStrategy for LineConnectivity {
    fn case_type(&self) -> CaseType {
        CaseType::LineConnectivity
    }

    fn run(&self, main: &[Feature], _main_index: &SpatialIndex, _related: &[Feature], _related_index: &SpatialIndex, ctx: &RelationContext) -> Vec<ValidationError> {
        run_connectivity(main, ctx, None)
    }
}

pub struct LineConnectivityWithFilter;

impl RelationStrategy for LineConnectivityWithFilter {
    fn case_type(&self) -> CaseType {
        CaseType::LineConnectivityWithFilter
    }

    fn run(&self, main: &[Feature], _main_index: &SpatialIndex, _related: &[Feature], _related_index: &SpatialIndex, ctx: &RelationContext) -> Vec<ValidationError> {
        run_connectivity(main, ctx, ctx.filter.as_ref())
    }
}

fn run_connectivity(main: &[Feature], ctx: &RelationContext, filter: Option<&crate::filter::CompiledFilter>) -> Vec<ValidationError> {
    let (points, owners) = all_endpoints(main);
    if points.is_empty() {
        return Vec::new();
    }
    let mut graph = EndpointGraph::build(&points, ctx.tolerance);
    let warnings = UnknownFieldWarnings::default();
    let mut errors = Vec::new();
    let by_fid: HashMap<i64, &Feature> = main.iter().map(|f| (f.fid, f)).collect();

    for i in 0..points.len() {
        let owner = owners[i];
        if let Some(f) = filter {
            let feature = by_fid[&owner];
            let (skip, _) = should_skip(f, feature, &ctx.rule_id, &warnings);
            if !skip {
                continue;
            }
        }

        // Connected to anything but itself means this endpoint is not a dangle.
        let connects_elsewhere = (0..points.len()).any(|j| j != i && owners[j] != owner && graph.same_component(i, j));
        if !connects_elsewhere {
            errors.push(
                ctx.error(
                    CaseType::LineConnectivity.code(),
                    format!("line {owner} has a disconnected endpoint"),
                    Severity::Warning,
                )
                .feature_id(owner)
                .location(points[i].x, points[i].y)
                .build(),
            );
        }
    }

    errors
}

pub struct LineDisconnection;

impl RelationStrategy for LineDisconnection {
    fn case_type(&self) -> CaseType {
        CaseType::LineDisconnection
    }

    fn run(&self, main: &[Feature], _main_index: &SpatialIndex, _related: &[Feature], _related_index: &SpatialIndex, ctx: &RelationContext) -> Vec<ValidationError> {
        let mut errors = Vec::new();
        for f in main {
            if ctx.is_cancelled() {
                break;
            }
            let Some(g) = &f.geometry else { continue };
            let mut points = Vec::new();
            for line in lines_of(g) {
                points.extend(line.0.windows(2).flat_map(|w| [w[0], w[1]]));
            }
            if points.len() < 2 {
                continue;
            }
            let mut graph = EndpointGraph::build(&points, ctx.tolerance);
            if graph.component_count() > 1 {
                errors.push(
                    ctx.error(
                        CaseType::LineDisconnection.code(),
                        format!("feature {} has disjoint sub-segments when snapped at tolerance", f.fid),
                        Severity::Error,
                    )
                    .feature_id(f.fid)
                    .metadata("component_count", graph.component_count())
                    .build(),
                );
            }
        }
        errors
    }
}

pub struct LineDisconnectionWithAttribute;

impl RelationStrategy for LineDisconnectionWithAttribute {
    fn case_type(&self) -> CaseType {
        CaseType::LineDisconnectionWithAttribute
    }

    fn run(&self, main: &[Feature], _main_index: &SpatialIndex, _related: &[Feature], _related_index: &SpatialIndex, ctx: &RelationContext) -> Vec<ValidationError> {
        let field = ctx.param("field").unwrap_or_default();
        let mut groups: HashMap<String, Vec<&Feature>> = HashMap::new();
        for f in main {
            let key = f.get(field).map(|v| format!("{v:?}")).unwrap_or_default();
            groups.entry(key).or_default().push(f);
        }

        let mut errors = Vec::new();
        for members in groups.values() {
            let mut points = Vec::new();
            let mut owners = Vec::new();
            for f in members {
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
            if points.len() < 2 {
                continue;
            }
            let mut graph = EndpointGraph::build(&points, ctx.tolerance);
            if graph.component_count() > 1 {
                for &fid in owners.iter().collect::<std::collections::HashSet<_>>() {
                    errors.push(
                        ctx.error(
                            CaseType::LineDisconnectionWithAttribute.code(),
                            format!("feature {fid} is disconnected from others sharing {field}"),
                            Severity::Error,
                        )
                        .feature_id(fid)
                        .field(field)
                        .build(),
                    );
                }
            }
        }
        errors
    }
}

pub struct DefectiveConnection;

impl RelationStrategy for DefectiveConnection {
    fn case_type(&self) -> CaseType {
        CaseType::DefectiveConnection
    }

    fn run(&self, main: &[Feature], _main_index: &SpatialIndex, related: &[Feature], related_index: &SpatialIndex, ctx: &RelationContext) -> Vec<ValidationError> {
        let same_layer = ctx.main_table == ctx.related_table;
        let related_by_fid = crate::relations::util::by_fid(related);
        let mut errors = Vec::new();
        let (main_points, main_owners) = all_endpoints(main);
        let mut graph = EndpointGraph::build(&main_points, ctx.tolerance);

        for (i, owner) in main_owners.iter().enumerate() {
            let to_other_line = (0..main_points.len()).any(|j| j != i && main_owners[j] != *owner && graph.same_component(i, j));
            if to_other_line {
                continue;
            }

            let feature = main.iter().find(|f| f.fid == *owner).expect("owner always present in main");
            let to_polygon_boundary = crate::relations::util::candidates(feature, related_index, &related_by_fid, ctx.tolerance, same_layer)
                .into_iter()
                .any(|r| {
                    r.geometry.as_ref().is_some_and(|rg| {
                        polygons_of(rg).iter().any(|p| {
                            p.exterior()
                                .0
                                .windows(2)
                                .map(|w| crate::checks::geomutil::point_to_segment_distance(main_points[i], w[0], w[1]))
                                .fold(f64::INFINITY, f64::min)
                                <= ctx.tolerance
                        })
                    })
                });

            if !to_polygon_boundary {
                errors.push(
                    ctx.error(
                        CaseType::DefectiveConnection.code(),
                        format!("line {owner} endpoint touches neither another line nor a polygon boundary"),
                        Severity::Error,
                    )
                    .feature_id(*owner)
                    .location(main_points[i].x, main_points[i].y)
                    .build(),
                );
            }
        }

        errors
    }
}
