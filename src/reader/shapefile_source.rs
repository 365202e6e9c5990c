//! `ShapefileDirSource`: treats a geodatabase as a directory of one
//! shapefile per layer plus a sentinel file, grounded in the teacher's
//! `shapefile` dependency and its `io::pack` directory-of-files convention.
//! This is a deliberate substitute for a GDB binary parser (out of scope
//! per the Non-goals): it keeps faithful *cursor contract* semantics
//! (restartable, forward-only, typed integrity pre-checks) without
//! reimplementing a closed binary format.

use std::path::{Path, PathBuf};

use geo::{Coord, Geometry, LineString, MultiLineString, MultiPoint, MultiPolygon, Point, Polygon};
use shapefile::dbase::FieldValue;
use shapefile::{PolygonRing, Shape};
use tracing::warn;

use crate::error::{Error, Result};
use crate::model::feature::{AttrValue, GeometryKind};
use crate::model::{Extent, FieldDef, Feature, LayerInfo};
use crate::model::rule::DataType;
use crate::reader::{integrity, DataSource, LayerCursor};

pub struct ShapefileDirSource {
    root: PathBuf,
}

impl ShapefileDirSource {
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        integrity::check(&root)?;
        Ok(Self { root })
    }

    fn layer_stems(&self) -> Result<Vec<String>> {
        let mut stems = Vec::new();
        for entry in std::fs::read_dir(&self.root).map_err(Error::Io)? {
            let entry = entry.map_err(Error::Io)?;
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) == Some("shp") {
                if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                    stems.push(stem.to_string());
                }
            }
        }
        stems.sort();
        Ok(stems)
    }

    fn shp_path(&self, id: &str) -> PathBuf {
        self.root.join(format!("{id}.shp"))
    }
}

impl DataSource for ShapefileDirSource {
    fn list_layers(&self) -> Result<Vec<LayerInfo>> {
        self.layer_stems()?
            .into_iter()
            .map(|id| layer_info(&self.root, &id))
            .collect()
    }

    fn open_layer(&self, id: &str) -> Result<Box<dyn LayerCursor>> {
        Ok(Box::new(ShapefileCursor::open(&self.shp_path(id))?))
    }
}

fn layer_info(root: &Path, id: &str) -> Result<LayerInfo> {
    let shp_path = root.join(format!("{id}.shp"));
    let mut reader = shapefile::Reader::from_path(&shp_path).map_err(|e| Error::Corrupt {
        path: shp_path.display().to_string(),
        detail: e.to_string(),
    })?;

    // The shapefile crate does not expose dbf field metadata independent of
    // a record; infer the schema (name + type) from the first record's
    // field values rather than pinning to a specific dbase FieldInfo API.
    let field_defs: Vec<FieldDef> = reader
        .iter_shapes_and_records()
        .next()
        .and_then(|res| res.ok())
        .map(|(_, record)| {
            record
                .into_iter()
                .map(|(name, value)| field_def_from_value(name, &value))
                .collect()
        })
        .unwrap_or_default();

    let header_bbox = reader.header().bbox;
    let extent = Some(Extent {
        min_x: header_bbox.min.x,
        min_y: header_bbox.min.y,
        max_x: header_bbox.max.x,
        max_y: header_bbox.max.y,
    });

    let geometry_type = match reader.header().shape_type {
        shapefile::ShapeType::Point | shapefile::ShapeType::PointZ => GeometryKind::Point,
        shapefile::ShapeType::Multipoint | shapefile::ShapeType::MultipointZ => {
            GeometryKind::MultiPoint
        }
        shapefile::ShapeType::Polyline | shapefile::ShapeType::PolylineZ => {
            GeometryKind::MultiLineString
        }
        shapefile::ShapeType::Polygon | shapefile::ShapeType::PolygonZ => {
            GeometryKind::MultiPolygon
        }
        _ => GeometryKind::Collection,
    };

    let feature_count = reader.iter_shapes_and_records().count() as i64;

    Ok(LayerInfo {
        id: id.to_string(),
        display_name: id.to_string(),
        geometry_type,
        epsg: read_epsg(root, id),
        field_defs,
        extent,
        feature_count,
    })
}

/// Reads an accompanying `.prj` WKT file's trailing `AUTHORITY["EPSG","n"]`
/// clause, when present. Best-effort: malformed/absent `.prj` yields `None`
/// rather than failing layer enumeration.
fn read_epsg(root: &Path, id: &str) -> Option<i32> {
    let prj = std::fs::read_to_string(root.join(format!("{id}.prj"))).ok()?;
    let marker = "AUTHORITY[\"EPSG\",\"";
    let start = prj.rfind(marker)? + marker.len();
    let rest = &prj[start..];
    let end = rest.find('"')?;
    rest[..end].parse().ok()
}

fn field_def_from_value(name: String, value: &FieldValue) -> FieldDef {
    let data_type = match value {
        FieldValue::Numeric(_) | FieldValue::Currency(_) | FieldValue::Double(_) => {
            DataType::Numeric(19, 6)
        }
        FieldValue::Float(_) => DataType::Numeric(19, 6),
        FieldValue::Integer(_) => DataType::Integer,
        FieldValue::Date(_) | FieldValue::DateTime(_) => DataType::Date,
        FieldValue::Logical(_) => DataType::Char(1),
        _ => DataType::Text(254),
    };
    FieldDef {
        name,
        data_type,
        width: None,
        precision: None,
        nullable: true,
    }
}

fn field_value_to_attr(value: &FieldValue) -> AttrValue {
    match value {
        FieldValue::Character(Some(s)) => AttrValue::Text(s.clone()),
        FieldValue::Character(None) => AttrValue::Null,
        FieldValue::Memo(s) => AttrValue::Text(s.clone()),
        FieldValue::Numeric(Some(n)) => AttrValue::Real(*n),
        FieldValue::Numeric(None) => AttrValue::Null,
        FieldValue::Currency(n) | FieldValue::Double(n) => AttrValue::Real(*n),
        FieldValue::Float(Some(f)) => AttrValue::Real(*f as f64),
        FieldValue::Float(None) => AttrValue::Null,
        FieldValue::Integer(i) => AttrValue::Integer(*i as i64),
        FieldValue::Logical(Some(b)) => AttrValue::Bool(*b),
        FieldValue::Logical(None) => AttrValue::Null,
        FieldValue::Date(Some(d)) => AttrValue::Text(format!("{d:?}")),
        FieldValue::Date(None) => AttrValue::Null,
        _ => AttrValue::Null,
    }
}

/// Converts a raw shapefile shape into `geo`'s geometry type, dropping Z/M
/// dimensions (the engine works in 2-D, per spec.md §3) and rejecting shapes
/// it cannot express (Null, Multipatch) with a Configuration-level warning
/// rather than silently passing them through (spec.md §9 "Curved
/// geometries").
fn shape_to_geometry(shape: Shape) -> Option<Geometry<f64>> {
    match shape {
        Shape::Point(p) => Some(Geometry::Point(Point::new(p.x, p.y))),
        Shape::PointZ(p) => Some(Geometry::Point(Point::new(p.x, p.y))),
        Shape::Multipoint(mp) => Some(Geometry::MultiPoint(MultiPoint::new(
            mp.points().iter().map(|p| Point::new(p.x, p.y)).collect(),
        ))),
        Shape::MultipointZ(mp) => Some(Geometry::MultiPoint(MultiPoint::new(
            mp.points().iter().map(|p| Point::new(p.x, p.y)).collect(),
        ))),
        Shape::Polyline(pl) => Some(polyline_to_geometry(
            pl.parts().iter().map(|part| part.iter().map(|p| Coord { x: p.x, y: p.y }).collect()).collect(),
        )),
        Shape::PolylineZ(pl) => Some(polyline_to_geometry(
            pl.parts().iter().map(|part| part.iter().map(|p| Coord { x: p.x, y: p.y }).collect()).collect(),
        )),
        Shape::Polygon(poly) => Some(polygon_rings_to_geometry(
            poly.rings()
                .iter()
                .map(|r| ring_to_coords(r))
                .collect(),
        )),
        Shape::PolygonZ(poly) => Some(polygon_rings_to_geometry(
            poly.rings()
                .iter()
                .map(|r| ring_to_coords(r))
                .collect(),
        )),
        Shape::NullShape => None,
        other => {
            warn!(shape = ?other, "unsupported shapefile geometry type, skipping");
            None
        }
    }
}

/// Implemented for both `shapefile::Point` and `shapefile::PointZ` so ring
/// extraction works identically for `Polygon` and `PolygonZ` shapes (Z is
/// dropped, the engine is 2-D only per spec.md §3).
trait PlanarXy {
    fn xy(&self) -> (f64, f64);
}

impl PlanarXy for shapefile::Point {
    fn xy(&self) -> (f64, f64) {
        (self.x, self.y)
    }
}

impl PlanarXy for shapefile::PointZ {
    fn xy(&self) -> (f64, f64) {
        (self.x, self.y)
    }
}

fn ring_to_coords<P: PlanarXy>(ring: &PolygonRing<P>) -> (bool, Vec<Coord<f64>>) {
    let (is_outer, points) = match ring {
        PolygonRing::Outer(pts) => (true, pts),
        PolygonRing::Inner(pts) => (false, pts),
    };
    (
        is_outer,
        points
            .iter()
            .map(|p| {
                let (x, y) = p.xy();
                Coord { x, y }
            })
            .collect(),
    )
}

fn close_ring(mut coords: Vec<Coord<f64>>) -> Vec<Coord<f64>> {
    if let (Some(first), Some(last)) = (coords.first().copied(), coords.last().copied()) {
        if first != last {
            coords.push(first);
        }
    }
    coords
}

fn polyline_to_geometry(parts: Vec<Vec<Coord<f64>>>) -> Geometry<f64> {
    let mut lines: Vec<LineString<f64>> = parts.into_iter().map(LineString::new).collect();
    if lines.len() == 1 {
        Geometry::LineString(lines.pop().unwrap())
    } else {
        Geometry::MultiLineString(MultiLineString::new(lines))
    }
}

/// Groups rings the way the shapefile spec does: each `Outer` ring starts a
/// new polygon; subsequent `Inner` rings (until the next `Outer`) become its
/// holes. A stray leading `Inner` ring (malformed input) is treated as its
/// own outer ring defensively rather than dropped.
fn polygon_rings_to_geometry(rings: Vec<(bool, Vec<Coord<f64>>)>) -> Geometry<f64> {
    let mut polygons: Vec<(Vec<Coord<f64>>, Vec<Vec<Coord<f64>>>)> = Vec::new();
    for (is_outer, coords) in rings {
        let coords = close_ring(coords);
        if is_outer || polygons.is_empty() {
            polygons.push((coords, Vec::new()));
        } else {
            polygons.last_mut().unwrap().1.push(coords);
        }
    }

    let mut geo_polygons: Vec<Polygon<f64>> = polygons
        .into_iter()
        .map(|(outer, holes)| {
            Polygon::new(
                LineString::new(outer),
                holes.into_iter().map(LineString::new).collect(),
            )
        })
        .collect();

    if geo_polygons.len() == 1 {
        Geometry::Polygon(geo_polygons.pop().unwrap())
    } else {
        Geometry::MultiPolygon(MultiPolygon::new(geo_polygons))
    }
}

struct ShapefileCursor {
    path: PathBuf,
    reader: shapefile::Reader<std::io::BufReader<std::fs::File>, std::io::BufReader<std::fs::File>>,
    next_fid: i64,
}

impl ShapefileCursor {
    fn open(path: &Path) -> Result<Self> {
        let reader = shapefile::Reader::from_path(path).map_err(|e| Error::Corrupt {
            path: path.display().to_string(),
            detail: e.to_string(),
        })?;
        Ok(Self {
            path: path.to_path_buf(),
            reader,
            next_fid: 0,
        })
    }
}

impl LayerCursor for ShapefileCursor {
    fn reset(&mut self) -> Result<()> {
        *self = ShapefileCursor::open(&self.path)?;
        Ok(())
    }

    fn next(&mut self) -> Result<Option<Feature>> {
        // `iter_shapes_and_records` borrows `&mut self.reader`; the
        // underlying shp/dbf file cursors (not the iterator) hold the read
        // position, so constructing a fresh iterator per call and taking
        // only its first item still walks the file forward exactly once
        // per `next()` — this sidesteps storing a self-referential iterator
        // on the struct.
        let Some(item) = self.reader.iter_shapes_and_records().next() else {
            return Ok(None);
        };
        let (shape, record) = item.map_err(|e| Error::Corrupt {
            path: self.path.display().to_string(),
            detail: e.to_string(),
        })?;

        let fid = self.next_fid;
        self.next_fid += 1;

        let geometry = shape_to_geometry(shape);
        let mut feature = Feature::new(fid, geometry);
        for (name, value) in record.into_iter() {
            feature.attributes.insert(name, field_value_to_attr(&value));
        }
        Ok(Some(feature))
    }

    fn count(&mut self, force_scan: bool) -> Result<i64> {
        if !force_scan {
            return Ok(-1);
        }
        let count = shapefile::Reader::from_path(&self.path)
            .map_err(|e| Error::Corrupt {
                path: self.path.display().to_string(),
                detail: e.to_string(),
            })?
            .iter_shapes_and_records()
            .count();
        Ok(count as i64)
    }

    fn extent(&self) -> Option<Extent> {
        let bbox = self.reader.header().bbox;
        Some(Extent {
            min_x: bbox.min.x,
            min_y: bbox.min.y,
            max_x: bbox.max.x,
            max_y: bbox.max.y,
        })
    }
}
