//! Shapefile-split companion pipeline (spec.md §1 "Share", §2): re-encodes
//! a geodatabase's layers into size-capped per-layer shapefile parts. A
//! thin consumer of the Reader; it does not touch the validation pipeline.

use std::fs;
use std::path::{Path, PathBuf};

use geo::{Coord, Geometry, LineString};
use shapefile::dbase::{FieldValue as DbfValue, Record, TableWriterBuilder};
use shapefile::{Point as ShpPoint, Polygon as ShpPolygon, PolygonRing, Polyline, ShapeType};

use crate::model::feature::{AttrValue, GeometryKind};
use crate::model::rule::DataType;
use crate::model::{FieldDef, LayerInfo};
use crate::reader::DataSource;
use crate::{Error, Result};

/// Approximate on-disk bytes per coordinate pair (x, y as 8-byte doubles),
/// used to decide when a part is full. Matches the shapefile spec's 2-D
/// point record size; under-counts header/dbf overhead, which is fine for
/// a soft cap.
const BYTES_PER_COORD: u64 = 16;

#[derive(Debug, Clone, Copy)]
pub struct SplitConfig {
    pub max_bytes_per_part: u64,
}

impl Default for SplitConfig {
    fn default() -> Self {
        Self {
            max_bytes_per_part: 2_000_000_000,
        }
    }
}

#[derive(Debug, Clone)]
pub struct SplitResult {
    pub layer_id: String,
    pub parts: Vec<PathBuf>,
    pub feature_count: i64,
}

/// Splits every layer `source` exposes into `out_dir/<layer_id>_NNN.shp`
/// parts, rolling over to a new part once the running byte estimate for the
/// current part exceeds `config.max_bytes_per_part`.
pub fn split(source: &dyn DataSource, out_dir: &Path, config: &SplitConfig) -> Result<Vec<SplitResult>> {
    fs::create_dir_all(out_dir)?;
    let layers = source.list_layers()?;
    let mut results = Vec::with_capacity(layers.len());
    for layer in &layers {
        results.push(split_layer(source, layer, out_dir, config)?);
    }
    Ok(results)
}

fn split_layer(source: &dyn DataSource, layer: &LayerInfo, out_dir: &Path, config: &SplitConfig) -> Result<SplitResult> {
    let shape_type = shape_type_for(layer.geometry_type);
    let mut cursor = source.open_layer(&layer.id)?;

    let mut parts = Vec::new();
    let mut part_index = 0usize;
    let mut feature_count = 0i64;
    let mut bytes_in_part = 0u64;
    let mut writer = open_part(out_dir, &layer.id, part_index, shape_type, &layer.field_defs)?;

    while let Some(feature) = cursor.next()? {
        let Some(geometry) = feature.geometry.as_ref() else {
            continue;
        };
        let estimated_bytes = estimate_bytes(geometry);
        if bytes_in_part > 0 && bytes_in_part + estimated_bytes > config.max_bytes_per_part {
            finish_part(writer)?;
            parts.push(part_path(out_dir, &layer.id, part_index));
            part_index += 1;
            bytes_in_part = 0;
            writer = open_part(out_dir, &layer.id, part_index, shape_type, &layer.field_defs)?;
        }

        write_feature(&mut writer, geometry, &feature.attributes, &layer.field_defs)?;
        bytes_in_part += estimated_bytes;
        feature_count += 1;
    }

    finish_part(writer)?;
    parts.push(part_path(out_dir, &layer.id, part_index));

    Ok(SplitResult {
        layer_id: layer.id.clone(),
        parts,
        feature_count,
    })
}

fn shape_type_for(kind: GeometryKind) -> ShapeType {
    match kind {
        GeometryKind::Point | GeometryKind::MultiPoint => ShapeType::Multipoint,
        GeometryKind::LineString | GeometryKind::MultiLineString => ShapeType::Polyline,
        GeometryKind::Polygon | GeometryKind::MultiPolygon => ShapeType::Polygon,
        GeometryKind::Collection => ShapeType::Polygon,
    }
}

fn part_path(out_dir: &Path, layer_id: &str, part_index: usize) -> PathBuf {
    out_dir.join(format!("{layer_id}_{part_index:03}.shp"))
}

struct PartWriter {
    shp: shapefile::Writer<std::io::BufWriter<std::fs::File>>,
    dbf: shapefile::dbase::TableWriter<std::io::BufWriter<std::fs::File>>,
}

fn open_part(out_dir: &Path, layer_id: &str, part_index: usize, shape_type: ShapeType, field_defs: &[FieldDef]) -> Result<PartWriter> {
    let shp_path = part_path(out_dir, layer_id, part_index);
    let dbf_path = shp_path.with_extension("dbf");

    let shp = shapefile::Writer::from_path(&shp_path, shape_type).map_err(|e| Error::Corrupt {
        path: shp_path.display().to_string(),
        detail: e.to_string(),
    })?;

    let mut builder = TableWriterBuilder::new();
    for field in field_defs {
        let name = field.name.chars().take(10).collect::<String>();
        builder = match field.data_type {
            DataType::Integer => builder.add_numeric_field(name.as_str().try_into().expect("field name truncated to fit dbf name limit"), 18, 0),
            DataType::Numeric(p, s) => builder.add_numeric_field(name.as_str().try_into().expect("field name truncated to fit dbf name limit"), p as u8, s as u8),
            DataType::Text(n) | DataType::Char(n) => builder.add_character_field(name.as_str().try_into().expect("field name truncated to fit dbf name limit"), n.min(254) as u8),
            DataType::Date => builder.add_date_field(name.as_str().try_into().expect("field name truncated to fit dbf name limit")),
        };
    }
    let dbf = builder.build_with_file_dest(&dbf_path).map_err(|e| Error::Corrupt {
        path: dbf_path.display().to_string(),
        detail: e.to_string(),
    })?;

    Ok(PartWriter { shp, dbf })
}

fn finish_part(writer: PartWriter) -> Result<()> {
    drop(writer.shp);
    drop(writer.dbf);
    Ok(())
}

fn write_feature(writer: &mut PartWriter, geometry: &Geometry<f64>, attributes: &std::collections::HashMap<String, AttrValue>, field_defs: &[FieldDef]) -> Result<()> {
    write_shape(&mut writer.shp, geometry)?;

    let mut record = Record::default();
    for field in field_defs {
        let value = attributes.get(&field.name).cloned().unwrap_or(AttrValue::Null);
        record.insert(field.name.clone(), attr_to_dbf(&value));
    }
    writer.dbf.write_record(&record).map_err(|e| Error::Invariant(e.to_string()))?;
    Ok(())
}

fn attr_to_dbf(value: &AttrValue) -> DbfValue {
    match value {
        AttrValue::Null => DbfValue::Character(None),
        AttrValue::Integer(i) => DbfValue::Numeric(Some(*i as f64)),
        AttrValue::Real(f) => DbfValue::Numeric(Some(*f)),
        AttrValue::Text(s) => DbfValue::Character(Some(s.clone())),
        AttrValue::Bool(b) => DbfValue::Logical(Some(*b)),
    }
}

fn write_shape(shp: &mut shapefile::Writer<std::io::BufWriter<std::fs::File>>, geometry: &Geometry<f64>) -> Result<()> {
    match geometry {
        Geometry::Point(p) => shp
            .write_shape(&ShpPoint::new(p.x(), p.y()))
            .map_err(|e| Error::Invariant(e.to_string())),
        Geometry::MultiPoint(mp) => {
            let points: Vec<ShpPoint> = mp.0.iter().map(|p| ShpPoint::new(p.x(), p.y())).collect();
            shp.write_shape(&shapefile::Multipoint::new(points)).map_err(|e| Error::Invariant(e.to_string()))
        }
        Geometry::LineString(l) => {
            let polyline = Polyline::new(vec![linestring_to_points(l)]);
            shp.write_shape(&polyline).map_err(|e| Error::Invariant(e.to_string()))
        }
        Geometry::MultiLineString(ml) => {
            let parts = ml.0.iter().map(linestring_to_points).collect();
            shp.write_shape(&Polyline::new(parts)).map_err(|e| Error::Invariant(e.to_string()))
        }
        Geometry::Polygon(poly) => shp.write_shape(&polygon_to_shp(std::slice::from_ref(poly))).map_err(|e| Error::Invariant(e.to_string())),
        Geometry::MultiPolygon(mpoly) => shp.write_shape(&polygon_to_shp(&mpoly.0)).map_err(|e| Error::Invariant(e.to_string())),
        Geometry::GeometryCollection(_) => Ok(()),
        _ => Ok(()),
    }
}

fn linestring_to_points(line: &LineString<f64>) -> Vec<ShpPoint> {
    line.0.iter().map(|c| ShpPoint::new(c.x, c.y)).collect()
}

fn polygon_to_shp(polygons: &[geo::Polygon<f64>]) -> ShpPolygon {
    let mut rings = Vec::new();
    for polygon in polygons {
        rings.push(PolygonRing::Outer(coords_to_points(polygon.exterior())));
        for hole in polygon.interiors() {
            rings.push(PolygonRing::Inner(coords_to_points(hole)));
        }
    }
    ShpPolygon::new(rings)
}

fn coords_to_points(ring: &LineString<f64>) -> Vec<ShpPoint> {
    ring.0.iter().map(|c: &Coord<f64>| ShpPoint::new(c.x, c.y)).collect()
}

fn estimate_bytes(geometry: &Geometry<f64>) -> u64 {
    let coord_count = match geometry {
        Geometry::Point(_) => 1,
        Geometry::MultiPoint(mp) => mp.0.len(),
        Geometry::LineString(l) => l.0.len(),
        Geometry::MultiLineString(ml) => ml.0.iter().map(|l| l.0.len()).sum(),
        Geometry::Polygon(p) => p.exterior().0.len() + p.interiors().iter().map(|r| r.0.len()).sum::<usize>(),
        Geometry::MultiPolygon(mp) => mp
            .0
            .iter()
            .map(|p| p.exterior().0.len() + p.interiors().iter().map(|r| r.0.len()).sum::<usize>())
            .sum(),
        _ => 0,
    };
    coord_count as u64 * BYTES_PER_COORD
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::{point, Polygon};

    #[test]
    fn estimate_bytes_scales_with_vertex_count() {
        let point = Geometry::Point(point!(x: 0.0, y: 0.0));
        assert_eq!(estimate_bytes(&point), BYTES_PER_COORD);

        let square = Polygon::new(
            LineString::new(vec![
                Coord { x: 0.0, y: 0.0 },
                Coord { x: 1.0, y: 0.0 },
                Coord { x: 1.0, y: 1.0 },
                Coord { x: 0.0, y: 0.0 },
            ]),
            vec![],
        );
        assert_eq!(estimate_bytes(&Geometry::Polygon(square)), 4 * BYTES_PER_COORD);
    }

    #[test]
    fn shape_type_maps_polygon_kinds_to_polygon() {
        assert_eq!(shape_type_for(GeometryKind::Polygon), ShapeType::Polygon);
        assert_eq!(shape_type_for(GeometryKind::MultiPolygon), ShapeType::Polygon);
        assert_eq!(shape_type_for(GeometryKind::LineString), ShapeType::Polyline);
        assert_eq!(shape_type_for(GeometryKind::Point), ShapeType::Multipoint);
    }

    #[test]
    fn part_path_is_zero_padded() {
        let path = part_path(Path::new("/tmp/out"), "tn_buld", 2);
        assert_eq!(path, Path::new("/tmp/out/tn_buld_002.shp"));
    }
}
