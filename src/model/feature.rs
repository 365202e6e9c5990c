//! `Feature`: an opaque handle with fid, optional geometry, and attributes.

use std::collections::HashMap;

use geo::Geometry;

/// Scalar attribute value. `Null` is distinct from an absent key so that
/// `NotNull` checks can tell "field present but empty" from "field missing".
#[derive(Debug, Clone, PartialEq)]
pub enum AttrValue {
    Null,
    Integer(i64),
    Real(f64),
    Text(String),
    Bool(bool),
}

impl AttrValue {
    pub fn is_null(&self) -> bool {
        matches!(self, AttrValue::Null)
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            AttrValue::Integer(i) => Some(*i as f64),
            AttrValue::Real(f) => Some(*f),
            AttrValue::Text(s) => s.trim().parse().ok(),
            AttrValue::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
            AttrValue::Null => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            AttrValue::Text(s) => Some(s.as_str()),
            _ => None,
        }
    }

    /// Case-insensitive text comparison, used throughout the Feature Filter
    /// and code-value matching (spec.md §4.2).
    pub fn eq_ignore_case(&self, other: &str) -> bool {
        match self {
            AttrValue::Text(s) => s.eq_ignore_ascii_case(other),
            AttrValue::Integer(i) => i.to_string().eq_ignore_ascii_case(other),
            AttrValue::Real(f) => f.to_string().eq_ignore_ascii_case(other),
            AttrValue::Bool(b) => b.to_string().eq_ignore_ascii_case(other),
            AttrValue::Null => false,
        }
    }
}

/// Mirrors the spec's geometry variant list for reporting/dispatch, kept
/// alongside the real `geo::Geometry<f64>` payload rather than replacing it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GeometryKind {
    Point,
    MultiPoint,
    LineString,
    MultiLineString,
    Polygon,
    MultiPolygon,
    Collection,
}

impl GeometryKind {
    pub fn of(geometry: &Geometry<f64>) -> Self {
        match geometry {
            Geometry::Point(_) => GeometryKind::Point,
            Geometry::MultiPoint(_) => GeometryKind::MultiPoint,
            Geometry::LineString(_) => GeometryKind::LineString,
            Geometry::MultiLineString(_) => GeometryKind::MultiLineString,
            Geometry::Polygon(_) => GeometryKind::Polygon,
            Geometry::MultiPolygon(_) => GeometryKind::MultiPolygon,
            Geometry::GeometryCollection(_) => GeometryKind::Collection,
            // Curved/rect/triangle primitives are linearized by the reader
            // before a Feature is ever constructed; treat anything else as
            // a fallback collection so dispatch never panics.
            _ => GeometryKind::Collection,
        }
    }
}

impl std::str::FromStr for GeometryKind {
    type Err = String;

    /// Matches a CSV rule's `expected_geom_type` column against the variant
    /// name, case-insensitively (spec.md §6).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            s if s.eq_ignore_ascii_case("point") => Ok(GeometryKind::Point),
            s if s.eq_ignore_ascii_case("multipoint") => Ok(GeometryKind::MultiPoint),
            s if s.eq_ignore_ascii_case("linestring") || s.eq_ignore_ascii_case("line") => Ok(GeometryKind::LineString),
            s if s.eq_ignore_ascii_case("multilinestring") => Ok(GeometryKind::MultiLineString),
            s if s.eq_ignore_ascii_case("polygon") => Ok(GeometryKind::Polygon),
            s if s.eq_ignore_ascii_case("multipolygon") => Ok(GeometryKind::MultiPolygon),
            s if s.eq_ignore_ascii_case("collection") => Ok(GeometryKind::Collection),
            other => Err(format!("unknown geometry type: {other}")),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Feature {
    pub fid: i64,
    pub geometry: Option<Geometry<f64>>,
    pub attributes: HashMap<String, AttrValue>,
}

impl Feature {
    pub fn new(fid: i64, geometry: Option<Geometry<f64>>) -> Self {
        Self {
            fid,
            geometry,
            attributes: HashMap::new(),
        }
    }

    pub fn get(&self, field: &str) -> Option<&AttrValue> {
        self.attributes.get(field)
    }

    pub fn geometry_kind(&self) -> Option<GeometryKind> {
        self.geometry.as_ref().map(GeometryKind::of)
    }

    /// Per the common base behavior in spec.md §4.4: a feature with no
    /// geometry, or an empty one, is skipped by every geometry strategy.
    pub fn has_usable_geometry(&self) -> bool {
        match &self.geometry {
            None => false,
            Some(Geometry::Polygon(p)) => !p.exterior().0.is_empty(),
            Some(Geometry::MultiPolygon(mp)) => !mp.0.is_empty(),
            Some(Geometry::LineString(l)) => l.0.len() >= 2,
            Some(Geometry::MultiLineString(ml)) => !ml.0.is_empty(),
            Some(Geometry::Point(_)) => true,
            Some(Geometry::MultiPoint(mp)) => !mp.0.is_empty(),
            Some(Geometry::GeometryCollection(c)) => !c.0.is_empty(),
            Some(_) => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::{point, Geometry};

    #[test]
    fn null_attribute_is_null() {
        assert!(AttrValue::Null.is_null());
        assert!(!AttrValue::Integer(0).is_null());
    }

    #[test]
    fn text_parses_to_f64() {
        assert_eq!(AttrValue::Text(" 3.5 ".into()).as_f64(), Some(3.5));
        assert_eq!(AttrValue::Text("abc".into()).as_f64(), None);
    }

    #[test]
    fn feature_without_geometry_is_unusable() {
        let f = Feature::new(1, None);
        assert!(!f.has_usable_geometry());
    }

    #[test]
    fn feature_with_point_geometry_is_usable() {
        let f = Feature::new(1, Some(Geometry::Point(point!(x: 0.0, y: 0.0))));
        assert!(f.has_usable_geometry());
        assert_eq!(f.geometry_kind(), Some(GeometryKind::Point));
    }
}
