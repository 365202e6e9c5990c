//! `LayerInfo`: layer-level metadata returned by the reader.

use crate::model::feature::GeometryKind;
use crate::model::rule::DataType;

#[derive(Debug, Clone)]
pub struct FieldDef {
    pub name: String,
    pub data_type: DataType,
    pub width: Option<u32>,
    pub precision: Option<u32>,
    pub nullable: bool,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Extent {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
}

#[derive(Debug, Clone)]
pub struct LayerInfo {
    pub id: String,
    pub display_name: String,
    pub geometry_type: GeometryKind,
    pub epsg: Option<i32>,
    pub field_defs: Vec<FieldDef>,
    pub extent: Option<Extent>,
    pub feature_count: i64,
}

impl LayerInfo {
    pub fn field(&self, name: &str) -> Option<&FieldDef> {
        self.field_defs
            .iter()
            .find(|f| f.name.eq_ignore_ascii_case(name))
    }
}
