//! CSV rule-family loading (spec.md §6): one file per rule family plus a
//! codelist and a criteria file. Conventions: UTF-8 (BOM optional), comma
//! separated, values containing commas double-quoted. A row whose first
//! non-whitespace character of the first column is `#` is commented out; an
//! `Enabled` column (`Y`/`N`, case-insensitive, defaults to `Y`) is a second
//! opt-out.

use std::collections::HashMap;
use std::fmt::Debug;
use std::path::Path;
use std::str::FromStr;

use polars::io::SerReader;
use polars::prelude::*;

use crate::codelist::CodelistStore;
use crate::model::feature::GeometryKind;
use crate::model::rule::{AttributeCheckType, AttributeRule, CaseType, CheckType, DataType as FieldType, GeometryRule, RelationRule, RuleMeta, SchemaRule, TableRule};
use crate::model::GeometryCriteria;
use crate::{Error, Result};

fn configuration(rule_id: &str, detail: impl Into<String>) -> Error {
    Error::Configuration { rule_id: rule_id.to_string(), detail: detail.into() }
}

/// Reads `path` into a DataFrame with every column forced to `String` (the
/// teacher's `read_pipe_delimited_txt` technique of disabling schema
/// inference entirely, rather than a named schema overwrite, since the
/// column set differs per rule family).
fn load_dataframe(path: &Path) -> Result<DataFrame> {
    let file = std::fs::File::open(path)?;
    Ok(CsvReadOptions::default().with_has_header(true).with_infer_schema_length(Some(0)).into_reader_with_file_handle(file).finish()?)
}

/// One CSV row as a lowercase-header-keyed map, plus the raw value of the
/// first column (used for the `#`-comment convention, which looks at the
/// literal cell, not the header name).
struct Row {
    fields: HashMap<String, String>,
    first_column_value: Option<String>,
}

impl Row {
    fn get(&self, name: &str) -> Option<&str> {
        self.fields.get(&name.to_ascii_lowercase()).map(String::as_str)
    }

    fn require(&self, name: &str, rule_id: &str) -> Result<&str> {
        self.get(name).ok_or_else(|| configuration(rule_id, format!("missing required column {name}")))
    }

    fn is_commented(&self) -> bool {
        self.first_column_value.as_deref().map(|v| v.trim_start().starts_with('#')).unwrap_or(false)
    }

    fn is_enabled(&self) -> bool {
        self.get("enabled").map(|v| v.trim().eq_ignore_ascii_case("y")).unwrap_or(true)
    }

    fn meta(&self, rule_id: &str) -> RuleMeta {
        RuleMeta { rule_id: rule_id.to_string(), enabled: self.is_enabled(), note: self.get("note").map(str::to_string) }
    }
}

fn rows(df: &DataFrame) -> Result<Vec<Row>> {
    let names: Vec<String> = df.get_column_names().iter().map(|s| s.to_string()).collect();
    let Some(first_column) = names.first().cloned() else {
        return Ok(Vec::new());
    };

    let mut columns: Vec<(String, Vec<Option<String>>)> = Vec::with_capacity(names.len());
    for name in &names {
        let series = df.column(name)?;
        let chunked = series.str()?;
        columns.push((name.to_ascii_lowercase(), chunked.into_iter().map(|v| v.map(str::to_string)).collect()));
    }
    let first_column_lower = first_column.to_ascii_lowercase();

    let mut out = Vec::with_capacity(df.height());
    for i in 0..df.height() {
        let mut fields = HashMap::with_capacity(columns.len());
        let mut first_column_value = None;
        for (name, values) in &columns {
            if let Some(Some(value)) = values.get(i) {
                if *name == first_column_lower {
                    first_column_value = Some(value.clone());
                }
                fields.insert(name.clone(), value.clone());
            }
        }
        out.push(Row { fields, first_column_value });
    }
    Ok(out)
}

/// Matches a CSV cell against a `Copy + Debug` enum's variant name,
/// case-insensitively, using `all` (each family's own `ALL` const) rather
/// than duplicating the variant list in a hand-written match.
fn parse_enum<T: Copy + Debug>(value: &str, all: &[T]) -> Option<T> {
    all.iter().find(|v| format!("{v:?}").eq_ignore_ascii_case(value.trim())).copied()
}

fn parse_bool(value: &str) -> bool {
    value.trim().eq_ignore_ascii_case("y") || value.trim().eq_ignore_ascii_case("true")
}

fn parse_opt<T: FromStr>(row: &Row, name: &str) -> Option<T> {
    row.get(name).and_then(|v| if v.trim().is_empty() { None } else { v.trim().parse().ok() })
}

pub fn load_table_rules(path: &Path) -> Result<Vec<TableRule>> {
    let df = load_dataframe(path)?;
    let mut out = Vec::new();
    for row in rows(&df)?.into_iter().filter(|r| !r.is_commented()) {
        let rule_id = row.require("rule_id", "<table.csv>")?.to_string();
        let table_id = row.require("table_id", &rule_id)?.to_string();
        let table_name = row.get("table_name").unwrap_or(&table_id).to_string();
        let expected_geom_type = row
            .require("expected_geom_type", &rule_id)?
            .parse::<GeometryKind>()
            .map_err(|e| configuration(&rule_id, e))?;
        let expected_epsg = parse_opt::<i32>(&row, "expected_epsg");
        out.push(TableRule { meta: row.meta(&rule_id), table_id, table_name, expected_geom_type, expected_epsg });
    }
    Ok(out)
}

pub fn load_schema_rules(path: &Path) -> Result<Vec<SchemaRule>> {
    let df = load_dataframe(path)?;
    let mut out = Vec::new();
    for row in rows(&df)?.into_iter().filter(|r| !r.is_commented()) {
        let rule_id = row.require("rule_id", "<schema.csv>")?.to_string();
        let table_id = row.require("table_id", &rule_id)?.to_string();
        let field_name = row.require("field_name", &rule_id)?.to_string();
        let data_type_name = row.require("data_type", &rule_id)?;
        let data_type = match data_type_name.trim().to_ascii_lowercase().as_str() {
            "integer" => FieldType::Integer,
            "date" => FieldType::Date,
            "text" => FieldType::Text(parse_opt::<u32>(&row, "length").unwrap_or(255)),
            "char" => FieldType::Char(parse_opt::<u32>(&row, "length").unwrap_or(1)),
            "numeric" => FieldType::Numeric(parse_opt::<u8>(&row, "precision").unwrap_or(18), parse_opt::<u8>(&row, "scale").unwrap_or(0)),
            other => return Err(configuration(&rule_id, format!("unknown data_type {other}"))),
        };
        out.push(SchemaRule {
            meta: row.meta(&rule_id),
            table_id,
            field_name,
            data_type,
            is_pk: row.get("is_pk").map(parse_bool).unwrap_or(false),
            is_uk: row.get("is_uk").map(parse_bool).unwrap_or(false),
            is_fk: row.get("is_fk").map(parse_bool).unwrap_or(false),
            is_not_null: row.get("is_not_null").map(parse_bool).unwrap_or(false),
            ref_table: row.get("ref_table").map(str::to_string),
            ref_field: row.get("ref_field").map(str::to_string),
        });
    }
    Ok(out)
}

pub fn load_geometry_rules(path: &Path) -> Result<Vec<GeometryRule>> {
    let df = load_dataframe(path)?;
    let mut out = Vec::new();
    for row in rows(&df)?.into_iter().filter(|r| !r.is_commented()) {
        let rule_id = row.require("rule_id", "<geometry.csv>")?.to_string();
        let table_id = row.require("table_id", &rule_id)?.to_string();
        let geom_type = row.require("geom_type", &rule_id)?.parse::<GeometryKind>().map_err(|e| configuration(&rule_id, e))?;
        let flags_raw = row.require("flags", &rule_id)?;
        let flags = flags_raw
            .split('|')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|s| parse_enum(s, &CheckType::ALL).ok_or_else(|| configuration(&rule_id, format!("unknown CheckType {s}"))))
            .collect::<Result<_>>()?;
        out.push(GeometryRule { meta: row.meta(&rule_id), table_id, geom_type, flags, filter: row.get("filter").map(str::to_string) });
    }
    Ok(out)
}

pub fn load_relation_rules(path: &Path) -> Result<Vec<RelationRule>> {
    let df = load_dataframe(path)?;
    let mut out = Vec::new();
    for row in rows(&df)?.into_iter().filter(|r| !r.is_commented()) {
        let rule_id = row.require("rule_id", "<relation.csv>")?.to_string();
        let case_type_raw = row.require("case_type", &rule_id)?;
        let case_type = parse_enum(case_type_raw, &CaseType::ALL).ok_or_else(|| configuration(&rule_id, format!("unknown CaseType {case_type_raw}")))?;
        out.push(RelationRule {
            meta: row.meta(&rule_id),
            case_type,
            main_table: row.require("main_table", &rule_id)?.to_string(),
            related_table: row.require("related_table", &rule_id)?.to_string(),
            filter: row.get("filter").map(str::to_string),
            tolerance: parse_opt::<f64>(&row, "tolerance").unwrap_or(0.0),
            params: parse_params(row.get("params")),
        });
    }
    Ok(out)
}

pub fn load_attribute_rules(path: &Path) -> Result<Vec<AttributeRule>> {
    let df = load_dataframe(path)?;
    let mut out = Vec::new();
    for row in rows(&df)?.into_iter().filter(|r| !r.is_commented()) {
        let rule_id = row.require("rule_id", "<attribute.csv>")?.to_string();
        let check_type_raw = row.require("check_type", &rule_id)?;
        let check_type = parse_enum(check_type_raw, &AttributeCheckType::ALL).ok_or_else(|| configuration(&rule_id, format!("unknown AttributeCheckType {check_type_raw}")))?;
        out.push(AttributeRule {
            meta: row.meta(&rule_id),
            table_id: row.require("table_id", &rule_id)?.to_string(),
            field: row.require("field", &rule_id)?.to_string(),
            check_type,
            params: parse_params(row.get("params")),
        });
    }
    Ok(out)
}

/// `params` cells are a single column carrying `key=val;key=val` pairs
/// (mirrors the filter option-suffix grammar in spec.md §4.2, reused here so
/// the CSV convention stays uniform across families).
fn parse_params(raw: Option<&str>) -> HashMap<String, String> {
    let Some(raw) = raw else { return HashMap::new() };
    raw.split(';')
        .filter_map(|pair| {
            let mut parts = pair.splitn(2, '=');
            let key = parts.next()?.trim();
            let val = parts.next()?.trim();
            if key.is_empty() {
                None
            } else {
                Some((key.to_string(), val.to_string()))
            }
        })
        .collect()
}

/// Loads the codelist CSV (`code_set_id, value` per row, repeated rows per
/// set) into a fresh `CodelistStore`.
pub fn load_codelist(path: &Path) -> Result<CodelistStore> {
    let df = load_dataframe(path)?;
    let store = CodelistStore::new();
    let mut grouped: HashMap<String, Vec<String>> = HashMap::new();
    for row in rows(&df)?.into_iter().filter(|r| !r.is_commented()) {
        let Some(code_set_id) = row.get("code_set_id") else { continue };
        let Some(value) = row.get("value") else { continue };
        grouped.entry(code_set_id.to_string()).or_default().push(value.to_string());
    }
    for (code_set_id, values) in grouped {
        store.insert(code_set_id, values);
    }
    Ok(store)
}

/// Loads the single-row criteria CSV into `GeometryCriteria`, falling back
/// to defaults for any column the file omits.
pub fn load_criteria(path: &Path) -> Result<GeometryCriteria> {
    let df = load_dataframe(path)?;
    let Some(row) = rows(&df)?.into_iter().find(|r| !r.is_commented()) else {
        return Ok(GeometryCriteria::default());
    };
    let defaults = GeometryCriteria::default();
    Ok(GeometryCriteria {
        min_line_length: parse_opt(&row, "min_line_length").unwrap_or(defaults.min_line_length),
        min_polygon_area: parse_opt(&row, "min_polygon_area").unwrap_or(defaults.min_polygon_area),
        sliver_ratio: parse_opt(&row, "sliver_ratio").unwrap_or(defaults.sliver_ratio),
        spike_angle_deg: parse_opt(&row, "spike_angle_deg").unwrap_or(defaults.spike_angle_deg),
        min_vertex_count: parse_opt(&row, "min_vertex_count").unwrap_or(defaults.min_vertex_count),
        undershoot_tolerance: parse_opt(&row, "undershoot_tolerance").unwrap_or(defaults.undershoot_tolerance),
        overlap_area_tol: parse_opt(&row, "overlap_area_tol").unwrap_or(defaults.overlap_area_tol),
        self_overlap_tol: parse_opt(&row, "self_overlap_tol").unwrap_or(defaults.self_overlap_tol),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn csv_file(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn commented_and_disabled_rows_are_handled_separately() {
        let file = csv_file("rule_id,table_id,table_name,expected_geom_type,expected_epsg,enabled\n#r0,tn_x,X,Polygon,5186,Y\nr1,tn_buld,Buildings,Polygon,5186,N\nr2,tn_road,Roads,LineString,5186,Y\n");
        let rules = load_table_rules(file.path()).unwrap();
        assert_eq!(rules.len(), 2);
        assert_eq!(rules[0].meta.rule_id, "r1");
        assert!(!rules[0].meta.enabled);
        assert!(rules[1].meta.enabled);
    }

    #[test]
    fn geometry_rule_flags_are_pipe_delimited() {
        let file = csv_file("rule_id,table_id,geom_type,flags,filter\nr1,tn_road,LineString,Duplicate|ShortObject,\n");
        let rules = load_geometry_rules(file.path()).unwrap();
        assert_eq!(rules.len(), 1);
        assert_eq!(rules[0].flags.len(), 2);
        assert!(rules[0].flags.contains(&CheckType::Duplicate));
        assert!(rules[0].flags.contains(&CheckType::ShortObject));
    }

    #[test]
    fn unknown_case_type_is_a_configuration_error() {
        let file = csv_file("rule_id,case_type,main_table,related_table,tolerance\nr1,NotARealCase,tn_a,tn_b,0.1\n");
        let err = load_relation_rules(file.path()).unwrap_err();
        assert!(matches!(err, Error::Configuration { .. }));
    }

    #[test]
    fn params_column_parses_key_value_pairs() {
        let file = csv_file("rule_id,case_type,main_table,related_table,tolerance,params\nr1,PointSpacingCheck,tn_p,tn_p,1.0,min_spacing_m=2.0;scale=1000\n");
        let rules = load_relation_rules(file.path()).unwrap();
        assert_eq!(rules[0].params.get("min_spacing_m"), Some(&"2.0".to_string()));
        assert_eq!(rules[0].params.get("scale"), Some(&"1000".to_string()));
    }

    #[test]
    fn codelist_groups_values_by_code_set_id() {
        let file = csv_file("code_set_id,value\nBLDG_TYPE,A\nBLDG_TYPE,B\nROAD_TYPE,1\n");
        let store = load_codelist(file.path()).unwrap();
        assert_eq!(store.is_valid("BLDG_TYPE", "A"), Some(true));
        assert_eq!(store.is_valid("BLDG_TYPE", "C"), Some(false));
        assert_eq!(store.is_valid("ROAD_TYPE", "1"), Some(true));
    }

    #[test]
    fn criteria_missing_columns_fall_back_to_defaults() {
        let file = csv_file("min_line_length\n2.5\n");
        let criteria = load_criteria(file.path()).unwrap();
        assert_eq!(criteria.min_line_length, 2.5);
        assert_eq!(criteria.min_polygon_area, GeometryCriteria::default().min_polygon_area);
    }
}
