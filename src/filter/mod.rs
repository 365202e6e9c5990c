//! Feature Filter (spec.md §4.2): parses a filter expression once per rule
//! into an AST, then evaluates it per feature.

mod ast;
mod change_filter;
mod parser;

pub use ast::{FilterExpr, Op};
pub use change_filter::{apply_change_filter, ChangeFilterOutcome};
pub use parser::parse;

use std::collections::HashMap;
use std::sync::Mutex;

use crate::model::feature::{AttrValue, Feature};

/// Parsed filter expression plus its option bag (`expr;key=val;key=val`).
#[derive(Debug, Clone)]
pub struct CompiledFilter {
    pub expr: Option<FilterExpr>,
    pub options: HashMap<String, String>,
}

impl CompiledFilter {
    pub fn compile(raw: &str) -> Self {
        parser::parse(raw)
    }

    pub fn option(&self, key: &str) -> Option<&str> {
        self.options.get(key).map(|s| s.as_str())
    }
}

/// Tracks which `(rule_id, field)` pairs have already logged the "unknown
/// field" warning, so each pair logs at most once per process (spec.md
/// §4.2: "log a warning once per `(rule, field)`").
#[derive(Default)]
pub struct UnknownFieldWarnings {
    seen: Mutex<std::collections::HashSet<(String, String)>>,
}

impl UnknownFieldWarnings {
    pub fn warn_once(&self, rule_id: &str, field: &str) {
        let key = (rule_id.to_string(), field.to_string());
        let mut seen = self.seen.lock().unwrap();
        if seen.insert(key) {
            tracing::warn!(rule_id, field, "filter references unknown field");
        }
    }
}

/// `should_skip(feature, table_id)`: unknown fields evaluate to `false` (no
/// skip), and the caller is expected to route warnings through
/// `UnknownFieldWarnings` (passed in so tests can avoid a process-global).
pub fn should_skip(
    filter: &CompiledFilter,
    feature: &Feature,
    rule_id: &str,
    warnings: &UnknownFieldWarnings,
) -> (bool, Option<String>) {
    let Some(expr) = &filter.expr else {
        return (false, None);
    };
    evaluate(expr, feature, rule_id, warnings)
}

fn evaluate(
    expr: &FilterExpr,
    feature: &Feature,
    rule_id: &str,
    warnings: &UnknownFieldWarnings,
) -> (bool, Option<String>) {
    match expr {
        FilterExpr::Leaf { field, op, values } => {
            let Some(value) = feature.get(field) else {
                warnings.warn_once(rule_id, field);
                return (false, None);
            };
            let matched = match op {
                Op::Eq => values.first().is_some_and(|v| value.eq_ignore_case(v)),
                Op::In => values.iter().any(|v| value.eq_ignore_case(v)),
                Op::NotIn => values.iter().all(|v| !value.eq_ignore_case(v)),
            };
            if matched {
                (true, Some(format!("{field} {op:?} matched")))
            } else {
                (false, None)
            }
        }
        FilterExpr::And(left, right) => {
            let (skip_l, reason_l) = evaluate(left, feature, rule_id, warnings);
            if !skip_l {
                return (false, None);
            }
            let (skip_r, reason_r) = evaluate(right, feature, rule_id, warnings);
            if skip_r {
                (true, reason_r.or(reason_l))
            } else {
                (false, None)
            }
        }
        FilterExpr::Or(left, right) => {
            let (skip_l, reason_l) = evaluate(left, feature, rule_id, warnings);
            if skip_l {
                return (true, reason_l);
            }
            evaluate(right, feature, rule_id, warnings)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn feature_with(field: &str, value: AttrValue) -> Feature {
        let mut f = Feature::new(1, None);
        f.attributes.insert(field.to_string(), value);
        f
    }

    #[test]
    fn unknown_field_does_not_skip() {
        let filter = CompiledFilter::compile("road_type = HIGHWAY");
        let f = Feature::new(1, None);
        let warnings = UnknownFieldWarnings::default();
        let (skip, _) = should_skip(&filter, &f, "r1", &warnings);
        assert!(!skip);
    }

    #[test]
    fn eq_leaf_matches_case_insensitively() {
        let filter = CompiledFilter::compile("road_type = highway");
        let f = feature_with("road_type", AttrValue::Text("HIGHWAY".into()));
        let warnings = UnknownFieldWarnings::default();
        let (skip, _) = should_skip(&filter, &f, "r1", &warnings);
        assert!(skip);
    }

    #[test]
    fn not_in_leaf_skips_when_value_excluded() {
        let filter = CompiledFilter::compile("road_type NOT IN (HIGHWAY, RAMP)");
        let f = feature_with("road_type", AttrValue::Text("LOCAL".into()));
        let warnings = UnknownFieldWarnings::default();
        let (skip, _) = should_skip(&filter, &f, "r1", &warnings);
        assert!(skip);
    }

    #[test]
    fn option_suffix_is_parsed_separately_from_expression() {
        let filter = CompiledFilter::compile("road_type IN (HIGHWAY);exclude_road_types=RAMP;scale=1000");
        assert_eq!(filter.option("scale"), Some("1000"));
        assert_eq!(filter.option("exclude_road_types"), Some("RAMP"));
    }
}
