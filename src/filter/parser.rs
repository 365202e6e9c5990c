//! Recursive-descent parser for the filter grammar of spec.md §4.2:
//! `leaf (AND|OR leaf)*` possibly followed by `;key=val` options.

use std::collections::HashMap;

use crate::filter::ast::{FilterExpr, Op};
use crate::filter::CompiledFilter;

pub fn parse(raw: &str) -> CompiledFilter {
    let (expr_part, option_parts) = split_options(raw);
    let options = option_parts
        .into_iter()
        .filter_map(|part| {
            let part = part.trim();
            if part.is_empty() {
                return None;
            }
            let (k, v) = part.split_once('=')?;
            Some((k.trim().to_string(), v.trim().to_string()))
        })
        .collect::<HashMap<_, _>>();

    let expr = if expr_part.trim().is_empty() {
        None
    } else {
        parse_expr(expr_part.trim())
    };

    CompiledFilter { expr, options }
}

/// Splits `expr;key=val;key=val` on top-level `;`, ignoring `;` inside
/// parenthesized IN-lists.
fn split_options(raw: &str) -> (&str, Vec<&str>) {
    let mut depth = 0i32;
    for (i, c) in raw.char_indices() {
        match c {
            '(' => depth += 1,
            ')' => depth -= 1,
            ';' if depth <= 0 => {
                let (expr, rest) = raw.split_at(i);
                return (expr, rest[1..].split(';').collect());
            }
            _ => {}
        }
    }
    (raw, Vec::new())
}

fn parse_expr(s: &str) -> Option<FilterExpr> {
    if let Some((left, right)) = split_top_level(s, " OR ") {
        return Some(FilterExpr::Or(
            Box::new(parse_expr(left)?),
            Box::new(parse_expr(right)?),
        ));
    }
    if let Some((left, right)) = split_top_level(s, " AND ") {
        return Some(FilterExpr::And(
            Box::new(parse_expr(left)?),
            Box::new(parse_expr(right)?),
        ));
    }
    parse_leaf(s)
}

/// Finds the first top-level occurrence of `sep` (case-insensitive, ignoring
/// parens), splitting `s` into `(before, after)`.
fn split_top_level<'a>(s: &'a str, sep: &str) -> Option<(&'a str, &'a str)> {
    let upper = s.to_ascii_uppercase();
    let sep_upper = sep.to_ascii_uppercase();
    let mut depth = 0i32;
    let bytes = s.as_bytes();
    let mut i = 0usize;
    while i < bytes.len() {
        match bytes[i] {
            b'(' => depth += 1,
            b')' => depth -= 1,
            _ => {}
        }
        if depth == 0 && upper[i..].starts_with(&sep_upper) {
            return Some((&s[..i], &s[i + sep.len()..]));
        }
        i += 1;
    }
    None
}

fn parse_leaf(s: &str) -> Option<FilterExpr> {
    let upper = s.to_ascii_uppercase();
    if let Some(pos) = upper.find(" NOT IN ") {
        let field = s[..pos].trim().to_string();
        let values = parse_value_list(s[pos + " NOT IN ".len()..].trim());
        return Some(FilterExpr::Leaf {
            field,
            op: Op::NotIn,
            values,
        });
    }
    if let Some(pos) = upper.find(" IN ") {
        let field = s[..pos].trim().to_string();
        let values = parse_value_list(s[pos + " IN ".len()..].trim());
        return Some(FilterExpr::Leaf {
            field,
            op: Op::In,
            values,
        });
    }
    if let Some((field, value)) = s.split_once('=') {
        return Some(FilterExpr::Leaf {
            field: field.trim().to_string(),
            op: Op::Eq,
            values: vec![strip_quotes(value.trim()).to_string()],
        });
    }
    None
}

fn parse_value_list(s: &str) -> Vec<String> {
    let inner = s.strip_prefix('(').and_then(|s| s.strip_suffix(')')).unwrap_or(s);
    inner
        .split(',')
        .map(|v| strip_quotes(v.trim()).to_string())
        .filter(|v| !v.is_empty())
        .collect()
}

fn strip_quotes(s: &str) -> &str {
    s.trim_matches('"').trim_matches('\'')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_simple_equality() {
        let compiled = parse("road_type = HIGHWAY");
        match compiled.expr {
            Some(FilterExpr::Leaf { field, op, values }) => {
                assert_eq!(field, "road_type");
                assert_eq!(op, Op::Eq);
                assert_eq!(values, vec!["HIGHWAY"]);
            }
            other => panic!("expected leaf, got {other:?}"),
        }
    }

    #[test]
    fn parses_in_list_and_options() {
        let compiled = parse("road_type IN (HIGHWAY, RAMP);scale=1000;angle_threshold=15");
        assert_eq!(compiled.option("scale"), Some("1000"));
        assert_eq!(compiled.option("angle_threshold"), Some("15"));
        match compiled.expr {
            Some(FilterExpr::Leaf { op, values, .. }) => {
                assert_eq!(op, Op::In);
                assert_eq!(values, vec!["HIGHWAY", "RAMP"]);
            }
            other => panic!("expected leaf, got {other:?}"),
        }
    }

    #[test]
    fn parses_compound_and() {
        let compiled = parse("road_type = HIGHWAY AND status = ACTIVE");
        assert!(matches!(compiled.expr, Some(FilterExpr::And(_, _))));
    }

    #[test]
    fn empty_expression_yields_none() {
        let compiled = parse(";scale=1000");
        assert!(compiled.expr.is_none());
        assert_eq!(compiled.option("scale"), Some("1000"));
    }
}
