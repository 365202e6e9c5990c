//! `IfCode*` family (spec.md §4.6): parses `condition_field`/`condition_values`
//! (a `conditionField;valueA|valueB;…` grammar at rule load) then evaluates a
//! per-variant consequent only on features where the condition holds.

use crate::attributes::AttributeStrategy;
use crate::codelist::CodelistStore;
use crate::model::error_record::{ErrorKind, Severity, ValidationError};
use crate::model::feature::Feature;
use crate::model::rule::{AttributeCheckType, AttributeRule};
use crate::stages::context::CheckContext;
use crate::{Error, Result};

struct Condition {
    field: String,
    values: Vec<String>,
}

fn parse_condition(rule: &AttributeRule) -> Result<Condition> {
    let field = rule
        .params
        .get("condition_field")
        .ok_or_else(|| Error::Configuration {
            rule_id: rule.meta.rule_id.clone(),
            detail: "missing required param `condition_field`".into(),
        })?
        .clone();
    let values: Vec<String> = rule
        .params
        .get("condition_values")
        .ok_or_else(|| Error::Configuration {
            rule_id: rule.meta.rule_id.clone(),
            detail: "missing required param `condition_values`".into(),
        })?
        .split('|')
        .map(|s| s.trim().to_string())
        .collect();
    if values.is_empty() || values.iter().any(|v| v.is_empty()) {
        return Err(Error::Configuration {
            rule_id: rule.meta.rule_id.clone(),
            detail: "`condition_values` must be a non-empty `|`-separated list".into(),
        });
    }
    Ok(Condition { field, values })
}

fn condition_holds(condition: &Condition, feature: &Feature) -> bool {
    feature.get(&condition.field).is_some_and(|v| condition.values.iter().any(|expected| v.eq_ignore_case(expected)))
}

fn numeric_param(rule: &AttributeRule, key: &str) -> Result<f64> {
    rule.params
        .get(key)
        .ok_or_else(|| Error::Configuration {
            rule_id: rule.meta.rule_id.clone(),
            detail: format!("missing required param `{key}`"),
        })?
        .trim()
        .parse::<f64>()
        .map_err(|_| Error::Configuration {
            rule_id: rule.meta.rule_id.clone(),
            detail: format!("param `{key}` is not numeric"),
        })
}

pub struct IfCodeThenNotNullAll;

impl AttributeStrategy for IfCodeThenNotNullAll {
    fn check_type(&self) -> AttributeCheckType {
        AttributeCheckType::IfCodeThenNotNullAll
    }

    fn run(&self, features: &[Feature], rule: &AttributeRule, _codelist: &CodelistStore, ctx: &CheckContext) -> Result<Vec<ValidationError>> {
        let condition = parse_condition(rule)?;
        let fields: Vec<&str> = rule.params.get("fields").map(|s| s.split(',').map(|f| f.trim()).collect()).unwrap_or_else(|| vec![rule.field.as_str()]);
        let mut errors = Vec::new();

        for f in features {
            if ctx.is_cancelled() {
                break;
            }
            if !condition_holds(&condition, f) {
                continue;
            }
            for field in &fields {
                let is_null = f.get(field).is_none_or(|v| v.is_null());
                if is_null {
                    errors.push(
                        ctx.error(
                            AttributeCheckType::IfCodeThenNotNullAll.code(),
                            format!("{} requires {field} to be non-null when {} matches", rule.field, condition.field),
                            Severity::Error,
                            ErrorKind::Attribute,
                        )
                        .feature_id(f.fid)
                        .field(*field)
                        .build(),
                    );
                }
            }
        }
        Ok(errors)
    }
}

pub struct IfCodeThenNull;

impl AttributeStrategy for IfCodeThenNull {
    fn check_type(&self) -> AttributeCheckType {
        AttributeCheckType::IfCodeThenNull
    }

    fn run(&self, features: &[Feature], rule: &AttributeRule, _codelist: &CodelistStore, ctx: &CheckContext) -> Result<Vec<ValidationError>> {
        let condition = parse_condition(rule)?;
        let mut errors = Vec::new();
        for f in features {
            if ctx.is_cancelled() {
                break;
            }
            if !condition_holds(&condition, f) {
                continue;
            }
            let is_null = f.get(&rule.field).is_none_or(|v| v.is_null());
            if !is_null {
                errors.push(
                    ctx.error(
                        AttributeCheckType::IfCodeThenNull.code(),
                        format!("{} must be null when {} matches", rule.field, condition.field),
                        Severity::Error,
                        ErrorKind::Attribute,
                    )
                    .feature_id(f.fid)
                    .field(&rule.field)
                    .build(),
                );
            }
        }
        Ok(errors)
    }
}

pub struct IfCodeThenNumericEquals;

impl AttributeStrategy for IfCodeThenNumericEquals {
    fn check_type(&self) -> AttributeCheckType {
        AttributeCheckType::IfCodeThenNumericEquals
    }

    fn run(&self, features: &[Feature], rule: &AttributeRule, _codelist: &CodelistStore, ctx: &CheckContext) -> Result<Vec<ValidationError>> {
        let condition = parse_condition(rule)?;
        let expected = numeric_param(rule, "value")?;
        let mut errors = Vec::new();
        for f in features {
            if ctx.is_cancelled() {
                break;
            }
            if !condition_holds(&condition, f) {
                continue;
            }
            let Some(v) = f.get(&rule.field).and_then(|v| v.as_f64()) else { continue };
            if (v - expected).abs() > f64::EPSILON {
                errors.push(
                    ctx.error(
                        AttributeCheckType::IfCodeThenNumericEquals.code(),
                        format!("{} = {v}, expected {expected} when {} matches", rule.field, condition.field),
                        Severity::Error,
                        ErrorKind::Attribute,
                    )
                    .feature_id(f.fid)
                    .field(&rule.field)
                    .metadata("value", v)
                    .build(),
                );
            }
        }
        Ok(errors)
    }
}

pub struct IfCodeThenBetweenExclusive;

impl AttributeStrategy for IfCodeThenBetweenExclusive {
    fn check_type(&self) -> AttributeCheckType {
        AttributeCheckType::IfCodeThenBetweenExclusive
    }

    fn run(&self, features: &[Feature], rule: &AttributeRule, _codelist: &CodelistStore, ctx: &CheckContext) -> Result<Vec<ValidationError>> {
        let condition = parse_condition(rule)?;
        let min = numeric_param(rule, "min")?;
        let max = numeric_param(rule, "max")?;
        let mut errors = Vec::new();
        for f in features {
            if ctx.is_cancelled() {
                break;
            }
            if !condition_holds(&condition, f) {
                continue;
            }
            let Some(v) = f.get(&rule.field).and_then(|v| v.as_f64()) else { continue };
            if v <= min || v >= max {
                errors.push(
                    ctx.error(
                        AttributeCheckType::IfCodeThenBetweenExclusive.code(),
                        format!("{} = {v} is not strictly between {min} and {max} when {} matches", rule.field, condition.field),
                        Severity::Error,
                        ErrorKind::Attribute,
                    )
                    .feature_id(f.fid)
                    .field(&rule.field)
                    .metadata("value", v)
                    .build(),
                );
            }
        }
        Ok(errors)
    }
}

pub struct IfCodeThenGreaterThanOrEqual;

impl AttributeStrategy for IfCodeThenGreaterThanOrEqual {
    fn check_type(&self) -> AttributeCheckType {
        AttributeCheckType::IfCodeThenGreaterThanOrEqual
    }

    fn run(&self, features: &[Feature], rule: &AttributeRule, _codelist: &CodelistStore, ctx: &CheckContext) -> Result<Vec<ValidationError>> {
        let condition = parse_condition(rule)?;
        let threshold = numeric_param(rule, "value")?;
        let mut errors = Vec::new();
        for f in features {
            if ctx.is_cancelled() {
                break;
            }
            if !condition_holds(&condition, f) {
                continue;
            }
            let Some(v) = f.get(&rule.field).and_then(|v| v.as_f64()) else { continue };
            if v < threshold {
                errors.push(
                    ctx.error(
                        AttributeCheckType::IfCodeThenGreaterThanOrEqual.code(),
                        format!("{} = {v} is below {threshold} when {} matches", rule.field, condition.field),
                        Severity::Error,
                        ErrorKind::Attribute,
                    )
                    .feature_id(f.fid)
                    .field(&rule.field)
                    .metadata("value", v)
                    .build(),
                );
            }
        }
        Ok(errors)
    }
}

pub struct IfCodeThenMultipleOf;

impl AttributeStrategy for IfCodeThenMultipleOf {
    fn check_type(&self) -> AttributeCheckType {
        AttributeCheckType::IfCodeThenMultipleOf
    }

    fn run(&self, features: &[Feature], rule: &AttributeRule, _codelist: &CodelistStore, ctx: &CheckContext) -> Result<Vec<ValidationError>> {
        let condition = parse_condition(rule)?;
        let divisor = numeric_param(rule, "value")?;
        if divisor == 0.0 {
            return Err(Error::Configuration {
                rule_id: rule.meta.rule_id.clone(),
                detail: "param `value` must not be zero".into(),
            });
        }
        let mut errors = Vec::new();
        for f in features {
            if ctx.is_cancelled() {
                break;
            }
            if !condition_holds(&condition, f) {
                continue;
            }
            let Some(v) = f.get(&rule.field).and_then(|v| v.as_f64()) else { continue };
            let remainder = v % divisor;
            let is_multiple = remainder.abs() < 1e-9 || (remainder.abs() - divisor.abs()).abs() < 1e-9;
            if !is_multiple {
                errors.push(
                    ctx.error(
                        AttributeCheckType::IfCodeThenMultipleOf.code(),
                        format!("{} = {v} is not a multiple of {divisor} when {} matches", rule.field, condition.field),
                        Severity::Error,
                        ErrorKind::Attribute,
                    )
                    .feature_id(f.fid)
                    .field(&rule.field)
                    .metadata("value", v)
                    .build(),
                );
            }
        }
        Ok(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::criteria::GeometryCriteria;
    use crate::model::feature::AttrValue;
    use crate::model::rule::RuleMeta;

    fn rule(field: &str, check_type: AttributeCheckType, params: &[(&str, &str)]) -> AttributeRule {
        AttributeRule {
            meta: RuleMeta {
                rule_id: "r1".into(),
                enabled: true,
                note: None,
            },
            table_id: "tn_test".into(),
            field: field.into(),
            check_type,
            params: params.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect(),
        }
    }

    fn feature(fid: i64, code: &str, height: Option<f64>) -> Feature {
        let mut f = Feature::new(fid, None);
        f.attributes.insert("bldg_se".into(), AttrValue::Text(code.into()));
        if let Some(h) = height {
            f.attributes.insert("height".into(), AttrValue::Real(h));
        }
        f
    }

    #[test]
    fn consequent_only_applies_when_condition_matches() {
        let ctx = CheckContext::for_test(GeometryCriteria::default());
        let codelist = CodelistStore::new();
        let rule = rule(
            "height",
            AttributeCheckType::IfCodeThenGreaterThanOrEqual,
            &[("condition_field", "bldg_se"), ("condition_values", "BDG001|BDG002"), ("value", "3")],
        );
        let features = vec![feature(1, "BDG001", Some(1.0)), feature(2, "BDG999", Some(1.0))];
        let errors = IfCodeThenGreaterThanOrEqual.run(&features, &rule, &codelist, &ctx).unwrap();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].feature_id, Some(1));
    }

    #[test]
    fn missing_condition_values_fails_at_load() {
        let ctx = CheckContext::for_test(GeometryCriteria::default());
        let codelist = CodelistStore::new();
        let rule = rule("height", AttributeCheckType::IfCodeThenNull, &[("condition_field", "bldg_se")]);
        assert!(IfCodeThenNull.run(&[], &rule, &codelist, &ctx).is_err());
    }
}
