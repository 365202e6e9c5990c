//! Single-field numeric/presence predicates (spec.md §4.6): `NotNull`,
//! `NotZero`, `Range`, `NumericEquals`, `MultipleOf`.

use crate::attributes::AttributeStrategy;
use crate::codelist::CodelistStore;
use crate::model::error_record::{ErrorKind, Severity, ValidationError};
use crate::model::feature::Feature;
use crate::model::rule::{AttributeCheckType, AttributeRule};
use crate::stages::context::CheckContext;
use crate::{Error, Result};

fn required_param(rule: &AttributeRule, key: &str) -> Result<f64> {
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

pub struct NotNullCheck;

impl AttributeStrategy for NotNullCheck {
    fn check_type(&self) -> AttributeCheckType {
        AttributeCheckType::NotNull
    }

    fn run(&self, features: &[Feature], rule: &AttributeRule, _codelist: &CodelistStore, ctx: &CheckContext) -> Result<Vec<ValidationError>> {
        let mut errors = Vec::new();
        for f in features {
            if ctx.is_cancelled() {
                break;
            }
            let is_null = f.get(&rule.field).is_none_or(|v| v.is_null());
            if is_null {
                errors.push(
                    ctx.error(AttributeCheckType::NotNull.code(), format!("{} is null", rule.field), Severity::Error, ErrorKind::Attribute)
                        .feature_id(f.fid)
                        .field(&rule.field)
                        .build(),
                );
            }
        }
        Ok(errors)
    }
}

pub struct NotZeroCheck;

impl AttributeStrategy for NotZeroCheck {
    fn check_type(&self) -> AttributeCheckType {
        AttributeCheckType::NotZero
    }

    fn run(&self, features: &[Feature], rule: &AttributeRule, _codelist: &CodelistStore, ctx: &CheckContext) -> Result<Vec<ValidationError>> {
        let mut errors = Vec::new();
        for f in features {
            if ctx.is_cancelled() {
                break;
            }
            let Some(value) = f.get(&rule.field) else { continue };
            if value.as_f64() == Some(0.0) {
                errors.push(
                    ctx.error(AttributeCheckType::NotZero.code(), format!("{} is zero", rule.field), Severity::Error, ErrorKind::Attribute)
                        .feature_id(f.fid)
                        .field(&rule.field)
                        .build(),
                );
            }
        }
        Ok(errors)
    }
}

pub struct RangeCheck;

impl AttributeStrategy for RangeCheck {
    fn check_type(&self) -> AttributeCheckType {
        AttributeCheckType::Range
    }

    fn run(&self, features: &[Feature], rule: &AttributeRule, _codelist: &CodelistStore, ctx: &CheckContext) -> Result<Vec<ValidationError>> {
        let lo = required_param(rule, "lo")?;
        let hi = required_param(rule, "hi")?;
        let mut errors = Vec::new();
        for f in features {
            if ctx.is_cancelled() {
                break;
            }
            let Some(v) = f.get(&rule.field).and_then(|v| v.as_f64()) else { continue };
            if v < lo || v > hi {
                errors.push(
                    ctx.error(
                        AttributeCheckType::Range.code(),
                        format!("{} = {v} is outside [{lo}, {hi}]", rule.field),
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

pub struct NumericEqualsCheck;

impl AttributeStrategy for NumericEqualsCheck {
    fn check_type(&self) -> AttributeCheckType {
        AttributeCheckType::NumericEquals
    }

    fn run(&self, features: &[Feature], rule: &AttributeRule, _codelist: &CodelistStore, ctx: &CheckContext) -> Result<Vec<ValidationError>> {
        let expected = required_param(rule, "value")?;
        let mut errors = Vec::new();
        for f in features {
            if ctx.is_cancelled() {
                break;
            }
            let Some(v) = f.get(&rule.field).and_then(|v| v.as_f64()) else { continue };
            if (v - expected).abs() > f64::EPSILON {
                errors.push(
                    ctx.error(
                        AttributeCheckType::NumericEquals.code(),
                        format!("{} = {v}, expected {expected}", rule.field),
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

pub struct MultipleOfCheck;

impl AttributeStrategy for MultipleOfCheck {
    fn check_type(&self) -> AttributeCheckType {
        AttributeCheckType::MultipleOf
    }

    fn run(&self, features: &[Feature], rule: &AttributeRule, _codelist: &CodelistStore, ctx: &CheckContext) -> Result<Vec<ValidationError>> {
        let divisor = required_param(rule, "value")?;
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
            let Some(v) = f.get(&rule.field).and_then(|v| v.as_f64()) else { continue };
            let remainder = v % divisor;
            let is_multiple = remainder.abs() < 1e-9 || (remainder.abs() - divisor.abs()).abs() < 1e-9;
            if !is_multiple {
                errors.push(
                    ctx.error(
                        AttributeCheckType::MultipleOf.code(),
                        format!("{} = {v} is not a multiple of {divisor}", rule.field),
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
    use std::collections::HashMap;

    fn rule(field: &str, params: &[(&str, &str)]) -> AttributeRule {
        AttributeRule {
            meta: RuleMeta {
                rule_id: "r1".into(),
                enabled: true,
                note: None,
            },
            table_id: "tn_test".into(),
            field: field.into(),
            check_type: AttributeCheckType::NotNull,
            params: params.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect(),
        }
    }

    fn feature_with(field: &str, value: AttrValue) -> Feature {
        let mut f = Feature::new(1, None);
        f.attributes.insert(field.into(), value);
        f
    }

    #[test]
    fn not_null_flags_missing_field() {
        let ctx = CheckContext::for_test(GeometryCriteria::default());
        let codelist = CodelistStore::new();
        let features = vec![Feature::new(1, None)];
        let errors = NotNullCheck.run(&features, &rule("height", &[]), &codelist, &ctx).unwrap();
        assert_eq!(errors.len(), 1);
    }

    #[test]
    fn range_rejects_out_of_bounds_value() {
        let ctx = CheckContext::for_test(GeometryCriteria::default());
        let codelist = CodelistStore::new();
        let features = vec![feature_with("height", AttrValue::Real(150.0))];
        let errors = RangeCheck.run(&features, &rule("height", &[("lo", "0"), ("hi", "100")]), &codelist, &ctx).unwrap();
        assert_eq!(errors.len(), 1);
    }

    #[test]
    fn multiple_of_accepts_exact_multiple() {
        let ctx = CheckContext::for_test(GeometryCriteria::default());
        let codelist = CodelistStore::new();
        let features = vec![feature_with("height", AttrValue::Real(9.0))];
        let errors = MultipleOfCheck.run(&features, &rule("height", &[("value", "3")]), &codelist, &ctx).unwrap();
        assert!(errors.is_empty());
    }
}
