//! `Regex` (spec.md §4.6): compiled once per rule invocation, evaluated per
//! value. An invalid pattern fails the rule at load (`Error::Configuration`)
//! rather than being reported as a per-feature finding.

use regex::Regex;

use crate::attributes::AttributeStrategy;
use crate::codelist::CodelistStore;
use crate::model::error_record::{ErrorKind, Severity, ValidationError};
use crate::model::feature::Feature;
use crate::model::rule::{AttributeCheckType, AttributeRule};
use crate::stages::context::CheckContext;
use crate::{Error, Result};

pub struct RegexCheck;

impl AttributeStrategy for RegexCheck {
    fn check_type(&self) -> AttributeCheckType {
        AttributeCheckType::Regex
    }

    fn run(&self, features: &[Feature], rule: &AttributeRule, _codelist: &CodelistStore, ctx: &CheckContext) -> Result<Vec<ValidationError>> {
        let pattern = rule.params.get("pattern").ok_or_else(|| Error::Configuration {
            rule_id: rule.meta.rule_id.clone(),
            detail: "missing required param `pattern`".into(),
        })?;
        let re = Regex::new(pattern)?;

        let mut errors = Vec::new();
        for f in features {
            if ctx.is_cancelled() {
                break;
            }
            let Some(text) = f.get(&rule.field).and_then(|v| v.as_str()) else { continue };
            if !re.is_match(text) {
                errors.push(
                    ctx.error(
                        AttributeCheckType::Regex.code(),
                        format!("{} = {text:?} does not match /{pattern}/", rule.field),
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::criteria::GeometryCriteria;
    use crate::model::feature::AttrValue;
    use crate::model::rule::RuleMeta;

    fn rule(pattern: &str) -> AttributeRule {
        AttributeRule {
            meta: RuleMeta {
                rule_id: "r1".into(),
                enabled: true,
                note: None,
            },
            table_id: "tn_test".into(),
            field: "bldg_no".into(),
            check_type: AttributeCheckType::Regex,
            params: [("pattern".to_string(), pattern.to_string())].into_iter().collect(),
        }
    }

    #[test]
    fn unmatched_value_is_flagged() {
        let ctx = CheckContext::for_test(GeometryCriteria::default());
        let codelist = CodelistStore::new();
        let mut f = Feature::new(1, None);
        f.attributes.insert("bldg_no".into(), AttrValue::Text("abc".into()));
        let errors = RegexCheck.run(&[f], &rule(r"^\d+$"), &codelist, &ctx).unwrap();
        assert_eq!(errors.len(), 1);
    }

    #[test]
    fn invalid_pattern_fails_at_load() {
        let ctx = CheckContext::for_test(GeometryCriteria::default());
        let codelist = CodelistStore::new();
        let result = RegexCheck.run(&[], &rule("("), &codelist, &ctx);
        assert!(result.is_err());
    }
}
