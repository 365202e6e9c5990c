//! `CodeList` (spec.md §4.6): looks up the referenced `CodeSetId` in the
//! codelist store; an unknown `CodeSetId` fails the rule at load, a value
//! outside the known set is a per-feature finding. `NotNull` is a separate
//! rule, so a null value passes here (spec.md §8 scenario 5).

use crate::attributes::AttributeStrategy;
use crate::codelist::CodelistStore;
use crate::model::error_record::{ErrorKind, Severity, ValidationError};
use crate::model::feature::Feature;
use crate::model::rule::{AttributeCheckType, AttributeRule};
use crate::stages::context::CheckContext;
use crate::{Error, Result};

pub struct CodeListCheck;

impl AttributeStrategy for CodeListCheck {
    fn check_type(&self) -> AttributeCheckType {
        AttributeCheckType::CodeList
    }

    fn run(&self, features: &[Feature], rule: &AttributeRule, codelist: &CodelistStore, ctx: &CheckContext) -> Result<Vec<ValidationError>> {
        let code_set_id = rule.params.get("code_set_id").ok_or_else(|| Error::Configuration {
            rule_id: rule.meta.rule_id.clone(),
            detail: "missing required param `code_set_id`".into(),
        })?;
        if !codelist.contains(code_set_id) {
            return Err(Error::Configuration {
                rule_id: rule.meta.rule_id.clone(),
                detail: format!("unknown CodeSetId `{code_set_id}`"),
            });
        }

        let mut errors = Vec::new();
        for f in features {
            if ctx.is_cancelled() {
                break;
            }
            let Some(value) = f.get(&rule.field) else { continue };
            if value.is_null() {
                continue;
            }
            let Some(text) = value.as_str() else { continue };
            if codelist.is_valid(code_set_id, text) == Some(false) {
                errors.push(
                    ctx.error(
                        AttributeCheckType::CodeList.code(),
                        format!("{} = {text:?} is not a member of {code_set_id}", rule.field),
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

    fn rule() -> AttributeRule {
        AttributeRule {
            meta: RuleMeta {
                rule_id: "r1".into(),
                enabled: true,
                note: None,
            },
            table_id: "tn_test".into(),
            field: "bldg_se".into(),
            check_type: AttributeCheckType::CodeList,
            params: [("code_set_id".to_string(), "건물구분".to_string())].into_iter().collect(),
        }
    }

    fn feature(fid: i64, value: Option<&str>) -> Feature {
        let mut f = Feature::new(fid, None);
        if let Some(v) = value {
            f.attributes.insert("bldg_se".into(), AttrValue::Text(v.into()));
        } else {
            f.attributes.insert("bldg_se".into(), AttrValue::Null);
        }
        f
    }

    #[test]
    fn null_passes_codelist_check() {
        let ctx = CheckContext::for_test(GeometryCriteria::default());
        let codelist = CodelistStore::new();
        codelist.insert("건물구분", vec!["BDG001".into(), "BDG002".into()]);
        let errors = CodeListCheck.run(&[feature(1, None)], &rule(), &codelist, &ctx).unwrap();
        assert!(errors.is_empty());
    }

    #[test]
    fn value_outside_set_is_flagged() {
        let ctx = CheckContext::for_test(GeometryCriteria::default());
        let codelist = CodelistStore::new();
        codelist.insert("건물구분", vec!["BDG001".into(), "BDG002".into()]);
        let features = vec![feature(1, Some("BDG001")), feature(2, Some("BDG003"))];
        let errors = CodeListCheck.run(&features, &rule(), &codelist, &ctx).unwrap();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].feature_id, Some(2));
    }

    #[test]
    fn unknown_code_set_fails_at_load() {
        let ctx = CheckContext::for_test(GeometryCriteria::default());
        let codelist = CodelistStore::new();
        let result = CodeListCheck.run(&[], &rule(), &codelist, &ctx);
        assert!(result.is_err());
    }
}
