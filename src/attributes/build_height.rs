//! `BuildHeight*` family (spec.md §4.6): fixed-shape 2-field comparisons. The
//! distilled spec names the three comparisons but not the exact field names
//! they compare (see DESIGN.md Open Question); field names default to the
//! cadastral convention used elsewhere (`bldg_se`-style snake_case) and are
//! overridable via rule `params` so a CSV rule row can repoint them.

use crate::attributes::AttributeStrategy;
use crate::codelist::CodelistStore;
use crate::model::error_record::{ErrorKind, Severity, ValidationError};
use crate::model::feature::Feature;
use crate::model::rule::{AttributeCheckType, AttributeRule};
use crate::stages::context::CheckContext;
use crate::Result;

/// Emits one error per feature where `lower_field <= upper_field` does not
/// hold (and both are present); shared by all three `BuildHeight*` variants.
fn run_height_order(check_type: AttributeCheckType, lower_default: &str, upper_default: &str, features: &[Feature], rule: &AttributeRule, ctx: &CheckContext) -> Vec<ValidationError> {
    let lower_field = rule.params.get("lower_field").map(String::as_str).unwrap_or(lower_default);
    let upper_field = rule.params.get("upper_field").map(String::as_str).unwrap_or(upper_default);
    let mut errors = Vec::new();

    for f in features {
        if ctx.is_cancelled() {
            break;
        }
        let (Some(lower), Some(upper)) = (f.get(lower_field).and_then(|v| v.as_f64()), f.get(upper_field).and_then(|v| v.as_f64())) else {
            continue;
        };
        if lower > upper {
            errors.push(
                ctx.error(check_type.code(), format!("{lower_field} ({lower}) exceeds {upper_field} ({upper})"), Severity::Error, ErrorKind::Attribute)
                    .feature_id(f.fid)
                    .field(lower_field)
                    .metadata("lower_value", lower)
                    .metadata("upper_value", upper)
                    .build(),
            );
        }
    }
    errors
}

pub struct BuildHeightBaseVsMax;

impl AttributeStrategy for BuildHeightBaseVsMax {
    fn check_type(&self) -> AttributeCheckType {
        AttributeCheckType::BuildHeightBaseVsMax
    }

    fn run(&self, features: &[Feature], rule: &AttributeRule, _codelist: &CodelistStore, ctx: &CheckContext) -> Result<Vec<ValidationError>> {
        Ok(run_height_order(AttributeCheckType::BuildHeightBaseVsMax, "bldg_base_height", "bldg_max_height", features, rule, ctx))
    }
}

pub struct BuildHeightMaxVsFacility;

impl AttributeStrategy for BuildHeightMaxVsFacility {
    fn check_type(&self) -> AttributeCheckType {
        AttributeCheckType::BuildHeightMaxVsFacility
    }

    fn run(&self, features: &[Feature], rule: &AttributeRule, _codelist: &CodelistStore, ctx: &CheckContext) -> Result<Vec<ValidationError>> {
        Ok(run_height_order(AttributeCheckType::BuildHeightMaxVsFacility, "bldg_max_height", "bldg_facility_height", features, rule, ctx))
    }
}

pub struct BuildHeightLowestVsBase;

impl AttributeStrategy for BuildHeightLowestVsBase {
    fn check_type(&self) -> AttributeCheckType {
        AttributeCheckType::BuildHeightLowestVsBase
    }

    fn run(&self, features: &[Feature], rule: &AttributeRule, _codelist: &CodelistStore, ctx: &CheckContext) -> Result<Vec<ValidationError>> {
        Ok(run_height_order(AttributeCheckType::BuildHeightLowestVsBase, "bldg_lowest_floor_height", "bldg_base_height", features, rule, ctx))
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
            field: "bldg_base_height".into(),
            check_type: AttributeCheckType::BuildHeightBaseVsMax,
            params: Default::default(),
        }
    }

    fn feature(base: f64, max: f64) -> Feature {
        let mut f = Feature::new(1, None);
        f.attributes.insert("bldg_base_height".into(), AttrValue::Real(base));
        f.attributes.insert("bldg_max_height".into(), AttrValue::Real(max));
        f
    }

    #[test]
    fn base_exceeding_max_is_flagged() {
        let ctx = CheckContext::for_test(GeometryCriteria::default());
        let codelist = CodelistStore::new();
        let errors = BuildHeightBaseVsMax.run(&[feature(10.0, 5.0)], &rule(), &codelist, &ctx).unwrap();
        assert_eq!(errors.len(), 1);
    }

    #[test]
    fn base_within_max_passes() {
        let ctx = CheckContext::for_test(GeometryCriteria::default());
        let codelist = CodelistStore::new();
        let errors = BuildHeightBaseVsMax.run(&[feature(5.0, 10.0)], &rule(), &codelist, &ctx).unwrap();
        assert!(errors.is_empty());
    }
}
