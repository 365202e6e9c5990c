//! `KoreanTypo` (spec.md §4.6): a deterministic heuristic over Hangul text —
//! isolated jamo (a standalone consonant/vowel that never combined into a
//! syllable block, the signature of a broken IME commit) and disallowed
//! punctuation characters that should never appear inside a Hangul field.

use crate::attributes::AttributeStrategy;
use crate::codelist::CodelistStore;
use crate::model::error_record::{ErrorKind, Severity, ValidationError};
use crate::model::feature::Feature;
use crate::model::rule::{AttributeCheckType, AttributeRule};
use crate::stages::context::CheckContext;
use crate::Result;

/// Hangul Compatibility Jamo block: standalone consonants/vowels (ㄱ, ㅏ, …)
/// that are never valid outside a combined syllable block (U+AC00-D7A3).
const COMPAT_JAMO_START: u32 = 0x3131;
const COMPAT_JAMO_END: u32 = 0x318E;

const DISALLOWED_PUNCTUATION: [char; 6] = ['#', '@', '$', '%', '^', '*'];

fn has_isolated_jamo(text: &str) -> bool {
    text.chars().any(|c| (COMPAT_JAMO_START..=COMPAT_JAMO_END).contains(&(c as u32)))
}

fn has_disallowed_punctuation(text: &str) -> bool {
    text.chars().any(|c| DISALLOWED_PUNCTUATION.contains(&c))
}

pub struct KoreanTypoCheck;

impl AttributeStrategy for KoreanTypoCheck {
    fn check_type(&self) -> AttributeCheckType {
        AttributeCheckType::KoreanTypo
    }

    fn run(&self, features: &[Feature], rule: &AttributeRule, _codelist: &CodelistStore, ctx: &CheckContext) -> Result<Vec<ValidationError>> {
        let mut errors = Vec::new();
        for f in features {
            if ctx.is_cancelled() {
                break;
            }
            let Some(text) = f.get(&rule.field).and_then(|v| v.as_str()) else { continue };
            if has_isolated_jamo(text) || has_disallowed_punctuation(text) {
                errors.push(
                    ctx.error(
                        AttributeCheckType::KoreanTypo.code(),
                        format!("{} = {text:?} looks like a typo (isolated jamo or disallowed punctuation)", rule.field),
                        Severity::Warning,
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
            field: "name".into(),
            check_type: AttributeCheckType::KoreanTypo,
            params: Default::default(),
        }
    }

    fn feature_with(text: &str) -> Feature {
        let mut f = Feature::new(1, None);
        f.attributes.insert("name".into(), AttrValue::Text(text.into()));
        f
    }

    #[test]
    fn well_formed_hangul_passes() {
        let ctx = CheckContext::for_test(GeometryCriteria::default());
        let codelist = CodelistStore::new();
        let errors = KoreanTypoCheck.run(&[feature_with("서울특별시")], &rule(), &codelist, &ctx).unwrap();
        assert!(errors.is_empty());
    }

    #[test]
    fn isolated_jamo_is_flagged() {
        let ctx = CheckContext::for_test(GeometryCriteria::default());
        let codelist = CodelistStore::new();
        let errors = KoreanTypoCheck.run(&[feature_with("서울ㅅ")], &rule(), &codelist, &ctx).unwrap();
        assert_eq!(errors.len(), 1);
    }

    #[test]
    fn disallowed_punctuation_is_flagged() {
        let ctx = CheckContext::for_test(GeometryCriteria::default());
        let codelist = CodelistStore::new();
        let errors = KoreanTypoCheck.run(&[feature_with("서울#1")], &rule(), &codelist, &ctx).unwrap();
        assert_eq!(errors.len(), 1);
    }
}
