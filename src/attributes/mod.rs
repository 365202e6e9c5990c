//! Attribute Check Strategies (spec.md §4.6): 17 `AttributeCheckType`
//! strategies, dispatched by a registry built once at startup (mirrors
//! `checks::CheckRegistry` and `relations::RelationRegistry`).
//!
//! Unlike geometry/relation strategies, an attribute strategy can fail at
//! *load* (bad regex, unknown `CodeSetId`, malformed `IfCode*` grammar) —
//! `run` returns `crate::Result<Vec<ValidationError>>` so the owning rule can
//! be failed and logged without aborting the stage (spec.md §7).

mod build_height;
mod codelist_check;
mod if_code;
mod korean_typo;
mod regex_check;
mod simple;

use crate::codelist::CodelistStore;
use crate::model::error_record::ValidationError;
use crate::model::feature::Feature;
use crate::model::rule::{AttributeCheckType, AttributeRule};
use crate::stages::context::CheckContext;
use crate::Result;
use std::collections::HashMap;

pub trait AttributeStrategy: Send + Sync {
    fn check_type(&self) -> AttributeCheckType;

    fn run(&self, features: &[Feature], rule: &AttributeRule, codelist: &CodelistStore, ctx: &CheckContext) -> Result<Vec<ValidationError>>;
}

pub struct AttributeRegistry {
    strategies: HashMap<AttributeCheckType, Box<dyn AttributeStrategy>>,
}

impl AttributeRegistry {
    pub fn new() -> Self {
        let list: Vec<Box<dyn AttributeStrategy>> = vec![
            Box::new(simple::NotNullCheck),
            Box::new(simple::NotZeroCheck),
            Box::new(simple::RangeCheck),
            Box::new(simple::NumericEqualsCheck),
            Box::new(simple::MultipleOfCheck),
            Box::new(regex_check::RegexCheck),
            Box::new(korean_typo::KoreanTypoCheck),
            Box::new(codelist_check::CodeListCheck),
            Box::new(if_code::IfCodeThenNotNullAll),
            Box::new(if_code::IfCodeThenNull),
            Box::new(if_code::IfCodeThenNumericEquals),
            Box::new(if_code::IfCodeThenBetweenExclusive),
            Box::new(if_code::IfCodeThenGreaterThanOrEqual),
            Box::new(if_code::IfCodeThenMultipleOf),
            Box::new(build_height::BuildHeightBaseVsMax),
            Box::new(build_height::BuildHeightMaxVsFacility),
            Box::new(build_height::BuildHeightLowestVsBase),
        ];
        let strategies = list.into_iter().map(|s| (s.check_type(), s)).collect();
        Self { strategies }
    }

    pub fn get(&self, check_type: AttributeCheckType) -> Option<&dyn AttributeStrategy> {
        self.strategies.get(&check_type).map(|b| b.as_ref())
    }
}

impl Default for AttributeRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registry_has_all_seventeen_check_types() {
        let registry = AttributeRegistry::new();
        for ct in AttributeCheckType::ALL {
            assert!(registry.get(ct).is_some(), "missing strategy for {ct:?}");
        }
    }
}
