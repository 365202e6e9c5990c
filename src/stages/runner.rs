//! `PipelineRunner`: sequences Stages 1-5 for one job under the gating rule
//! (spec.md §4.3) and owns the registries/caches shared read-only across
//! every stage and every job (spec.md §5 "Shared mutable resources").

use std::collections::HashMap;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::attributes::AttributeRegistry;
use crate::checks::CheckRegistry;
use crate::codelist::CodelistStore;
use crate::index::SpatialIndexCache;
use crate::model::error_record::{Severity, ValidationError};
use crate::model::rule::{AttributeRule, GeometryRule, RelationRule, SchemaRule, TableRule};
use crate::model::{GeometryCriteria, StageStatus};
use crate::reader::DataSource;
use crate::relations::RelationRegistry;
use crate::stages::{attributes, geometry, relations, schema, tables};
use crate::Result;

/// Every rule family plus the ambient config a job needs to run the full
/// pipeline, bundled so `PipelineRunner::run` takes one argument per job
/// rather than five parallel slices (spec.md §3 "RuleSet").
#[derive(Debug, Clone, Default)]
pub struct RuleSet {
    pub table_rules: Vec<TableRule>,
    pub schema_rules: Vec<SchemaRule>,
    pub geometry_rules: Vec<GeometryRule>,
    pub relation_rules: Vec<RelationRule>,
    pub attribute_rules: Vec<AttributeRule>,
    pub criteria: GeometryCriteria,
}

#[derive(Debug, Clone)]
pub struct StageOutcome {
    pub status: StageStatus,
    pub errors: Vec<ValidationError>,
}

fn has_failure(errors: &[ValidationError]) -> bool {
    errors.iter().any(|e| matches!(e.severity, Severity::Error | Severity::Critical))
}

pub struct PipelineRunner {
    checks: CheckRegistry,
    relations: RelationRegistry,
    attributes: AttributeRegistry,
    index_cache: SpatialIndexCache,
}

impl PipelineRunner {
    pub fn new() -> Self {
        Self {
            checks: CheckRegistry::new(),
            relations: RelationRegistry::new(),
            attributes: AttributeRegistry::new(),
            index_cache: SpatialIndexCache::new(),
        }
    }

    pub fn index_cache(&self) -> &SpatialIndexCache {
        &self.index_cache
    }

    /// Runs every stage in `selected_stages` (a subset of `1..=5`) for one
    /// job, in order. `on_geometry_progress` is forwarded to Stage 3 only
    /// (spec.md §4.4 "progress callback every N features"); the orchestrator
    /// translates it into per-job `StageProgress`.
    #[allow(clippy::too_many_arguments)]
    pub async fn run(
        &self,
        job_id: &str,
        source: &dyn DataSource,
        rules: &RuleSet,
        codelist: &CodelistStore,
        selected_stages: &[u8],
        stop_on_table_check_failure: bool,
        cancellation: CancellationToken,
        on_geometry_progress: Arc<dyn Fn(u64) + Send + Sync>,
    ) -> Result<HashMap<u8, StageOutcome>> {
        let mut results = HashMap::new();
        let mut blocked = false;

        if selected_stages.contains(&1) {
            if rules.table_rules.is_empty() {
                results.insert(1, StageOutcome { status: StageStatus::Skipped, errors: Vec::new() });
            } else {
                let outcome = tables::run(job_id, source, &rules.table_rules, cancellation.clone())?;
                if !outcome.passed && stop_on_table_check_failure {
                    blocked = true;
                }
                let status = if outcome.passed { StageStatus::Passed } else { StageStatus::Failed };
                results.insert(1, StageOutcome { status, errors: outcome.errors });
            }
        }

        for &stage in &[2u8, 3, 4, 5] {
            if !selected_stages.contains(&stage) {
                continue;
            }
            if blocked {
                results.insert(stage, StageOutcome { status: StageStatus::Blocked, errors: Vec::new() });
                continue;
            }
            if cancellation.is_cancelled() {
                break;
            }

            let outcome = match stage {
                2 => {
                    if rules.schema_rules.is_empty() {
                        StageOutcome { status: StageStatus::Skipped, errors: Vec::new() }
                    } else {
                        let errors = schema::run(job_id, source, &rules.schema_rules, cancellation.clone())?;
                        let status = if has_failure(&errors) { StageStatus::Failed } else { StageStatus::Passed };
                        StageOutcome { status, errors }
                    }
                }
                3 => {
                    if rules.geometry_rules.is_empty() {
                        StageOutcome { status: StageStatus::Skipped, errors: Vec::new() }
                    } else {
                        let errors = geometry::run(job_id, source, &rules.geometry_rules, &self.checks, &self.index_cache, rules.criteria, cancellation.clone(), on_geometry_progress.clone()).await?;
                        let status = if has_failure(&errors) { StageStatus::Failed } else { StageStatus::Passed };
                        StageOutcome { status, errors }
                    }
                }
                4 => {
                    if rules.relation_rules.is_empty() {
                        StageOutcome { status: StageStatus::Skipped, errors: Vec::new() }
                    } else {
                        let errors = relations::run(job_id, source, &rules.relation_rules, &self.relations, &self.index_cache, cancellation.clone()).await?;
                        let status = if has_failure(&errors) { StageStatus::Failed } else { StageStatus::Passed };
                        StageOutcome { status, errors }
                    }
                }
                5 => {
                    if rules.attribute_rules.is_empty() {
                        StageOutcome { status: StageStatus::Skipped, errors: Vec::new() }
                    } else {
                        let errors = attributes::run(job_id, source, &rules.attribute_rules, &self.attributes, codelist, cancellation.clone())?;
                        let status = if has_failure(&errors) { StageStatus::Failed } else { StageStatus::Passed };
                        StageOutcome { status, errors }
                    }
                }
                _ => unreachable!("selected_stages is bounded to 1..=5 by JobRequest validation"),
            };
            results.insert(stage, outcome);
        }

        Ok(results)
    }
}

impl Default for PipelineRunner {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::feature::GeometryKind;
    use crate::model::rule::RuleMeta;
    use crate::model::LayerInfo;
    use crate::reader::LayerCursor;

    struct EmptySource;

    impl DataSource for EmptySource {
        fn list_layers(&self) -> Result<Vec<LayerInfo>> {
            Ok(vec![])
        }
        fn open_layer(&self, _id: &str) -> Result<Box<dyn LayerCursor>> {
            unimplemented!()
        }
    }

    #[tokio::test]
    async fn stage_with_no_rules_is_skipped() {
        let runner = PipelineRunner::new();
        let codelist = CodelistStore::new();
        let rules = RuleSet::default();
        let results = runner.run("val_1", &EmptySource, &rules, &codelist, &[1, 2, 3, 4, 5], false, CancellationToken::new(), Arc::new(|_| {})).await.unwrap();
        for stage in 1..=5u8 {
            assert_eq!(results.get(&stage).unwrap().status, StageStatus::Skipped);
        }
    }

    #[tokio::test]
    async fn failed_table_stage_blocks_downstream_when_gated() {
        let runner = PipelineRunner::new();
        let codelist = CodelistStore::new();
        let mut rules = RuleSet::default();
        rules.table_rules.push(TableRule {
            meta: RuleMeta { rule_id: "r1".into(), enabled: true, note: None },
            table_id: "tn_missing".into(),
            table_name: "Missing".into(),
            expected_geom_type: GeometryKind::Polygon,
            expected_epsg: None,
        });
        rules.schema_rules.push(crate::model::rule::SchemaRule {
            meta: RuleMeta { rule_id: "r2".into(), enabled: true, note: None },
            table_id: "tn_missing".into(),
            field_name: "f".into(),
            data_type: crate::model::rule::DataType::Text(10),
            is_pk: false,
            is_uk: false,
            is_fk: false,
            is_not_null: false,
            ref_table: None,
            ref_field: None,
        });
        let results = runner.run("val_1", &EmptySource, &rules, &codelist, &[1, 2], true, CancellationToken::new(), Arc::new(|_| {})).await.unwrap();
        assert_eq!(results.get(&1).unwrap().status, StageStatus::Failed);
        assert_eq!(results.get(&2).unwrap().status, StageStatus::Blocked);
        assert!(results.get(&2).unwrap().errors.is_empty());
    }
}
