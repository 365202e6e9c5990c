//! Job Orchestrator (spec.md §4.8/§5): owns the job registry, spawns one
//! background task per running job, and is the only thing allowed to mutate
//! a `Job` after it leaves `Pending`.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use parking_lot::RwLock;
use serde::Serialize;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::config::Config;
use crate::model::job::{Job, JobRequest, JobResult, JobState, StageStatus};
use crate::reader::{integrity, ShapefileDirSource};
use crate::rules;
use crate::sink::{ErrorSink, PageFilter};
use crate::stages::runner::{PipelineRunner, RuleSet};
use crate::{Error, Result};

/// In-memory batch size before the sink hits disk (spec.md §4.7).
const SINK_FLUSH_BATCH: usize = 500;

/// Terminal jobs older than this are evicted by the background sweep
/// (spec.md §4.8 "retention").
const RETENTION: chrono::Duration = chrono::Duration::hours(24);

/// The `meta.json` job snapshot written at finalization (spec.md §6).
#[derive(Debug, Serialize)]
struct JobSnapshot {
    job_id: String,
    state: String,
    progress_pct: u8,
    total_errors: u64,
    total_warnings: u64,
    started_at: DateTime<Utc>,
    completed_at: Option<DateTime<Utc>>,
}

impl From<&Job> for JobSnapshot {
    fn from(job: &Job) -> Self {
        Self {
            job_id: job.job_id.clone(),
            state: format!("{:?}", job.state),
            progress_pct: job.progress_pct,
            total_errors: job.error_count,
            total_warnings: job.warning_count,
            started_at: job.started_at,
            completed_at: job.completed_at,
        }
    }
}

struct JobEntry {
    job: RwLock<Job>,
    sink: Arc<ErrorSink>,
    handle: RwLock<Option<JoinHandle<()>>>,
}

/// Job lifecycle: create, start, observe, cancel, delete. One `PipelineRunner`
/// (and the registries/spatial index cache it owns) is shared read-only
/// across every job, mirroring spec.md §5's "shared mutable resources" model.
pub struct Orchestrator {
    jobs: DashMap<String, Arc<JobEntry>>,
    runner: Arc<PipelineRunner>,
    config: Config,
}

impl Orchestrator {
    pub fn new(config: Config) -> Arc<Self> {
        Arc::new(Self {
            jobs: DashMap::new(),
            runner: Arc::new(PipelineRunner::new()),
            config,
        })
    }

    /// Spawns the hourly eviction sweep (spec.md §4.8). The returned handle
    /// is detached; callers that want a clean shutdown can drop it.
    pub fn spawn_eviction_task(self: &Arc<Self>) -> JoinHandle<()> {
        let orchestrator = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(Duration::from_secs(3600));
            loop {
                ticker.tick().await;
                orchestrator.evict_expired();
            }
        })
    }

    fn evict_expired(&self) {
        let now = Utc::now();
        let expired: Vec<String> = self
            .jobs
            .iter()
            .filter(|entry| {
                let job = entry.value().job.read();
                job.state.is_terminal() && job.completed_at.is_some_and(|t| now - t > RETENTION)
            })
            .map(|entry| entry.key().clone())
            .collect();
        for job_id in expired {
            info!(job_id, "evicting job past retention window");
            self.delete(&job_id).ok();
        }
    }

    /// `val_YYYYMMDD_HHMMSS_<hex>` (spec.md §6), unique within this process
    /// by construction (the hex suffix is a truncated v4 UUID).
    fn generate_job_id() -> String {
        let now = Utc::now();
        let hex = Uuid::new_v4().simple().to_string();
        format!("val_{}_{}", now.format("%Y%m%d_%H%M%S"), &hex[..8])
    }

    pub fn create_job(&self, request: JobRequest) -> Result<String> {
        if request.stages.is_empty() || request.stages.iter().any(|s| !(1..=5).contains(s)) {
            return Err(Error::Invariant(format!(
                "stages must be a non-empty subset of 1..=5, got {:?}",
                request.stages
            )));
        }

        let job_id = Self::generate_job_id();
        let job_dir = self.config.job_dir(&job_id);
        std::fs::create_dir_all(&job_dir)?;
        let sink_path = job_dir.join("errors.ndjson");
        let sink = Arc::new(ErrorSink::create(&sink_path, SINK_FLUSH_BATCH)?);
        let job = Job::new(job_id.clone(), request, sink_path);

        self.jobs.insert(
            job_id.to_ascii_lowercase(),
            Arc::new(JobEntry {
                job: RwLock::new(job),
                sink,
                handle: RwLock::new(None),
            }),
        );
        Ok(job_id)
    }

    fn entry(&self, job_id: &str) -> Result<Arc<JobEntry>> {
        self.jobs
            .get(&job_id.to_ascii_lowercase())
            .map(|e| e.clone())
            .ok_or_else(|| Error::UnknownJob(job_id.to_string()))
    }

    /// Transitions the job to `Running` and spawns its pipeline task. Only
    /// one execution per job_id is ever spawned, since `start` refuses a job
    /// that isn't `Pending`.
    pub fn start(self: &Arc<Self>, job_id: &str) -> Result<()> {
        let entry = self.entry(job_id)?;
        {
            let mut job = entry.job.write();
            if !job.state.can_transition_to(&JobState::Running) {
                return Err(Error::InvalidJobState {
                    job_id: job_id.to_string(),
                    detail: format!("cannot start job in state {:?}", job.state),
                });
            }
            job.state = JobState::Running;
        }

        let orchestrator = self.clone();
        let job_id_owned = job_id.to_string();
        let handle = tokio::spawn(async move {
            orchestrator.run_job(job_id_owned).await;
        });
        *entry.handle.write() = Some(handle);
        Ok(())
    }

    async fn run_job(self: Arc<Self>, job_id: String) {
        let Ok(entry) = self.entry(&job_id) else {
            return;
        };

        let outcome = self.run_job_inner(&job_id, entry.clone()).await;
        let summary = entry.sink.finalize();

        let mut job = entry.job.write();
        match outcome {
            Ok(()) if job.is_cancelled() => {
                job.state = JobState::Cancelled;
            }
            Ok(()) => {
                job.state = JobState::Completed;
                job.progress_pct = 100;
            }
            Err(err) => {
                error!(job_id, error = %err, "job aborted with a system error");
                job.state = JobState::Failed;
            }
        }
        job.error_count = summary.total_errors;
        job.warning_count = summary.total_warnings;
        job.completed_at = Some(Utc::now());
        job.result = Some(JobResult {
            total_errors: summary.total_errors,
            total_warnings: summary.total_warnings,
            errors_path: summary.path,
        });

        let snapshot = JobSnapshot::from(&*job);
        drop(job);
        self.write_meta(&job_id, &snapshot);
    }

    /// `meta.json` per spec.md §6 "Persisted state layout"; best-effort, a
    /// failure here doesn't change the job's outcome.
    fn write_meta(&self, job_id: &str, snapshot: &JobSnapshot) {
        let path = self.config.job_dir(job_id).join("meta.json");
        match serde_json::to_vec_pretty(snapshot) {
            Ok(bytes) => {
                if let Err(err) = std::fs::write(&path, bytes) {
                    warn!(job_id, error = %err, "failed to write job meta.json");
                }
            }
            Err(err) => warn!(job_id, error = %err, "failed to serialize job meta.json"),
        }
    }

    async fn run_job_inner(&self, job_id: &str, entry: Arc<JobEntry>) -> Result<()> {
        let (gdb_path, selected_stages, stop_on_table_check_failure, cancellation) = {
            let job = entry.job.read();
            (
                job.request.gdb_path.clone(),
                job.selected_stages.clone(),
                job.request.stop_on_table_check_failure,
                job.cancellation_token.clone(),
            )
        };

        integrity::check(&gdb_path)?;
        let source = ShapefileDirSource::open(&gdb_path)?;

        let rule_set = RuleSet {
            table_rules: rules::load_table_rules(&self.config.config_dir.join("table.csv"))?,
            schema_rules: rules::load_schema_rules(&self.config.config_dir.join("schema.csv"))?,
            geometry_rules: rules::load_geometry_rules(&self.config.config_dir.join("geometry.csv"))?,
            relation_rules: rules::load_relation_rules(&self.config.config_dir.join("relation.csv"))?,
            attribute_rules: rules::load_attribute_rules(&self.config.config_dir.join("attribute.csv"))?,
            criteria: rules::load_criteria(&self.config.config_dir.join("criteria.csv"))?,
        };
        let codelist = rules::load_codelist(&self.config.config_dir.join("codelist.csv"))?;

        {
            let mut job = entry.job.write();
            for stage in &selected_stages {
                if let Some(progress) = job.stage_progress.get_mut(stage) {
                    progress.status = StageStatus::Running;
                }
            }
        }

        let progress_entry = entry.clone();
        let on_geometry_progress: Arc<dyn Fn(u64) + Send + Sync> = Arc::new(move |count: u64| {
            let mut job = progress_entry.job.write();
            if let Some(progress) = job.stage_progress.get_mut(&3) {
                progress.current_task = Some(format!("{count} features processed"));
            }
        });

        let results = self
            .runner
            .run(
                job_id,
                &source,
                &rule_set,
                &codelist,
                &selected_stages,
                stop_on_table_check_failure,
                cancellation.clone(),
                on_geometry_progress,
            )
            .await?;

        let total_selected = selected_stages.len().max(1);
        let mut completed = 0usize;
        for stage in 1..=5u8 {
            let Some(outcome) = results.get(&stage) else { continue };
            completed += 1;
            for error in &outcome.errors {
                entry.sink.append(error.clone());
            }
            let mut job = entry.job.write();
            if let Some(progress) = job.stage_progress.get_mut(&stage) {
                progress.status = outcome.status;
                progress.pct = 100;
            }
            job.progress_pct = ((completed * 100) / total_selected) as u8;
        }

        Ok(())
    }

    pub fn cancel(&self, job_id: &str) -> Result<()> {
        let entry = self.entry(job_id)?;
        let job = entry.job.read();
        if job.state.is_terminal() {
            return Err(Error::InvalidJobState {
                job_id: job_id.to_string(),
                detail: format!("cannot cancel job already in terminal state {:?}", job.state),
            });
        }
        job.cancellation_token.cancel();
        Ok(())
    }

    pub fn status(&self, job_id: &str) -> Result<Job> {
        Ok(self.entry(job_id)?.job.read().clone())
    }

    pub fn result(&self, job_id: &str) -> Result<Option<JobResult>> {
        Ok(self.entry(job_id)?.job.read().result.clone())
    }

    pub fn errors(&self, job_id: &str, offset: usize, limit: usize, filter: &PageFilter) -> Result<crate::sink::ErrorPage> {
        let entry = self.entry(job_id)?;
        entry.sink.read_page(offset, limit, filter)
    }

    /// Newest-first by `started_at`, per spec.md §6's job-listing contract.
    pub fn list_jobs(&self) -> Vec<Job> {
        let mut jobs: Vec<Job> = self.jobs.iter().map(|entry| entry.value().job.read().clone()).collect();
        jobs.sort_by(|a, b| b.started_at.cmp(&a.started_at));
        jobs
    }

    pub fn delete(&self, job_id: &str) -> Result<()> {
        let key = job_id.to_ascii_lowercase();
        let Some((_, entry)) = self.jobs.remove(&key) else {
            return Err(Error::UnknownJob(job_id.to_string()));
        };
        if let Some(handle) = entry.handle.write().take() {
            handle.abort();
        }
        let job_dir = self.config.job_dir(job_id);
        if let Err(err) = std::fs::remove_dir_all(&job_dir) {
            if err.kind() != std::io::ErrorKind::NotFound {
                warn!(job_id, error = %err, "failed to remove job directory on delete");
            }
        }
        self.runner.index_cache().evict_job(job_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(dir: &tempfile::TempDir) -> Config {
        Config {
            config_dir: dir.path().join("config"),
            work_dir: dir.path().join("work"),
            bind_addr: "127.0.0.1:0".into(),
        }
    }

    #[test]
    fn job_id_has_expected_shape() {
        let id = Orchestrator::generate_job_id();
        assert!(id.starts_with("val_"));
        let parts: Vec<&str> = id.splitn(4, '_').collect();
        assert_eq!(parts.len(), 4);
        assert_eq!(parts[1].len(), 8);
        assert_eq!(parts[2].len(), 6);
        assert_eq!(parts[3].len(), 8);
    }

    #[test]
    fn create_job_rejects_out_of_range_stages() {
        let dir = tempfile::tempdir().unwrap();
        let orchestrator = Orchestrator::new(config(&dir));
        let request = JobRequest {
            gdb_path: dir.path().join("nonexistent"),
            stages: vec![1, 6],
            stop_on_table_check_failure: false,
        };
        let err = orchestrator.create_job(request).unwrap_err();
        assert!(matches!(err, Error::Invariant(_)));
    }

    #[test]
    fn create_job_rejects_empty_stage_list() {
        let dir = tempfile::tempdir().unwrap();
        let orchestrator = Orchestrator::new(config(&dir));
        let request = JobRequest {
            gdb_path: dir.path().join("nonexistent"),
            stages: vec![],
            stop_on_table_check_failure: false,
        };
        assert!(orchestrator.create_job(request).is_err());
    }

    #[test]
    fn create_job_persists_a_pending_job() {
        let dir = tempfile::tempdir().unwrap();
        let orchestrator = Orchestrator::new(config(&dir));
        let request = JobRequest {
            gdb_path: dir.path().join("nonexistent"),
            ..Default::default()
        };
        let job_id = orchestrator.create_job(request).unwrap();
        let job = orchestrator.status(&job_id).unwrap();
        assert_eq!(job.state, JobState::Pending);
        assert!(dir.path().join("work").join(&job_id).join("errors.ndjson").exists());
    }

    #[test]
    fn status_lookup_is_case_insensitive() {
        let dir = tempfile::tempdir().unwrap();
        let orchestrator = Orchestrator::new(config(&dir));
        let request = JobRequest {
            gdb_path: dir.path().join("nonexistent"),
            ..Default::default()
        };
        let job_id = orchestrator.create_job(request).unwrap();
        assert!(orchestrator.status(&job_id.to_ascii_uppercase()).is_ok());
    }

    #[tokio::test]
    async fn start_on_source_missing_integrity_sentinel_fails_the_job() {
        let dir = tempfile::tempdir().unwrap();
        let orchestrator = Orchestrator::new(config(&dir));
        let missing_source = dir.path().join("source_without_sentinel");
        std::fs::create_dir_all(&missing_source).unwrap();
        let request = JobRequest {
            gdb_path: missing_source,
            ..Default::default()
        };
        let job_id = orchestrator.create_job(request).unwrap();
        orchestrator.start(&job_id).unwrap();

        let entry = orchestrator.entry(&job_id).unwrap();
        let join = entry.handle.write().take().unwrap();
        join.await.unwrap();

        let job = orchestrator.status(&job_id).unwrap();
        assert_eq!(job.state, JobState::Failed);
    }

    #[tokio::test]
    async fn starting_a_running_job_twice_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let orchestrator = Orchestrator::new(config(&dir));
        let request = JobRequest {
            gdb_path: dir.path().join("nonexistent"),
            ..Default::default()
        };
        let job_id = orchestrator.create_job(request).unwrap();
        orchestrator.start(&job_id).unwrap();
        assert!(orchestrator.start(&job_id).is_err());
    }

    #[test]
    fn cancel_unknown_job_is_unknown_job_error() {
        let dir = tempfile::tempdir().unwrap();
        let orchestrator = Orchestrator::new(config(&dir));
        assert!(matches!(orchestrator.cancel("val_nope").unwrap_err(), Error::UnknownJob(_)));
    }

    #[test]
    fn delete_removes_job_directory() {
        let dir = tempfile::tempdir().unwrap();
        let orchestrator = Orchestrator::new(config(&dir));
        let request = JobRequest {
            gdb_path: dir.path().join("nonexistent"),
            ..Default::default()
        };
        let job_id = orchestrator.create_job(request).unwrap();
        let job_dir = dir.path().join("work").join(&job_id);
        assert!(job_dir.exists());
        orchestrator.delete(&job_id).unwrap();
        assert!(!job_dir.exists());
        assert!(orchestrator.status(&job_id).is_err());
    }

    #[test]
    fn list_jobs_orders_newest_first() {
        let dir = tempfile::tempdir().unwrap();
        let orchestrator = Orchestrator::new(config(&dir));
        let first = orchestrator
            .create_job(JobRequest {
                gdb_path: dir.path().join("a"),
                ..Default::default()
            })
            .unwrap();
        std::thread::sleep(Duration::from_millis(5));
        let second = orchestrator
            .create_job(JobRequest {
                gdb_path: dir.path().join("b"),
                ..Default::default()
            })
            .unwrap();
        let jobs = orchestrator.list_jobs();
        assert_eq!(jobs[0].job_id, second);
        assert_eq!(jobs[1].job_id, first);
    }
}
