//! `Job` and its lifecycle (spec.md §3). Ownership: the Orchestrator
//! exclusively mutates `Job`; strategies only ever see a read-only
//! `CheckContext` (see `crate::stages::context`).

use std::collections::HashMap;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobState {
    Pending,
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl JobState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobState::Completed | JobState::Failed | JobState::Cancelled)
    }

    /// `Job state progression` invariant (spec.md §8): valid direct
    /// transitions out of `self`.
    pub fn can_transition_to(&self, next: &JobState) -> bool {
        matches!(
            (self, next),
            (JobState::Pending, JobState::Running)
                | (JobState::Running, JobState::Completed)
                | (JobState::Running, JobState::Failed)
                | (JobState::Running, JobState::Cancelled)
                | (JobState::Pending, JobState::Cancelled)
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageStatus {
    Pending,
    Running,
    Passed,
    Failed,
    Blocked,
    Skipped,
}

#[derive(Debug, Clone)]
pub struct StageProgress {
    pub status: StageStatus,
    pub pct: u8,
    pub current_task: Option<String>,
}

impl Default for StageProgress {
    fn default() -> Self {
        Self {
            status: StageStatus::Pending,
            pct: 0,
            current_task: None,
        }
    }
}

/// Request payload accepted by `Orchestrator::create_job`, mirroring the
/// `POST /validation/start` body of spec.md §6.
#[derive(Debug, Clone)]
pub struct JobRequest {
    pub gdb_path: PathBuf,
    pub stages: Vec<u8>,
    pub stop_on_table_check_failure: bool,
}

impl Default for JobRequest {
    fn default() -> Self {
        Self {
            gdb_path: PathBuf::new(),
            stages: vec![1, 2, 3, 4, 5],
            stop_on_table_check_failure: false,
        }
    }
}

#[derive(Debug, Clone)]
pub struct JobResult {
    pub total_errors: u64,
    pub total_warnings: u64,
    pub errors_path: PathBuf,
}

#[derive(Debug, Clone)]
pub struct Job {
    pub job_id: String,
    pub request: JobRequest,
    pub state: JobState,
    pub progress_pct: u8,
    pub selected_stages: Vec<u8>,
    pub stage_progress: HashMap<u8, StageProgress>,
    pub error_count: u64,
    pub warning_count: u64,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub cancellation_token: CancellationToken,
    pub result: Option<JobResult>,
    pub error_sink_path: PathBuf,
}

impl Job {
    pub fn new(job_id: String, request: JobRequest, error_sink_path: PathBuf) -> Self {
        let selected_stages = request.stages.clone();
        let stage_progress = selected_stages
            .iter()
            .map(|&s| (s, StageProgress::default()))
            .collect();
        Self {
            job_id,
            request,
            state: JobState::Pending,
            progress_pct: 0,
            selected_stages,
            stage_progress,
            error_count: 0,
            warning_count: 0,
            started_at: Utc::now(),
            completed_at: None,
            cancellation_token: CancellationToken::new(),
            result: None,
            error_sink_path,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancellation_token.is_cancelled()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pending_cannot_jump_to_completed() {
        assert!(!JobState::Pending.can_transition_to(&JobState::Completed));
    }

    #[test]
    fn running_can_reach_any_terminal_state() {
        assert!(JobState::Running.can_transition_to(&JobState::Completed));
        assert!(JobState::Running.can_transition_to(&JobState::Failed));
        assert!(JobState::Running.can_transition_to(&JobState::Cancelled));
    }

    #[test]
    fn terminal_states_are_terminal() {
        assert!(JobState::Completed.is_terminal());
        assert!(JobState::Failed.is_terminal());
        assert!(JobState::Cancelled.is_terminal());
        assert!(!JobState::Running.is_terminal());
    }

    #[test]
    fn new_job_starts_pending_and_not_cancelled() {
        let job = Job::new("val_x".into(), JobRequest::default(), "work/val_x/errors.ndjson".into());
        assert_eq!(job.state, JobState::Pending);
        assert!(!job.is_cancelled());
    }
}
