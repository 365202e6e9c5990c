//! HTTP-surface-shaped request/response types (spec.md §6). This crate does
//! not bind a listener; these types are the stable contract a thin API
//! collaborator (axum, actix, …) wraps around [`crate::orchestrator::Orchestrator`].

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::job::{Job, JobRequest, JobResult, JobState};
use crate::model::{AttributeCheckType, CaseType, CheckType};
use crate::sink::{ErrorPage, PageFilter};
use crate::{orchestrator::Orchestrator, Error, Result};

/// `GET /validation/stages` response element.
#[derive(Debug, Clone, Serialize)]
pub struct StageDescriptor {
    pub stage_number: u8,
    pub stage_name: &'static str,
    pub description: &'static str,
    pub check_types: Vec<String>,
}

/// `GET /validation/stages`: a static catalog, not derived from any job.
pub fn list_stages() -> Vec<StageDescriptor> {
    vec![
        StageDescriptor {
            stage_number: 1,
            stage_name: "Tables",
            description: "table existence, geometry-type/EPSG mismatch, extra-layer warning",
            check_types: Vec::new(),
        },
        StageDescriptor {
            stage_number: 2,
            stage_name: "Schema",
            description: "column presence/type, not-null, primary/unique/foreign key",
            check_types: Vec::new(),
        },
        StageDescriptor {
            stage_number: 3,
            stage_name: "Geometry",
            description: "per-feature geometry validity and shape checks",
            check_types: CheckType::ALL.iter().map(|c| format!("{c:?}")).collect(),
        },
        StageDescriptor {
            stage_number: 4,
            stage_name: "Relations",
            description: "cross-layer and cross-feature spatial relationship checks",
            check_types: CaseType::ALL.iter().map(|c| format!("{c:?}")).collect(),
        },
        StageDescriptor {
            stage_number: 5,
            stage_name: "Attributes",
            description: "attribute value checks, codelists, conditional rules",
            check_types: AttributeCheckType::ALL.iter().map(|c| format!("{c:?}")).collect(),
        },
    ]
}

/// `POST /validation/start` request body.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartRequest {
    pub gdb_path: PathBuf,
    #[serde(default)]
    pub stages: Option<Vec<u8>>,
    #[serde(default)]
    pub stop_on_table_check_failure: bool,
}

impl From<StartRequest> for JobRequest {
    fn from(req: StartRequest) -> Self {
        Self {
            gdb_path: req.gdb_path,
            stages: req.stages.unwrap_or_else(|| vec![1, 2, 3, 4, 5]),
            stop_on_table_check_failure: req.stop_on_table_check_failure,
        }
    }
}

/// `POST /validation/start` response body, HTTP 202.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StartResponse {
    pub success: bool,
    pub job_id: String,
    pub started_at: DateTime<Utc>,
    pub selected_stages: Vec<u8>,
}

/// Creates and immediately starts a job, mirroring `POST /validation/start`.
pub fn start(orchestrator: &std::sync::Arc<Orchestrator>, request: StartRequest) -> Result<StartResponse> {
    let selected_stages = request.stages.clone().unwrap_or_else(|| vec![1, 2, 3, 4, 5]);
    let job_request: JobRequest = request.into();
    let job_id = orchestrator.create_job(job_request)?;
    orchestrator.start(&job_id)?;
    let job = orchestrator.status(&job_id)?;
    Ok(StartResponse {
        success: true,
        job_id,
        started_at: job.started_at,
        selected_stages,
    })
}

/// `GET /validation/jobs/{jobId}/status` response body.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusResponse {
    pub job_id: String,
    pub state: JobStateWire,
    pub progress_pct: u8,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStateWire {
    Pending,
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl From<&JobState> for JobStateWire {
    fn from(state: &JobState) -> Self {
        match state {
            JobState::Pending => JobStateWire::Pending,
            JobState::Running => JobStateWire::Running,
            JobState::Completed => JobStateWire::Completed,
            JobState::Failed => JobStateWire::Failed,
            JobState::Cancelled => JobStateWire::Cancelled,
        }
    }
}

impl From<&Job> for StatusResponse {
    fn from(job: &Job) -> Self {
        Self {
            job_id: job.job_id.clone(),
            state: (&job.state).into(),
            progress_pct: job.progress_pct,
            started_at: job.started_at,
            completed_at: job.completed_at,
        }
    }
}

pub fn get_status(orchestrator: &Orchestrator, job_id: &str) -> Result<StatusResponse> {
    Ok((&orchestrator.status(job_id)?).into())
}

/// `GET /validation/jobs/{jobId}/result` response body.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultResponse {
    pub success: bool,
    pub job_id: String,
    pub state: JobStateWire,
    pub total_errors: u64,
    pub total_warnings: u64,
}

pub fn get_result(orchestrator: &Orchestrator, job_id: &str) -> Result<ResultResponse> {
    let job = orchestrator.status(job_id)?;
    let result = job.result.unwrap_or(JobResult {
        total_errors: 0,
        total_warnings: 0,
        errors_path: PathBuf::new(),
    });
    Ok(ResultResponse {
        success: true,
        job_id: job.job_id,
        state: (&job.state).into(),
        total_errors: result.total_errors,
        total_warnings: result.total_warnings,
    })
}

/// `GET /validation/jobs/{jobId}/errors?stage=&page=&pageSize=` query params.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct ErrorsQuery {
    pub stage: Option<u8>,
    #[serde(default)]
    pub page: usize,
    #[serde(default = "default_page_size")]
    pub page_size: usize,
}

fn default_page_size() -> usize {
    100
}

pub fn get_errors(orchestrator: &Orchestrator, job_id: &str, query: ErrorsQuery) -> Result<ErrorPage> {
    let filter = PageFilter {
        stage: query.stage,
        rule_id: None,
    };
    let offset = query.page.saturating_mul(query.page_size.max(1));
    orchestrator.errors(job_id, offset, query.page_size.max(1), &filter)
}

pub fn cancel(orchestrator: &Orchestrator, job_id: &str) -> Result<()> {
    orchestrator.cancel(job_id)
}

pub fn delete(orchestrator: &Orchestrator, job_id: &str) -> Result<()> {
    orchestrator.delete(job_id)
}

/// `GET /validation/jobs` response element.
pub fn list_jobs(orchestrator: &Orchestrator) -> Vec<StatusResponse> {
    orchestrator.list_jobs().iter().map(StatusResponse::from).collect()
}

/// Maps an engine [`Error`] onto the HTTP status codes of spec.md §6.
pub fn status_code(error: &Error) -> u16 {
    match error {
        Error::UnknownJob(_) => 404,
        Error::Invariant(_) | Error::InvalidJobState { .. } => 400,
        Error::Configuration { .. } => 400,
        Error::PathNotFound(_) | Error::UnsupportedDriver(_) | Error::Corrupt { .. } => 400,
        _ => 500,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn list_stages_has_one_entry_per_stage() {
        let stages = list_stages();
        assert_eq!(stages.len(), 5);
        assert_eq!(stages[2].check_types.len(), CheckType::ALL.len());
    }

    #[test]
    fn start_request_defaults_to_all_stages() {
        let req = StartRequest {
            gdb_path: "x".into(),
            stages: None,
            stop_on_table_check_failure: false,
        };
        let job_request: JobRequest = req.into();
        assert_eq!(job_request.stages, vec![1, 2, 3, 4, 5]);
    }

    #[test]
    fn unknown_job_maps_to_404() {
        assert_eq!(status_code(&Error::UnknownJob("val_x".into())), 404);
    }

    #[test]
    fn invariant_violation_maps_to_400() {
        assert_eq!(status_code(&Error::Invariant("bad stages".into())), 400);
    }
}
