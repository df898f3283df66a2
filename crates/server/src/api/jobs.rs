//! Job API handlers.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use exemaker_core::{
    split_extra_args, AuxDir, ConsoleMode, HiddenImports, JobDescriptor, JobId, JobSnapshot,
    LogRecord, OutputMode,
};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

use super::handlers::{api_error, queue_error, ApiError};
use crate::state::AppState;

// ============================================================================
// Request/Response Types
// ============================================================================

/// Request body for creating or editing a job.
///
/// Mirrors the fields of a job form: hidden imports arrive as one
/// comma-separated string and extra arguments as one free-form string.
/// Blank optional strings count as absent.
#[derive(Debug, Deserialize)]
pub struct JobRequest {
    /// Path of the `.py` script to package
    pub source: PathBuf,
    #[serde(default)]
    pub output_mode: OutputMode,
    #[serde(default)]
    pub console_mode: ConsoleMode,
    pub output_dir: Option<PathBuf>,
    pub output_name: Option<String>,
    pub icon: Option<PathBuf>,
    pub file_version: Option<String>,
    pub copyright: Option<String>,
    pub hidden_imports: Option<String>,
    pub extra_args: Option<String>,
    #[serde(default)]
    pub aux_dirs: Vec<AuxDirBody>,
}

/// Auxiliary directory in request body
#[derive(Debug, Deserialize)]
pub struct AuxDirBody {
    pub source: PathBuf,
    pub destination: String,
}

impl JobRequest {
    pub fn into_descriptor(self) -> JobDescriptor {
        let mut descriptor = JobDescriptor::new(self.source)
            .with_output_mode(self.output_mode)
            .with_console_mode(self.console_mode);

        descriptor.output_dir = self.output_dir.filter(|p| !p.as_os_str().is_empty());
        descriptor.output_name = non_blank(self.output_name);
        descriptor.icon = self.icon.filter(|p| !p.as_os_str().is_empty());
        descriptor.file_version = non_blank(self.file_version);
        descriptor.copyright = non_blank(self.copyright);
        descriptor.hidden_imports = self
            .hidden_imports
            .as_deref()
            .map(HiddenImports::parse)
            .unwrap_or_default();
        descriptor.extra_args = self
            .extra_args
            .as_deref()
            .map(split_extra_args)
            .unwrap_or_default();
        descriptor.aux_dirs = self
            .aux_dirs
            .into_iter()
            .map(|aux| AuxDir::new(aux.source, aux.destination))
            .collect();

        descriptor
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Response for listing jobs
#[derive(Debug, Serialize)]
pub struct ListJobsResponse {
    pub jobs: Vec<JobSnapshot>,
    pub total: usize,
}

/// Response for a job's captured output
#[derive(Debug, Serialize)]
pub struct JobLogResponse {
    pub job_id: JobId,
    pub lines: Vec<LogRecord>,
}

fn parse_job_id(id: &str) -> Result<JobId, ApiError> {
    id.parse()
        .map_err(|_| api_error(StatusCode::BAD_REQUEST, format!("Invalid job id: {}", id)))
}

fn not_found(id: JobId) -> ApiError {
    api_error(StatusCode::NOT_FOUND, format!("Job not found: {}", id))
}

// ============================================================================
// Handlers
// ============================================================================

/// Enqueue a new job
pub async fn create_job(
    State(state): State<Arc<AppState>>,
    Json(body): Json<JobRequest>,
) -> Result<(StatusCode, Json<JobSnapshot>), ApiError> {
    let queue = state.queue();
    let id = queue.enqueue(body.into_descriptor()).map_err(queue_error)?;
    let snapshot = queue.job(id).ok_or_else(|| not_found(id))?;
    Ok((StatusCode::CREATED, Json(snapshot)))
}

/// List all jobs in enqueue order
pub async fn list_jobs(State(state): State<Arc<AppState>>) -> Json<ListJobsResponse> {
    let jobs = state.queue().jobs();
    Json(ListJobsResponse {
        total: jobs.len(),
        jobs,
    })
}

/// Get a job by ID
pub async fn get_job(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<JobSnapshot>, ApiError> {
    let id = parse_job_id(&id)?;
    state.queue().job(id).map(Json).ok_or_else(|| not_found(id))
}

/// Replace the parameters of a job that has not started
pub async fn update_job(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(body): Json<JobRequest>,
) -> Result<Json<JobSnapshot>, ApiError> {
    let id = parse_job_id(&id)?;
    state
        .queue()
        .update(id, body.into_descriptor())
        .map(Json)
        .map_err(queue_error)
}

/// Remove a job that has not started
pub async fn delete_job(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<JobSnapshot>, ApiError> {
    let id = parse_job_id(&id)?;
    let removed = state.queue().remove(id).map_err(queue_error)?;
    info!("Job {} removed via API", id);
    Ok(Json(removed))
}

/// Get the output captured for a job
pub async fn get_job_log(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<JobLogResponse>, ApiError> {
    let id = parse_job_id(&id)?;
    let lines = state.queue().log(id).map_err(queue_error)?;
    Ok(Json(JobLogResponse { job_id: id, lines }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_maps_form_fields() {
        let body: JobRequest = serde_json::from_value(serde_json::json!({
            "source": "/work/app/main.py",
            "output_mode": "single_directory",
            "console_mode": "console",
            "output_name": "  tool ",
            "file_version": "",
            "hidden_imports": "numpy, pandas,,numpy",
            "extra_args": "  --log-level DEBUG ",
            "aux_dirs": [{ "source": "assets", "destination": "assets" }]
        }))
        .unwrap();

        let descriptor = body.into_descriptor();
        assert_eq!(descriptor.output_mode, OutputMode::SingleDirectory);
        assert_eq!(descriptor.console_mode, ConsoleMode::Console);
        assert_eq!(descriptor.output_name.as_deref(), Some("tool"));
        assert_eq!(descriptor.file_version, None);
        assert_eq!(
            descriptor.hidden_imports.iter().collect::<Vec<_>>(),
            vec!["numpy", "pandas"]
        );
        assert_eq!(descriptor.extra_args, vec!["--log-level", "DEBUG"]);
        assert_eq!(descriptor.aux_dirs, vec![AuxDir::new("assets", "assets")]);
    }

    #[test]
    fn test_minimal_request_uses_defaults() {
        let body: JobRequest =
            serde_json::from_value(serde_json::json!({ "source": "/work/a.py" })).unwrap();
        let descriptor = body.into_descriptor();
        assert_eq!(descriptor, JobDescriptor::new("/work/a.py"));
    }

    #[test]
    fn test_parse_job_id_rejects_garbage() {
        let (status, _) = parse_job_id("not-a-uuid").unwrap_err();
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }
}
