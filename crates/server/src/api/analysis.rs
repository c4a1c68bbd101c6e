//! Validation pre-flight, job submission, polling, results, and cancellation.
//!
//! Submission creates a job handle, registers it, and hands the run to a
//! blocking task; the response carries the job ID immediately. Validation
//! runs inside the orchestrator before any row is touched, so an
//! incompatible pair fails the job without consuming execution resources.
//! Pollers read snapshots at their own cadence; nothing here pushes.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use genoscore_engine::executor::{ExecutionRequest, Executor};
use genoscore_engine::job::{JobHandle, JobSnapshot, JobStatus};
use genoscore_engine::rubric::GeneScore;
use genoscore_engine::rule::Rule;
use genoscore_engine::stats::ScoreDistribution;
use genoscore_engine::validation::{validate_rubric, ValidationReport};

use crate::state::AppState;

use super::error_status;

#[derive(Deserialize, utoipa::ToSchema)]
pub struct RubricDatasetPair {
    pub rubric_id: Uuid,
    pub dataset_id: Uuid,
}

/// Pre-flight compatibility check of a (rubric, dataset) pair.
///
/// Stateless and recomputed on every call — either side may have changed
/// since the last check. Usable outside any job for interactive displays.
#[utoipa::path(
    post,
    path = "/validate",
    tag = "Analysis",
    request_body = RubricDatasetPair,
    responses(
        (status = 200, description = "Validation report (valid or not)", body = Object),
        (status = 404, description = "Rubric or dataset not found", body = String)
    )
)]
pub(crate) async fn validate(
    State(state): State<Arc<AppState>>,
    Json(pair): Json<RubricDatasetPair>,
) -> Result<Json<ValidationReport>, (StatusCode, String)> {
    state.rubric(pair.rubric_id).map_err(error_status)?;
    let dataset = state.dataset(pair.dataset_id).map_err(error_status)?;

    let members = state.members_of(pair.rubric_id);
    let member_rules: Vec<&Rule> = members.iter().map(|m| &m.rule).collect();
    Ok(Json(validate_rubric(&member_rules, &dataset.columns)))
}

#[derive(Serialize, utoipa::ToSchema)]
pub struct SubmitResponse {
    pub job_id: Uuid,
    #[schema(value_type = String)]
    pub status: JobStatus,
    pub message: String,
}

/// Submit a (rubric, dataset) pair for asynchronous execution.
///
/// Returns 202 with the job ID; poll `GET /jobs/{id}` for progress. An
/// incompatible pair surfaces as the job failing immediately with a
/// validation message, before it ever enters Running.
#[utoipa::path(
    post,
    path = "/execute",
    tag = "Analysis",
    request_body = RubricDatasetPair,
    responses(
        (status = 202, description = "Job accepted", body = SubmitResponse),
        (status = 404, description = "Rubric or dataset not found", body = String)
    )
)]
pub(crate) async fn execute(
    State(state): State<Arc<AppState>>,
    Json(pair): Json<RubricDatasetPair>,
) -> Result<(StatusCode, Json<SubmitResponse>), (StatusCode, String)> {
    let rubric = state.rubric(pair.rubric_id).map_err(error_status)?;
    let dataset = state.dataset(pair.dataset_id).map_err(error_status)?;

    // Snapshot the member set now: rule edits after submission must not
    // race a running job.
    let members = state.members_of(pair.rubric_id);

    let job = JobHandle::new(pair.rubric_id, pair.dataset_id);
    state
        .jobs
        .write()
        .expect("jobs lock poisoned")
        .insert(job.id(), job.clone());

    info!(job_id = %job.id(), rubric = %rubric.name, dataset = %dataset.name, "Job submitted");

    let engine_config = state.config.engine.clone();
    let worker_job = job.clone();
    let request = ExecutionRequest {
        rubric,
        members,
        dataset,
    };
    tokio::task::spawn_blocking(move || {
        Executor::new(engine_config).execute(request, &worker_job);
    });

    let snapshot = job.snapshot();
    Ok((
        StatusCode::ACCEPTED,
        Json(SubmitResponse {
            job_id: job.id(),
            status: snapshot.status,
            message: snapshot.message,
        }),
    ))
}

/// Poll a job's status, progress, and message.
#[utoipa::path(
    get,
    path = "/jobs/{id}",
    tag = "Analysis",
    params(("id" = Uuid, Path, description = "Job ID")),
    responses(
        (status = 200, description = "Job snapshot", body = Object),
        (status = 404, description = "Job not found", body = String)
    )
)]
pub(crate) async fn job_status(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<JobSnapshot>, (StatusCode, String)> {
    let job = state.job(id).map_err(error_status)?;
    Ok(Json(job.snapshot()))
}

#[derive(Serialize, utoipa::ToSchema)]
pub struct ResultsResponse {
    pub job_id: Uuid,
    #[schema(value_type = String)]
    pub status: JobStatus,
    pub total_genes: usize,
    pub error_count: usize,
    #[schema(value_type = Vec<Object>)]
    pub gene_scores: Vec<GeneScore>,
    #[schema(value_type = Object)]
    pub score_distribution: IndexMap<String, ScoreDistribution>,
}

/// Fetch a completed job's per-gene scores and score distributions.
///
/// Results exist only for Completed jobs: cancelled and failed jobs answer
/// 409 — never a silently truncated partial list.
#[utoipa::path(
    get,
    path = "/jobs/{id}/results",
    tag = "Analysis",
    params(("id" = Uuid, Path, description = "Job ID")),
    responses(
        (status = 200, description = "Gene scores and distributions", body = ResultsResponse),
        (status = 404, description = "Job not found", body = String),
        (status = 409, description = "Results not available for this job state", body = String)
    )
)]
pub(crate) async fn job_results(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<ResultsResponse>, (StatusCode, String)> {
    let job = state.job(id).map_err(error_status)?;

    let result = job.result().ok_or_else(|| {
        (
            StatusCode::CONFLICT,
            format!(
                "Results not available: job {} is {:?}",
                id,
                job.status()
            ),
        )
    })?;

    Ok(Json(ResultsResponse {
        job_id: id,
        status: job.status(),
        total_genes: result.total_genes,
        error_count: result.error_count,
        gene_scores: result.gene_scores.clone(),
        score_distribution: result.score_distribution.clone(),
    }))
}

/// Request cancellation of a pending or running job.
///
/// Cooperative: the orchestrator halts at the next row-batch boundary and
/// discards partial results. Terminal jobs answer 409.
#[utoipa::path(
    post,
    path = "/jobs/{id}/cancel",
    tag = "Analysis",
    params(("id" = Uuid, Path, description = "Job ID")),
    responses(
        (status = 200, description = "Cancellation requested; snapshot returned", body = Object),
        (status = 404, description = "Job not found", body = String),
        (status = 409, description = "Job already terminal", body = String)
    )
)]
pub(crate) async fn cancel_job(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<JobSnapshot>, (StatusCode, String)> {
    let job = state.job(id).map_err(error_status)?;

    if !job.cancel() {
        return Err((
            StatusCode::CONFLICT,
            format!("Job {} is already {:?}", id, job.status()),
        ));
    }

    info!(job_id = %id, "Cancellation requested");
    Ok(Json(job.snapshot()))
}
