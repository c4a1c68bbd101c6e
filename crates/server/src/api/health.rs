//! Server readiness and store counts.

use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use serde::Serialize;

use genoscore_engine::job::JobStatus;

use crate::state::AppState;

#[derive(Serialize, utoipa::ToSchema)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub rule_count: usize,
    pub rubric_count: usize,
    pub dataset_count: usize,
    pub running_jobs: usize,
}

#[utoipa::path(
    get,
    path = "/health",
    tag = "Health",
    responses(
        (status = 200, description = "Server health and store counts", body = HealthResponse)
    )
)]
pub(crate) async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let running_jobs = state
        .jobs
        .read()
        .expect("jobs lock poisoned")
        .values()
        .filter(|j| matches!(j.status(), JobStatus::Pending | JobStatus::Running))
        .count();

    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        rule_count: state.rules.read().expect("rules lock poisoned").len(),
        rubric_count: state.rubrics.read().expect("rubrics lock poisoned").len(),
        dataset_count: state.datasets.read().expect("datasets lock poisoned").len(),
        running_jobs,
    })
}
