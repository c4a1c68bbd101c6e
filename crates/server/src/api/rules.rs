//! Rule CRUD and interactive rule testing.
//!
//! Rules are compiled at creation time: an unparseable clause or an
//! unmapped variable is rejected with 400 before the rule ever exists,
//! so execution only ever sees well-formed rules.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use genoscore_core::dataset::GeneRow;
use genoscore_engine::rule::{Rule, RuleSpec, RuleTrace};

use crate::state::AppState;

use super::error_status;

/// A stored rule plus derived data-quality flags.
#[derive(Serialize, utoipa::ToSchema)]
pub struct RuleResponse {
    #[serde(flatten)]
    #[schema(value_type = Object)]
    pub rule: Rule,
    /// True when the only clause is the unconditional catch-all — the rule
    /// never discriminates. A data-quality signal, not an error.
    pub is_degenerate: bool,
}

impl RuleResponse {
    fn from_rule(rule: Rule) -> Self {
        let is_degenerate = rule.is_degenerate();
        Self { rule, is_degenerate }
    }
}

/// List all rules, sorted by name.
#[utoipa::path(
    get,
    path = "/rules",
    tag = "Rules",
    responses(
        (status = 200, description = "All stored rules", body = Vec<RuleResponse>)
    )
)]
pub(crate) async fn list_rules(State(state): State<Arc<AppState>>) -> Json<Vec<RuleResponse>> {
    let guard = state.rules.read().expect("rules lock poisoned");
    let mut rules: Vec<Rule> = guard.values().cloned().collect();
    rules.sort_by(|a, b| a.name.cmp(&b.name));
    Json(rules.into_iter().map(RuleResponse::from_rule).collect())
}

/// Create a rule from a spec; compiles all clauses.
#[utoipa::path(
    post,
    path = "/rules",
    tag = "Rules",
    request_body = Object,
    responses(
        (status = 201, description = "Rule created", body = RuleResponse),
        (status = 400, description = "Spec failed to compile", body = String)
    )
)]
pub(crate) async fn create_rule(
    State(state): State<Arc<AppState>>,
    Json(spec): Json<RuleSpec>,
) -> Result<(StatusCode, Json<RuleResponse>), (StatusCode, String)> {
    let rule = Rule::compile(spec).map_err(|e| (StatusCode::BAD_REQUEST, e.to_string()))?;

    if rule.is_degenerate() {
        warn!(rule = %rule.name, "Rule is degenerate: its only clause is the catch-all");
    }
    info!(rule_id = %rule.id, rule = %rule.name, "Rule created");

    state
        .rules
        .write()
        .expect("rules lock poisoned")
        .insert(rule.id, rule.clone());

    Ok((StatusCode::CREATED, Json(RuleResponse::from_rule(rule))))
}

/// Get a single rule by ID.
#[utoipa::path(
    get,
    path = "/rules/{id}",
    tag = "Rules",
    params(("id" = Uuid, Path, description = "Rule ID")),
    responses(
        (status = 200, description = "Rule details", body = RuleResponse),
        (status = 404, description = "Rule not found", body = String)
    )
)]
pub(crate) async fn get_rule(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<RuleResponse>, (StatusCode, String)> {
    let rule = state.rule(id).map_err(error_status)?;
    Ok(Json(RuleResponse::from_rule(rule)))
}

/// Delete a rule and any rubric links referencing it.
#[utoipa::path(
    delete,
    path = "/rules/{id}",
    tag = "Rules",
    params(("id" = Uuid, Path, description = "Rule ID")),
    responses(
        (status = 204, description = "Rule deleted"),
        (status = 404, description = "Rule not found", body = String)
    )
)]
pub(crate) async fn delete_rule(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, (StatusCode, String)> {
    let removed = state
        .rules
        .write()
        .expect("rules lock poisoned")
        .remove(&id);
    if removed.is_none() {
        return Err(error_status(genoscore_core::CoreError::RuleNotFound(id)));
    }

    state
        .rubric_rules
        .write()
        .expect("rubric_rules lock poisoned")
        .retain(|link| link.rule_id != id);

    Ok(StatusCode::NO_CONTENT)
}

#[derive(Deserialize, utoipa::ToSchema)]
pub struct TestRuleRequest {
    /// A sample gene row to evaluate the rule against.
    #[schema(value_type = Object)]
    pub sample_row: GeneRow,
}

/// Evaluate a rule against a sample row with a full per-clause trace.
#[utoipa::path(
    post,
    path = "/rules/{id}/test",
    tag = "Rules",
    params(("id" = Uuid, Path, description = "Rule ID")),
    request_body = TestRuleRequest,
    responses(
        (status = 200, description = "Per-clause evaluation trace", body = Object),
        (status = 404, description = "Rule not found", body = String)
    )
)]
pub(crate) async fn test_rule(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(request): Json<TestRuleRequest>,
) -> Result<Json<RuleTrace>, (StatusCode, String)> {
    let rule = state.rule(id).map_err(error_status)?;
    Ok(Json(rule.trace(&request.sample_row)))
}
