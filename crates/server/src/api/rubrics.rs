//! Rubric CRUD and member-rule listing.
//!
//! Membership is a join entity (rubric_id, rule_id, weight, order_index):
//! the same rule can belong to many rubrics with different weights, and
//! deleting a rubric removes its links but never its rules.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use genoscore_engine::rubric::{Rubric, RubricRule};

use crate::state::AppState;

use super::error_status;

#[derive(Deserialize, utoipa::ToSchema)]
pub struct RubricMemberRequest {
    pub rule_id: Uuid,
    /// Rubric-local weight applied to the rule's resolved score.
    #[serde(default = "default_weight")]
    pub weight: f64,
    /// Presentation/iteration order; does not affect the aggregate.
    pub order_index: Option<u32>,
}

fn default_weight() -> f64 {
    1.0
}

#[derive(Deserialize, utoipa::ToSchema)]
pub struct CreateRubricRequest {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub rules: Vec<RubricMemberRequest>,
}

#[derive(Serialize, utoipa::ToSchema)]
pub struct RubricResponse {
    #[serde(flatten)]
    #[schema(value_type = Object)]
    pub rubric: Rubric,
    pub rule_count: usize,
}

/// List all rubrics, sorted by name.
#[utoipa::path(
    get,
    path = "/rubrics",
    tag = "Rubrics",
    responses(
        (status = 200, description = "All stored rubrics", body = Vec<RubricResponse>)
    )
)]
pub(crate) async fn list_rubrics(State(state): State<Arc<AppState>>) -> Json<Vec<RubricResponse>> {
    let rubrics = state.rubrics.read().expect("rubrics lock poisoned");
    let links = state.rubric_rules.read().expect("rubric_rules lock poisoned");

    let mut out: Vec<RubricResponse> = rubrics
        .values()
        .map(|r| RubricResponse {
            rule_count: links
                .iter()
                .filter(|l| l.rubric_id == r.id && l.is_active)
                .count(),
            rubric: r.clone(),
        })
        .collect();
    out.sort_by(|a, b| a.rubric.name.cmp(&b.rubric.name));
    Json(out)
}

/// Create a rubric with an initial member-rule list.
#[utoipa::path(
    post,
    path = "/rubrics",
    tag = "Rubrics",
    request_body = CreateRubricRequest,
    responses(
        (status = 201, description = "Rubric created", body = RubricResponse),
        (status = 400, description = "Unknown rule ID or invalid weight", body = String)
    )
)]
pub(crate) async fn create_rubric(
    State(state): State<Arc<AppState>>,
    Json(request): Json<CreateRubricRequest>,
) -> Result<(StatusCode, Json<RubricResponse>), (StatusCode, String)> {
    // Reject unknown rules and invalid weights before creating anything.
    {
        let rules = state.rules.read().expect("rules lock poisoned");
        for member in &request.rules {
            if !rules.contains_key(&member.rule_id) {
                return Err((
                    StatusCode::BAD_REQUEST,
                    format!("Unknown rule: {}", member.rule_id),
                ));
            }
            if member.weight.is_nan() || member.weight < 0.0 {
                return Err((
                    StatusCode::BAD_REQUEST,
                    format!("Rule weight must be non-negative, got {}", member.weight),
                ));
            }
        }
    }

    let rubric = Rubric::new(request.name, request.description);
    let rule_count = request.rules.len();

    let links: Vec<RubricRule> = request
        .rules
        .into_iter()
        .enumerate()
        .map(|(i, m)| RubricRule {
            rubric_id: rubric.id,
            rule_id: m.rule_id,
            weight: m.weight,
            order_index: m.order_index.unwrap_or(i as u32),
            is_active: true,
        })
        .collect();

    info!(rubric_id = %rubric.id, rubric = %rubric.name, rules = rule_count, "Rubric created");

    state
        .rubrics
        .write()
        .expect("rubrics lock poisoned")
        .insert(rubric.id, rubric.clone());
    state
        .rubric_rules
        .write()
        .expect("rubric_rules lock poisoned")
        .extend(links);

    Ok((
        StatusCode::CREATED,
        Json(RubricResponse { rubric, rule_count }),
    ))
}

/// Get a single rubric by ID.
#[utoipa::path(
    get,
    path = "/rubrics/{id}",
    tag = "Rubrics",
    params(("id" = Uuid, Path, description = "Rubric ID")),
    responses(
        (status = 200, description = "Rubric details", body = RubricResponse),
        (status = 404, description = "Rubric not found", body = String)
    )
)]
pub(crate) async fn get_rubric(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<RubricResponse>, (StatusCode, String)> {
    let rubric = state.rubric(id).map_err(error_status)?;
    let rule_count = state
        .rubric_rules
        .read()
        .expect("rubric_rules lock poisoned")
        .iter()
        .filter(|l| l.rubric_id == id && l.is_active)
        .count();
    Ok(Json(RubricResponse { rubric, rule_count }))
}

/// Delete a rubric and its membership links (member rules are shared and
/// survive).
#[utoipa::path(
    delete,
    path = "/rubrics/{id}",
    tag = "Rubrics",
    params(("id" = Uuid, Path, description = "Rubric ID")),
    responses(
        (status = 204, description = "Rubric deleted"),
        (status = 404, description = "Rubric not found", body = String)
    )
)]
pub(crate) async fn delete_rubric(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, (StatusCode, String)> {
    let removed = state
        .rubrics
        .write()
        .expect("rubrics lock poisoned")
        .remove(&id);
    if removed.is_none() {
        return Err(error_status(genoscore_core::CoreError::RubricNotFound(id)));
    }

    state
        .rubric_rules
        .write()
        .expect("rubric_rules lock poisoned")
        .retain(|link| link.rubric_id != id);

    Ok(StatusCode::NO_CONTENT)
}

#[derive(Serialize, utoipa::ToSchema)]
pub struct MemberRuleResponse {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub ruleset_conditions: Vec<String>,
    #[schema(value_type = Object)]
    pub column_mapping: IndexMap<String, String>,
    /// The rule's own default weight.
    pub weight: f64,
    /// The weight this rubric applies to the rule.
    pub rubric_weight: f64,
    pub order_index: u32,
    pub is_degenerate: bool,
}

/// List a rubric's member rules with their rubric-local weights, in order.
#[utoipa::path(
    get,
    path = "/rubrics/{id}/rules",
    tag = "Rubrics",
    params(("id" = Uuid, Path, description = "Rubric ID")),
    responses(
        (status = 200, description = "Member rules in order", body = Vec<MemberRuleResponse>),
        (status = 404, description = "Rubric not found", body = String)
    )
)]
pub(crate) async fn rubric_rules(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<MemberRuleResponse>>, (StatusCode, String)> {
    state.rubric(id).map_err(error_status)?;

    let members = state.members_of(id);
    let out = members
        .into_iter()
        .map(|m| MemberRuleResponse {
            id: m.rule.id,
            name: m.rule.name.clone(),
            description: m.rule.description.clone(),
            ruleset_conditions: m.rule.ruleset_conditions.clone(),
            column_mapping: m.rule.column_mapping.clone(),
            weight: m.rule.weight,
            rubric_weight: m.weight,
            order_index: m.order_index,
            is_degenerate: m.rule.is_degenerate(),
        })
        .collect();

    Ok(Json(out))
}
