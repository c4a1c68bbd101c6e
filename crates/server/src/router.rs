//! HTTP router construction.
//!
//! Assembles all Axum routes, middleware, and OpenAPI docs into a single
//! `Router`.

use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::CorsLayer;
use utoipa::OpenApi;
use utoipa_scalar::{Scalar, Servable};

use crate::api;
use crate::state::AppState;

/// Build the complete application router with all routes and middleware.
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(api::health::health))
        // Rules
        .route(
            "/rules",
            get(api::rules::list_rules).post(api::rules::create_rule),
        )
        .route(
            "/rules/{id}",
            get(api::rules::get_rule).delete(api::rules::delete_rule),
        )
        .route("/rules/{id}/test", post(api::rules::test_rule))
        // Rubrics
        .route(
            "/rubrics",
            get(api::rubrics::list_rubrics).post(api::rubrics::create_rubric),
        )
        .route(
            "/rubrics/{id}",
            get(api::rubrics::get_rubric).delete(api::rubrics::delete_rubric),
        )
        .route("/rubrics/{id}/rules", get(api::rubrics::rubric_rules))
        // Datasets
        .route(
            "/datasets",
            get(api::datasets::list_datasets).post(api::datasets::register_dataset),
        )
        .route("/datasets/{id}", get(api::datasets::get_dataset))
        // Analysis
        .route("/validate", post(api::analysis::validate))
        .route("/execute", post(api::analysis::execute))
        .route("/jobs/{id}", get(api::analysis::job_status))
        .route("/jobs/{id}/results", get(api::analysis::job_results))
        .route("/jobs/{id}/cancel", post(api::analysis::cancel_job))
        .layer(CorsLayer::permissive())
        .with_state(state)
        .merge(Scalar::with_url("/docs", api::doc::ApiDoc::openapi()))
}
