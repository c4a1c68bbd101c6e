//! HTTP API handlers.

pub mod analysis;
pub mod datasets;
pub mod doc;
pub mod health;
pub mod rubrics;
pub mod rules;

use axum::http::StatusCode;

use genoscore_core::CoreError;

/// Map store lookup failures onto HTTP statuses.
pub(crate) fn error_status(err: CoreError) -> (StatusCode, String) {
    let status = match err {
        CoreError::DatasetNotFound(_)
        | CoreError::RuleNotFound(_)
        | CoreError::RubricNotFound(_)
        | CoreError::JobNotFound(_) => StatusCode::NOT_FOUND,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (status, err.to_string())
}
