//! Dataset registration and catalog queries.
//!
//! The engine only needs a column catalog plus rows; how the data got here
//! (Excel/CSV parsing, upload plumbing) is a collaborator concern. Rows are
//! accepted pre-parsed as JSON and never mutated after registration.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use genoscore_core::dataset::{Column, Dataset, GeneRow};

use crate::state::AppState;

use super::error_status;

#[derive(Deserialize, utoipa::ToSchema)]
pub struct RegisterDatasetRequest {
    pub name: String,
    #[schema(value_type = Vec<Object>)]
    pub columns: Vec<Column>,
    #[schema(value_type = Vec<Object>)]
    pub rows: Vec<GeneRow>,
}

#[derive(Serialize, utoipa::ToSchema)]
pub struct DatasetSummary {
    pub id: Uuid,
    pub name: String,
    pub column_count: usize,
    pub row_count: usize,
    pub registered_at: DateTime<Utc>,
}

impl DatasetSummary {
    fn from_dataset(ds: &Dataset) -> Self {
        Self {
            id: ds.id,
            name: ds.name.clone(),
            column_count: ds.columns.len(),
            row_count: ds.row_count(),
            registered_at: ds.registered_at,
        }
    }
}

/// Column catalog view of a dataset (rows omitted).
#[derive(Serialize, utoipa::ToSchema)]
pub struct DatasetCatalog {
    pub id: Uuid,
    pub name: String,
    #[schema(value_type = Vec<Object>)]
    pub columns: Vec<Column>,
    pub row_count: usize,
    pub registered_at: DateTime<Utc>,
}

/// Register a dataset: column catalog plus gene rows.
#[utoipa::path(
    post,
    path = "/datasets",
    tag = "Datasets",
    request_body = RegisterDatasetRequest,
    responses(
        (status = 201, description = "Dataset registered", body = DatasetSummary),
        (status = 400, description = "Row references a column absent from the catalog", body = String)
    )
)]
pub(crate) async fn register_dataset(
    State(state): State<Arc<AppState>>,
    Json(request): Json<RegisterDatasetRequest>,
) -> Result<(StatusCode, Json<DatasetSummary>), (StatusCode, String)> {
    let dataset = Dataset::new(request.name, request.columns, request.rows);

    // Rows must stay within the declared catalog; silent extra columns
    // would make validation lie about what rules can reference.
    for row in &dataset.rows {
        for column in row.values.keys() {
            if !dataset.has_column(column) {
                return Err((
                    StatusCode::BAD_REQUEST,
                    format!(
                        "Row for gene '{}' references column '{}' absent from the catalog",
                        row.gene_symbol, column
                    ),
                ));
            }
        }
    }

    info!(
        dataset_id = %dataset.id,
        dataset = %dataset.name,
        columns = dataset.columns.len(),
        rows = dataset.row_count(),
        "Dataset registered"
    );

    let summary = DatasetSummary::from_dataset(&dataset);
    state
        .datasets
        .write()
        .expect("datasets lock poisoned")
        .insert(dataset.id, Arc::new(dataset));

    Ok((StatusCode::CREATED, Json(summary)))
}

/// List registered datasets.
#[utoipa::path(
    get,
    path = "/datasets",
    tag = "Datasets",
    responses(
        (status = 200, description = "Dataset summaries", body = Vec<DatasetSummary>)
    )
)]
pub(crate) async fn list_datasets(State(state): State<Arc<AppState>>) -> Json<Vec<DatasetSummary>> {
    let guard = state.datasets.read().expect("datasets lock poisoned");
    let mut out: Vec<DatasetSummary> = guard
        .values()
        .map(|ds| DatasetSummary::from_dataset(ds))
        .collect();
    out.sort_by(|a, b| a.name.cmp(&b.name));
    Json(out)
}

/// Get a dataset's column catalog.
#[utoipa::path(
    get,
    path = "/datasets/{id}",
    tag = "Datasets",
    params(("id" = Uuid, Path, description = "Dataset ID")),
    responses(
        (status = 200, description = "Dataset column catalog", body = DatasetCatalog),
        (status = 404, description = "Dataset not found", body = String)
    )
)]
pub(crate) async fn get_dataset(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<DatasetCatalog>, (StatusCode, String)> {
    let ds = state.dataset(id).map_err(error_status)?;
    Ok(Json(DatasetCatalog {
        id: ds.id,
        name: ds.name.clone(),
        columns: ds.columns.clone(),
        row_count: ds.row_count(),
        registered_at: ds.registered_at,
    }))
}
