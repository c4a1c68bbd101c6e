//! OpenAPI documentation aggregator.
//!
//! Collects all `#[utoipa::path]`-annotated handlers and `ToSchema`-derived
//! types into a single OpenAPI spec, served via Scalar UI at `/docs`.

use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "genoscore API",
        version = "0.1.0",
        description = "Gene scoring engine: piecewise rules, weighted rubrics, schema validation, and asynchronous scoring jobs.",
    ),
    tags(
        (name = "Health", description = "Server readiness and store counts"),
        (name = "Rules", description = "Piecewise scoring rule CRUD and interactive testing"),
        (name = "Rubrics", description = "Weighted rule collections and membership"),
        (name = "Datasets", description = "Dataset registration and column catalogs"),
        (name = "Analysis", description = "Validation pre-flight, job submission, polling, results, cancellation"),
    ),
    paths(
        crate::api::health::health,
        crate::api::rules::list_rules,
        crate::api::rules::create_rule,
        crate::api::rules::get_rule,
        crate::api::rules::delete_rule,
        crate::api::rules::test_rule,
        crate::api::rubrics::list_rubrics,
        crate::api::rubrics::create_rubric,
        crate::api::rubrics::get_rubric,
        crate::api::rubrics::delete_rubric,
        crate::api::rubrics::rubric_rules,
        crate::api::datasets::register_dataset,
        crate::api::datasets::list_datasets,
        crate::api::datasets::get_dataset,
        crate::api::analysis::validate,
        crate::api::analysis::execute,
        crate::api::analysis::job_status,
        crate::api::analysis::job_results,
        crate::api::analysis::cancel_job,
    )
)]
pub struct ApiDoc;
