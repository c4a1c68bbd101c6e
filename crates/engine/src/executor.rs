//! Execution orchestrator: drives one job over a dataset's gene rows.
//!
//! One `execute` call owns one job from validation through its terminal
//! state. Rows are evaluated in batches on a rayon pool (each gene row is
//! independent); statistics fold into job-level accumulators between
//! batches, so there is a single aggregation point and no shared mutable
//! state across workers. Cancellation is observed at batch boundaries only,
//! which guarantees no partially-applied aggregate state ever escapes.
//!
//! The orchestrator is synchronous; callers that need it off-thread spawn
//! it (the server uses `tokio::task::spawn_blocking`).

use std::cmp::Ordering;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use indexmap::IndexMap;
use rayon::prelude::*;
use tracing::{debug, info, warn};

use genoscore_core::config::EngineConfig;
use genoscore_core::dataset::{Dataset, GeneRow};

use crate::job::{ExecutionResult, JobHandle};
use crate::rubric::{score_gene, GeneScore, Member, Rubric};
use crate::rule::Rule;
use crate::stats::{RunningStats, ScoreDistribution};
use crate::validation::validate_rubric;

/// Distribution key for the weighted per-gene total.
const TOTAL_SCORE_COLUMN: &str = "TOTAL_SCORE";

/// Everything one job needs, owned for the duration of the run. Members are
/// materialized at submission time, so later rule edits cannot race the job;
/// the dataset is shared read-only.
pub struct ExecutionRequest {
    pub rubric: Rubric,
    pub members: Vec<Member>,
    pub dataset: Arc<Dataset>,
}

/// Drives job execution. Stateless apart from configuration; one executor
/// can serve any number of concurrent jobs.
pub struct Executor {
    config: EngineConfig,
}

impl Executor {
    pub fn new(config: EngineConfig) -> Self {
        Self { config }
    }

    /// Run a job to a terminal state.
    ///
    /// Validates first: an incompatible (rubric, dataset) pair fails the
    /// job immediately and never enters Running, consuming no execution
    /// resources.
    pub fn execute(&self, request: ExecutionRequest, job: &JobHandle) {
        if job.is_cancel_requested() {
            job.mark_cancelled();
            return;
        }

        let member_rules: Vec<&Rule> = request.members.iter().map(|m| &m.rule).collect();
        let report = validate_rubric(&member_rules, &request.dataset.columns);
        if !report.is_valid {
            job.mark_failed(format!(
                "Validation failed: rubric '{}' is incompatible with dataset '{}': {}",
                request.rubric.name,
                request.dataset.name,
                report.failure_summary()
            ));
            return;
        }

        let total_rows = request.dataset.row_count();
        if total_rows == 0 {
            job.mark_failed(format!("Dataset '{}' has no rows", request.dataset.name));
            return;
        }

        job.mark_running();
        info!(
            job_id = %job.id(),
            rubric = %request.rubric.name,
            dataset = %request.dataset.name,
            rules = request.members.len(),
            rows = total_rows,
            "Job started"
        );

        let pool = match rayon::ThreadPoolBuilder::new()
            .num_threads(self.config.resolved_worker_threads())
            .build()
        {
            Ok(pool) => pool,
            Err(e) => {
                job.mark_failed(format!("Failed to build worker pool: {}", e));
                return;
            }
        };

        let members = &request.members;
        let batch_size = self.config.row_batch_size.max(1);
        let progress_step = self.config.progress_step_percent.max(1);

        // One accumulator per member rule plus one for the total — the
        // single aggregation point all batches fold into.
        let mut rule_stats: IndexMap<String, RunningStats> = members
            .iter()
            .map(|m| (m.rule.name.clone(), RunningStats::new()))
            .collect();
        let mut total_stats = RunningStats::new();

        let mut gene_scores: Vec<GeneScore> = Vec::with_capacity(total_rows);
        let mut rows_done = 0usize;
        let mut last_emitted: u8 = 0;

        for chunk in request.dataset.rows.chunks(batch_size) {
            // Cooperative cancellation: checked at batch boundaries only,
            // never mid-evaluation.
            if job.is_cancel_requested() {
                job.mark_cancelled();
                info!(job_id = %job.id(), rows_done, "Job cancelled; partial results discarded");
                return;
            }

            let batch: Vec<GeneScore> = pool.install(|| {
                chunk
                    .par_iter()
                    .map(|row| {
                        catch_unwind(AssertUnwindSafe(|| score_gene(members, row)))
                            .unwrap_or_else(|_| faulted_score(row))
                    })
                    .collect()
            });

            let mut batch_faults = 0usize;
            for score in &batch {
                match score.total_score {
                    Some(total) => total_stats.push(total),
                    None => batch_faults += 1,
                }
                for (rule_name, value) in &score.per_rule {
                    if let (Some(stats), Some(v)) = (rule_stats.get_mut(rule_name), value) {
                        stats.push(*v);
                    }
                }
            }
            if batch_faults > 0 {
                job.bump_error_count(batch_faults);
                warn!(
                    job_id = %job.id(),
                    faults = batch_faults,
                    "Batch contained genes that could not be scored"
                );
            }

            gene_scores.extend(batch);
            rows_done += chunk.len();

            let percent = (rows_done * 100 / total_rows) as u8;
            if percent >= last_emitted.saturating_add(progress_step) || rows_done == total_rows {
                last_emitted = percent;
                job.set_progress(
                    percent,
                    format!("Scored {}/{} genes", rows_done, total_rows),
                );
                debug!(job_id = %job.id(), percent, "Progress");
            }
        }

        // Presentation order: highest totals first, unscorable genes last.
        gene_scores.sort_by(|a, b| match (a.total_score, b.total_score) {
            (Some(x), Some(y)) => y.partial_cmp(&x).unwrap_or(Ordering::Equal),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        });

        let error_count = gene_scores
            .iter()
            .filter(|g| g.total_score.is_none())
            .count();

        let mut score_distribution: IndexMap<String, ScoreDistribution> = rule_stats
            .iter()
            .map(|(name, stats)| (format!("{}_SCORE", name), stats.summarize(total_rows)))
            .collect();
        score_distribution.insert(
            TOTAL_SCORE_COLUMN.to_string(),
            total_stats.summarize(total_rows),
        );

        info!(job_id = %job.id(), genes = total_rows, faults = error_count, "Job completed");
        job.mark_completed(ExecutionResult {
            gene_scores,
            score_distribution,
            total_genes: total_rows,
            error_count,
        });
    }
}

/// Placeholder score for a gene whose evaluation faulted unexpectedly.
/// The fault is reflected in the job's error tally; it never aborts the run.
fn faulted_score(row: &GeneRow) -> GeneScore {
    GeneScore {
        gene_symbol: row.gene_symbol.clone(),
        per_rule: IndexMap::new(),
        total_score: None,
        rules_applied: 0,
        error: Some("unexpected evaluation fault".to_string()),
    }
}

// ── Tests ───────────────────────────────────────────────────────────
