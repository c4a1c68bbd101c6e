//! Execution job state machine and polling handle.
//!
//! A job moves `Pending → Running → {Completed | Failed | Cancelled}`.
//! Transitions are monotonic — no state re-entry — and progress only ever
//! increases. The [`JobHandle`] is a cheap `Arc` clone shared between the
//! orchestrator (writer) and any number of pollers (readers); pollers are
//! never blocked on, and the orchestrator never pushes.
//!
//! Cancellation is a cooperative request: [`JobHandle::cancel`] raises a
//! flag, and the orchestrator observes it at the next row-batch boundary.

use std::sync::atomic::{AtomicBool, AtomicU8, AtomicUsize, Ordering};
use std::sync::{Arc, RwLock};

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::Serialize;
use uuid::Uuid;

use crate::rubric::GeneScore;
use crate::stats::ScoreDistribution;

// ── Status ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobStatus::Completed | JobStatus::Failed | JobStatus::Cancelled
        )
    }
}

// ── Results ─────────────────────────────────────────────────────────

/// Final output of a completed job.
#[derive(Debug, Clone, Serialize)]
pub struct ExecutionResult {
    /// Per-gene scores, sorted by total score descending.
    pub gene_scores: Vec<GeneScore>,
    /// Score column name → distribution summary.
    pub score_distribution: IndexMap<String, ScoreDistribution>,
    pub total_genes: usize,
    /// Genes whose total score could not be computed (unexpected faults).
    pub error_count: usize,
}

/// Point-in-time view of a job, for pollers.
#[derive(Debug, Clone, Serialize)]
pub struct JobSnapshot {
    pub id: Uuid,
    pub rubric_id: Uuid,
    pub dataset_id: Uuid,
    pub status: JobStatus,
    pub progress_percent: u8,
    pub message: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub error_count: usize,
}

// ── Handle ──────────────────────────────────────────────────────────

struct JobInner {
    id: Uuid,
    rubric_id: Uuid,
    dataset_id: Uuid,
    status: RwLock<JobStatus>,
    progress: AtomicU8,
    message: RwLock<String>,
    cancel: AtomicBool,
    started_at: DateTime<Utc>,
    finished_at: RwLock<Option<DateTime<Utc>>>,
    error_count: AtomicUsize,
    result: RwLock<Option<Arc<ExecutionResult>>>,
}

/// Shared handle to one execution job.
#[derive(Clone)]
pub struct JobHandle {
    inner: Arc<JobInner>,
}

impl JobHandle {
    pub fn new(rubric_id: Uuid, dataset_id: Uuid) -> Self {
        Self {
            inner: Arc::new(JobInner {
                id: Uuid::new_v4(),
                rubric_id,
                dataset_id,
                status: RwLock::new(JobStatus::Pending),
                progress: AtomicU8::new(0),
                message: RwLock::new("Analysis queued".to_string()),
                cancel: AtomicBool::new(false),
                started_at: Utc::now(),
                finished_at: RwLock::new(None),
                error_count: AtomicUsize::new(0),
                result: RwLock::new(None),
            }),
        }
    }

    pub fn id(&self) -> Uuid {
        self.inner.id
    }

    pub fn status(&self) -> JobStatus {
        *self.inner.status.read().expect("job status lock poisoned")
    }

    /// Request cancellation. Permitted only while Pending or Running;
    /// returns false (no-op) once the job is terminal. The transition to
    /// Cancelled happens when the orchestrator observes the flag at the
    /// next batch boundary.
    pub fn cancel(&self) -> bool {
        let status = self.inner.status.read().expect("job status lock poisoned");
        if status.is_terminal() {
            return false;
        }
        drop(status);
        self.inner.cancel.store(true, Ordering::Relaxed);
        self.set_message("Cancellation requested");
        true
    }

    pub fn is_cancel_requested(&self) -> bool {
        self.inner.cancel.load(Ordering::Relaxed)
    }

    /// The final result, available only once Completed. Cancelled and
    /// failed jobs never expose results — not even partial ones.
    pub fn result(&self) -> Option<Arc<ExecutionResult>> {
        if self.status() != JobStatus::Completed {
            return None;
        }
        self.inner
            .result
            .read()
            .expect("job result lock poisoned")
            .clone()
    }

    pub fn snapshot(&self) -> JobSnapshot {
        JobSnapshot {
            id: self.inner.id,
            rubric_id: self.inner.rubric_id,
            dataset_id: self.inner.dataset_id,
            status: self.status(),
            progress_percent: self.inner.progress.load(Ordering::Relaxed),
            message: self
                .inner
                .message
                .read()
                .expect("job message lock poisoned")
                .clone(),
            started_at: self.inner.started_at,
            finished_at: *self
                .inner
                .finished_at
                .read()
                .expect("job finished_at lock poisoned"),
            error_count: self.inner.error_count.load(Ordering::Relaxed),
        }
    }

    // ── Orchestrator-side transitions ───────────────────────────────

    fn set_message(&self, message: impl Into<String>) {
        *self.inner.message.write().expect("job message lock poisoned") = message.into();
    }

    fn set_finished_now(&self) {
        *self
            .inner
            .finished_at
            .write()
            .expect("job finished_at lock poisoned") = Some(Utc::now());
    }

    pub(crate) fn mark_running(&self) {
        let mut status = self.inner.status.write().expect("job status lock poisoned");
        if *status == JobStatus::Pending {
            *status = JobStatus::Running;
            drop(status);
            self.set_message("Executing analysis");
        }
    }

    /// Advance progress. `fetch_max` keeps the reported percentage
    /// monotonic even if updates race.
    pub(crate) fn set_progress(&self, percent: u8, message: impl Into<String>) {
        self.inner
            .progress
            .fetch_max(percent.min(100), Ordering::Relaxed);
        self.set_message(message);
    }

    pub(crate) fn bump_error_count(&self, by: usize) {
        self.inner.error_count.fetch_add(by, Ordering::Relaxed);
    }

    pub(crate) fn mark_completed(&self, result: ExecutionResult) {
        let mut status = self.inner.status.write().expect("job status lock poisoned");
        if *status != JobStatus::Running {
            return;
        }
        *status = JobStatus::Completed;
        drop(status);

        *self.inner.result.write().expect("job result lock poisoned") =
            Some(Arc::new(result));
        self.inner.progress.store(100, Ordering::Relaxed);
        self.set_message("Analysis completed successfully");
        self.set_finished_now();
    }

    pub(crate) fn mark_failed(&self, message: impl Into<String>) {
        let mut status = self.inner.status.write().expect("job status lock poisoned");
        if status.is_terminal() {
            return;
        }
        *status = JobStatus::Failed;
        drop(status);
        self.set_message(message);
        self.set_finished_now();
    }

    pub(crate) fn mark_cancelled(&self) {
        let mut status = self.inner.status.write().expect("job status lock poisoned");
        if status.is_terminal() {
            return;
        }
        *status = JobStatus::Cancelled;
        drop(status);
        self.set_message("Analysis cancelled");
        self.set_finished_now();
    }
}

// ── Tests ───────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn handle() -> JobHandle {
        JobHandle::new(Uuid::new_v4(), Uuid::new_v4())
    }

    fn empty_result() -> ExecutionResult {
        ExecutionResult {
            gene_scores: Vec::new(),
            score_distribution: IndexMap::new(),
            total_genes: 0,
            error_count: 0,
        }
    }

    #[test]
    fn new_job_is_pending() {
        let job = handle();
        let snap = job.snapshot();
        assert_eq!(snap.status, JobStatus::Pending);
        assert_eq!(snap.progress_percent, 0);
        assert!(snap.finished_at.is_none());
    }

    #[test]
    fn happy_path_transitions() {
        let job = handle();
        job.mark_running();
        assert_eq!(job.status(), JobStatus::Running);
        assert!(job.result().is_none(), "no result while running");

        job.mark_completed(empty_result());
        let snap = job.snapshot();
        assert_eq!(snap.status, JobStatus::Completed);
        assert_eq!(snap.progress_percent, 100);
        assert!(snap.finished_at.is_some());
        assert!(job.result().is_some());
    }

    #[test]
    fn progress_is_monotonic() {
        let job = handle();
        job.mark_running();
        job.set_progress(50, "halfway");
        job.set_progress(30, "stale update");
        assert_eq!(job.snapshot().progress_percent, 50);
        job.set_progress(75, "later");
        assert_eq!(job.snapshot().progress_percent, 75);
    }

    #[test]
    fn cancel_is_a_request_until_observed() {
        let job = handle();
        job.mark_running();
        assert!(job.cancel());
        assert!(job.is_cancel_requested());
        // Still running until the orchestrator observes the flag.
        assert_eq!(job.status(), JobStatus::Running);

        job.mark_cancelled();
        assert_eq!(job.status(), JobStatus::Cancelled);
        assert!(job.result().is_none(), "cancelled jobs expose no results");
    }

    #[test]
    fn cancel_after_terminal_is_rejected() {
        let job = handle();
        job.mark_running();
        job.mark_completed(empty_result());
        assert!(!job.cancel());
        assert_eq!(job.status(), JobStatus::Completed);
    }

    #[test]
    fn no_state_reentry_after_terminal() {
        let job = handle();
        job.mark_running();
        job.mark_cancelled();
        // Late transitions are ignored.
        job.mark_failed("too late");
        job.mark_running();
        assert_eq!(job.status(), JobStatus::Cancelled);
    }

    #[test]
    fn failed_from_pending_skips_running() {
        let job = handle();
        job.mark_failed("validation failed");
        assert_eq!(job.status(), JobStatus::Failed);
        assert!(job.result().is_none());
    }

    #[test]
    fn completion_requires_running() {
        let job = handle();
        // Completing a pending job is not a legal transition.
        job.mark_completed(empty_result());
        assert_eq!(job.status(), JobStatus::Pending);
        assert!(job.result().is_none());
    }

    #[test]
    fn terminal_states_are_recognized() {
        assert!(!JobStatus::Pending.is_terminal());
        assert!(!JobStatus::Running.is_terminal());
        assert!(JobStatus::Completed.is_terminal());
        assert!(JobStatus::Failed.is_terminal());
        assert!(JobStatus::Cancelled.is_terminal());
    }
}
