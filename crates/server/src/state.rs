//! Shared application state: in-memory rule/rubric/dataset stores plus the
//! job registry.
//!
//! Stores are deliberately thin — the engine treats them as read-only input
//! suppliers. Datasets are held behind `Arc` so a running job keeps its rows
//! alive (and unchanged) even if the dataset is re-registered mid-run.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use uuid::Uuid;

use genoscore_core::dataset::Dataset;
use genoscore_core::{Config, CoreError};
use genoscore_engine::job::JobHandle;
use genoscore_engine::rubric::{Rubric, RubricRule};
use genoscore_engine::rule::Rule;

pub struct AppState {
    pub config: Config,
    pub rules: RwLock<HashMap<Uuid, Rule>>,
    pub rubrics: RwLock<HashMap<Uuid, Rubric>>,
    /// Rubric↔rule join entities (rules are shared, never embedded).
    pub rubric_rules: RwLock<Vec<RubricRule>>,
    pub datasets: RwLock<HashMap<Uuid, Arc<Dataset>>>,
    pub jobs: RwLock<HashMap<Uuid, JobHandle>>,
}

impl AppState {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            rules: RwLock::new(HashMap::new()),
            rubrics: RwLock::new(HashMap::new()),
            rubric_rules: RwLock::new(Vec::new()),
            datasets: RwLock::new(HashMap::new()),
            jobs: RwLock::new(HashMap::new()),
        }
    }

    pub fn rule(&self, id: Uuid) -> Result<Rule, CoreError> {
        self.rules
            .read()
            .expect("rules lock poisoned")
            .get(&id)
            .cloned()
            .ok_or(CoreError::RuleNotFound(id))
    }

    pub fn rubric(&self, id: Uuid) -> Result<Rubric, CoreError> {
        self.rubrics
            .read()
            .expect("rubrics lock poisoned")
            .get(&id)
            .cloned()
            .ok_or(CoreError::RubricNotFound(id))
    }

    pub fn dataset(&self, id: Uuid) -> Result<Arc<Dataset>, CoreError> {
        self.datasets
            .read()
            .expect("datasets lock poisoned")
            .get(&id)
            .cloned()
            .ok_or(CoreError::DatasetNotFound(id))
    }

    pub fn job(&self, id: Uuid) -> Result<JobHandle, CoreError> {
        self.jobs
            .read()
            .expect("jobs lock poisoned")
            .get(&id)
            .cloned()
            .ok_or(CoreError::JobNotFound(id))
    }

    /// Materialize a rubric's active members, cloning rules so the caller
    /// owns a stable snapshot for the duration of a job.
    pub fn members_of(&self, rubric_id: Uuid) -> Vec<genoscore_engine::rubric::Member> {
        let links = self.rubric_rules.read().expect("rubric_rules lock poisoned");
        let rules = self.rules.read().expect("rules lock poisoned");
        genoscore_engine::rubric::assemble_members(rubric_id, &links, &rules)
    }
}
