//! Piecewise scoring rules: compiled clause lists plus column mappings.
//!
//! A rule is authored as a [`RuleSpec`] carrying raw clause strings of the
//! form `"<condition> ~ <score>"` and a variable→column mapping, then
//! compiled into a [`Rule`] with parsed [`ScoreClause`]s. Compilation is the
//! authoring-time gate: syntax errors and unmapped variables never reach
//! execution.
//!
//! Resolution walks clauses in declared order and returns the score of the
//! first clause whose condition holds (first-match-wins). A clause that
//! errors during evaluation is treated as non-matching and skipped; the
//! first such error is recorded for diagnostics.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use genoscore_core::dataset::{CellValue, GeneRow};

use crate::condition::{self, Condition, ParseError};
use crate::evaluator::{evaluate, EvalError};

// ── Errors ──────────────────────────────────────────────────────────

/// Rule compilation failure. Surfaced at authoring time only.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RuleCompileError {
    #[error("clause '{clause}': {source}")]
    Clause {
        clause: String,
        #[source]
        source: ParseError,
    },

    #[error("clause '{clause}' references variable '{variable}' missing from the column mapping")]
    UnmappedVariable { clause: String, variable: String },

    #[error("ruleset must contain at least one clause")]
    EmptyRuleset,

    #[error("rule weight must be non-negative, got {0}")]
    InvalidWeight(f64),
}

// ── Score clauses ───────────────────────────────────────────────────

/// One `condition ~ score` pair of a rule's ordered ruleset.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoreClause {
    /// The clause as authored, kept for display and diagnostics.
    pub source: String,
    pub condition: Condition,
    pub score: f64,
}

/// Score token meaning "not a number" in the source material's R convention.
const NA_SCORE: &str = "NA_real_";

impl ScoreClause {
    /// Parse a clause string of the form `"<condition> ~ <score>"`.
    ///
    /// The score is an f64 literal or `NA_real_` (NaN).
    pub fn parse(source: &str) -> Result<Self, ParseError> {
        let (cond_part, score_part) = source
            .split_once('~')
            .ok_or_else(|| ParseError::MissingScoreSeparator(source.to_string()))?;

        let condition = condition::parse(cond_part.trim())?;

        let score_text = score_part.trim();
        let score = if score_text == NA_SCORE {
            f64::NAN
        } else {
            score_text.parse::<f64>().map_err(|_| ParseError::InvalidScore {
                text: score_text.to_string(),
            })?
        };

        Ok(Self {
            source: source.trim().to_string(),
            condition,
            score,
        })
    }

    /// True when this clause is the unconditional `TRUE` catch-all.
    pub fn is_catch_all(&self) -> bool {
        matches!(self.condition, Condition::True)
    }
}

// ── Rule spec and compiled rule ─────────────────────────────────────

/// A rule as authored: raw clause strings, not yet compiled.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleSpec {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    /// Ordered clause strings; first match wins.
    pub ruleset_conditions: Vec<String>,
    /// Variable name → dataset column (optionally a dotted path whose last
    /// segment is the column name).
    pub column_mapping: IndexMap<String, String>,
    #[serde(default = "default_weight")]
    pub weight: f64,
    #[serde(default = "default_active")]
    pub is_active: bool,
}

fn default_weight() -> f64 {
    1.0
}

fn default_active() -> bool {
    true
}

/// A compiled, executable scoring rule.
///
/// Serializes back to its authored form (clause strings + mapping); the
/// compiled ASTs are an internal detail.
#[derive(Debug, Clone, Serialize)]
pub struct Rule {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub ruleset_conditions: Vec<String>,
    #[serde(skip)]
    clauses: Vec<ScoreClause>,
    pub column_mapping: IndexMap<String, String>,
    pub weight: f64,
    pub is_active: bool,
}

/// Extract the effective column name from a mapping value.
///
/// Mapping values may be dotted paths like `gene_table.expr_rank`; the
/// trailing segment is the column name.
pub fn column_name(path: &str) -> &str {
    path.rsplit('.').next().unwrap_or(path)
}

impl Rule {
    /// Compile a spec into an executable rule.
    ///
    /// Fails on the first unparseable clause, a clause referencing a
    /// variable absent from the column mapping, an empty ruleset, or a
    /// negative/NaN weight.
    pub fn compile(spec: RuleSpec) -> Result<Self, RuleCompileError> {
        if spec.ruleset_conditions.is_empty() {
            return Err(RuleCompileError::EmptyRuleset);
        }
        if spec.weight.is_nan() || spec.weight < 0.0 {
            return Err(RuleCompileError::InvalidWeight(spec.weight));
        }

        let mut clauses = Vec::with_capacity(spec.ruleset_conditions.len());
        for source in &spec.ruleset_conditions {
            let clause = ScoreClause::parse(source).map_err(|e| RuleCompileError::Clause {
                clause: source.clone(),
                source: e,
            })?;

            for variable in clause.condition.variables() {
                if !spec.column_mapping.contains_key(&variable) {
                    return Err(RuleCompileError::UnmappedVariable {
                        clause: source.clone(),
                        variable,
                    });
                }
            }

            clauses.push(clause);
        }

        Ok(Self {
            id: Uuid::new_v4(),
            name: spec.name,
            description: spec.description,
            ruleset_conditions: spec.ruleset_conditions,
            clauses,
            column_mapping: spec.column_mapping,
            weight: spec.weight,
            is_active: spec.is_active,
        })
    }

    pub fn clauses(&self) -> &[ScoreClause] {
        &self.clauses
    }

    /// A degenerate rule's only clause is the unconditional catch-all —
    /// it never discriminates. Data-quality signal, not an error.
    pub fn is_degenerate(&self) -> bool {
        self.clauses.len() == 1 && self.clauses[0].is_catch_all()
    }

    /// Dataset columns this rule requires, in mapping order, deduplicated.
    pub fn required_columns(&self) -> Vec<String> {
        let mut out: Vec<String> = Vec::new();
        for path in self.column_mapping.values() {
            let name = column_name(path);
            if !out.iter().any(|c| c == name) {
                out.push(name.to_string());
            }
        }
        out
    }

    /// Bind this rule's variables to a row's cell values.
    ///
    /// Columns absent from the row bind as missing, which evaluation
    /// surfaces as an [`EvalError`] only if a clause actually touches them.
    fn bind(&self, row: &GeneRow) -> IndexMap<String, CellValue> {
        self.column_mapping
            .iter()
            .map(|(var, path)| (var.clone(), row.get(column_name(path)).clone()))
            .collect()
    }

    /// Resolve this rule against a row: first matching clause wins.
    pub fn resolve(&self, row: &GeneRow) -> Resolution {
        let bindings = self.bind(row);
        let mut first_error: Option<EvalError> = None;

        for (index, clause) in self.clauses.iter().enumerate() {
            match evaluate(&clause.condition, &bindings) {
                Ok(true) => {
                    return Resolution {
                        score: Some(clause.score),
                        matched_clause: Some(index),
                        first_error,
                    };
                }
                Ok(false) => {}
                Err(e) => {
                    // Fail-soft: an erroring clause is a non-match. Keep the
                    // first error so diagnostics can explain a degraded rule.
                    if first_error.is_none() {
                        first_error = Some(e);
                    }
                }
            }
        }

        Resolution {
            score: None,
            matched_clause: None,
            first_error,
        }
    }

    /// Evaluate against a sample row with a full per-clause trace.
    ///
    /// Used by the interactive rule-test endpoint; evaluation stops at the
    /// first matching clause, mirroring [`Rule::resolve`].
    pub fn trace(&self, row: &GeneRow) -> RuleTrace {
        let bindings = self.bind(row);
        let mut clause_traces = Vec::new();
        let mut final_score = None;

        for clause in &self.clauses {
            let (matched, error) = match evaluate(&clause.condition, &bindings) {
                Ok(m) => (m, None),
                Err(e) => (false, Some(e.to_string())),
            };
            clause_traces.push(ClauseTrace {
                source: clause.source.clone(),
                matched,
                score: clause.score,
                error,
            });
            if matched {
                final_score = Some(clause.score);
                break;
            }
        }

        RuleTrace {
            rule_name: self.name.clone(),
            bound_values: bindings,
            clauses: clause_traces,
            final_score,
        }
    }
}

// ── Resolution & trace ──────────────────────────────────────────────

/// Outcome of resolving one rule against one row.
///
/// `score == None` means no clause matched: the rule is inapplicable for
/// this gene (distinct from a legitimate zero score). Callers decide how to
/// treat inapplicability; the resolver never defaults to zero.
#[derive(Debug, Clone, PartialEq)]
pub struct Resolution {
    pub score: Option<f64>,
    /// Index of the matching clause, if any.
    pub matched_clause: Option<usize>,
    /// First clause evaluation error encountered, for diagnostics.
    pub first_error: Option<EvalError>,
}

impl Resolution {
    pub fn is_applicable(&self) -> bool {
        self.score.is_some()
    }
}

/// Per-clause evaluation detail for the rule-test endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct ClauseTrace {
    pub source: String,
    pub matched: bool,
    pub score: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Full evaluation trace of one rule against one sample row.
#[derive(Debug, Clone, Serialize)]
pub struct RuleTrace {
    pub rule_name: String,
    pub bound_values: IndexMap<String, CellValue>,
    /// Clauses evaluated, in order, up to and including the first match.
    pub clauses: Vec<ClauseTrace>,
    pub final_score: Option<f64>,
}

// ── Tests ───────────────────────────────────────────────────────────
