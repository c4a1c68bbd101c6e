//! Rule/rubric schema validation against a dataset's column catalog.
//!
//! Stateless by design: either side of a (rubric, dataset) pair can change
//! independently, so reports are recomputed on every call and never cached.
//! Extra dataset columns that no rule references are informational, never an
//! error.

use serde::Serialize;
use uuid::Uuid;

use genoscore_core::dataset::Column;

use crate::rule::{column_name, Rule, RuleSpec};

// ── Result types ────────────────────────────────────────────────────

/// Overall validation outcome for one rule against one column catalog.
#[derive(Debug, Clone, Serialize)]
pub struct RuleValidation {
    pub rule_id: Uuid,
    pub rule_name: String,
    pub is_valid: bool,
    /// Exactly the required-but-absent columns, in mapping order.
    pub missing_columns: Vec<String>,
    /// Set when the rule itself is broken (unparseable clause), independent
    /// of any dataset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ValidationStatus {
    Pass,
    Fail,
}

/// Rubric-level validation report.
///
/// Valid iff every member rule is valid. The compatibility percentage and
/// status message are informational, for interactive pre-flight displays.
#[derive(Debug, Clone, Serialize)]
pub struct ValidationReport {
    pub is_valid: bool,
    pub validation_status: ValidationStatus,
    pub total_rules: usize,
    pub valid_rules: usize,
    pub invalid_rules: usize,
    pub compatibility_percent: f64,
    /// Union of all missing columns across member rules, first-seen order.
    pub missing_columns: Vec<String>,
    pub status_message: String,
    pub per_rule: Vec<RuleValidation>,
}

impl ValidationReport {
    /// One-line summary naming the invalid rules and their missing columns,
    /// suitable for a failed job's message.
    pub fn failure_summary(&self) -> String {
        let details: Vec<String> = self
            .per_rule
            .iter()
            .filter(|r| !r.is_valid)
            .map(|r| match &r.error {
                Some(e) => format!("{} ({})", r.rule_name, e),
                None => format!("{} (missing: {})", r.rule_name, r.missing_columns.join(", ")),
            })
            .collect();
        format!(
            "{}/{} rules incompatible with dataset columns: {}",
            self.invalid_rules,
            self.total_rules,
            details.join("; ")
        )
    }
}

// ── Validation ──────────────────────────────────────────────────────

fn has_column(columns: &[Column], name: &str) -> bool {
    columns.iter().any(|c| c.name == name)
}

/// Validate a compiled rule against a column catalog.
///
/// A rule is valid iff every column its mapping references exists in the
/// catalog by exact name.
pub fn validate_rule(rule: &Rule, columns: &[Column]) -> RuleValidation {
    let missing: Vec<String> = rule
        .required_columns()
        .into_iter()
        .filter(|c| !has_column(columns, c))
        .collect();

    RuleValidation {
        rule_id: rule.id,
        rule_name: rule.name.clone(),
        is_valid: missing.is_empty(),
        missing_columns: missing,
        error: None,
    }
}

/// Validate an uncompiled rule spec against a column catalog.
///
/// A spec with an unparseable clause is always invalid, independent of the
/// dataset, and carries the parse error as its message.
pub fn validate_rule_spec(spec: &RuleSpec, columns: &[Column]) -> RuleValidation {
    match Rule::compile(spec.clone()) {
        Ok(rule) => validate_rule(&rule, columns),
        Err(e) => RuleValidation {
            rule_id: Uuid::nil(),
            rule_name: spec.name.clone(),
            is_valid: false,
            missing_columns: spec
                .column_mapping
                .values()
                .map(|p| column_name(p).to_string())
                .filter(|c| !has_column(columns, c))
                .collect(),
            error: Some(e.to_string()),
        },
    }
}

/// Validate a rubric's member rules against a column catalog.
pub fn validate_rubric(rules: &[&Rule], columns: &[Column]) -> ValidationReport {
    let per_rule: Vec<RuleValidation> = rules.iter().map(|r| validate_rule(r, columns)).collect();

    let total_rules = per_rule.len();
    let valid_rules = per_rule.iter().filter(|r| r.is_valid).count();
    let invalid_rules = total_rules - valid_rules;
    let is_valid = invalid_rules == 0;

    let mut missing_columns: Vec<String> = Vec::new();
    for rv in &per_rule {
        for col in &rv.missing_columns {
            if !missing_columns.iter().any(|c| c == col) {
                missing_columns.push(col.clone());
            }
        }
    }

    let compatibility_percent = if total_rules == 0 {
        100.0
    } else {
        (valid_rules as f64 / total_rules as f64 * 1000.0).round() / 10.0
    };

    let status_message = if total_rules == 0 {
        "No rules in rubric to validate".to_string()
    } else if is_valid {
        format!("All {} rules are compatible with dataset columns", total_rules)
    } else if valid_rules == 0 {
        "No rules are compatible with dataset columns".to_string()
    } else {
        format!(
            "Limited compatibility: {}/{} rules are compatible",
            valid_rules, total_rules
        )
    };

    ValidationReport {
        is_valid,
        validation_status: if is_valid {
            ValidationStatus::Pass
        } else {
            ValidationStatus::Fail
        },
        total_rules,
        valid_rules,
        invalid_rules,
        compatibility_percent,
        missing_columns,
        status_message,
        per_rule,
    }
}

// ── Tests ───────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use indexmap::IndexMap;

    fn rule(name: &str, mapping: &[(&str, &str)]) -> Rule {
        let vars: Vec<&str> = mapping.iter().map(|(v, _)| *v).collect();
        let clause = if vars.is_empty() {
            "TRUE ~ 0".to_string()
        } else {
            format!("{} > 0 ~ 1", vars[0])
        };
        Rule::compile(RuleSpec {
            name: name.to_string(),
            description: None,
            ruleset_conditions: vec![clause, "TRUE ~ 0".to_string()],
            column_mapping: mapping
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            weight: 1.0,
            is_active: true,
        })
        .unwrap()
    }

    fn columns(names: &[&str]) -> Vec<Column> {
        names.iter().map(|n| Column::numeric(*n)).collect()
    }

    #[test]
    fn rule_valid_when_all_columns_present() {
        let r = rule("r1", &[("x", "expr"), ("y", "cnv")]);
        let v = validate_rule(&r, &columns(&["expr", "cnv", "unused_extra"]));
        assert!(v.is_valid);
        assert!(v.missing_columns.is_empty());
    }

    #[test]
    fn missing_columns_are_exact_set_difference() {
        let r = rule("r1", &[("x", "expr"), ("y", "cnv"), ("z", "dependency")]);
        let v = validate_rule(&r, &columns(&["expr"]));
        assert!(!v.is_valid);
        assert_eq!(v.missing_columns, vec!["cnv", "dependency"]);
    }

    #[test]
    fn column_match_is_exact_name() {
        let r = rule("r1", &[("x", "Expr")]);
        let v = validate_rule(&r, &columns(&["expr"]));
        assert!(!v.is_valid, "column matching must be case-sensitive");
    }

    #[test]
    fn dotted_paths_validate_against_last_segment() {
        let r = rule("r1", &[("x", "gene_table.expr")]);
        assert!(validate_rule(&r, &columns(&["expr"])).is_valid);
    }

    #[test]
    fn rubric_valid_iff_all_rules_valid() {
        let good = rule("good", &[("x", "expr")]);
        let bad = rule("bad", &[("x", "absent")]);
        let cols = columns(&["expr"]);

        let report = validate_rubric(&[&good], &cols);
        assert!(report.is_valid);
        assert_eq!(report.validation_status, ValidationStatus::Pass);

        let report = validate_rubric(&[&good, &bad], &cols);
        assert!(!report.is_valid);
        assert_eq!(report.validation_status, ValidationStatus::Fail);
        assert_eq!(report.valid_rules, 1);
        assert_eq!(report.invalid_rules, 1);
        assert_eq!(report.compatibility_percent, 50.0);
        assert_eq!(report.missing_columns, vec!["absent"]);
    }

    #[test]
    fn missing_columns_union_deduplicates() {
        let a = rule("a", &[("x", "shared_missing")]);
        let b = rule("b", &[("x", "shared_missing"), ("y", "other_missing")]);
        let report = validate_rubric(&[&a, &b], &columns(&["expr"]));
        assert_eq!(
            report.missing_columns,
            vec!["shared_missing", "other_missing"]
        );
    }

    #[test]
    fn empty_rubric_is_vacuously_valid() {
        let report = validate_rubric(&[], &columns(&["expr"]));
        assert!(report.is_valid);
        assert_eq!(report.total_rules, 0);
        assert_eq!(report.status_message, "No rules in rubric to validate");
    }

    #[test]
    fn failure_summary_names_rules_and_columns() {
        let bad = rule("magnitude", &[("x", "tcga_rank")]);
        let report = validate_rubric(&[&bad], &columns(&["expr"]));
        let summary = report.failure_summary();
        assert!(summary.contains("magnitude"));
        assert!(summary.contains("tcga_rank"));
    }

    #[test]
    fn unparseable_spec_is_always_invalid() {
        let spec = RuleSpec {
            name: "broken".to_string(),
            description: None,
            ruleset_conditions: vec!["x >> 1 ~ 5".to_string()],
            column_mapping: IndexMap::from([("x".to_string(), "expr".to_string())]),
            weight: 1.0,
            is_active: true,
        };
        // Invalid even against a dataset that has every mapped column.
        let v = validate_rule_spec(&spec, &columns(&["expr"]));
        assert!(!v.is_valid);
        assert!(v.error.is_some());
    }

    #[test]
    fn reports_are_recomputed_not_cached() {
        let r = rule("r1", &[("x", "expr")]);
        assert!(!validate_rule(&r, &columns(&["other"])).is_valid);
        // Same rule, new catalog: fresh result.
        assert!(validate_rule(&r, &columns(&["expr"])).is_valid);
    }
}
