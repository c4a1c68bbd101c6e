//! Rubrics: weighted collections of shared rules, and per-gene aggregation.
//!
//! Rules are shared across rubrics (many-to-many), so membership is an
//! explicit join entity [`RubricRule`] carrying the rubric-local weight and
//! order index — never an embedded rule copy. Order affects presentation
//! only; the aggregate is a commutative weighted sum.

use std::collections::HashMap;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use genoscore_core::dataset::GeneRow;

use crate::rule::Rule;

// ── Model ───────────────────────────────────────────────────────────

/// A named, weighted collection of rules producing one aggregate score per
/// gene.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Rubric {
    pub id: Uuid,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default = "default_active")]
    pub is_active: bool,
}

fn default_active() -> bool {
    true
}

impl Rubric {
    pub fn new(name: impl Into<String>, description: Option<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            description,
            is_active: true,
        }
    }
}

/// Join entity linking a rubric to a member rule.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RubricRule {
    pub rubric_id: Uuid,
    pub rule_id: Uuid,
    pub weight: f64,
    pub order_index: u32,
    #[serde(default = "default_active")]
    pub is_active: bool,
}

/// A rubric member with its rule materialized for execution.
#[derive(Debug, Clone)]
pub struct Member {
    pub rule: Rule,
    pub weight: f64,
    pub order_index: u32,
}

/// Materialize a rubric's members from its join entities.
///
/// Filters to active links whose rules exist and are active, sorted by
/// order index. Rules are cloned: a job owns its member set for the whole
/// run, so concurrent rule edits cannot race a running job.
pub fn assemble_members(
    rubric_id: Uuid,
    links: &[RubricRule],
    rules: &HashMap<Uuid, Rule>,
) -> Vec<Member> {
    let mut members: Vec<Member> = links
        .iter()
        .filter(|l| l.rubric_id == rubric_id && l.is_active)
        .filter_map(|l| {
            rules
                .get(&l.rule_id)
                .filter(|r| r.is_active)
                .map(|r| Member {
                    rule: r.clone(),
                    weight: l.weight,
                    order_index: l.order_index,
                })
        })
        .collect();
    members.sort_by_key(|m| m.order_index);
    members
}

// ── Per-gene aggregation ────────────────────────────────────────────

/// Scoring outcome for one gene across a rubric's member rules.
#[derive(Debug, Clone, Serialize)]
pub struct GeneScore {
    pub gene_symbol: String,
    /// Rule name → resolved raw score. `None` means the rule was
    /// inapplicable for this gene — distinct from a legitimate zero.
    pub per_rule: IndexMap<String, Option<f64>>,
    /// Weighted sum over applicable rules. `None` only when an unexpected
    /// fault prevented scoring this gene at all.
    pub total_score: Option<f64>,
    /// How many member rules actually applied (inapplicable rules are not
    /// counted as zero).
    pub rules_applied: usize,
    /// First clause-evaluation diagnostic across member rules, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Score one gene row against a rubric's members.
///
/// Each applicable rule contributes `score × weight`; inapplicable rules
/// (no clause matched, or an NaN score) are excluded from both the sum and
/// the applied counter. A rule resolving to NaN (`NA_real_` clause score)
/// counts as inapplicable, since NaN cannot participate in the total.
pub fn score_gene(members: &[Member], row: &GeneRow) -> GeneScore {
    let mut per_rule = IndexMap::with_capacity(members.len());
    let mut total = 0.0;
    let mut rules_applied = 0;
    let mut first_error: Option<String> = None;

    for member in members {
        let resolution = member.rule.resolve(row);

        if let (None, Some(e)) = (&first_error, &resolution.first_error) {
            first_error = Some(format!("rule '{}': {}", member.rule.name, e));
        }

        match resolution.score {
            Some(score) if !score.is_nan() => {
                per_rule.insert(member.rule.name.clone(), Some(score));
                total += score * member.weight;
                rules_applied += 1;
            }
            _ => {
                per_rule.insert(member.rule.name.clone(), None);
            }
        }
    }

    GeneScore {
        gene_symbol: row.gene_symbol.clone(),
        per_rule,
        total_score: Some(total),
        rules_applied,
        error: first_error,
    }
}

// ── Tests ───────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rule::RuleSpec;
    use genoscore_core::dataset::CellValue;

    fn fixed_rule(name: &str, score: f64) -> Rule {
        // Always applicable, resolves to a fixed score.
        Rule::compile(RuleSpec {
            name: name.to_string(),
            description: None,
            ruleset_conditions: vec![format!("TRUE ~ {}", score)],
            column_mapping: IndexMap::new(),
            weight: 1.0,
            is_active: true,
        })
        .unwrap()
    }

    fn threshold_rule(name: &str, column: &str) -> Rule {
        // Applicable only when the column value exceeds 0.5; no catch-all.
        Rule::compile(RuleSpec {
            name: name.to_string(),
            description: None,
            ruleset_conditions: vec!["x > 0.5 ~ 1".to_string()],
            column_mapping: IndexMap::from([("x".to_string(), column.to_string())]),
            weight: 1.0,
            is_active: true,
        })
        .unwrap()
    }

    fn member(rule: Rule, weight: f64, order_index: u32) -> Member {
        Member { rule, weight, order_index }
    }

    #[test]
    fn weighted_aggregation_is_linear() {
        // R1 (weight 2, score 3) and R2 (weight 0.5, score 4): total 8.0.
        let members = vec![
            member(fixed_rule("r1", 3.0), 2.0, 0),
            member(fixed_rule("r2", 4.0), 0.5, 1),
        ];
        let score = score_gene(&members, &GeneRow::new("BRCA1"));
        assert_eq!(score.total_score, Some(8.0));
        assert_eq!(score.rules_applied, 2);
        assert_eq!(score.per_rule.get("r1"), Some(&Some(3.0)));
        assert_eq!(score.per_rule.get("r2"), Some(&Some(4.0)));
    }

    #[test]
    fn inapplicable_rule_excluded_from_sum_and_counter() {
        let members = vec![
            member(fixed_rule("fixed", 2.0), 1.0, 0),
            member(threshold_rule("strict", "expr"), 10.0, 1),
        ];
        // expr below threshold: "strict" matches no clause.
        let row = GeneRow::new("TP53").with_value("expr", CellValue::Number(0.1));
        let score = score_gene(&members, &row);
        assert_eq!(score.total_score, Some(2.0));
        assert_eq!(score.rules_applied, 1);
        assert_eq!(score.per_rule.get("strict"), Some(&None));
    }

    #[test]
    fn nan_score_counts_as_inapplicable() {
        let na_rule = Rule::compile(RuleSpec {
            name: "na".to_string(),
            description: None,
            ruleset_conditions: vec!["TRUE ~ NA_real_".to_string()],
            column_mapping: IndexMap::new(),
            weight: 1.0,
            is_active: true,
        })
        .unwrap();
        let members = vec![
            member(na_rule, 5.0, 0),
            member(fixed_rule("fixed", 1.0), 1.0, 1),
        ];
        let score = score_gene(&members, &GeneRow::new("TP53"));
        assert_eq!(score.total_score, Some(1.0));
        assert_eq!(score.rules_applied, 1);
        assert_eq!(score.per_rule.get("na"), Some(&None));
    }

    #[test]
    fn no_members_scores_zero_with_none_applied() {
        let score = score_gene(&[], &GeneRow::new("TP53"));
        assert_eq!(score.total_score, Some(0.0));
        assert_eq!(score.rules_applied, 0);
    }

    #[test]
    fn aggregation_is_commutative() {
        let row = GeneRow::new("TP53");
        let forward = vec![
            member(fixed_rule("a", 3.0), 2.0, 0),
            member(fixed_rule("b", 4.0), 0.5, 1),
        ];
        let reversed = vec![
            member(fixed_rule("b", 4.0), 0.5, 0),
            member(fixed_rule("a", 3.0), 2.0, 1),
        ];
        assert_eq!(
            score_gene(&forward, &row).total_score,
            score_gene(&reversed, &row).total_score
        );
    }

    #[test]
    fn first_diagnostic_recorded() {
        // Rule whose first clause type-errors before its catch-all.
        let erroring = Rule::compile(RuleSpec {
            name: "typed".to_string(),
            description: None,
            ruleset_conditions: vec!["y > 1 ~ 5".to_string(), "TRUE ~ 0".to_string()],
            column_mapping: IndexMap::from([("y".to_string(), "lineage".to_string())]),
            weight: 1.0,
            is_active: true,
        })
        .unwrap();
        let members = vec![member(erroring, 1.0, 0)];
        let row = GeneRow::new("TP53").with_value("lineage", CellValue::Text("breast".into()));
        let score = score_gene(&members, &row);
        assert_eq!(score.total_score, Some(0.0));
        let err = score.error.expect("diagnostic expected");
        assert!(err.contains("typed"));
    }

    // ── Member assembly ─────────────────────────────────────────────

    #[test]
    fn assemble_filters_and_orders_members() {
        let rubric_id = Uuid::new_v4();
        let other_rubric = Uuid::new_v4();

        let active = fixed_rule("active", 1.0);
        let mut inactive = fixed_rule("inactive", 1.0);
        inactive.is_active = false;
        let second = fixed_rule("second", 2.0);

        let rules: HashMap<Uuid, Rule> = [
            (active.id, active.clone()),
            (inactive.id, inactive.clone()),
            (second.id, second.clone()),
        ]
        .into_iter()
        .collect();

        let links = vec![
            RubricRule {
                rubric_id,
                rule_id: second.id,
                weight: 1.0,
                order_index: 2,
                is_active: true,
            },
            RubricRule {
                rubric_id,
                rule_id: active.id,
                weight: 2.0,
                order_index: 1,
                is_active: true,
            },
            // Inactive link: dropped.
            RubricRule {
                rubric_id,
                rule_id: active.id,
                weight: 9.0,
                order_index: 0,
                is_active: false,
            },
            // Inactive rule: dropped.
            RubricRule {
                rubric_id,
                rule_id: inactive.id,
                weight: 1.0,
                order_index: 3,
                is_active: true,
            },
            // Different rubric: dropped.
            RubricRule {
                rubric_id: other_rubric,
                rule_id: active.id,
                weight: 1.0,
                order_index: 0,
                is_active: true,
            },
        ];

        let members = assemble_members(rubric_id, &links, &rules);
        assert_eq!(members.len(), 2);
        assert_eq!(members[0].rule.name, "active");
        assert_eq!(members[0].weight, 2.0);
        assert_eq!(members[1].rule.name, "second");
    }

    #[test]
    fn same_rule_shared_across_rubrics_with_different_weights() {
        let rubric_a = Uuid::new_v4();
        let rubric_b = Uuid::new_v4();
        let shared = fixed_rule("shared", 3.0);
        let rules: HashMap<Uuid, Rule> = [(shared.id, shared.clone())].into_iter().collect();

        let links = vec![
            RubricRule {
                rubric_id: rubric_a,
                rule_id: shared.id,
                weight: 1.0,
                order_index: 0,
                is_active: true,
            },
            RubricRule {
                rubric_id: rubric_b,
                rule_id: shared.id,
                weight: 4.0,
                order_index: 0,
                is_active: true,
            },
        ];

        let row = GeneRow::new("TP53");
        let a = score_gene(&assemble_members(rubric_a, &links, &rules), &row);
        let b = score_gene(&assemble_members(rubric_b, &links, &rules), &row);
        assert_eq!(a.total_score, Some(3.0));
        assert_eq!(b.total_score, Some(12.0));
    }
}
