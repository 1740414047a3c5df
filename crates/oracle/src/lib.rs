//! # The Oracle: Migration Risk Assessment
//!
//! **Role**: Assigns a [`RiskLevel`] and a reason to every [`Change`] the
//! forge emitted.
//!
//! **Algorithm**:
//! 1. Each [`RiskRule`] returns its own partial map `change id → assignment`.
//! 2. [`Oracle::assess`] folds the maps in rule order with last-write-wins:
//!    a later rule's assignment for an id replaces an earlier one.
//! 3. Any change left without an assignment defaults to `Safe`.
//!
//! Rule order is precedence. Coarse rules go first, behavioral-signal rules
//! last: `baseline`, `template_binding`, `directive`, `watcher`.

pub mod rules;

use std::collections::BTreeMap;
use std::panic::{catch_unwind, AssertUnwindSafe};

use anatomist::Analysis;
use common::migration::{Change, RiskAssignment, RiskLevel, RuleFailure};
use common::roles::PatternRoles;
use common::NodeId;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

pub use rules::{BaselineRule, DirectiveRule, TemplateBindingRule, WatcherRule};

/// Reason given to changes no rule assigned.
pub const DEFAULT_REASON: &str = "No specific risk pattern detected";

/// Partial result of one rule.
pub type RiskMap = BTreeMap<NodeId, RiskAssignment>;

/// Everything a risk rule reads.
pub struct RiskContext<'a> {
    pub analysis: &'a Analysis,
    pub roles: &'a PatternRoles,
    pub changes: &'a [Change],
}

/// One risk rule.
///
/// # Implementation Notes
/// - Pure: no I/O, no shared state
/// - Only ids it has an opinion on go into the returned map
/// - An `Err` drops this rule's map, later rules still run
pub trait RiskRule {
    fn name(&self) -> &'static str;

    fn assess(&self, cx: &RiskContext<'_>) -> Result<RiskMap, OracleError>;
}

#[derive(Debug, thiserror::Error)]
pub enum OracleError {
    #[error("Change {0} is not part of this run")]
    UnknownChange(NodeId),

    #[error("Risk rule {rule} failed: {message}")]
    Rule { rule: &'static str, message: String },
}

/// Final risk per change id, plus the rules that failed on the way.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct Assessment {
    pub risks: BTreeMap<NodeId, RiskAssignment>,
    pub failures: Vec<RuleFailure>,
}

impl Assessment {
    pub fn risk_of(&self, id: &NodeId) -> Option<&RiskAssignment> {
        self.risks.get(id)
    }

    /// Number of changes at `level`.
    pub fn count(&self, level: RiskLevel) -> usize {
        self.risks.values().filter(|r| r.level == level).count()
    }
}

pub struct Oracle {
    rules: Vec<Box<dyn RiskRule>>,
}

impl Oracle {
    /// The standard precedence: baseline, template binding, directive, watcher.
    pub fn standard() -> Self {
        Self::from_rules(vec![
            Box::new(BaselineRule),
            Box::new(TemplateBindingRule),
            Box::new(DirectiveRule),
            Box::new(WatcherRule),
        ])
    }

    pub fn from_rules(rules: Vec<Box<dyn RiskRule>>) -> Self {
        Self { rules }
    }

    pub fn rule_names(&self) -> Vec<&'static str> {
        self.rules.iter().map(|r| r.name()).collect()
    }

    pub fn assess(&self, cx: &RiskContext<'_>) -> Assessment {
        let mut assessment = Assessment::default();

        for rule in &self.rules {
            let outcome = catch_unwind(AssertUnwindSafe(|| rule.assess(cx)));
            let failure = match outcome {
                Ok(Ok(map)) => {
                    info!(rule = rule.name(), assigned = map.len(), "risk rule applied");
                    assessment.risks.extend(map);
                    continue;
                }
                Ok(Err(e)) => RuleFailure::new(rule.name(), e.to_string()),
                Err(panic) => RuleFailure::from_panic(rule.name(), panic.as_ref()),
            };
            warn!(rule = rule.name(), error = %failure.message, "risk rule failed, skipping");
            assessment.failures.push(failure);
        }

        for change in cx.changes {
            assessment
                .risks
                .entry(change.id.clone())
                .or_insert_with(|| RiskAssignment::new(RiskLevel::Safe, DEFAULT_REASON));
        }
        // Stray ids from a misbehaving rule never reach the report.
        assessment
            .risks
            .retain(|id, _| cx.changes.iter().any(|c| &c.id == id));

        info!(
            safe = assessment.count(RiskLevel::Safe),
            risky = assessment.count(RiskLevel::Risky),
            manual = assessment.count(RiskLevel::Manual),
            "risk assessment finished"
        );
        assessment
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::migration::ChangeTag;

    struct Assign(&'static str, RiskLevel);

    impl RiskRule for Assign {
        fn name(&self) -> &'static str {
            self.0
        }

        fn assess(&self, cx: &RiskContext<'_>) -> Result<RiskMap, OracleError> {
            Ok(cx
                .changes
                .iter()
                .map(|c| (c.id.clone(), RiskAssignment::new(self.1, self.0)))
                .collect())
        }
    }

    struct Broken;

    impl RiskRule for Broken {
        fn name(&self) -> &'static str {
            "broken"
        }

        fn assess(&self, _cx: &RiskContext<'_>) -> Result<RiskMap, OracleError> {
            Err(OracleError::UnknownChange(NodeId::from("chg-9999")))
        }
    }

    fn change(id: &str) -> Change {
        let mut c = Change::new(
            ChangeTag::Injectable,
            NodeId::from("cls-0001"),
            NodeId::synthetic("injectable", "AuthService"),
            "service",
        );
        c.id = NodeId::from(id);
        c
    }

    #[test]
    fn test_later_rule_wins_and_failures_are_isolated() {
        let analysis = Analysis::default();
        let roles = PatternRoles::new();
        let changes = vec![change("chg-0001")];
        let cx = RiskContext {
            analysis: &analysis,
            roles: &roles,
            changes: &changes,
        };
        let oracle = Oracle::from_rules(vec![
            Box::new(Assign("first", RiskLevel::Manual)),
            Box::new(Broken),
            Box::new(Assign("last", RiskLevel::Safe)),
        ]);
        let result = oracle.assess(&cx);
        let risk = result.risk_of(&NodeId::from("chg-0001")).unwrap();
        assert_eq!(risk.level, RiskLevel::Safe);
        assert_eq!(risk.reason, "last");
        assert_eq!(result.failures.len(), 1);
        assert_eq!(result.failures[0].rule, "broken");
    }

    #[test]
    fn test_unassigned_changes_default_to_safe() {
        let analysis = Analysis::default();
        let roles = PatternRoles::new();
        let changes = vec![change("chg-0001"), change("chg-0002")];
        let cx = RiskContext {
            analysis: &analysis,
            roles: &roles,
            changes: &changes,
        };
        let result = Oracle::from_rules(Vec::new()).assess(&cx);
        assert_eq!(result.risks.len(), 2);
        assert_eq!(result.count(RiskLevel::Safe), 2);
        assert_eq!(result.risks.values().next().unwrap().reason, DEFAULT_REASON);
    }

    #[test]
    fn test_standard_order() {
        assert_eq!(
            Oracle::standard().rule_names(),
            vec!["baseline", "template_binding", "directive", "watcher"]
        );
    }
}
