//! Migration records and risk levels.

use serde::{Deserialize, Serialize};

use crate::NodeId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeSource {
    Rule,
    Ai,
    Human,
}

/// Typed category carried by every change.
///
/// Risk rules key on this instead of scanning `reason` text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeTag {
    Scaffold,
    Component,
    Injectable,
    Http,
    /// Promise-defer call that needs a manual Observable conversion.
    DeferredPromise,
    WatchStream,
    Routing,
    /// Guard or resolver stub generated from a resolve-block key.
    RouteStub,
    DirectiveStub,
}

impl ChangeTag {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChangeTag::Scaffold => "scaffold",
            ChangeTag::Component => "component",
            ChangeTag::Injectable => "injectable",
            ChangeTag::Http => "http",
            ChangeTag::DeferredPromise => "deferred_promise",
            ChangeTag::WatchStream => "watch_stream",
            ChangeTag::Routing => "routing",
            ChangeTag::RouteStub => "route_stub",
            ChangeTag::DirectiveStub => "directive_stub",
        }
    }
}

/// One atomic migration action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Change {
    /// Assigned by the rule engine in emission order.
    pub id: NodeId,
    pub before_id: NodeId,
    /// Often a synthetic label such as `component:user`.
    pub after_id: NodeId,
    pub source: ChangeSource,
    pub tag: ChangeTag,
    pub reason: String,
    /// Generated file (relative to the output root) the change lands in.
    pub file: Option<String>,
}

impl Change {
    pub fn new(tag: ChangeTag, before_id: NodeId, after_id: NodeId, reason: impl Into<String>) -> Self {
        Self {
            id: NodeId::default(),
            before_id,
            after_id,
            source: ChangeSource::Rule,
            tag,
            reason: reason.into(),
            file: None,
        }
    }

    pub fn in_file(mut self, file: impl Into<String>) -> Self {
        self.file = Some(file.into());
        self
    }
}

/// Migration risk. Deliberately not `Ord`: rules assign levels, they never compare them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskLevel {
    Safe,
    Risky,
    Manual,
}

impl RiskLevel {
    /// One step up; `Manual` stays `Manual`.
    pub fn escalated(self) -> Self {
        match self {
            RiskLevel::Safe => RiskLevel::Risky,
            RiskLevel::Risky | RiskLevel::Manual => RiskLevel::Manual,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RiskLevel::Safe => "safe",
            RiskLevel::Risky => "risky",
            RiskLevel::Manual => "manual",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskAssignment {
    pub level: RiskLevel,
    pub reason: String,
}

impl RiskAssignment {
    pub fn new(level: RiskLevel, reason: impl Into<String>) -> Self {
        Self {
            level,
            reason: reason.into(),
        }
    }
}

/// A transformation or risk rule that returned an error or panicked. It
/// contributed nothing to the run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleFailure {
    pub rule: String,
    pub message: String,
}

impl RuleFailure {
    pub fn new(rule: &str, message: impl Into<String>) -> Self {
        Self {
            rule: rule.to_string(),
            message: message.into(),
        }
    }

    /// Failure record for a caught panic payload.
    pub fn from_panic(rule: &str, payload: &(dyn std::any::Any + Send)) -> Self {
        let message = if let Some(s) = payload.downcast_ref::<&str>() {
            format!("panicked: {}", s)
        } else if let Some(s) = payload.downcast_ref::<String>() {
            format!("panicked: {}", s)
        } else {
            "panicked".to_string()
        };
        Self::new(rule, message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escalation_saturates_at_manual() {
        assert_eq!(RiskLevel::Safe.escalated(), RiskLevel::Risky);
        assert_eq!(RiskLevel::Risky.escalated(), RiskLevel::Manual);
        assert_eq!(RiskLevel::Manual.escalated(), RiskLevel::Manual);
    }

    #[test]
    fn test_change_defaults_to_rule_source() {
        let c = Change::new(
            ChangeTag::Component,
            NodeId::from("cls-0001"),
            NodeId::synthetic("component", "user"),
            "controller to component",
        )
        .in_file("src/app/user/user.component.ts");
        assert_eq!(c.source, ChangeSource::Rule);
        assert!(c.id.is_empty());
        assert_eq!(c.file.as_deref(), Some("src/app/user/user.component.ts"));
    }

    #[test]
    fn test_failure_from_panic_payloads() {
        let owned: Box<dyn std::any::Any + Send> = Box::new(String::from("bad state"));
        assert_eq!(RuleFailure::from_panic("r", owned.as_ref()).message, "panicked: bad state");
        let other: Box<dyn std::any::Any + Send> = Box::new(7u8);
        assert_eq!(RuleFailure::from_panic("r", other.as_ref()).message, "panicked");
    }
}
