//! Semantic roles and their fold.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::NodeId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Controller,
    ComponentState,
    ComponentMethod,
    Service,
    TemplateBinding,
    ShallowWatch,
    HttpCall,
    PromiseChain,
    Directive,
    CompileUsage,
    EventHandler,
}

/// Roles and confidence per node id.
///
/// Each detector returns its own `PatternRoles`; the pipeline folds them with
/// [`PatternRoles::merge`]: role lists concatenate, confidence keeps the maximum.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PatternRoles {
    pub roles: BTreeMap<NodeId, Vec<Role>>,
    pub confidence: BTreeMap<NodeId, f32>,
}

impl PatternRoles {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn assign(&mut self, id: &NodeId, roles: &[Role], confidence: f32) {
        self.roles.entry(id.clone()).or_default().extend_from_slice(roles);
        let slot = self.confidence.entry(id.clone()).or_insert(confidence);
        if confidence > *slot {
            *slot = confidence;
        }
    }

    pub fn merge(mut self, other: PatternRoles) -> PatternRoles {
        for (id, roles) in other.roles {
            self.roles.entry(id).or_default().extend(roles);
        }
        for (id, c) in other.confidence {
            let slot = self.confidence.entry(id).or_insert(c);
            if c > *slot {
                *slot = c;
            }
        }
        self
    }

    pub fn roles_of(&self, id: &NodeId) -> &[Role] {
        self.roles.get(id).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn has(&self, id: &NodeId, role: Role) -> bool {
        self.roles_of(id).contains(&role)
    }

    pub fn confidence_of(&self, id: &NodeId) -> f32 {
        self.confidence.get(id).copied().unwrap_or(0.0)
    }

    /// Node ids carrying `role`, in id order.
    pub fn with_role(&self, role: Role) -> Vec<&NodeId> {
        self.roles
            .iter()
            .filter(|(_, roles)| roles.contains(&role))
            .map(|(id, _)| id)
            .collect()
    }
}
