//! Runtime-only facts with no static shape.

use serde::{Deserialize, Serialize};

use crate::{IrNode, NodeId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BindingSemantics {
    OneWay,
    TwoWay,
    Implicit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecyclePhase {
    Init,
    Update,
    Destroy,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BehaviorKind {
    RuntimeBinding {
        source: NodeId,
        target: NodeId,
        semantics: BindingSemantics,
    },
    LifecycleHook {
        phase: LifecyclePhase,
        owner: NodeId,
    },
    Observer {
        observed: NodeId,
        trigger: String,
    },
    SideEffect {
        cause: String,
        affected: NodeId,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Behavior {
    pub node: IrNode,
    pub kind: BehaviorKind,
}

impl Behavior {
    /// The IR node this behavior is about.
    pub fn subject(&self) -> &NodeId {
        match &self.kind {
            BehaviorKind::RuntimeBinding { target, .. } => target,
            BehaviorKind::LifecycleHook { owner, .. } => owner,
            BehaviorKind::Observer { observed, .. } => observed,
            BehaviorKind::SideEffect { affected, .. } => affected,
        }
    }
}
