//! Markup-level IR: bindings and directive occurrences.

use serde::{Deserialize, Serialize};

use crate::{IrNode, NodeId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BindingKind {
    Read,
    Write,
    TwoWay,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Binding {
    pub expression: String,
    /// Field symbol of the bound controller, when one could be resolved.
    pub target: Option<NodeId>,
    pub kind: BindingKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DirectiveKind {
    Loop,
    Conditional,
    Event,
}

/// One `ng-repeat` / `ng-if` / `ng-click`-style occurrence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemplateDirective {
    pub node: IrNode,
    pub kind: DirectiveKind,
    /// Attribute name as written, e.g. `ng-click`.
    pub attribute: String,
    pub expression: String,
}

/// All markup facts of one file scoped to one controller (or to none).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Template {
    pub node: IrNode,
    /// Markup file, relative to the source root.
    pub file: String,
    /// Controller name this scope is bound to.
    pub controller: Option<String>,
    /// `controller as alias` alias, if any.
    pub alias: Option<String>,
    pub bindings: Vec<Binding>,
    pub directives: Vec<TemplateDirective>,
}
