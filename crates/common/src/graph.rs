//! Typed dependency multigraph over IR node ids.
//!
//! Backed by `petgraph::DiGraph`, which already permits parallel edges and
//! self-loops. Node weights are `NodeId`s; an id → index map keeps insertion
//! idempotent.

use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use petgraph::Direction;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::NodeId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EdgeKind {
    Import,
    Call,
    Inject,
    Extends,
    Implements,
    TemplateBinding,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EdgeMeta {
    pub optional: bool,
    pub runtime_only: bool,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Edge {
    pub kind: EdgeKind,
    pub meta: EdgeMeta,
}

#[derive(Debug, Default)]
pub struct DependencyGraph {
    graph: DiGraph<NodeId, Edge>,
    index: HashMap<NodeId, NodeIndex>,
}

impl DependencyGraph {
    pub fn new() -> Self {
        Self::default()
    }

    fn intern(&mut self, id: &NodeId) -> NodeIndex {
        if let Some(&idx) = self.index.get(id) {
            return idx;
        }
        let idx = self.graph.add_node(id.clone());
        self.index.insert(id.clone(), idx);
        idx
    }

    /// Adds an edge. Repeated references produce repeated edges.
    pub fn add_edge(&mut self, source: &NodeId, target: &NodeId, kind: EdgeKind, meta: EdgeMeta) {
        let s = self.intern(source);
        let t = self.intern(target);
        self.graph.add_edge(s, t, Edge { kind, meta });
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// Outgoing edges of `source` in insertion order.
    pub fn edges_from(&self, source: &NodeId) -> Vec<(&NodeId, &Edge)> {
        let Some(&idx) = self.index.get(source) else {
            return Vec::new();
        };
        let mut out: Vec<_> = self
            .graph
            .edges_directed(idx, Direction::Outgoing)
            .map(|e| (e.id(), &self.graph[e.target()], e.weight()))
            .collect();
        // petgraph yields outgoing edges newest-first.
        out.sort_by_key(|(eid, _, _)| *eid);
        out.into_iter().map(|(_, t, w)| (t, w)).collect()
    }

    /// Incoming edges of `target` of the given kind.
    pub fn sources_of(&self, target: &NodeId, kind: EdgeKind) -> Vec<&NodeId> {
        let Some(&idx) = self.index.get(target) else {
            return Vec::new();
        };
        self.graph
            .edges_directed(idx, Direction::Incoming)
            .filter(|e| e.weight().kind == kind)
            .map(|e| &self.graph[e.source()])
            .collect()
    }

    /// All edges as `(source, target, edge)` in insertion order.
    pub fn edges(&self) -> impl Iterator<Item = (&NodeId, &NodeId, &Edge)> {
        self.graph
            .edge_references()
            .map(|e| (&self.graph[e.source()], &self.graph[e.target()], e.weight()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parallel_edges_and_self_loops_are_kept() {
        let mut g = DependencyGraph::new();
        let a = NodeId::from("cls-0001");
        let b = NodeId::from("cls-0002");
        g.add_edge(&a, &b, EdgeKind::Inject, EdgeMeta::default());
        g.add_edge(&a, &b, EdgeKind::Inject, EdgeMeta::default());
        g.add_edge(&a, &a, EdgeKind::Call, EdgeMeta::default());

        assert_eq!(g.node_count(), 2);
        assert_eq!(g.edge_count(), 3);
        let out = g.edges_from(&a);
        assert_eq!(out.len(), 3);
        assert_eq!(out[0].0, &b);
        assert_eq!(out[2].1.kind, EdgeKind::Call);
    }

    #[test]
    fn test_sources_of_filters_by_kind() {
        let mut g = DependencyGraph::new();
        let tpl = NodeId::from("tpl-0001");
        let cls = NodeId::from("cls-0001");
        g.add_edge(&tpl, &cls, EdgeKind::TemplateBinding, EdgeMeta::default());
        g.add_edge(
            &NodeId::from("cls-0002"),
            &cls,
            EdgeKind::Inject,
            EdgeMeta {
                runtime_only: true,
                ..Default::default()
            },
        );
        assert_eq!(g.sources_of(&cls, EdgeKind::TemplateBinding), vec![&tpl]);
        assert!(g.sources_of(&NodeId::from("missing"), EdgeKind::Call).is_empty());
    }
}
