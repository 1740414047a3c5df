//! # Common: The Migration IR
//!
//! **Role**: Framework-agnostic facts shared by every stage of the pipeline.
//!
//! **Core Types**:
//! - `NodeId`: Opaque identity, stable for one pipeline run. The only way entities
//!   reference each other.
//! - `IrNode`: Identity + optional source location + free-form metadata. Every IR
//!   entity embeds one.
//! - [`code`]: modules, classes, symbols, functions, HTTP/promise call facts.
//! - [`graph`]: typed dependency multigraph.
//! - [`template`]: markup-level bindings and directives.
//! - [`behavior`]: runtime-only facts with no static shape.
//! - [`migration`]: `Change` records, tags and risk levels.
//! - [`roles`]: semantic roles assigned by pattern detection.
//! - [`registry`]: id → owner index built once per run.
//!
//! **Design**:
//! - Pure data. No I/O, no parsing.
//! - Ordered maps (`BTreeMap`/`BTreeSet`) throughout so that every serialized
//!   artifact is byte-stable across runs with identical input.

pub mod behavior;
pub mod code;
pub mod graph;
pub mod migration;
pub mod registry;
pub mod roles;
pub mod template;

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Opaque node identity.
///
/// Allocated by [`IdAllocator`] during IR building (`cls-0003`, `tpl-0001`) or
/// composed by rules as a synthetic label (`component:user`). Synthetic labels
/// need not resolve to a real node.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(String);

impl NodeId {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    /// Builds a synthetic `kind:label` id.
    pub fn synthetic(kind: &str, label: &str) -> Self {
        Self(format!("{}:{}", kind, label))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for NodeId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Deterministic per-run id allocator.
///
/// Ids are `{prefix}-{sequence:04}` with one counter per prefix. Two runs that
/// visit the same facts in the same order allocate the same ids.
#[derive(Debug, Default)]
pub struct IdAllocator {
    counters: BTreeMap<&'static str, u32>,
}

impl IdAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next(&mut self, prefix: &'static str) -> NodeId {
        let counter = self.counters.entry(prefix).or_insert(0);
        *counter += 1;
        NodeId(format!("{}-{:04}", prefix, counter))
    }
}

/// Source location (file + 1-indexed inclusive line range).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceLocation {
    /// Normalized path relative to the source root, forward slashes.
    pub file: String,
    pub start_line: u32,
    pub end_line: u32,
}

/// Base record embedded by every IR entity.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IrNode {
    pub id: NodeId,
    pub location: Option<SourceLocation>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: BTreeMap<String, String>,
}

impl IrNode {
    pub fn new(id: NodeId) -> Self {
        Self {
            id,
            location: None,
            metadata: BTreeMap::new(),
        }
    }

    pub fn at(mut self, file: &str, start_line: u32, end_line: u32) -> Self {
        self.location = Some(SourceLocation {
            file: file.to_string(),
            start_line,
            end_line,
        });
        self
    }

    pub fn with_meta(mut self, key: &str, value: impl Into<String>) -> Self {
        self.metadata.insert(key.to_string(), value.into());
        self
    }

    /// File component of the location, if any.
    pub fn file(&self) -> Option<&str> {
        self.location.as_ref().map(|l| l.file.as_str())
    }
}
