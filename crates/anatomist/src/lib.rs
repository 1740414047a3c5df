//! # The Anatomist: Legacy Source Analysis
//!
//! **Role**: Turns a legacy client-side codebase into raw facts, normalizes them
//! into the IR, and assigns semantic roles.
//!
//! **Stages**:
//! 1. [`ingest`]: walk the source root, classify files (script / markup / other).
//! 2. [`parser`], [`routes`], [`markup`]: per-category analyzers producing [`RawFacts`].
//! 3. [`builder`]: pure normalization into modules, graph, templates, behaviors.
//! 4. [`heuristics`]: independent pattern detectors, folded into `PatternRoles`.
//!
//! **Design**:
//! - Analyzers are total over malformed input: one bad file is logged and skipped.
//! - Raw facts are approximate; the builder drops anything missing its required shape.

pub mod builder;
pub mod heuristics;
pub mod ingest;
pub mod markup;
pub mod parser;
pub mod path_util;
pub mod pipeline;
pub mod routes;
pub mod scan;
mod syntax;

pub use heuristics::Detector;
pub use ingest::{FileKind, SourceSet};
pub use pipeline::{analyze, detect, Analysis};
pub use routes::{Route, RouterFamily};

use common::behavior::LifecyclePhase;
use common::code::{CallMethod, ClassKind};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// One observer registration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawWatch {
    pub expression: String,
    pub deep: bool,
}

/// A controller, service, factory or provider registration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawClass {
    pub name: String,
    /// Registration method (`controller`, `service`, ...). Unknown values are dropped by the builder.
    pub kind: String,
    pub file: String,
    pub start_line: u32,
    pub end_line: u32,
    pub start_byte: usize,
    pub end_byte: usize,
    pub di_tokens: Vec<String>,
    pub reads: BTreeSet<String>,
    pub writes: BTreeSet<String>,
    pub methods: Vec<String>,
    pub watches: Vec<RawWatch>,
    pub nested_scope: bool,
    pub dynamic_compile: bool,
    pub lifecycle: Vec<LifecyclePhase>,
}

/// Isolate-scope binding mode of a directive property.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScopeBindingMode {
    /// `=`
    TwoWay,
    /// `<` or `@`
    OneWay,
    /// `&`
    Expression,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawDirective {
    pub name: String,
    pub file: String,
    pub start_line: u32,
    pub end_line: u32,
    pub start_byte: usize,
    pub end_byte: usize,
    pub di_tokens: Vec<String>,
    pub restrict: Option<String>,
    pub link: bool,
    pub compile: bool,
    pub transclude: bool,
    pub inline_template: bool,
    /// Uses the `$compile` service somewhere in its body.
    pub dynamic_compile: bool,
    pub scope_bindings: Vec<(String, ScopeBindingMode)>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawCall {
    pub file: String,
    pub line: u32,
    /// Lower-case method name; `defer` for promise construction.
    pub method: String,
    pub url: String,
    pub owner: Option<String>,
}

impl RawCall {
    pub fn method(&self) -> Option<CallMethod> {
        CallMethod::parse(&self.method)
    }
}

/// Directive occurrence in markup (`ng-repeat`, `ng-if`, `ng-click`, ...).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawDirectiveUse {
    pub attribute: String,
    pub expression: String,
    pub line: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawBindingUse {
    pub expression: String,
    pub two_way: bool,
    pub line: u32,
}

/// Markup facts scoped to one `ng-controller` element, or to none.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MarkupScope {
    pub controller: Option<String>,
    pub alias: Option<String>,
    pub tag: String,
    pub start_line: u32,
    pub end_line: u32,
    pub loops: Vec<RawDirectiveUse>,
    pub conditionals: Vec<RawDirectiveUse>,
    pub events: Vec<RawDirectiveUse>,
    pub bindings: Vec<RawBindingUse>,
}

impl MarkupScope {
    pub fn is_empty(&self) -> bool {
        self.loops.is_empty()
            && self.conditionals.is_empty()
            && self.events.is_empty()
            && self.bindings.is_empty()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawMarkup {
    pub file: String,
    /// Controller scopes in document order.
    pub scopes: Vec<MarkupScope>,
    /// Facts outside every controller scope.
    pub unscoped: MarkupScope,
}

/// Everything the analyzers extract from one source tree.
#[derive(Debug, Clone, Default)]
pub struct RawFacts {
    /// Analyzed script files, relative paths in sorted order.
    pub scripts: Vec<String>,
    pub classes: Vec<RawClass>,
    pub directives: Vec<RawDirective>,
    pub calls: Vec<RawCall>,
    pub routes: Vec<Route>,
    pub markup: Vec<RawMarkup>,
    /// Full markup text per file. Kept out of the IR for exact fragment extraction.
    pub markup_text: BTreeMap<String, String>,
}

impl RawClass {
    pub fn class_kind(&self) -> Option<ClassKind> {
        ClassKind::parse(&self.kind)
    }
}

/// Errors produced by the Anatomist crate.
#[derive(Debug, thiserror::Error)]
pub enum AnatomistError {
    /// Tree-sitter could not load a grammar or returned no tree.
    #[error("Parse failure: {0}")]
    ParseFailure(String),

    /// I/O error (file read/write). Displays as the OS message, no source chain.
    #[error(transparent)]
    IoError(#[from] std::io::Error),

    /// Carries the walked path in its message; not chained to the inner I/O error.
    #[error("Walk error: {0}")]
    WalkError(walkdir::Error),

    /// Tree-sitter uses u32 byte offsets.
    #[error("Byte range overflow: file size exceeds 4GB limit")]
    ByteRangeOverflow,
}

impl From<walkdir::Error> for AnatomistError {
    fn from(e: walkdir::Error) -> Self {
        AnatomistError::WalkError(e)
    }
}
