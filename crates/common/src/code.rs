//! Script-level IR: modules, classes, symbols and call facts.

use bitflags::bitflags;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::IrNode;

/// A parameter or field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Symbol {
    pub node: IrNode,
    pub name: String,
    pub type_hint: Option<String>,
    pub mutable: bool,
}

/// A method or free function.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Function {
    pub node: IrNode,
    pub name: String,
    pub params: Vec<Symbol>,
}

/// How the legacy class was registered with the framework.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClassKind {
    Controller,
    Service,
    Factory,
    Provider,
    Directive,
}

impl ClassKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ClassKind::Controller => "controller",
            ClassKind::Service => "service",
            ClassKind::Factory => "factory",
            ClassKind::Provider => "provider",
            ClassKind::Directive => "directive",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "controller" => Some(ClassKind::Controller),
            "service" => Some(ClassKind::Service),
            "factory" => Some(ClassKind::Factory),
            "provider" => Some(ClassKind::Provider),
            "directive" => Some(ClassKind::Directive),
            _ => None,
        }
    }

    /// Service, factory and provider registrations all become injectables.
    pub fn is_service_like(&self) -> bool {
        matches!(
            self,
            ClassKind::Service | ClassKind::Factory | ClassKind::Provider
        )
    }
}

bitflags! {
    /// Structural signals surfaced by the script analyzer.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
    pub struct ClassFlags: u16 {
        /// At least one observer with shallow semantics.
        const SHALLOW_WATCH = 1 << 0;
        /// At least one observer with deep (trailing `true`) semantics.
        const DEEP_WATCH = 1 << 1;
        /// `$compile` invoked inside the body.
        const DYNAMIC_COMPILE = 1 << 2;
        /// `$scope.$new()` inside the body.
        const NESTED_SCOPE = 1 << 3;
        /// Directive definition carries a `link` function.
        const LINK = 1 << 4;
        /// Directive definition enables transclusion.
        const TRANSCLUDE = 1 << 5;
        /// Directive definition carries a `compile` function.
        const COMPILE_FN = 1 << 6;
    }
}

/// One legacy controller, service, factory, provider or directive.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Class {
    pub node: IrNode,
    pub name: String,
    pub kind: ClassKind,
    pub fields: Vec<Symbol>,
    pub methods: Vec<Function>,
    /// Shared-state properties read from the legacy scope.
    pub reads: BTreeSet<String>,
    /// Shared-state properties written to the legacy scope.
    pub writes: BTreeSet<String>,
    pub flags: ClassFlags,
    /// Watched expressions in registration order.
    pub watched: Vec<String>,
    /// Injected dependency tokens, declaration order preserved.
    pub di_tokens: Vec<String>,
}

impl Class {
    pub fn has_watch(&self) -> bool {
        self.flags
            .intersects(ClassFlags::SHALLOW_WATCH | ClassFlags::DEEP_WATCH)
    }

    /// Shallow observers only, no deep ones.
    pub fn is_shallow_only(&self) -> bool {
        self.flags.contains(ClassFlags::SHALLOW_WATCH) && !self.flags.contains(ClassFlags::DEEP_WATCH)
    }

    /// Compile or nested-scope usage: the class is coupled to its markup at runtime.
    pub fn has_unsafe_template_coupling(&self) -> bool {
        self.flags
            .intersects(ClassFlags::DYNAMIC_COMPILE | ClassFlags::NESTED_SCOPE)
    }

    pub fn field(&self, name: &str) -> Option<&Symbol> {
        self.fields.iter().find(|f| f.name == name)
    }
}

/// One analyzed source file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Module {
    pub node: IrNode,
    /// Path relative to the source root, forward slashes.
    pub path: String,
    pub classes: Vec<Class>,
    pub functions: Vec<Function>,
    pub globals: Vec<Symbol>,
}

/// HTTP verb or deferred-promise construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CallMethod {
    Get,
    Post,
    Put,
    Delete,
    Patch,
    Head,
    Jsonp,
    /// `$q.defer()` or `$q(function (resolve, reject) {...})`.
    Defer,
}

impl CallMethod {
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "get" => Some(CallMethod::Get),
            "post" => Some(CallMethod::Post),
            "put" => Some(CallMethod::Put),
            "delete" => Some(CallMethod::Delete),
            "patch" => Some(CallMethod::Patch),
            "head" => Some(CallMethod::Head),
            "jsonp" => Some(CallMethod::Jsonp),
            "defer" => Some(CallMethod::Defer),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            CallMethod::Get => "get",
            CallMethod::Post => "post",
            CallMethod::Put => "put",
            CallMethod::Delete => "delete",
            CallMethod::Patch => "patch",
            CallMethod::Head => "head",
            CallMethod::Jsonp => "jsonp",
            CallMethod::Defer => "defer",
        }
    }

    /// Verbs whose client call carries a request body.
    pub fn has_body(&self) -> bool {
        matches!(self, CallMethod::Post | CallMethod::Put | CallMethod::Patch)
    }
}

/// A normalized HTTP or promise call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HttpCall {
    pub node: IrNode,
    pub method: CallMethod,
    /// Literal URL, or the leading literal of a concatenation. Empty for `Defer`.
    pub url: String,
    /// Name of the enclosing registration, `None` when attributed to the file only.
    pub owner: Option<String>,
}

impl HttpCall {
    pub fn is_deferred(&self) -> bool {
        self.method == CallMethod::Defer
    }
}
