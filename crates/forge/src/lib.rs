//! # The Forge: Transformation Rule Engine
//!
//! **Role**: Turns the analysis and its pattern roles into target-framework
//! source files plus one [`Change`] record per migration action.
//!
//! **Structure**:
//! - [`engine`]: the ordered rule list, failure isolation, change-id assignment.
//! - [`rules`]: one module per rewrite (scaffold, controllers, services, HTTP,
//!   watches, routes, directive stubs).
//! - [`di`]: legacy injection token → constructor parameter resolution.
//! - [`markup`]: template fragment extraction and attribute rewriting.
//! - [`writer`]: idempotent file writes and membership-checked injections.
//! - [`naming`]: file, class and selector names derived from legacy identifiers.
//!
//! **Idempotence**: whole files are written only when their content differs;
//! fragments injected into existing files (imports, fields, methods, module
//! entries) are guarded by a membership check first. Running the engine twice
//! over the same output root converges to byte-identical files.

pub mod di;
pub mod engine;
pub mod markup;
pub mod naming;
pub mod rules;
pub mod scaffold;
pub mod writer;

pub use common::migration::RuleFailure;
pub use engine::{Engine, RuleKind, Transformation};
pub use writer::Output;

use anatomist::Analysis;
use common::migration::Change;
use common::roles::PatternRoles;

/// Everything a rule reads. Read-only; the only side effects go through `out`.
pub struct RuleContext<'a> {
    pub analysis: &'a Analysis,
    pub roles: &'a PatternRoles,
    pub out: &'a Output,
}

/// One deterministic rewrite.
///
/// # Implementation Notes
/// - Must be idempotent against an existing output root
/// - Returns its changes in emission order; the engine assigns ids
/// - An `Err` drops this rule's changes only, siblings still run
pub trait Rule {
    fn name(&self) -> &'static str;

    fn apply(&self, cx: &RuleContext<'_>) -> Result<Vec<Change>, ForgeError>;
}

#[derive(Debug, thiserror::Error)]
pub enum ForgeError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Markup error: {0}")]
    Markup(String),

    #[error("Rule {rule} failed: {message}")]
    Rule { rule: &'static str, message: String },
}

impl ForgeError {
    pub(crate) fn io(path: &std::path::Path, source: std::io::Error) -> Self {
        ForgeError::Io {
            path: path.display().to_string(),
            source,
        }
    }
}
