//! Structural-signal detectors: observers, compile/nested-scope coupling,
//! HTTP/promise calls and directives.

use common::code::{ClassFlags, ClassKind};
use common::roles::{PatternRoles, Role};

use super::Detector;
use crate::pipeline::Analysis;

/// Compile or nested-scope usage marks unsafe template coupling. Deep
/// observers mark component state that risk assessment escalates later.
pub struct TemplateCouplingDetector;

impl Detector for TemplateCouplingDetector {
    fn name(&self) -> &'static str {
        "template_coupling"
    }

    fn detect(&self, analysis: &Analysis) -> PatternRoles {
        let mut roles = PatternRoles::new();
        for class in analysis.classes().filter(|c| c.kind != ClassKind::Directive) {
            if class.has_unsafe_template_coupling() {
                roles.assign(&class.node.id, &[Role::TemplateBinding], 0.9);
            }
            if class.flags.contains(ClassFlags::DEEP_WATCH) {
                roles.assign(&class.node.id, &[Role::ComponentState], 0.8);
            }
        }
        roles
    }
}

/// Shallow-only observers are eligible for the reactive-stream rewrite.
pub struct WatchDetector;

impl Detector for WatchDetector {
    fn name(&self) -> &'static str {
        "watch"
    }

    fn detect(&self, analysis: &Analysis) -> PatternRoles {
        let mut roles = PatternRoles::new();
        for class in analysis.classes().filter(|c| c.is_shallow_only()) {
            roles.assign(&class.node.id, &[Role::ShallowWatch], 0.9);
        }
        roles
    }
}

pub struct HttpCallDetector;

impl Detector for HttpCallDetector {
    fn name(&self) -> &'static str {
        "http_call"
    }

    fn detect(&self, analysis: &Analysis) -> PatternRoles {
        let mut roles = PatternRoles::new();
        for call in &analysis.calls {
            if call.is_deferred() {
                roles.assign(&call.node.id, &[Role::HttpCall, Role::PromiseChain], 0.9);
            } else {
                roles.assign(&call.node.id, &[Role::HttpCall], 0.95);
            }
        }
        roles
    }
}

/// Every directive is flagged; none is migrated automatically.
pub struct DirectiveDetector;

impl Detector for DirectiveDetector {
    fn name(&self) -> &'static str {
        "directive"
    }

    fn detect(&self, analysis: &Analysis) -> PatternRoles {
        let mut roles = PatternRoles::new();
        for class in analysis.classes().filter(|c| c.kind == ClassKind::Directive) {
            roles.assign(&class.node.id, &[Role::Directive, Role::CompileUsage], 1.0);
            if class
                .flags
                .intersects(ClassFlags::LINK | ClassFlags::TRANSCLUDE)
            {
                roles.assign(&class.node.id, &[Role::TemplateBinding], 0.9);
            }
        }
        roles
    }
}
