//! Naming-convention detectors.

use common::code::ClassKind;
use common::roles::{PatternRoles, Role};

use super::Detector;
use crate::pipeline::Analysis;

const CONTROLLER_SUFFIXES: &[&str] = &["controller", "ctrl"];

/// Suffix → confidence. Explicit `Service` naming is the strongest signal.
const SERVICE_SUFFIXES: &[(&str, f32)] = &[
    ("service", 0.95),
    ("svc", 0.95),
    ("factory", 0.90),
    ("provider", 0.85),
];

/// `Controller`/`Ctrl` suffix, or a `.controller(...)` registration without one.
pub struct ControllerDetector;

impl Detector for ControllerDetector {
    fn name(&self) -> &'static str {
        "controller"
    }

    fn detect(&self, analysis: &Analysis) -> PatternRoles {
        let mut roles = PatternRoles::new();
        for class in analysis.classes() {
            if class.kind == ClassKind::Directive {
                continue;
            }
            let lower = class.name.to_ascii_lowercase();
            let confidence = if CONTROLLER_SUFFIXES.iter().any(|s| lower.ends_with(s)) {
                0.95
            } else if class.kind == ClassKind::Controller {
                0.9
            } else {
                continue;
            };
            roles.assign(
                &class.node.id,
                &[Role::Controller, Role::ComponentState, Role::ComponentMethod],
                confidence,
            );
        }
        roles
    }
}

/// Service-like suffixes, or a service/factory/provider registration.
pub struct ServiceDetector;

impl Detector for ServiceDetector {
    fn name(&self) -> &'static str {
        "service"
    }

    fn detect(&self, analysis: &Analysis) -> PatternRoles {
        let mut roles = PatternRoles::new();
        for class in analysis.classes() {
            if class.kind == ClassKind::Directive {
                continue;
            }
            let lower = class.name.to_ascii_lowercase();
            let by_suffix = SERVICE_SUFFIXES
                .iter()
                .find(|(suffix, _)| lower.ends_with(suffix))
                .map(|(_, c)| *c);
            // A `.controller(...)` registration has no kind signal; only a
            // service-like name suffix makes it a service.
            let by_kind = match class.kind {
                ClassKind::Service => Some(0.85),
                ClassKind::Factory => Some(0.8),
                ClassKind::Provider => Some(0.75),
                ClassKind::Controller | ClassKind::Directive => None,
            };
            if let Some(confidence) = by_suffix.or(by_kind) {
                roles.assign(&class.node.id, &[Role::Service], confidence);
            }
        }
        roles
    }
}

/// `true` when a class name alone marks it as service-like.
pub fn has_service_suffix(name: &str) -> bool {
    let lower = name.to_ascii_lowercase();
    SERVICE_SUFFIXES.iter().any(|(s, _)| lower.ends_with(s))
}
