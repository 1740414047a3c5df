//! Pattern detection: semantic roles with confidence per IR node.
//!
//! This module defines the `Detector` trait and the standard detector list.
//! Detectors are independent and side-effect-free; [`run_detectors`] folds
//! their outputs (role lists concatenated, confidence kept at the maximum).

pub mod markup;
pub mod naming;
pub mod signals;

use common::roles::PatternRoles;
use tracing::debug;

use crate::pipeline::Analysis;

/// A detector assigning roles to IR node ids.
///
/// # Implementation Notes
/// - Return a fresh `PatternRoles`; never mutate shared state
/// - Read-only over the analysis, which is immutable once built
/// - Order in [`standard_detectors`] does not change the fold result, but it
///   is kept explicit so reports list detectors deterministically
pub trait Detector {
    fn name(&self) -> &'static str;

    fn detect(&self, analysis: &Analysis) -> PatternRoles;
}

/// The standard detector list.
pub fn standard_detectors() -> Vec<Box<dyn Detector>> {
    vec![
        Box::new(naming::ControllerDetector),
        Box::new(naming::ServiceDetector),
        Box::new(signals::TemplateCouplingDetector),
        Box::new(signals::WatchDetector),
        Box::new(signals::HttpCallDetector),
        Box::new(signals::DirectiveDetector),
        Box::new(markup::EventHandlerDetector),
    ]
}

/// Runs every detector and folds the results.
pub fn run_detectors(detectors: &[Box<dyn Detector>], analysis: &Analysis) -> PatternRoles {
    detectors
        .iter()
        .map(|d| {
            let found = d.detect(analysis);
            debug!(detector = d.name(), nodes = found.roles.len(), "detector finished");
            found
        })
        .fold(PatternRoles::new(), PatternRoles::merge)
}
