//! Markup-derived roles.

use common::roles::{PatternRoles, Role};
use common::template::DirectiveKind;

use super::Detector;
use crate::pipeline::Analysis;

/// Event directives, and the controllers whose scoped markup contains them.
pub struct EventHandlerDetector;

impl Detector for EventHandlerDetector {
    fn name(&self) -> &'static str {
        "event_handler"
    }

    fn detect(&self, analysis: &Analysis) -> PatternRoles {
        let mut roles = PatternRoles::new();
        for template in &analysis.templates {
            let events: Vec<_> = template
                .directives
                .iter()
                .filter(|d| d.kind == DirectiveKind::Event)
                .collect();
            if events.is_empty() {
                continue;
            }
            for directive in &events {
                roles.assign(&directive.node.id, &[Role::EventHandler], 0.8);
            }
            if let Some(cid) = analysis.index.owner(&template.node.id) {
                roles.assign(cid, &[Role::EventHandler], 0.8);
            }
        }
        roles
    }
}
