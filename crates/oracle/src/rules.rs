//! The standard risk rules, in precedence order.

use common::code::{Class, ClassFlags, ClassKind};
use common::migration::{Change, ChangeTag, RiskAssignment, RiskLevel};
use common::roles::Role;

use crate::{OracleError, RiskContext, RiskMap, RiskRule};

/// Distinct scope writes that make a shallow-watch class risky.
pub const SHALLOW_WATCH_WRITE_LIMIT: usize = 10;
/// Distinct scope writes that make a class without any watch risky.
pub const UNWATCHED_WRITE_LIMIT: usize = 7;

// ---------------------------------------------------------------------------
// Baseline
// ---------------------------------------------------------------------------

/// Every mechanical change starts safe.
///
/// Directive stubs and deferred promises are left to the rules that own them.
pub struct BaselineRule;

fn baseline_reason(tag: ChangeTag) -> Option<&'static str> {
    match tag {
        ChangeTag::Scaffold => Some("Project scaffold is generated deterministically"),
        ChangeTag::Component => Some("Controller maps to a component shell"),
        ChangeTag::Injectable => Some("Service maps cleanly to @Injectable()"),
        ChangeTag::Http => Some("$http call maps to a deterministic HttpClient method"),
        ChangeTag::WatchStream => Some("Shallow $watch maps to a BehaviorSubject field"),
        ChangeTag::Routing => Some("Route table is rebuilt from static route facts"),
        ChangeTag::RouteStub => Some("Guard or resolver stub generated from a resolve key"),
        ChangeTag::DeferredPromise | ChangeTag::DirectiveStub => None,
    }
}

impl RiskRule for BaselineRule {
    fn name(&self) -> &'static str {
        "baseline"
    }

    fn assess(&self, cx: &RiskContext<'_>) -> Result<RiskMap, OracleError> {
        Ok(cx
            .changes
            .iter()
            .filter_map(|c| {
                baseline_reason(c.tag).map(|r| (c.id.clone(), RiskAssignment::new(RiskLevel::Safe, r)))
            })
            .collect())
    }
}

// ---------------------------------------------------------------------------
// Template binding
// ---------------------------------------------------------------------------

/// Template coupling combined with event handlers is one level riskier.
/// Template coupling alone is structural and stays at baseline.
pub struct TemplateBindingRule;

impl RiskRule for TemplateBindingRule {
    fn name(&self) -> &'static str {
        "template_binding"
    }

    fn assess(&self, cx: &RiskContext<'_>) -> Result<RiskMap, OracleError> {
        let mut map = RiskMap::new();
        for change in cx.changes {
            let node = &change.before_id;
            if cx.roles.has(node, Role::TemplateBinding) && cx.roles.has(node, Role::EventHandler) {
                map.insert(
                    change.id.clone(),
                    RiskAssignment::new(
                        RiskLevel::Safe.escalated(),
                        "Template coupling combined with event handlers",
                    ),
                );
            }
        }
        Ok(map)
    }
}

// ---------------------------------------------------------------------------
// Directive
// ---------------------------------------------------------------------------

/// Directives have no deterministic mapping: always manual.
pub struct DirectiveRule;

fn directive_signals(class: &Class) -> Vec<&'static str> {
    [
        (ClassFlags::COMPILE_FN, "compile()"),
        (ClassFlags::LINK, "link()"),
        (ClassFlags::TRANSCLUDE, "transclude"),
        (ClassFlags::DYNAMIC_COMPILE, "$compile"),
    ]
    .into_iter()
    .filter(|(flag, _)| class.flags.contains(*flag))
    .map(|(_, label)| label)
    .collect()
}

impl RiskRule for DirectiveRule {
    fn name(&self) -> &'static str {
        "directive"
    }

    fn assess(&self, cx: &RiskContext<'_>) -> Result<RiskMap, OracleError> {
        let mut map = RiskMap::new();
        for change in cx.changes.iter().filter(|c| c.tag == ChangeTag::DirectiveStub) {
            let signals = cx
                .analysis
                .class(&change.before_id)
                .filter(|c| c.kind == ClassKind::Directive)
                .map(directive_signals)
                .unwrap_or_default();
            let suffix = if signals.is_empty() {
                String::new()
            } else {
                format!(" [{}]", signals.join(", "))
            };
            map.insert(
                change.id.clone(),
                RiskAssignment::new(
                    RiskLevel::Manual,
                    format!(
                        "Directive{} has no deterministic migration; convert to @Component or @Directive by hand",
                        suffix
                    ),
                ),
            );
        }
        Ok(map)
    }
}

// ---------------------------------------------------------------------------
// Watcher / behavior
// ---------------------------------------------------------------------------

/// Behavioral signals of the class a change originates from. Runs last.
///
/// Assigns only when a signal applies, so earlier escalations survive when
/// the class is quiet. Directive stubs are never touched.
pub struct WatcherRule;

fn watcher_signal(change: &Change, class: Option<&Class>) -> Option<RiskAssignment> {
    if change.tag == ChangeTag::DeferredPromise {
        return Some(RiskAssignment::new(
            RiskLevel::Manual,
            "$q.defer() detected: the promise chain needs a manual Observable migration",
        ));
    }
    let class = class?;
    let writes = class.writes.len();
    if class.flags.contains(ClassFlags::DEEP_WATCH) {
        Some(RiskAssignment::new(
            RiskLevel::Manual,
            "Deep $watch detected (high behavioral coupling)",
        ))
    } else if class.flags.contains(ClassFlags::DYNAMIC_COMPILE) {
        Some(RiskAssignment::new(
            RiskLevel::Manual,
            "$compile usage detected (runtime DOM compilation)",
        ))
    } else if class.flags.contains(ClassFlags::NESTED_SCOPE) {
        Some(RiskAssignment::new(
            RiskLevel::Manual,
            "Nested scope creation detected (scope inheritance)",
        ))
    } else if class.flags.contains(ClassFlags::SHALLOW_WATCH) {
        (writes >= SHALLOW_WATCH_WRITE_LIMIT).then(|| {
            RiskAssignment::new(
                RiskLevel::Safe.escalated(),
                format!("Shallow $watch with extreme scope mutation ({} distinct writes)", writes),
            )
        })
    } else {
        (writes >= UNWATCHED_WRITE_LIMIT).then(|| {
            RiskAssignment::new(
                RiskLevel::Safe.escalated(),
                format!(
                    "Heavy scope mutation without a reactive pattern ({} distinct writes)",
                    writes
                ),
            )
        })
    }
}

impl RiskRule for WatcherRule {
    fn name(&self) -> &'static str {
        "watcher"
    }

    fn assess(&self, cx: &RiskContext<'_>) -> Result<RiskMap, OracleError> {
        let mut map = RiskMap::new();
        for change in cx.changes.iter().filter(|c| c.tag != ChangeTag::DirectiveStub) {
            let class = cx
                .analysis
                .class(&change.before_id)
                .filter(|c| c.kind != ClassKind::Directive);
            if let Some(assignment) = watcher_signal(change, class) {
                map.insert(change.id.clone(), assignment);
            }
        }
        Ok(map)
    }
}
