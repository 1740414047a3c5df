//! IR builder: pure normalization of raw facts.
//!
//! No I/O. Raw facts missing their required shape are dropped here, so later
//! stages never see a nameless class or a URL-less HTTP call. Ids come from a
//! single [`IdAllocator`] walked in a fixed order (scripts in path order, then
//! markup), which keeps them stable across identical runs.

use std::collections::{BTreeMap, BTreeSet};

use common::behavior::{Behavior, BehaviorKind, BindingSemantics};
use common::code::{CallMethod, Class, ClassFlags, ClassKind, Function, HttpCall, Module, Symbol};
use common::graph::{DependencyGraph, EdgeKind, EdgeMeta};
use common::template::{Binding, BindingKind, DirectiveKind, Template, TemplateDirective};
use common::{IdAllocator, IrNode, NodeId};
use tracing::debug;

use crate::{MarkupScope, RawClass, RawDirective, RawFacts, ScopeBindingMode};

/// Normalized IR of one run.
#[derive(Debug, Default)]
pub struct Ir {
    pub modules: Vec<Module>,
    pub graph: DependencyGraph,
    pub templates: Vec<Template>,
    pub behaviors: Vec<Behavior>,
    pub calls: Vec<HttpCall>,
}

fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_' || c == '$')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$')
}

fn symbol(ids: &mut IdAllocator, prefix: &'static str, name: &str, mutable: bool, file: &str, line: u32) -> Symbol {
    Symbol {
        node: IrNode::new(ids.next(prefix)).at(file, line, line),
        name: name.to_string(),
        type_hint: None,
        mutable,
    }
}

fn class_from_raw(ids: &mut IdAllocator, raw: &RawClass, kind: ClassKind) -> Class {
    let node = IrNode::new(ids.next("cls"))
        .at(&raw.file, raw.start_line, raw.end_line)
        .with_meta("registered_as", kind.as_str());

    let mut flags = ClassFlags::empty();
    for watch in &raw.watches {
        flags |= if watch.deep {
            ClassFlags::DEEP_WATCH
        } else {
            ClassFlags::SHALLOW_WATCH
        };
    }
    if raw.nested_scope {
        flags |= ClassFlags::NESTED_SCOPE;
    }
    if raw.dynamic_compile {
        flags |= ClassFlags::DYNAMIC_COMPILE;
    }

    let mut fields: Vec<Symbol> = raw
        .writes
        .iter()
        .map(|w| symbol(ids, "fld", w, true, &raw.file, raw.start_line))
        .collect();
    for read in raw.reads.difference(&raw.writes) {
        if !raw.methods.contains(read) {
            fields.push(symbol(ids, "fld", read, false, &raw.file, raw.start_line));
        }
    }
    let methods = raw
        .methods
        .iter()
        .map(|m| Function {
            node: IrNode::new(ids.next("fn")).at(&raw.file, raw.start_line, raw.end_line),
            name: m.clone(),
            params: Vec::new(),
        })
        .collect();

    Class {
        node,
        name: raw.name.clone(),
        kind,
        fields,
        methods,
        reads: raw.reads.clone(),
        writes: raw.writes.clone(),
        flags,
        watched: raw.watches.iter().map(|w| w.expression.clone()).collect(),
        di_tokens: raw.di_tokens.clone(),
    }
}

fn class_from_directive(ids: &mut IdAllocator, raw: &RawDirective) -> Class {
    let mut node = IrNode::new(ids.next("cls"))
        .at(&raw.file, raw.start_line, raw.end_line)
        .with_meta("registered_as", "directive");
    if let Some(restrict) = &raw.restrict {
        node = node.with_meta("restrict", restrict.clone());
    }

    let mut flags = ClassFlags::empty();
    if raw.link {
        flags |= ClassFlags::LINK;
    }
    if raw.transclude {
        flags |= ClassFlags::TRANSCLUDE;
    }
    if raw.compile {
        flags |= ClassFlags::COMPILE_FN;
    }
    if raw.dynamic_compile {
        flags |= ClassFlags::DYNAMIC_COMPILE;
    }

    let fields = raw
        .scope_bindings
        .iter()
        .map(|(name, mode)| {
            let mut s = symbol(ids, "fld", name, *mode == ScopeBindingMode::TwoWay, &raw.file, raw.start_line);
            s.type_hint = Some(
                match mode {
                    ScopeBindingMode::TwoWay => "=",
                    ScopeBindingMode::OneWay => "<",
                    ScopeBindingMode::Expression => "&",
                }
                .to_string(),
            );
            s
        })
        .collect();

    Class {
        node,
        name: raw.name.clone(),
        kind: ClassKind::Directive,
        fields,
        methods: Vec::new(),
        reads: BTreeSet::new(),
        writes: BTreeSet::new(),
        flags,
        watched: Vec::new(),
        di_tokens: raw.di_tokens.clone(),
    }
}

/// First identifier segment of a binding expression with the alias removed:
/// `vm.user.name` → `user`, `query | filter` → `query`.
fn binding_root(expr: &str, alias: Option<&str>) -> Option<String> {
    let head = expr.split('|').next()?.trim();
    let mut parts = head.split('.');
    let mut first = parts.next()?.trim();
    if alias.is_some_and(|a| a == first) {
        first = parts.next()?.trim();
    }
    let ident: String = first
        .chars()
        .take_while(|c| c.is_ascii_alphanumeric() || *c == '_' || *c == '$')
        .collect();
    (!ident.is_empty()).then_some(ident)
}

fn side_effect(ids: &mut IdAllocator, cls: &Class, cause: &str) -> Behavior {
    Behavior {
        node: IrNode::new(ids.next("bhv")),
        kind: BehaviorKind::SideEffect {
            cause: cause.to_string(),
            affected: cls.node.id.clone(),
        },
    }
}

/// Normalizes raw facts into IR.
pub fn build(raw: &RawFacts) -> Ir {
    let mut ids = IdAllocator::new();
    let mut ir = Ir::default();

    // Modules, one per script file, classes in source order.
    let mut by_file: BTreeMap<&str, (Vec<&RawClass>, Vec<&RawDirective>)> = BTreeMap::new();
    for file in &raw.scripts {
        by_file.entry(file.as_str()).or_default();
    }
    for class in &raw.classes {
        by_file.entry(class.file.as_str()).or_default().0.push(class);
    }
    for directive in &raw.directives {
        by_file.entry(directive.file.as_str()).or_default().1.push(directive);
    }

    let mut dropped = 0usize;
    for (file, (classes, directives)) in by_file {
        let mut module = Module {
            node: IrNode::new(ids.next("mod")).at(file, 1, 1),
            path: file.to_string(),
            classes: Vec::new(),
            functions: Vec::new(),
            globals: Vec::new(),
        };
        for raw_class in classes {
            match raw_class.class_kind() {
                Some(kind) if kind != ClassKind::Directive && is_identifier(&raw_class.name) => {
                    module.classes.push(class_from_raw(&mut ids, raw_class, kind));
                }
                _ => dropped += 1,
            }
        }
        for raw_directive in directives {
            if is_identifier(&raw_directive.name) {
                module.classes.push(class_from_directive(&mut ids, raw_directive));
            } else {
                dropped += 1;
            }
        }
        ir.modules.push(module);
    }

    // Calls.
    for raw_call in &raw.calls {
        let Some(method) = raw_call.method() else {
            dropped += 1;
            continue;
        };
        if method != CallMethod::Defer && raw_call.url.trim().is_empty() {
            dropped += 1;
            continue;
        }
        ir.calls.push(HttpCall {
            node: IrNode::new(ids.next("http")).at(&raw_call.file, raw_call.line, raw_call.line),
            method,
            url: raw_call.url.clone(),
            owner: raw_call.owner.clone(),
        });
    }

    // Class name → id, first registration wins.
    let mut class_ids: BTreeMap<String, NodeId> = BTreeMap::new();
    for class in ir.modules.iter().flat_map(|m| &m.classes) {
        class_ids.entry(class.name.clone()).or_insert(class.node.id.clone());
    }

    // Graph + script-derived behaviors.
    for module in &ir.modules {
        for class in &module.classes {
            let cid = &class.node.id;
            for token in &class.di_tokens {
                let (target, runtime_only) = match class_ids.get(token) {
                    Some(id) => (id.clone(), false),
                    None => (NodeId::synthetic("builtin", token), token.starts_with('$')),
                };
                ir.graph.add_edge(
                    cid,
                    &target,
                    EdgeKind::Inject,
                    EdgeMeta {
                        optional: false,
                        runtime_only,
                        notes: Some(token.clone()),
                    },
                );
            }

            if class.flags.contains(ClassFlags::COMPILE_FN) {
                ir.behaviors.push(side_effect(&mut ids, class, "compile"));
            }
            if class.flags.contains(ClassFlags::LINK) {
                ir.behaviors.push(side_effect(&mut ids, class, "link"));
            }
            if class.flags.contains(ClassFlags::TRANSCLUDE) {
                ir.behaviors.push(side_effect(&mut ids, class, "transclude"));
            }
            if class.flags.contains(ClassFlags::DYNAMIC_COMPILE) {
                ir.behaviors.push(side_effect(&mut ids, class, "dynamic_compile"));
            }
            if class.flags.contains(ClassFlags::NESTED_SCOPE) {
                ir.behaviors.push(side_effect(&mut ids, class, "nested_scope"));
            }

            let depth = if class.flags.contains(ClassFlags::DEEP_WATCH) {
                "deep"
            } else {
                "shallow"
            };
            for expr in &class.watched {
                let root = binding_root(expr, None).unwrap_or_else(|| expr.clone());
                let observed = class
                    .field(&root)
                    .map(|f| f.node.id.clone())
                    .unwrap_or_else(|| cid.clone());
                ir.behaviors.push(Behavior {
                    node: IrNode::new(ids.next("bhv")),
                    kind: BehaviorKind::Observer {
                        observed,
                        trigger: format!("{}:{}", depth, expr),
                    },
                });
            }

            if class.kind == ClassKind::Directive {
                for field in &class.fields {
                    let semantics = match field.type_hint.as_deref() {
                        Some("=") => BindingSemantics::TwoWay,
                        Some("<") => BindingSemantics::OneWay,
                        _ => BindingSemantics::Implicit,
                    };
                    ir.behaviors.push(Behavior {
                        node: IrNode::new(ids.next("bhv")),
                        kind: BehaviorKind::RuntimeBinding {
                            source: cid.clone(),
                            target: field.node.id.clone(),
                            semantics,
                        },
                    });
                }
            }
        }
    }

    for call in &ir.calls {
        if let Some(owner) = call.owner.as_ref().and_then(|o| class_ids.get(o)) {
            ir.graph
                .add_edge(owner, &call.node.id, EdgeKind::Call, EdgeMeta::default());
        }
    }

    // Lifecycle hooks need the raw phase list, which is not carried on `Class`.
    for raw_class in &raw.classes {
        let Some(cid) = class_ids.get(&raw_class.name) else {
            continue;
        };
        for phase in &raw_class.lifecycle {
            ir.behaviors.push(Behavior {
                node: IrNode::new(ids.next("bhv")),
                kind: BehaviorKind::LifecycleHook {
                    phase: *phase,
                    owner: cid.clone(),
                },
            });
        }
    }

    // Templates.
    let class_lookup: BTreeMap<&str, &Class> = ir
        .modules
        .iter()
        .flat_map(|m| &m.classes)
        .map(|c| (c.name.as_str(), c))
        .collect();
    for markup in &raw.markup {
        let scopes = markup.scopes.iter().chain(
            (!markup.unscoped.is_empty()).then_some(&markup.unscoped),
        );
        for scope in scopes {
            let template = build_template(&mut ids, &markup.file, scope, &class_lookup);
            if let Some(cid) = scope
                .controller
                .as_deref()
                .and_then(|c| class_lookup.get(c))
                .map(|c| c.node.id.clone())
            {
                ir.graph.add_edge(
                    &template.node.id,
                    &cid,
                    EdgeKind::TemplateBinding,
                    EdgeMeta::default(),
                );
            }
            for binding in template.bindings.iter().filter(|b| b.kind == BindingKind::TwoWay) {
                let Some(target) = binding.target.clone() else {
                    continue;
                };
                ir.behaviors.push(Behavior {
                    node: IrNode::new(ids.next("bhv")),
                    kind: BehaviorKind::RuntimeBinding {
                        source: template.node.id.clone(),
                        target,
                        semantics: BindingSemantics::TwoWay,
                    },
                });
            }
            ir.templates.push(template);
        }
    }

    if dropped > 0 {
        debug!(dropped, "raw facts without required shape were dropped");
    }
    ir
}

fn build_template(
    ids: &mut IdAllocator,
    file: &str,
    scope: &MarkupScope,
    classes: &BTreeMap<&str, &Class>,
) -> Template {
    let owner = scope.controller.as_deref().and_then(|c| classes.get(c)).copied();
    let mut node = IrNode::new(ids.next("tpl")).at(file, scope.start_line.max(1), scope.end_line.max(1));
    if !scope.tag.is_empty() {
        node = node.with_meta("tag", scope.tag.clone());
    }

    let bindings = scope
        .bindings
        .iter()
        .filter(|b| !b.expression.trim().is_empty())
        .map(|b| {
            let target = owner.and_then(|cls| {
                let root = binding_root(&b.expression, scope.alias.as_deref())?;
                cls.field(&root).map(|f| f.node.id.clone()).or_else(|| {
                    b.two_way.then(|| cls.node.id.clone())
                })
            });
            Binding {
                expression: b.expression.clone(),
                target,
                kind: if b.two_way {
                    BindingKind::TwoWay
                } else {
                    BindingKind::Read
                },
            }
        })
        .collect();

    let mut directives = Vec::new();
    for (kind, uses) in [
        (DirectiveKind::Loop, &scope.loops),
        (DirectiveKind::Conditional, &scope.conditionals),
        (DirectiveKind::Event, &scope.events),
    ] {
        for u in uses {
            directives.push(TemplateDirective {
                node: IrNode::new(ids.next("dir")).at(file, u.line, u.line),
                kind,
                attribute: u.attribute.clone(),
                expression: u.expression.clone(),
            });
        }
    }

    Template {
        node,
        file: file.to_string(),
        controller: scope.controller.clone(),
        alias: scope.alias.clone(),
        bindings,
        directives,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{RawBindingUse, RawCall, RawDirectiveUse, RawMarkup, RawWatch};

    fn raw_controller() -> RawClass {
        RawClass {
            name: "UserController".into(),
            kind: "controller".into(),
            file: "app/user.js".into(),
            start_line: 1,
            end_line: 20,
            di_tokens: vec!["$scope".into(), "$http".into(), "AuthService".into()],
            writes: ["users".to_string(), "query".to_string()].into(),
            reads: ["title".to_string()].into(),
            methods: vec!["load".into()],
            watches: vec![RawWatch {
                expression: "query".into(),
                deep: false,
            }],
            ..Default::default()
        }
    }

    fn raw_facts() -> RawFacts {
        RawFacts {
            scripts: vec!["app/auth.js".into(), "app/user.js".into()],
            classes: vec![
                raw_controller(),
                RawClass {
                    name: "AuthService".into(),
                    kind: "service".into(),
                    file: "app/auth.js".into(),
                    ..Default::default()
                },
                RawClass {
                    name: "".into(),
                    kind: "service".into(),
                    file: "app/auth.js".into(),
                    ..Default::default()
                },
                RawClass {
                    name: "Weird".into(),
                    kind: "component".into(),
                    file: "app/auth.js".into(),
                    ..Default::default()
                },
            ],
            directives: vec![RawDirective {
                name: "myPanel".into(),
                file: "app/user.js".into(),
                link: true,
                transclude: true,
                scope_bindings: vec![("model".into(), ScopeBindingMode::TwoWay)],
                ..Default::default()
            }],
            calls: vec![
                RawCall {
                    file: "app/user.js".into(),
                    line: 5,
                    method: "get".into(),
                    url: "/api/users".into(),
                    owner: Some("UserController".into()),
                },
                RawCall {
                    file: "app/user.js".into(),
                    line: 9,
                    method: "get".into(),
                    url: "".into(),
                    owner: None,
                },
            ],
            routes: Vec::new(),
            markup: vec![RawMarkup {
                file: "index.html".into(),
                scopes: vec![MarkupScope {
                    controller: Some("UserController".into()),
                    alias: Some("vm".into()),
                    tag: "div".into(),
                    start_line: 3,
                    end_line: 9,
                    events: vec![RawDirectiveUse {
                        attribute: "ng-click".into(),
                        expression: "vm.load()".into(),
                        line: 4,
                    }],
                    bindings: vec![RawBindingUse {
                        expression: "vm.query".into(),
                        two_way: true,
                        line: 5,
                    }],
                    ..Default::default()
                }],
                unscoped: MarkupScope::default(),
            }],
            markup_text: BTreeMap::new(),
        }
    }

    #[test]
    fn test_build_filters_malformed_facts() {
        let ir = build(&raw_facts());
        let names: Vec<_> = ir
            .modules
            .iter()
            .flat_map(|m| m.classes.iter().map(|c| c.name.as_str()))
            .collect();
        assert_eq!(names, vec!["AuthService", "UserController", "myPanel"]);
        assert_eq!(ir.calls.len(), 1);
        assert_eq!(ir.templates.len(), 1);
    }

    #[test]
    fn test_class_annotations_are_propagated() {
        let ir = build(&raw_facts());
        let user = &ir.modules[1].classes[0];
        assert_eq!(user.di_tokens, vec!["$scope", "$http", "AuthService"]);
        assert!(user.is_shallow_only());
        assert_eq!(user.watched, vec!["query"]);
        assert!(user.field("users").unwrap().mutable);
        assert!(!user.field("title").unwrap().mutable);
        assert_eq!(user.methods[0].name, "load");
    }

    #[test]
    fn test_graph_edges() {
        let ir = build(&raw_facts());
        let user = &ir.modules[1].classes[0];
        let auth = &ir.modules[0].classes[0];
        let out = ir.graph.edges_from(&user.node.id);
        let injected: Vec<_> = out
            .iter()
            .filter(|(_, e)| e.kind == EdgeKind::Inject)
            .map(|(t, _)| t.as_str().to_string())
            .collect();
        assert_eq!(injected, vec!["builtin:$scope", "builtin:$http", auth.node.id.as_str()]);
        assert!(out.iter().any(|(_, e)| e.kind == EdgeKind::Call));
        assert_eq!(
            ir.graph.sources_of(&user.node.id, EdgeKind::TemplateBinding),
            vec![&ir.templates[0].node.id]
        );
    }

    #[test]
    fn test_behaviors_are_synthesized() {
        let ir = build(&raw_facts());
        let side_effects: Vec<_> = ir
            .behaviors
            .iter()
            .filter_map(|b| match &b.kind {
                BehaviorKind::SideEffect { cause, .. } => Some(cause.as_str()),
                _ => None,
            })
            .collect();
        assert_eq!(side_effects, vec!["link", "transclude"]);
        assert!(ir.behaviors.iter().any(|b| matches!(
            &b.kind,
            BehaviorKind::Observer { trigger, .. } if trigger == "shallow:query"
        )));
        let two_way = ir
            .behaviors
            .iter()
            .filter(|b| matches!(b.kind, BehaviorKind::RuntimeBinding { semantics: BindingSemantics::TwoWay, .. }))
            .count();
        // One from the directive's `=` binding, one from ng-model.
        assert_eq!(two_way, 2);
    }

    #[test]
    fn test_binding_root() {
        assert_eq!(binding_root("vm.user.name", Some("vm")).as_deref(), Some("user"));
        assert_eq!(binding_root("query | filter:x", None).as_deref(), Some("query"));
        assert_eq!(binding_root("items[0]", None).as_deref(), Some("items"));
    }
}
