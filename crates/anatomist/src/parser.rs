//! Script analyzer: tree-sitter extraction of legacy registrations, scope
//! usage, observers and HTTP/promise calls.
//!
//! JavaScript and TypeScript share one registration query (the TypeScript
//! grammar extends the JavaScript node shapes). File extension selects the
//! grammar.

use std::collections::{BTreeSet, HashSet};
use std::path::Path;
use std::sync::OnceLock;

use common::behavior::LifecyclePhase;
use tree_sitter::{Language, Node, Parser, Query, QueryCursor, StreamingIterator, Tree};

use crate::routes;
use crate::syntax::{
    call_args, end_line, find_function_named, is_function, line, object_members, resolve_factory, returned_value,
    string_literal, text, url_literal, walk, Factory,
};
use crate::{AnatomistError, RawCall, RawClass, RawDirective, RawWatch, Route, ScopeBindingMode};

static JS_QUERY: OnceLock<Query> = OnceLock::new();
static TS_QUERY: OnceLock<Query> = OnceLock::new();

/// `.controller('Name', factory)` and friends, anywhere in the tree,
/// chained or not.
const REGISTRATION_S_EXPR: &str = r#"
    (call_expression
      function: (member_expression
        property: (property_identifier) @reg.kind)
      arguments: (arguments
        .
        (string) @reg.name
        .
        (_) @reg.factory)
      (#any-of? @reg.kind "controller" "service" "factory" "provider" "directive")) @reg.call
"#;

const HTTP_VERBS: &[&str] = &["get", "post", "put", "delete", "patch", "head", "jsonp"];

const WATCH_METHODS: &[&str] = &["$watch", "$watchCollection", "$watchGroup"];

fn get_js_query() -> &'static Query {
    JS_QUERY.get_or_init(|| {
        Query::new(&tree_sitter_javascript::LANGUAGE.into(), REGISTRATION_S_EXPR).expect(
            "JS registration query compilation failed, the hardcoded S-expression is malformed",
        )
    })
}

fn get_ts_query() -> &'static Query {
    TS_QUERY.get_or_init(|| {
        Query::new(
            &tree_sitter_typescript::LANGUAGE_TYPESCRIPT.into(),
            REGISTRATION_S_EXPR,
        )
        .expect("TS registration query compilation failed, the hardcoded S-expression is malformed")
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScriptLang {
    JavaScript,
    TypeScript,
}

impl ScriptLang {
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some("ts") => ScriptLang::TypeScript,
            _ => ScriptLang::JavaScript,
        }
    }
}

/// Facts extracted from one script file.
#[derive(Debug, Default)]
pub struct ScriptFacts {
    pub classes: Vec<RawClass>,
    pub directives: Vec<RawDirective>,
    pub calls: Vec<RawCall>,
    pub routes: Vec<Route>,
}

/// Host owning one parser per grammar.
pub struct ScriptAnalyzer {
    js: Parser,
    ts: Parser,
}

impl ScriptAnalyzer {
    /// # Errors
    /// `ParseFailure` if a grammar fails to load.
    pub fn new() -> Result<Self, AnatomistError> {
        Ok(Self {
            js: make_parser(tree_sitter_javascript::LANGUAGE.into(), "JavaScript")?,
            ts: make_parser(
                tree_sitter_typescript::LANGUAGE_TYPESCRIPT.into(),
                "TypeScript",
            )?,
        })
    }

    /// # Errors
    /// `ParseFailure` if tree-sitter returns no tree.
    pub fn analyze_source(
        &mut self,
        source: &[u8],
        rel: &str,
        lang: ScriptLang,
    ) -> Result<ScriptFacts, AnatomistError> {
        let parser = match lang {
            ScriptLang::JavaScript => &mut self.js,
            ScriptLang::TypeScript => &mut self.ts,
        };
        let tree: Tree = parser.parse(source, None).ok_or_else(|| {
            AnatomistError::ParseFailure(format!("tree-sitter returned no tree for {}", rel))
        })?;
        let root = tree.root_node();
        if root.has_error() {
            tracing::debug!(file = rel, "syntax errors present, extracting partial facts");
        }
        let query = match lang {
            ScriptLang::JavaScript => get_js_query(),
            ScriptLang::TypeScript => get_ts_query(),
        };

        let mut facts = ScriptFacts::default();
        let mut spans: Vec<(usize, usize, String)> = Vec::new();

        let mut cursor = QueryCursor::new();
        let mut matches = cursor.matches(query, root, source);
        while let Some(m) = matches.next() {
            let capture = |name: &str| {
                m.captures
                    .iter()
                    .find(|c| query.capture_names()[c.index as usize] == name)
                    .map(|c| c.node)
            };
            let (Some(kind), Some(name), Some(factory)) =
                (capture("reg.kind"), capture("reg.name"), capture("reg.factory"))
            else {
                continue;
            };
            let Some(name) = string_literal(name, source) else {
                continue;
            };
            let kind = text(kind, source).to_string();
            let Some(factory) = resolve_factory(factory, root, source) else {
                tracing::debug!(file = rel, name = %name, "unresolvable factory, skipped");
                continue;
            };
            spans.push((factory.func.start_byte(), factory.func.end_byte(), name.clone()));

            if kind == "directive" {
                facts
                    .directives
                    .push(extract_directive(&name, &factory, source, rel));
            } else {
                facts
                    .classes
                    .push(extract_class(&name, &kind, &factory, source, rel));
            }
        }

        // Chained registrations are matched outermost-first; restore source order.
        facts.classes.sort_by_key(|c| c.start_byte);
        facts.directives.sort_by_key(|d| d.start_byte);
        facts.calls = extract_calls(root, source, rel, &spans);
        facts.routes = routes::extract_routes(root, source, rel);
        Ok(facts)
    }
}

fn make_parser(language: Language, label: &str) -> Result<Parser, AnatomistError> {
    let mut parser = Parser::new();
    parser.set_language(&language).map_err(|e| {
        AnatomistError::ParseFailure(format!("Failed to load {} grammar: {}", label, e))
    })?;
    Ok(parser)
}

// ---------------------------------------------------------------------------
// Registration bodies
// ---------------------------------------------------------------------------

/// Local names that stand for the legacy scope inside one factory body.
struct ScopeNames {
    names: HashSet<String>,
    /// `this` (and `var vm = this` aliases) count as scope for controllers.
    this_is_scope: bool,
    compile: HashSet<String>,
}

impl ScopeNames {
    fn for_factory(factory: &Factory<'_>, this_is_scope: bool, src: &[u8]) -> Self {
        let mut names: HashSet<String> = ["$scope".to_string()].into();
        let mut compile: HashSet<String> = ["$compile".to_string()].into();
        // Minified factories rename parameters; the token at the same position names them.
        for (token, param) in factory.tokens.iter().zip(&factory.params) {
            match token.as_str() {
                "$scope" => {
                    names.insert(param.clone());
                }
                "$compile" => {
                    compile.insert(param.clone());
                }
                _ => {}
            }
        }
        if this_is_scope {
            walk(factory.func, &mut |node| {
                if node.kind() != "variable_declarator" {
                    return;
                }
                let is_this = node
                    .child_by_field_name("value")
                    .is_some_and(|v| v.kind() == "this");
                if let (true, Some(n)) = (is_this, node.child_by_field_name("name")) {
                    names.insert(text(n, src).to_string());
                }
            });
        }
        Self {
            names,
            this_is_scope,
            compile,
        }
    }

    fn is_scope(&self, node: Node<'_>, src: &[u8]) -> bool {
        match node.kind() {
            "this" => self.this_is_scope,
            "identifier" => self.names.contains(text(node, src)),
            _ => false,
        }
    }

    /// Scope property at the root of a member chain: `$scope.user.name` → `user`.
    fn root_property(&self, member: Node<'_>, src: &[u8]) -> Option<String> {
        let mut current = member;
        loop {
            if current.kind() != "member_expression" {
                return None;
            }
            let object = current.child_by_field_name("object")?;
            if self.is_scope(object, src) {
                let prop = text(current.child_by_field_name("property")?, src);
                return Some(prop.to_string());
            }
            current = object;
        }
    }
}

fn lifecycle_phase(hook: &str) -> Option<LifecyclePhase> {
    match hook {
        "$onInit" => Some(LifecyclePhase::Init),
        "$onChanges" | "$doCheck" => Some(LifecyclePhase::Update),
        "$onDestroy" => Some(LifecyclePhase::Destroy),
        _ => None,
    }
}

/// `true` when `node` is the target of an assignment or update, directly or
/// as the object of a member chain that is.
fn is_write_target(node: Node<'_>) -> bool {
    let mut current = node;
    while let Some(parent) = current.parent() {
        match parent.kind() {
            "member_expression"
                if parent
                    .child_by_field_name("object")
                    .is_some_and(|o| o.id() == current.id()) =>
            {
                current = parent;
            }
            "assignment_expression" | "augmented_assignment_expression" => {
                return parent
                    .child_by_field_name("left")
                    .is_some_and(|l| l.id() == current.id());
            }
            "update_expression" => return true,
            _ => return false,
        }
    }
    false
}

/// Watched expression: string literal, else the first scope property the
/// watcher function reads, else the compacted source text.
fn watch_expression(arg: Node<'_>, scope: &ScopeNames, src: &[u8]) -> String {
    if let Some(s) = string_literal(arg, src) {
        return s;
    }
    let mut first = None;
    walk(arg, &mut |n| {
        if first.is_none() && n.kind() == "member_expression" {
            first = scope.root_property(n, src);
        }
    });
    first.unwrap_or_else(|| text(arg, src).split_whitespace().collect::<Vec<_>>().join(" "))
}

#[derive(Default)]
struct BodyFacts {
    reads: BTreeSet<String>,
    writes: BTreeSet<String>,
    methods: Vec<String>,
    watches: Vec<RawWatch>,
    nested_scope: bool,
    dynamic_compile: bool,
    lifecycle: Vec<LifecyclePhase>,
}

impl BodyFacts {
    fn add_method(&mut self, name: &str) {
        if let Some(phase) = lifecycle_phase(name) {
            if !self.lifecycle.contains(&phase) {
                self.lifecycle.push(phase);
            }
        } else if !name.starts_with('$') && !self.methods.iter().any(|m| m == name) {
            self.methods.push(name.to_string());
        }
    }
}

fn scan_body(func: Node<'_>, scope: &ScopeNames, src: &[u8]) -> BodyFacts {
    let mut facts = BodyFacts::default();

    walk(func, &mut |node| match node.kind() {
        "assignment_expression" | "augmented_assignment_expression" => {
            let (Some(left), Some(right)) = (
                node.child_by_field_name("left"),
                node.child_by_field_name("right"),
            ) else {
                return;
            };
            if left.kind() != "member_expression" {
                return;
            }
            let object = left.child_by_field_name("object");
            let direct_this = object.is_some_and(|o| o.kind() == "this");
            let prop = left
                .child_by_field_name("property")
                .map(|p| text(p, src).to_string())
                .unwrap_or_default();

            if is_function(right) && (direct_this || object.is_some_and(|o| scope.is_scope(o, src))) {
                facts.add_method(&prop);
            } else if let Some(root) = scope.root_property(left, src) {
                if !root.starts_with('$') {
                    facts.writes.insert(root);
                }
            }
        }
        "update_expression" => {
            if let Some(arg) = node.child_by_field_name("argument") {
                if let Some(root) = scope.root_property(arg, src) {
                    facts.writes.insert(root);
                }
            }
        }
        "member_expression" => {
            let object_is_scope = node
                .child_by_field_name("object")
                .is_some_and(|o| scope.is_scope(o, src));
            if !object_is_scope || is_write_target(node) {
                return;
            }
            if let Some(prop) = node.child_by_field_name("property") {
                let prop = text(prop, src);
                if !prop.starts_with('$') {
                    facts.reads.insert(prop.to_string());
                }
            }
        }
        "call_expression" => {
            let Some(function) = node.child_by_field_name("function") else {
                return;
            };
            match function.kind() {
                "identifier" if scope.compile.contains(text(function, src)) => {
                    facts.dynamic_compile = true;
                }
                "member_expression" => {
                    let prop = function
                        .child_by_field_name("property")
                        .map(|p| text(p, src))
                        .unwrap_or_default();
                    let args = call_args(node);
                    match prop {
                        p if WATCH_METHODS.contains(&p) => {
                            if let Some(first) = args.first() {
                                let deep = p == "$watch"
                                    && args.len() >= 3
                                    && args.last().is_some_and(|a| a.kind() == "true");
                                facts.watches.push(RawWatch {
                                    expression: watch_expression(*first, scope, src),
                                    deep,
                                });
                            }
                        }
                        "$new" => facts.nested_scope = true,
                        "$on" => {
                            let destroy = args
                                .first()
                                .and_then(|a| string_literal(*a, src))
                                .is_some_and(|e| e == "$destroy");
                            if destroy && !facts.lifecycle.contains(&LifecyclePhase::Destroy) {
                                facts.lifecycle.push(LifecyclePhase::Destroy);
                            }
                        }
                        _ => {}
                    }
                }
                _ => {}
            }
        }
        _ => {}
    });

    // Factories expose their API through the returned object, either inline
    // or by naming a function declared in the body (`return { all: all }`).
    if let Some(value) = returned_value(func).filter(|v| v.kind() == "object") {
        for (key, member) in object_members(value, src) {
            let callable = match member.kind() {
                "identifier" | "shorthand_property_identifier" => {
                    find_function_named(func, text(member, src), src).is_some()
                }
                "method_definition" => true,
                _ => is_function(member),
            };
            if callable {
                facts.add_method(&key);
            }
        }
    }
    // Function-valued writes are methods, not state.
    let methods: HashSet<&String> = facts.methods.iter().collect();
    facts.writes.retain(|w| !methods.contains(w));
    facts
}

fn extract_class(name: &str, kind: &str, factory: &Factory<'_>, src: &[u8], rel: &str) -> RawClass {
    let scope = ScopeNames::for_factory(factory, kind == "controller", src);
    let body = scan_body(factory.func, &scope, src);
    RawClass {
        name: name.to_string(),
        kind: kind.to_string(),
        file: rel.to_string(),
        start_line: line(factory.func),
        end_line: end_line(factory.func),
        start_byte: factory.func.start_byte(),
        end_byte: factory.func.end_byte(),
        di_tokens: factory.tokens.clone(),
        reads: body.reads,
        writes: body.writes,
        methods: body.methods,
        watches: body.watches,
        nested_scope: body.nested_scope,
        dynamic_compile: body.dynamic_compile,
        lifecycle: body.lifecycle,
    }
}

fn scope_binding_mode(binding: &str) -> Option<ScopeBindingMode> {
    match binding.trim().chars().next()? {
        '=' => Some(ScopeBindingMode::TwoWay),
        '<' | '@' => Some(ScopeBindingMode::OneWay),
        '&' => Some(ScopeBindingMode::Expression),
        _ => None,
    }
}

fn extract_directive(name: &str, factory: &Factory<'_>, src: &[u8], rel: &str) -> RawDirective {
    let scope = ScopeNames::for_factory(factory, false, src);
    let body = scan_body(factory.func, &scope, src);
    let mut directive = RawDirective {
        name: name.to_string(),
        file: rel.to_string(),
        start_line: line(factory.func),
        end_line: end_line(factory.func),
        start_byte: factory.func.start_byte(),
        end_byte: factory.func.end_byte(),
        di_tokens: factory.tokens.clone(),
        dynamic_compile: body.dynamic_compile,
        ..Default::default()
    };

    match returned_value(factory.func) {
        // Returning a bare function is the link-function shorthand.
        Some(value) if is_function(value) => directive.link = true,
        Some(value) if value.kind() == "object" => {
            for (key, member) in object_members(value, src) {
                match key.as_str() {
                    "restrict" => directive.restrict = string_literal(member, src),
                    "link" => directive.link = true,
                    "compile" => directive.compile = true,
                    "transclude" => directive.transclude = member.kind() != "false",
                    "template" | "templateUrl" => directive.inline_template |= key == "template",
                    "scope" | "bindToController" if member.kind() == "object" => {
                        for (prop, binding) in object_members(member, src) {
                            if let Some(mode) =
                                string_literal(binding, src).and_then(|s| scope_binding_mode(&s))
                            {
                                directive.scope_bindings.push((prop, mode));
                            }
                        }
                    }
                    _ => {}
                }
            }
        }
        _ => {}
    }
    directive
}

// ---------------------------------------------------------------------------
// HTTP / promise calls
// ---------------------------------------------------------------------------

/// Smallest registration span containing `byte`.
fn owner_at(spans: &[(usize, usize, String)], byte: usize) -> Option<String> {
    spans
        .iter()
        .filter(|(start, end, _)| *start <= byte && byte < *end)
        .min_by_key(|(start, end, _)| end - start)
        .map(|(_, _, name)| name.clone())
}

fn http_config_call(config: Node<'_>, src: &[u8]) -> Option<(String, String)> {
    let mut method = None;
    let mut url = String::new();
    for (key, value) in object_members(config, src) {
        match key.as_str() {
            "method" => method = string_literal(value, src).map(|m| m.to_ascii_lowercase()),
            "url" => url = url_literal(value, src),
            _ => {}
        }
    }
    Some((method.unwrap_or_else(|| "get".to_string()), url))
}

fn extract_calls(
    root: Node<'_>,
    src: &[u8],
    rel: &str,
    spans: &[(usize, usize, String)],
) -> Vec<RawCall> {
    let mut calls: Vec<RawCall> = Vec::new();

    walk(root, &mut |node| {
        if node.kind() != "call_expression" {
            return;
        }
        let Some(function) = node.child_by_field_name("function") else {
            return;
        };
        let args = call_args(node);
        let found = match function.kind() {
            "member_expression" => {
                let object = function.child_by_field_name("object").map(|o| text(o, src));
                let prop = function
                    .child_by_field_name("property")
                    .map(|p| text(p, src))
                    .unwrap_or_default();
                match (object, prop) {
                    (Some("$http"), verb) if HTTP_VERBS.contains(&verb) => Some((
                        verb.to_string(),
                        args.first()
                            .map(|a| url_literal(*a, src))
                            .unwrap_or_default(),
                    )),
                    (Some("$q"), "defer") => Some(("defer".to_string(), String::new())),
                    _ => None,
                }
            }
            "identifier" => match text(function, src) {
                "$http" => args
                    .first()
                    .filter(|a| a.kind() == "object")
                    .and_then(|a| http_config_call(*a, src)),
                "$q" if args.first().is_some_and(|a| is_function(*a)) => {
                    Some(("defer".to_string(), String::new()))
                }
                _ => None,
            },
            _ => None,
        };
        let Some((method, url)) = found else {
            return;
        };
        let owner = owner_at(spans, node.start_byte());

        // One record per (file, method, url); an owned duplicate wins.
        if let Some(existing) = calls.iter_mut().find(|c| c.method == method && c.url == url) {
            if existing.owner.is_none() && owner.is_some() {
                existing.owner = owner;
                existing.line = line(node);
            }
            return;
        }
        calls.push(RawCall {
            file: rel.to_string(),
            line: line(node),
            method,
            url,
            owner,
        });
    });

    calls
}
