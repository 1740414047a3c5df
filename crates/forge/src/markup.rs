//! Markup migration: fragment extraction and directive rewriting.
//!
//! Works on the tree-sitter-html parse tree shared with the markup analyzer.
//! Element boundaries come from the tree, so a controller scope nested inside
//! same-named tags closes at its own end tag. Attribute rewrites are collected
//! as byte-range edits and applied bottom-to-top so earlier offsets stay valid.

use std::sync::OnceLock;

use anatomist::markup::{attributes, end_tag, parse_html, split_controller, start_tag, EVENT_ATTRS};
use common::template::{BindingKind, DirectiveKind, Template};
use regex::{Captures, Regex};
use tree_sitter::Node;

use crate::ForgeError;

/// Legacy attribute → target property binding.
const PROPERTY_ATTRS: &[(&str, &str)] = &[
    ("ng-class", "ngClass"),
    ("ng-style", "ngStyle"),
    ("ng-disabled", "disabled"),
    ("ng-readonly", "readOnly"),
    ("ng-checked", "checked"),
    ("ng-selected", "selected"),
    ("ng-required", "required"),
    ("ng-href", "href"),
    ("ng-src", "src"),
    ("ng-srcset", "srcset"),
    ("ng-value", "value"),
    ("ng-placeholder", "placeholder"),
];

/// Properties whose legacy form usually carries `{{ }}` interpolation.
const INTERPOLATED_PROPS: &[&str] = &["href", "src", "srcset"];

/// Bootstrap and cosmetic attributes with no target counterpart.
const STRIPPED_ATTRS: &[&str] = &["ng-app", "ng-controller", "ng-cloak", "ng-strict-di"];

/// Pipes that exist under the same name in the target framework.
const COMPATIBLE_PIPES: &[&str] = &[
    "date",
    "currency",
    "number",
    "uppercase",
    "lowercase",
    "json",
    "slice",
    "async",
    "percent",
    "titlecase",
    "keyvalue",
];

/// Result of migrating one markup document or fragment.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct MigratedMarkup {
    pub html: String,
    /// Two-way model bindings are present; the root module needs `FormsModule`.
    pub uses_forms: bool,
    /// Manual-migration notes, also emitted as TODO comments at the top of `html`.
    pub notes: Vec<String>,
}

/// Inner markup of one controller scope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fragment {
    pub inner: String,
    pub alias: Option<String>,
}

struct Edit {
    start: usize,
    end: usize,
    text: String,
}

#[derive(Default)]
struct Rewrite {
    edits: Vec<Edit>,
    notes: Vec<String>,
    uses_forms: bool,
}

impl Rewrite {
    fn note(&mut self, note: impl Into<String>) {
        let note = note.into();
        if !self.notes.contains(&note) {
            self.notes.push(note);
        }
    }
}

/// Drops the `alias.` prefix of `controller as alias` expressions.
struct Unalias(Option<Regex>);

impl Unalias {
    fn new(alias: Option<&str>) -> Result<Self, ForgeError> {
        match alias.filter(|a| !a.is_empty()) {
            Some(a) => Regex::new(&format!(r"\b{}\.", regex::escape(a)))
                .map(|re| Unalias(Some(re)))
                .map_err(|e| ForgeError::Markup(e.to_string())),
            None => Ok(Unalias(None)),
        }
    }

    fn apply(&self, expr: &str) -> String {
        match &self.0 {
            Some(re) => re.replace_all(expr, "").into_owned(),
            None => expr.to_string(),
        }
    }
}

fn interpolation_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?s)\{\{(.*?)\}\}").expect("valid interpolation regex"))
}

fn visit<'t>(node: Node<'t>, f: &mut impl FnMut(Node<'t>)) {
    f(node);
    let mut cursor = node.walk();
    let children: Vec<Node<'t>> = node.named_children(&mut cursor).collect();
    for child in children {
        visit(child, f);
    }
}

// ---------------------------------------------------------------------------
// Fragment extraction
// ---------------------------------------------------------------------------

/// Finds the outermost element scoped to `controller` (with or without an
/// `as alias` suffix) and returns its exact inner markup.
pub fn extract_fragment(html: &str, controller: &str) -> Result<Option<Fragment>, ForgeError> {
    let tree = parse_html(html).map_err(|e| ForgeError::Markup(e.to_string()))?;
    let mut found: Option<Fragment> = None;
    visit(tree.root_node(), &mut |node| {
        if found.is_some() || node.kind() != "element" {
            return;
        }
        let Some(scope) = attributes(node, html)
            .into_iter()
            .find(|a| a.directive() == "ng-controller")
            .and_then(|a| a.value)
        else {
            return;
        };
        let (name, alias) = split_controller(&scope);
        if name != controller {
            return;
        }
        let Some(open) = start_tag(node) else {
            return;
        };
        let inner_end = end_tag(node).map(|t| t.start_byte()).unwrap_or_else(|| node.end_byte());
        let inner_start = open.end_byte().min(inner_end);
        found = Some(Fragment {
            inner: html[inner_start..inner_end].to_string(),
            alias,
        });
    });
    Ok(found)
}

// ---------------------------------------------------------------------------
// Rewriting
// ---------------------------------------------------------------------------

fn binding(name: &str, value: &str) -> String {
    if value.contains('"') {
        format!("{}='{}'", name, value)
    } else {
        format!("{}=\"{}\"", name, value)
    }
}

/// Splits on single `|` outside quotes (`||` is logical or).
fn split_pipes(expr: &str) -> Vec<&str> {
    let bytes = expr.as_bytes();
    let mut parts = Vec::new();
    let mut quote: Option<u8> = None;
    let mut last = 0;
    for i in 0..bytes.len() {
        let b = bytes[i];
        match quote {
            Some(q) if b == q => quote = None,
            Some(_) => {}
            None if b == b'\'' || b == b'"' => quote = Some(b),
            None if b == b'|' => {
                let prev_pipe = i > 0 && bytes[i - 1] == b'|';
                let next_pipe = bytes.get(i + 1) == Some(&b'|');
                if !prev_pipe && !next_pipe {
                    parts.push(&expr[last..i]);
                    last = i + 1;
                }
            }
            None => {}
        }
    }
    parts.push(&expr[last..]);
    parts
}

/// Rewrites legacy filters into pipes; annotates the ones with no equivalent.
fn rewrite_pipes(expr: &str, rw: &mut Rewrite) -> String {
    let parts = split_pipes(expr);
    if parts.len() < 2 {
        return expr.to_string();
    }
    let mut out = vec![parts[0].trim().to_string()];
    for filter in &parts[1..] {
        let filter = filter.trim();
        let (name, args) = match filter.split_once(':') {
            Some((n, a)) => (n.trim(), Some(a.trim())),
            None => (filter, None),
        };
        match name {
            "limitTo" => match args {
                Some(limit) => out.push(format!("slice:0:{}", limit)),
                None => out.push(filter.to_string()),
            },
            n if COMPATIBLE_PIPES.contains(&n) => out.push(filter.to_string()),
            "orderBy" => {
                rw.note("orderBy has no Angular pipe; sort in the component");
                out.push(filter.to_string());
            }
            "filter" => {
                rw.note("filter has no Angular pipe; move filtering into the component");
                out.push(filter.to_string());
            }
            other => {
                rw.note(format!("filter '{}' has no Angular pipe; create a custom pipe", other));
                out.push(filter.to_string());
            }
        }
    }
    out.join(" | ")
}

/// `u in users track by u.id` → `let u of users`.
fn rewrite_repeat(expr: &str, rw: &mut Rewrite) -> String {
    let expr = expr.trim();
    let (base, track) = match expr.split_once(" track by ") {
        Some((b, t)) => (b.trim(), Some(t.trim())),
        None => (expr, None),
    };
    if let Some(track) = track {
        rw.note(format!(
            "ng-repeat 'track by {}' dropped; add a trackBy function to the component",
            track
        ));
    }
    let Some((item, collection)) = base.split_once(" in ") else {
        rw.note(format!("ng-repeat '{}' not understood; migrate manually", expr));
        return format!("let item of {}", base);
    };
    let item = item.trim();
    let collection = rewrite_pipes(collection.trim(), rw);
    if item.starts_with('(') {
        rw.note(format!(
            "object iteration {} rewritten with the keyvalue pipe; use entry.key / entry.value",
            item
        ));
        return format!("let entry of {} | keyvalue", collection);
    }
    format!("let {} of {}", item, collection)
}

fn annotation(directive: &str) -> Option<&'static str> {
    match directive {
        "ng-switch" | "ng-switch-when" | "ng-switch-default" => {
            Some("ng-switch kept; rewrite with [ngSwitch] and *ngSwitchCase")
        }
        "ng-include" => Some("ng-include kept; extract the included markup into a child component"),
        "ng-transclude" => Some("ng-transclude kept; use <ng-content>"),
        "ng-options" => Some("ng-options kept; use *ngFor on <option> elements"),
        "ng-init" => Some("ng-init kept; move initialization into ngOnInit"),
        _ => None,
    }
}

fn removal_start(src: &[u8], start: usize) -> usize {
    let mut s = start;
    while s > 0 && matches!(src[s - 1], b' ' | b'\t' | b'\n' | b'\r') {
        s -= 1;
    }
    s
}

fn rewrite_element(node: Node<'_>, src: &str, un: &Unalias, rw: &mut Rewrite) {
    let mut structural = 0;
    for attr in attributes(node, src) {
        let name = attr.directive();
        if STRIPPED_ATTRS.contains(&name.as_str()) {
            rw.edits.push(Edit {
                start: removal_start(src.as_bytes(), attr.start_byte),
                end: attr.end_byte,
                text: String::new(),
            });
            continue;
        }
        if let Some(note) = annotation(&name) {
            rw.note(note);
        }
        let Some(raw) = attr.value.as_deref() else {
            continue;
        };
        let value = un.apply(raw);
        let replacement = match name.as_str() {
            "ng-repeat" | "ng-repeat-start" => {
                structural += 1;
                Some(binding("*ngFor", &rewrite_repeat(&value, rw)))
            }
            "ng-if" | "ng-show" => {
                structural += 1;
                Some(binding("*ngIf", &value))
            }
            "ng-hide" => {
                structural += 1;
                Some(binding("*ngIf", &format!("!({})", value)))
            }
            "ng-model" => {
                rw.uses_forms = true;
                Some(binding("[(ngModel)]", &value))
            }
            "ng-bind" => Some(binding("[textContent]", &rewrite_pipes(&value, rw))),
            "ng-bind-html" => {
                rw.note("ng-bind-html became [innerHTML]; sanitize untrusted content with DomSanitizer");
                Some(binding("[innerHTML]", &value))
            }
            n if EVENT_ATTRS.contains(&n) => {
                let event = n.trim_start_matches("ng-");
                Some(binding(&format!("({})", event), &value))
            }
            n => PROPERTY_ATTRS
                .iter()
                .find(|(legacy, _)| *legacy == n)
                .map(|(_, prop)| {
                    if INTERPOLATED_PROPS.contains(prop) && value.contains("{{") {
                        binding(prop, &value)
                    } else {
                        binding(&format!("[{}]", prop), &value)
                    }
                }),
        };
        if let Some(text) = replacement {
            rw.edits.push(Edit {
                start: attr.start_byte,
                end: attr.end_byte,
                text,
            });
        }
    }
    if structural > 1 {
        rw.note("element carries several structural directives; wrap one in <ng-container>");
    }
}

fn strip_legacy_script(node: Node<'_>, src: &str, rw: &mut Rewrite) {
    let is_legacy = attributes(node, src).iter().any(|a| {
        a.directive() == "src"
            && a.value
                .as_deref()
                .is_some_and(|v| v.to_ascii_lowercase().contains("angular"))
    });
    if !is_legacy {
        return;
    }
    let bytes = src.as_bytes();
    let mut start = node.start_byte();
    while start > 0 && matches!(bytes[start - 1], b' ' | b'\t') {
        start -= 1;
    }
    let mut end = node.end_byte();
    if bytes.get(end) == Some(&b'\r') {
        end += 1;
    }
    if bytes.get(end) == Some(&b'\n') {
        end += 1;
    }
    rw.edits.push(Edit {
        start,
        end,
        text: String::new(),
    });
}

/// Applies edits bottom-to-top; overlapping edits after the first are skipped.
fn apply_edits(src: &str, mut edits: Vec<Edit>) -> String {
    edits.sort_by(|a, b| b.start.cmp(&a.start));
    let mut out = src.to_string();
    let mut floor = usize::MAX;
    for edit in edits {
        if edit.end > floor || edit.start > edit.end || edit.end > out.len() {
            continue;
        }
        out.replace_range(edit.start..edit.end, &edit.text);
        floor = edit.start;
    }
    out
}

fn rewrite_interpolations(text: &str, un: &Unalias, rw: &mut Rewrite) -> String {
    interpolation_regex()
        .replace_all(text, |caps: &Captures<'_>| {
            let original = caps.get(0).map(|m| m.as_str()).unwrap_or_default();
            let inner = caps.get(1).map(|m| m.as_str()).unwrap_or_default();
            let unaliased = un.apply(inner);
            let piped = rewrite_pipes(unaliased.trim(), rw);
            if unaliased == inner && piped == inner.trim() {
                original.to_string()
            } else {
                format!("{{{{ {} }}}}", piped)
            }
        })
        .into_owned()
}

fn with_notes(body: &str, notes: &[String]) -> String {
    let mut out = String::new();
    for note in notes {
        out.push_str(&format!("<!-- TODO: {} -->\n", note));
    }
    out.push_str(body.trim());
    out.push('\n');
    out
}

/// Rewrites legacy directives, bindings, bootstrap attributes and filters.
///
/// # Errors
/// `Markup` if the document cannot be parsed or the alias is unusable.
pub fn migrate(html: &str, alias: Option<&str>) -> Result<MigratedMarkup, ForgeError> {
    let tree = parse_html(html).map_err(|e| ForgeError::Markup(e.to_string()))?;
    let un = Unalias::new(alias)?;
    let mut rw = Rewrite::default();
    visit(tree.root_node(), &mut |node| match node.kind() {
        "element" => rewrite_element(node, html, &un, &mut rw),
        "script_element" => strip_legacy_script(node, html, &mut rw),
        _ => {}
    });
    let edits = std::mem::take(&mut rw.edits);
    let rewritten = apply_edits(html, edits);
    let body = rewrite_interpolations(&rewritten, &un, &mut rw);
    Ok(MigratedMarkup {
        html: with_notes(&body, &rw.notes),
        uses_forms: rw.uses_forms,
        notes: rw.notes,
    })
}

/// Minimal markup from directive facts when no source markup can be located.
pub fn synthesize(templates: &[&Template]) -> Option<MigratedMarkup> {
    let mut rw = Rewrite::default();
    let mut lines = vec!["<!-- Synthesized from detected template facts; no source markup found -->".to_string()];
    for template in templates {
        let Ok(un) = Unalias::new(template.alias.as_deref()) else {
            continue;
        };
        for directive in &template.directives {
            let expr = un.apply(&directive.expression);
            match directive.kind {
                DirectiveKind::Loop => {
                    let value = rewrite_repeat(&expr, &mut rw);
                    let item = value
                        .trim_start_matches("let ")
                        .split_whitespace()
                        .next()
                        .unwrap_or("item")
                        .to_string();
                    lines.push(format!("<div {}>{{{{ {} | json }}}}</div>", binding("*ngFor", &value), item));
                }
                DirectiveKind::Conditional => {
                    let cond = if directive.attribute.ends_with("ng-hide") {
                        format!("!({})", expr)
                    } else {
                        expr
                    };
                    lines.push(format!("<div {}><!-- content --></div>", binding("*ngIf", &cond)));
                }
                DirectiveKind::Event => {
                    let event = anatomist::markup::normalize_attr(&directive.attribute);
                    let event = event.trim_start_matches("ng-");
                    let label = expr.split('(').next().unwrap_or_default().trim().to_string();
                    lines.push(format!(
                        "<button {}>{}</button>",
                        binding(&format!("({})", event), &expr),
                        label
                    ));
                }
            }
        }
        for b in template.bindings.iter().filter(|b| b.kind == BindingKind::TwoWay) {
            rw.uses_forms = true;
            lines.push(format!("<input {}>", binding("[(ngModel)]", &un.apply(&b.expression))));
        }
    }
    if lines.len() == 1 {
        return None;
    }
    Some(MigratedMarkup {
        html: with_notes(&lines.join("\n"), &rw.notes),
        uses_forms: rw.uses_forms,
        notes: rw.notes,
    })
}

/// Last resort: a placeholder that says what is missing.
pub fn stub(class_name: &str) -> MigratedMarkup {
    let note = format!("no template source found for {}; migrate manually", class_name);
    MigratedMarkup {
        html: with_notes(&format!("<div>\n  <h2>{}</h2>\n</div>", class_name), std::slice::from_ref(&note)),
        uses_forms: false,
        notes: vec![note],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::template::TemplateDirective;
    use common::{IrNode, NodeId};

    #[test]
    fn test_fragment_respects_nested_same_name_tags() {
        let html = r#"<body>
<div ng-controller="OuterController">
  <div class="a"><div>skip</div></div>
  <div ng-controller="UserController as vm"><div class="x"><div>deep</div></div><p>{{vm.name}}</p></div>
  <footer>tail</footer>
</div>
</body>"#;
        let user = extract_fragment(html, "UserController").unwrap().unwrap();
        assert_eq!(user.inner, r#"<div class="x"><div>deep</div></div><p>{{vm.name}}</p>"#);
        assert_eq!(user.alias.as_deref(), Some("vm"));

        let outer = extract_fragment(html, "OuterController").unwrap().unwrap();
        assert!(outer.inner.contains("<footer>tail</footer>"));
        assert!(outer.inner.trim_end().ends_with("</footer>"));
        assert!(extract_fragment(html, "MissingController").unwrap().is_none());
    }

    #[test]
    fn test_attribute_rewrites() {
        let html = r#"<div ng-app="app" ng-controller="UserController as vm">
  <input ng-model="vm.query" ng-disabled="vm.busy">
  <li ng-repeat="u in vm.users | limitTo:5 track by u.id" ng-click="vm.select(u)">{{ u.name | uppercase }}</li>
  <p ng-hide="vm.empty" ng-class="{active: vm.on}">x</p>
  <a ng-href="/users/{{vm.id}}">link</a>
  <span ng-bind="vm.title"></span>
</div>"#;
        let migrated = migrate(html, Some("vm")).unwrap();
        let out = &migrated.html;
        assert!(out.contains(r#"<div>"#), "{}", out);
        assert!(out.contains(r#"[(ngModel)]="query""#));
        assert!(out.contains(r#"[disabled]="busy""#));
        assert!(out.contains(r#"*ngFor="let u of users | slice:0:5""#));
        assert!(out.contains(r#"(click)="select(u)""#));
        assert!(out.contains(r#"*ngIf="!(empty)""#));
        assert!(out.contains(r#"[ngClass]="{active: on}""#));
        assert!(out.contains(r#"href="/users/{{id}}""#));
        assert!(out.contains(r#"[textContent]="title""#));
        assert!(out.contains("{{ u.name | uppercase }}"));
        assert!(!out.lines().filter(|l| !l.starts_with("<!--")).any(|l| l.contains("ng-")));
        assert!(migrated.uses_forms);
        assert!(out.starts_with("<!-- TODO: ng-repeat 'track by u.id' dropped"));
    }

    #[test]
    fn test_annotations_and_scripts() {
        let html = r#"<html>
<head>
  <script src="https://ajax.googleapis.com/ajax/libs/angularjs/1.8.2/angular.min.js"></script>
  <script src="app/app.js"></script>
</head>
<body>
  <div ng-switch="mode"><span ng-switch-when="a">A</span></div>
  <p>{{ items | orderBy:'name' | myFilter }}</p>
  <div ng-repeat="(k, v) in vm.map">{{k}}</div>
</body>
</html>"#;
        let migrated = migrate(html, None).unwrap();
        assert!(!migrated.html.contains("angular.min.js"));
        assert!(migrated.html.contains("app/app.js"));
        assert!(migrated.html.contains(r#"*ngFor="let entry of vm.map | keyvalue""#));
        let notes = migrated.notes.join("\n");
        assert!(notes.contains("ng-switch"));
        assert!(notes.contains("orderBy"));
        assert!(notes.contains("'myFilter'"));
        assert!(notes.contains("keyvalue"));
        assert!(!migrated.uses_forms);
    }

    #[test]
    fn test_migrate_is_stable_on_migrated_output() {
        let html = r#"<ul><li ng-repeat="x in xs" ng-if="x.ok">{{x}}</li></ul>"#;
        let once = migrate(html, None).unwrap();
        assert!(once.notes.iter().any(|n| n.contains("ng-container")));
        let again = migrate(html, None).unwrap();
        assert_eq!(once, again);
    }

    #[test]
    fn test_synthesize_and_stub() {
        let directive = |kind, attribute: &str, expression: &str| TemplateDirective {
            node: IrNode::new(NodeId::new("tdr-0001")),
            kind,
            attribute: attribute.to_string(),
            expression: expression.to_string(),
        };
        let template = Template {
            node: IrNode::new(NodeId::new("tpl-0001")),
            file: "index.html".into(),
            controller: Some("UserController".into()),
            alias: Some("vm".into()),
            bindings: Vec::new(),
            directives: vec![
                directive(DirectiveKind::Loop, "ng-repeat", "u in vm.users"),
                directive(DirectiveKind::Conditional, "ng-hide", "vm.empty"),
                directive(DirectiveKind::Event, "ng-click", "vm.save()"),
            ],
        };
        let synthesized = synthesize(&[&template]).unwrap();
        assert!(synthesized.html.contains(r#"<div *ngFor="let u of users">{{ u | json }}</div>"#));
        assert!(synthesized.html.contains(r#"*ngIf="!(empty)""#));
        assert!(synthesized.html.contains(r#"<button (click)="save()">save</button>"#));

        let empty = Template {
            directives: Vec::new(),
            ..template
        };
        assert!(synthesize(&[&empty]).is_none());

        let s = stub("UserComponent");
        assert!(s.html.starts_with("<!-- TODO: no template source found for UserComponent"));
        assert!(s.html.contains("<h2>UserComponent</h2>"));
    }
}
