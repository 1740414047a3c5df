//! Markup analyzer: controller scopes and directive occurrences from a
//! tree-sitter-html parse tree.
//!
//! Element boundaries come from the parse tree, never from tag counting, so
//! nested same-name elements, void elements and quoted `>` inside attribute
//! values do not confuse scope attribution. The element helpers are public:
//! the markup migrator in `forge` walks the same tree shapes.

use tree_sitter::{Node, Parser, Tree};

use crate::{AnatomistError, MarkupScope, RawBindingUse, RawDirectiveUse, RawMarkup};

const LOOP_ATTRS: &[&str] = &["ng-repeat", "ng-repeat-start"];

const CONDITIONAL_ATTRS: &[&str] = &["ng-if", "ng-show", "ng-hide", "ng-switch", "ng-switch-when"];

/// Event directives; `ng-` + DOM event name.
pub const EVENT_ATTRS: &[&str] = &[
    "ng-click",
    "ng-dblclick",
    "ng-submit",
    "ng-change",
    "ng-blur",
    "ng-focus",
    "ng-keyup",
    "ng-keydown",
    "ng-keypress",
    "ng-mouseenter",
    "ng-mouseleave",
    "ng-mousedown",
    "ng-mouseup",
];

/// One attribute of a start tag.
#[derive(Debug, Clone, PartialEq)]
pub struct HtmlAttribute {
    /// Name as written.
    pub name: String,
    pub value: Option<String>,
    pub start_byte: usize,
    pub end_byte: usize,
}

impl HtmlAttribute {
    /// Normalized directive name (`data-ng-click`, `ng:click` → `ng-click`).
    pub fn directive(&self) -> String {
        normalize_attr(&self.name)
    }
}

pub fn normalize_attr(name: &str) -> String {
    let lower = name.to_ascii_lowercase().replace([':', '_'], "-");
    lower
        .strip_prefix("data-")
        .or_else(|| lower.strip_prefix("x-"))
        .unwrap_or(&lower)
        .to_string()
}

/// Parses HTML with the tree-sitter-html grammar.
///
/// # Errors
/// `ParseFailure` if the grammar fails to load or no tree is produced.
pub fn parse_html(source: &str) -> Result<Tree, AnatomistError> {
    let mut parser = Parser::new();
    parser
        .set_language(&tree_sitter_html::LANGUAGE.into())
        .map_err(|e| AnatomistError::ParseFailure(format!("Failed to load HTML grammar: {}", e)))?;
    parser
        .parse(source, None)
        .ok_or_else(|| AnatomistError::ParseFailure("tree-sitter returned no HTML tree".to_string()))
}

/// The start (or self-closing) tag of an element.
pub fn start_tag(element: Node<'_>) -> Option<Node<'_>> {
    let mut cursor = element.walk();
    let tag = element
        .children(&mut cursor)
        .find(|c| matches!(c.kind(), "start_tag" | "self_closing_tag"));
    tag
}

pub fn end_tag(element: Node<'_>) -> Option<Node<'_>> {
    let mut cursor = element.walk();
    let tag = element.children(&mut cursor).find(|c| c.kind() == "end_tag");
    tag
}

pub fn tag_name(element: Node<'_>, src: &str) -> String {
    start_tag(element)
        .and_then(|t| {
            let mut cursor = t.walk();
            let name = t.children(&mut cursor).find(|c| c.kind() == "tag_name");
            name
        })
        .and_then(|n| n.utf8_text(src.as_bytes()).ok())
        .unwrap_or_default()
        .to_ascii_lowercase()
}

pub fn attributes(element: Node<'_>, src: &str) -> Vec<HtmlAttribute> {
    let Some(tag) = start_tag(element) else {
        return Vec::new();
    };
    let mut cursor = tag.walk();
    tag.children(&mut cursor)
        .filter(|c| c.kind() == "attribute")
        .filter_map(|attr| {
            let mut inner = attr.walk();
            let children: Vec<Node<'_>> = attr.children(&mut inner).collect();
            let name = children
                .iter()
                .find(|c| c.kind() == "attribute_name")?
                .utf8_text(src.as_bytes())
                .ok()?
                .to_string();
            let value = children.iter().find_map(|c| match c.kind() {
                "attribute_value" => c.utf8_text(src.as_bytes()).ok().map(str::to_string),
                "quoted_attribute_value" => {
                    let raw = c.utf8_text(src.as_bytes()).ok()?;
                    Some(raw.trim_matches(|ch| ch == '"' || ch == '\'').to_string())
                }
                _ => None,
            });
            Some(HtmlAttribute {
                name,
                value,
                start_byte: attr.start_byte(),
                end_byte: attr.end_byte(),
            })
        })
        .collect()
}

/// `{{ expr }}` bodies in order, trimmed.
pub fn interpolations(text: &str) -> Vec<String> {
    let mut out = Vec::new();
    let mut rest = text;
    while let Some(open) = rest.find("{{") {
        let after = &rest[open + 2..];
        let Some(close) = after.find("}}") else {
            break;
        };
        let expr = after[..close].trim();
        if !expr.is_empty() {
            out.push(expr.to_string());
        }
        rest = &after[close + 2..];
    }
    out
}

/// `Name as alias` → (`Name`, `Some(alias)`).
pub fn split_controller(raw: &str) -> (String, Option<String>) {
    match raw.split_once(" as ") {
        Some((name, alias)) => (name.trim().to_string(), Some(alias.trim().to_string())),
        None => (raw.trim().to_string(), None),
    }
}

/// Pre-order walk over elements only.
pub fn walk_elements<'t>(node: Node<'t>, visit: &mut impl FnMut(Node<'t>)) {
    if node.kind() == "element" {
        visit(node);
    }
    let mut cursor = node.walk();
    for child in node.named_children(&mut cursor) {
        walk_elements(child, visit);
    }
}

fn line(node: Node<'_>) -> u32 {
    node.start_position().row as u32 + 1
}

/// Extracts controller scopes and directive occurrences from one markup file.
///
/// # Errors
/// `ParseFailure` if no tree is produced.
pub fn analyze_markup(source: &str, file: &str) -> Result<RawMarkup, AnatomistError> {
    let tree = parse_html(source)?;
    let mut markup = RawMarkup {
        file: file.to_string(),
        ..Default::default()
    };
    let mut stack: Vec<usize> = Vec::new();
    visit(tree.root_node(), source, &mut markup, &mut stack);
    Ok(markup)
}

fn current<'m>(markup: &'m mut RawMarkup, stack: &[usize]) -> &'m mut MarkupScope {
    match stack.last() {
        Some(&idx) => &mut markup.scopes[idx],
        None => &mut markup.unscoped,
    }
}

fn visit(node: Node<'_>, src: &str, markup: &mut RawMarkup, stack: &mut Vec<usize>) {
    let mut pushed = false;
    match node.kind() {
        "element" => {
            let attrs = attributes(node, src);
            if let Some(ctrl) = attrs
                .iter()
                .find(|a| a.directive() == "ng-controller")
                .and_then(|a| a.value.as_deref())
            {
                let (controller, alias) = split_controller(ctrl);
                markup.scopes.push(MarkupScope {
                    controller: Some(controller),
                    alias,
                    tag: tag_name(node, src),
                    start_line: line(node),
                    end_line: node.end_position().row as u32 + 1,
                    ..Default::default()
                });
                stack.push(markup.scopes.len() - 1);
                pushed = true;
            }
            let at = line(node);
            let scope = current(markup, stack);
            for attr in &attrs {
                let name = attr.directive();
                let value = attr.value.clone().unwrap_or_default();
                let occurrence = RawDirectiveUse {
                    attribute: name.clone(),
                    expression: value.clone(),
                    line: at,
                };
                if LOOP_ATTRS.contains(&name.as_str()) {
                    scope.loops.push(occurrence);
                } else if CONDITIONAL_ATTRS.contains(&name.as_str()) {
                    scope.conditionals.push(occurrence);
                } else if EVENT_ATTRS.contains(&name.as_str()) {
                    scope.events.push(occurrence);
                } else if name == "ng-model" {
                    scope.bindings.push(RawBindingUse {
                        expression: value,
                        two_way: true,
                        line: at,
                    });
                } else if name == "ng-bind" {
                    scope.bindings.push(RawBindingUse {
                        expression: value,
                        two_way: false,
                        line: at,
                    });
                } else {
                    for expr in interpolations(&value) {
                        scope.bindings.push(RawBindingUse {
                            expression: expr,
                            two_way: false,
                            line: at,
                        });
                    }
                }
            }
        }
        "text" => {
            let at = line(node);
            let body = node.utf8_text(src.as_bytes()).unwrap_or_default();
            let scope = current(markup, stack);
            for expr in interpolations(body) {
                scope.bindings.push(RawBindingUse {
                    expression: expr,
                    two_way: false,
                    line: at,
                });
            }
        }
        "script_element" | "style_element" | "comment" => return,
        _ => {}
    }

    let mut cursor = node.walk();
    let children: Vec<Node<'_>> = node.named_children(&mut cursor).collect();
    for child in children {
        visit(child, src, markup, stack);
    }
    if pushed {
        stack.pop();
    }
}
