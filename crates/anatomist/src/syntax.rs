//! Small tree-sitter helpers shared by the script and route analyzers.
//!
//! Node kinds are those of the JavaScript grammar; the TypeScript grammar
//! extends it with the same shapes plus typed parameter wrappers.

use tree_sitter::Node;

/// Source text of `node`, empty on invalid UTF-8.
pub(crate) fn text<'a>(node: Node<'_>, src: &'a [u8]) -> &'a str {
    node.utf8_text(src).unwrap_or("")
}

/// 1-indexed first line.
pub(crate) fn line(node: Node<'_>) -> u32 {
    node.start_position().row as u32 + 1
}

/// 1-indexed last line.
pub(crate) fn end_line(node: Node<'_>) -> u32 {
    node.end_position().row as u32 + 1
}

pub(crate) fn is_function(node: Node<'_>) -> bool {
    matches!(
        node.kind(),
        "function_expression" | "function" | "arrow_function" | "function_declaration"
    )
}

/// Value of a string literal, or of a template literal without substitutions.
pub(crate) fn string_literal(node: Node<'_>, src: &[u8]) -> Option<String> {
    let raw = text(node, src);
    match node.kind() {
        "string" if raw.len() >= 2 => Some(raw[1..raw.len() - 1].to_string()),
        "template_string" if raw.len() >= 2 && !raw.contains("${") => {
            Some(raw[1..raw.len() - 1].to_string())
        }
        _ => None,
    }
}

/// Named children of `node`, excluding comments.
pub(crate) fn named_children(node: Node<'_>) -> Vec<Node<'_>> {
    let mut cursor = node.walk();
    node.named_children(&mut cursor)
        .filter(|c| c.kind() != "comment")
        .collect()
}

/// Argument nodes of a `call_expression`.
pub(crate) fn call_args(call: Node<'_>) -> Vec<Node<'_>> {
    call.child_by_field_name("arguments")
        .map(named_children)
        .unwrap_or_default()
}

/// Pre-order walk over `node` and all named descendants.
pub(crate) fn walk<'t>(node: Node<'t>, visit: &mut impl FnMut(Node<'t>)) {
    visit(node);
    let mut cursor = node.walk();
    for child in node.named_children(&mut cursor) {
        walk(child, visit);
    }
}

/// Parameter names of a function-like node, in order.
pub(crate) fn function_params(func: Node<'_>, src: &[u8]) -> Vec<String> {
    if let Some(single) = func.child_by_field_name("parameter") {
        return vec![text(single, src).to_string()];
    }
    let Some(params) = func.child_by_field_name("parameters") else {
        return Vec::new();
    };
    named_children(params)
        .into_iter()
        .filter_map(|p| {
            let name_node = match p.kind() {
                "identifier" => Some(p),
                "required_parameter" | "optional_parameter" => p.child_by_field_name("pattern"),
                "assignment_pattern" => p.child_by_field_name("left"),
                _ => None,
            }?;
            (name_node.kind() == "identifier").then(|| text(name_node, src).to_string())
        })
        .collect()
}

/// Key of an object `pair` or `method_definition`.
pub(crate) fn member_key(node: Node<'_>, src: &[u8]) -> Option<String> {
    let key = node
        .child_by_field_name("key")
        .or_else(|| node.child_by_field_name("name"))?;
    match key.kind() {
        "string" => string_literal(key, src),
        _ => Some(text(key, src).to_string()),
    }
}

/// `(key, value)` pairs of an object literal. `method_definition` members yield
/// themselves as the value.
pub(crate) fn object_members<'t>(object: Node<'t>, src: &[u8]) -> Vec<(String, Node<'t>)> {
    named_children(object)
        .into_iter()
        .filter_map(|member| match member.kind() {
            "pair" => Some((member_key(member, src)?, member.child_by_field_name("value")?)),
            "method_definition" => Some((member_key(member, src)?, member)),
            "shorthand_property_identifier" => Some((text(member, src).to_string(), member)),
            _ => None,
        })
        .collect()
}

/// Looks up a function declared by name anywhere under `root`
/// (`function Name() {}` or `var Name = function () {}`).
pub(crate) fn find_function_named<'t>(root: Node<'t>, name: &str, src: &[u8]) -> Option<Node<'t>> {
    let mut found = None;
    walk(root, &mut |node| {
        if found.is_some() {
            return;
        }
        match node.kind() {
            "function_declaration" => {
                if node
                    .child_by_field_name("name")
                    .is_some_and(|n| text(n, src) == name)
                {
                    found = Some(node);
                }
            }
            "variable_declarator" => {
                let named = node
                    .child_by_field_name("name")
                    .is_some_and(|n| text(n, src) == name);
                if let Some(value) = node.child_by_field_name("value").filter(|v| is_function(*v)) {
                    if named {
                        found = Some(value);
                    }
                }
            }
            _ => {}
        }
    });
    found
}

/// String elements of `Name.$inject = [...]` for `name`.
pub(crate) fn explicit_inject<'t>(root: Node<'t>, name: &str, src: &[u8]) -> Option<Vec<String>> {
    let mut tokens = None;
    walk(root, &mut |node| {
        if tokens.is_some() || node.kind() != "assignment_expression" {
            return;
        }
        let (Some(left), Some(right)) = (
            node.child_by_field_name("left"),
            node.child_by_field_name("right"),
        ) else {
            return;
        };
        if left.kind() != "member_expression" || right.kind() != "array" {
            return;
        }
        let object = left.child_by_field_name("object").map(|o| text(o, src));
        let property = left.child_by_field_name("property").map(|p| text(p, src));
        if object == Some(name) && property == Some("$inject") {
            tokens = Some(
                named_children(right)
                    .into_iter()
                    .filter_map(|e| string_literal(e, src))
                    .collect(),
            );
        }
    });
    tokens
}

/// A registration's factory resolved to its function node plus DI tokens.
pub(crate) struct Factory<'t> {
    pub func: Node<'t>,
    pub tokens: Vec<String>,
    /// Parameter names, positionally aligned with `tokens` where both exist.
    pub params: Vec<String>,
}

/// Resolves the factory argument of a registration or `.config(...)` call.
///
/// Handles an inline function, an arrow function, a dependency array ending in
/// either, and an identifier naming a function declared in the same file.
/// Array literals win over `$inject`, which wins over parameter names.
pub(crate) fn resolve_factory<'t>(arg: Node<'t>, root: Node<'t>, src: &[u8]) -> Option<Factory<'t>> {
    match arg.kind() {
        k if is_function(arg) && k != "function_declaration" => {
            let params = function_params(arg, src);
            Some(Factory {
                func: arg,
                tokens: params.clone(),
                params,
            })
        }
        "array" => {
            let elements = named_children(arg);
            let last = *elements.last()?;
            let tokens: Vec<String> = elements
                .iter()
                .filter_map(|e| string_literal(*e, src))
                .collect();
            let func = if is_function(last) {
                last
            } else if last.kind() == "identifier" {
                find_function_named(root, text(last, src), src)?
            } else {
                return None;
            };
            Some(Factory {
                func,
                tokens,
                params: function_params(func, src),
            })
        }
        "identifier" => {
            let name = text(arg, src);
            let func = find_function_named(root, name, src)?;
            let params = function_params(func, src);
            let tokens = explicit_inject(root, name, src).unwrap_or_else(|| params.clone());
            Some(Factory {
                func,
                tokens,
                params,
            })
        }
        _ => None,
    }
}

/// Statements directly inside a function body.
pub(crate) fn body_statements(func: Node<'_>) -> Vec<Node<'_>> {
    match func.child_by_field_name("body") {
        Some(body) if body.kind() == "statement_block" => named_children(body),
        _ => Vec::new(),
    }
}

/// The value of the first top-level `return` in a function body, or the
/// expression body of an arrow function.
pub(crate) fn returned_value(func: Node<'_>) -> Option<Node<'_>> {
    if let Some(body) = func.child_by_field_name("body") {
        if body.kind() != "statement_block" {
            return Some(strip_parens(body));
        }
    }
    body_statements(func)
        .into_iter()
        .find(|s| s.kind() == "return_statement")
        .and_then(|r| r.named_child(0))
        .map(strip_parens)
}

fn strip_parens(mut node: Node<'_>) -> Node<'_> {
    while node.kind() == "parenthesized_expression" {
        match node.named_child(0) {
            Some(inner) => node = inner,
            None => break,
        }
    }
    node
}

/// Literal prefix of a URL expression: a literal, the static head of a
/// template literal, or the first literal operand of a `+` concatenation.
pub(crate) fn url_literal(node: Node<'_>, src: &[u8]) -> String {
    match node.kind() {
        "string" => string_literal(node, src).unwrap_or_default(),
        "template_string" => {
            let raw = text(node, src);
            let inner = raw.trim_start_matches('`').trim_end_matches('`');
            inner.split("${").next().unwrap_or_default().to_string()
        }
        "binary_expression" => {
            let left = node
                .child_by_field_name("left")
                .map(|l| url_literal(l, src))
                .unwrap_or_default();
            if !left.is_empty() {
                return left;
            }
            node.child_by_field_name("right")
                .map(|r| url_literal(r, src))
                .unwrap_or_default()
        }
        "parenthesized_expression" => node
            .named_child(0)
            .map(|n| url_literal(n, src))
            .unwrap_or_default(),
        _ => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tree_sitter::Parser;

    fn parse(src: &str) -> tree_sitter::Tree {
        let mut parser = Parser::new();
        parser
            .set_language(&tree_sitter_javascript::LANGUAGE.into())
            .unwrap();
        parser.parse(src, None).unwrap()
    }

    fn first_of_kind<'t>(root: Node<'t>, kind: &str) -> Node<'t> {
        let mut found = None;
        walk(root, &mut |n| {
            if found.is_none() && n.kind() == kind {
                found = Some(n);
            }
        });
        found.unwrap()
    }

    #[test]
    fn test_array_factory_prefers_literal_tokens() {
        let src = "x(['$http', 'AuthService', function (a, b) {}]);";
        let tree = parse(src);
        let array = first_of_kind(tree.root_node(), "array");
        let factory = resolve_factory(array, tree.root_node(), src.as_bytes()).unwrap();
        assert_eq!(factory.tokens, vec!["$http", "AuthService"]);
        assert_eq!(factory.params, vec!["a", "b"]);
    }

    #[test]
    fn test_identifier_factory_uses_explicit_inject() {
        let src = "function Ctrl(s, h) {}\nCtrl.$inject = ['$scope', '$http'];\nx(Ctrl);";
        let tree = parse(src);
        let root = tree.root_node();
        let call = first_of_kind(root, "call_expression");
        let arg = call_args(call)[0];
        let factory = resolve_factory(arg, root, src.as_bytes()).unwrap();
        assert_eq!(factory.tokens, vec!["$scope", "$http"]);
        assert_eq!(factory.func.kind(), "function_declaration");
    }

    #[test]
    fn test_url_literal_concatenation() {
        let src = "f('/api/users/' + id); g(base + '/api/items'); h(`/api/x/${id}`);";
        let tree = parse(src);
        let mut urls = Vec::new();
        walk(tree.root_node(), &mut |n| {
            if n.kind() == "call_expression" {
                urls.push(url_literal(call_args(n)[0], src.as_bytes()));
            }
        });
        assert_eq!(urls, vec!["/api/users/", "/api/items", "/api/x/"]);
    }
}
