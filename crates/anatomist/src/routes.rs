//! Route analyzer: flat path-based and hierarchical state-based router
//! configuration inside `.config(...)` blocks.
//!
//! The router family is chosen from the config block's DI tokens. A block whose
//! tokens name neither provider (renamed or minified) is probed with both
//! parsers, hierarchical first; the first non-empty result wins.

use serde::{Deserialize, Serialize};
use tree_sitter::Node;

use crate::syntax::{
    call_args, line, object_members, resolve_factory, string_literal, text, walk,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RouterFamily {
    /// `$routeProvider.when(path, {...})`
    Flat,
    /// `$stateProvider.state(name, {...})`
    Hierarchical,
}

/// A route fact. Built fresh from analyzer output each run, never mutated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Route {
    pub family: RouterFamily,
    pub file: String,
    pub line: u32,
    /// Flat path, or the URL fragment of a state.
    pub path: Option<String>,
    /// Dotted state name (hierarchical only).
    pub state: Option<String>,
    pub controller: Option<String>,
    pub template_url: Option<String>,
    pub inline_template: bool,
    /// Resolve-block key names in declaration order.
    pub resolve: Vec<String>,
    pub is_abstract: bool,
    /// Catch-all from `.otherwise(...)`.
    pub otherwise: bool,
    pub redirect_to: Option<String>,
    pub on_enter: bool,
    pub on_exit: bool,
}

impl Route {
    fn new(family: RouterFamily, file: &str, line: u32) -> Self {
        Self {
            family,
            file: file.to_string(),
            line,
            path: None,
            state: None,
            controller: None,
            template_url: None,
            inline_template: false,
            resolve: Vec::new(),
            is_abstract: false,
            otherwise: false,
            redirect_to: None,
            on_enter: false,
            on_exit: false,
        }
    }

    /// Required shape: a flat route needs a path (or is a catch-all with a
    /// redirect), a state needs a name.
    pub fn is_well_formed(&self) -> bool {
        match self.family {
            RouterFamily::Flat => self.path.is_some() || (self.otherwise && self.redirect_to.is_some()),
            RouterFamily::Hierarchical => {
                self.state.as_deref().is_some_and(|s| !s.is_empty())
                    || (self.otherwise && self.redirect_to.is_some())
            }
        }
    }
}

/// `Name as alias` → `Name`.
pub fn controller_name(raw: &str) -> String {
    raw.split(" as ").next().unwrap_or(raw).trim().to_string()
}

/// Extracts every route declared in `.config(...)` blocks under `root`.
pub fn extract_routes(root: Node<'_>, src: &[u8], file: &str) -> Vec<Route> {
    let mut routes = Vec::new();
    let mut configs = Vec::new();

    walk(root, &mut |node| {
        if node.kind() != "call_expression" {
            return;
        }
        let is_config = node
            .child_by_field_name("function")
            .filter(|f| f.kind() == "member_expression")
            .and_then(|f| f.child_by_field_name("property"))
            .is_some_and(|p| text(p, src) == "config");
        if is_config {
            if let Some(arg) = call_args(node).first() {
                configs.push(*arg);
            }
        }
    });

    for arg in configs {
        let Some(factory) = resolve_factory(arg, root, src) else {
            continue;
        };
        let names: Vec<&str> = factory
            .tokens
            .iter()
            .chain(&factory.params)
            .map(String::as_str)
            .collect();
        let flat = names.contains(&"$routeProvider");
        let hierarchical = names.contains(&"$stateProvider") || names.contains(&"$urlRouterProvider");

        match (flat, hierarchical) {
            (true, false) => routes.extend(parse_flat(factory.func, src, file)),
            (false, true) => routes.extend(parse_hierarchical(factory.func, src, file)),
            (true, true) => {
                routes.extend(parse_hierarchical(factory.func, src, file));
                routes.extend(parse_flat(factory.func, src, file));
            }
            (false, false) => {
                let probed = parse_hierarchical(factory.func, src, file);
                if probed.is_empty() {
                    routes.extend(parse_flat(factory.func, src, file));
                } else {
                    routes.extend(probed);
                }
            }
        }
    }
    routes
}

/// Calls under `scope` of the form `<anything>.<method>(...)`.
fn method_calls<'t>(scope: Node<'t>, src: &[u8], method: &str) -> Vec<Node<'t>> {
    let mut calls = Vec::new();
    walk(scope, &mut |node| {
        if node.kind() != "call_expression" {
            return;
        }
        let matches = node
            .child_by_field_name("function")
            .filter(|f| f.kind() == "member_expression")
            .and_then(|f| f.child_by_field_name("property"))
            .is_some_and(|p| text(p, src) == method);
        if matches {
            calls.push(node);
        }
    });
    // Chained calls share a start byte; order by the argument list instead.
    calls.sort_by_key(|c| args_start(*c));
    calls
}

fn args_start(call: Node<'_>) -> usize {
    call.child_by_field_name("arguments")
        .map(|a| a.start_byte())
        .unwrap_or_else(|| call.start_byte())
}

fn args_line(call: Node<'_>) -> u32 {
    call.child_by_field_name("arguments")
        .map(line)
        .unwrap_or_else(|| line(call))
}

/// Applies the shared route-definition keys of one object literal.
fn apply_definition(route: &mut Route, definition: Node<'_>, src: &[u8]) {
    for (key, value) in object_members(definition, src) {
        match key.as_str() {
            "url" => route.path = string_literal(value, src),
            "controller" => route.controller = string_literal(value, src).map(|c| controller_name(&c)),
            "controllerAs" => {}
            "templateUrl" => route.template_url = string_literal(value, src),
            "template" => route.inline_template = true,
            "resolve" if value.kind() == "object" => {
                route.resolve = object_members(value, src).into_iter().map(|(k, _)| k).collect();
            }
            "abstract" => route.is_abstract = value.kind() == "true",
            "redirectTo" => route.redirect_to = string_literal(value, src),
            "onEnter" => route.on_enter = true,
            "onExit" => route.on_exit = true,
            _ => {}
        }
    }
}

fn parse_flat(func: Node<'_>, src: &[u8], file: &str) -> Vec<Route> {
    let mut routes = Vec::new();
    for call in method_calls(func, src, "when") {
        let args = call_args(call);
        let (Some(path), Some(definition)) = (
            args.first().and_then(|a| string_literal(*a, src)),
            args.get(1).filter(|d| d.kind() == "object"),
        ) else {
            continue;
        };
        let mut route = Route::new(RouterFamily::Flat, file, args_line(call));
        apply_definition(&mut route, *definition, src);
        route.path = Some(path);
        routes.push(route);
    }
    for call in method_calls(func, src, "otherwise") {
        let Some(arg) = call_args(call).into_iter().next() else {
            continue;
        };
        let mut route = Route::new(RouterFamily::Flat, file, args_line(call));
        route.otherwise = true;
        if arg.kind() == "object" {
            apply_definition(&mut route, arg, src);
        } else {
            route.redirect_to = string_literal(arg, src);
        }
        routes.push(route);
    }
    routes
}

fn parse_hierarchical(func: Node<'_>, src: &[u8], file: &str) -> Vec<Route> {
    let mut routes = Vec::new();
    for call in method_calls(func, src, "state") {
        let args = call_args(call);
        let mut route = Route::new(RouterFamily::Hierarchical, file, args_line(call));
        let mut parent = None;

        let definition = match (args.first(), args.get(1)) {
            (Some(name), Some(def)) if def.kind() == "object" => {
                route.state = string_literal(*name, src);
                *def
            }
            // Object form: `.state({ name: 'x', ... })`.
            (Some(def), None) if def.kind() == "object" => *def,
            _ => continue,
        };
        for (key, value) in object_members(definition, src) {
            match key.as_str() {
                "name" if route.state.is_none() => route.state = string_literal(value, src),
                "parent" => parent = string_literal(value, src),
                _ => {}
            }
        }
        apply_definition(&mut route, definition, src);
        if let (Some(parent), Some(state)) = (parent, route.state.as_ref()) {
            if !state.starts_with(&format!("{}.", parent)) {
                route.state = Some(format!("{}.{}", parent, state));
            }
        }
        routes.push(route);
    }
    for call in method_calls(func, src, "otherwise") {
        let Some(target) = call_args(call).first().and_then(|a| string_literal(*a, src)) else {
            continue;
        };
        let mut route = Route::new(RouterFamily::Hierarchical, file, args_line(call));
        route.otherwise = true;
        route.redirect_to = Some(target);
        routes.push(route);
    }
    routes
}

#[cfg(test)]
mod tests {
    use super::*;
    use tree_sitter::Parser;

    fn routes_of(src: &str) -> Vec<Route> {
        let mut parser = Parser::new();
        parser
            .set_language(&tree_sitter_javascript::LANGUAGE.into())
            .unwrap();
        let tree = parser.parse(src, None).unwrap();
        extract_routes(tree.root_node(), src.as_bytes(), "app/routes.js")
    }

    #[test]
    fn test_flat_routes_with_resolve_and_otherwise() {
        let routes = routes_of(
            r#"
app.config(['$routeProvider', function ($routeProvider) {
  $routeProvider
    .when('/users/:id', { controller: 'UserDetailController as vm', templateUrl: 'user.html',
                          resolve: { auth: function () {}, user: function () {} } })
    .when('/settings', { controller: 'SettingsController', template: '<p></p>' })
    .otherwise({ redirectTo: '/settings' });
}]);
"#,
        );
        assert_eq!(routes.len(), 3);
        assert!(routes.iter().all(|r| r.family == RouterFamily::Flat));
        assert_eq!(routes[0].path.as_deref(), Some("/users/:id"));
        assert_eq!(routes[0].controller.as_deref(), Some("UserDetailController"));
        assert_eq!(routes[0].resolve, vec!["auth", "user"]);
        assert!(routes[1].inline_template);
        assert!(routes[2].otherwise);
        assert_eq!(routes[2].redirect_to.as_deref(), Some("/settings"));
    }

    #[test]
    fn test_hierarchical_states_with_parent_and_object_form() {
        let routes = routes_of(
            r#"
function routes($stateProvider, $urlRouterProvider) {
  $urlRouterProvider.otherwise('/home');
  $stateProvider
    .state('app', { abstract: true, url: '/app', templateUrl: 'app.html' })
    .state('detail', { parent: 'app.users', url: '/:userId', controller: 'UserDetailController',
                       resolve: { auth: a, userData: b }, onEnter: function () {} })
    .state({ name: 'home', url: '/home', redirectTo: 'app' });
}
app.config(routes);
"#,
        );
        let states: Vec<_> = routes.iter().filter_map(|r| r.state.clone()).collect();
        assert_eq!(states, vec!["app", "app.users.detail", "home"]);
        assert!(routes[0].is_abstract);
        assert!(routes[1].on_enter && !routes[1].on_exit);
        assert_eq!(routes[2].redirect_to.as_deref(), Some("app"));
        let otherwise = routes.iter().find(|r| r.otherwise).unwrap();
        assert_eq!(otherwise.redirect_to.as_deref(), Some("/home"));
        assert!(routes.iter().all(|r| r.is_well_formed()));
    }

    #[test]
    fn test_ambiguous_block_is_probed() {
        let routes = routes_of(
            "app.config(['rp', function (rp) { rp.when('/a', { controller: 'ACtrl' }); }]);",
        );
        assert_eq!(routes.len(), 1);
        assert_eq!(routes[0].family, RouterFamily::Flat);

        let routes = routes_of(
            "app.config(function (sp) { sp.state('a', { url: '/a' }); });",
        );
        assert_eq!(routes.len(), 1);
        assert_eq!(routes[0].family, RouterFamily::Hierarchical);
    }
}
