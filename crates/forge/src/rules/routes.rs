//! Route facts → `app-routing.module.ts`.
//!
//! # Flat routes
//! Ordered static, then parameterized, then wildcard (stable within a rank);
//! `otherwise` becomes a catch-all redirect appended last.
//!
//! # Hierarchical states
//! The tree is rebuilt from dotted state names. Missing ancestors are
//! synthesized so every declared state has a parent chain. Siblings list
//! static segments before parameterized ones, otherwise in discovery order.
//! An abstract state becomes a lazily loaded feature module: the target router
//! cannot inline `children` and lazy-load the same path, so its subtree is
//! summarized as comments on the lazy entry instead of being duplicated.
//!
//! Resolve-block keys become resolver stubs, except auth-looking keys, which
//! become guard stubs. Redirect and enter/exit hooks become TODO comments.
//!
//! With no route facts at all, each migrated controller gets a route named
//! after its component.

use std::collections::HashMap;
use std::sync::OnceLock;

use anatomist::{Route, RouterFamily};
use common::migration::{Change, ChangeTag};
use common::roles::Role;
use common::NodeId;
use regex::Regex;
use tracing::info;

use super::ensure_component_shell;
use crate::naming::{kebab, pascal, ComponentNames};
use crate::writer::{register_in_app_module, write_if_changed};
use crate::{ForgeError, Rule, RuleContext};

const ROUTING_FILE: &str = "app-routing.module.ts";

/// Resolve keys that guard access rather than load data.
const AUTH_KEYS: &[&str] = &[
    "auth",
    "authenticated",
    "user",
    "currentuser",
    "session",
    "loggedin",
    "isloggedin",
    "authcheck",
    "logincheck",
];

fn is_auth_key(key: &str) -> bool {
    let lower = key.to_ascii_lowercase();
    AUTH_KEYS.contains(&lower.as_str()) || lower.starts_with("auth") || lower.starts_with("login")
}

fn url_param_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\{(\w+)(?::[^}]*)?\}").expect("valid url-parameter regex"))
}

fn quote(s: &str) -> String {
    s.replace('\\', "\\\\").replace('\'', "\\'")
}

/// Legacy URL → target path: no leading slash, `{id}` → `:id`, no query.
fn target_path(url: &str) -> String {
    let url = url.split('?').next().unwrap_or_default();
    let url = url.trim_start_matches('^').trim_start_matches('/').trim_end_matches('/');
    let url = url_param_regex().replace_all(url, ":$1");
    if url == "*" {
        "**".to_string()
    } else {
        url.into_owned()
    }
}

fn is_parameterized(path: &str) -> bool {
    path.split('/').any(|s| s.starts_with(':'))
}

fn flat_rank(path: &str) -> u8 {
    if path == "**" {
        3
    } else if is_parameterized(path) {
        2
    } else {
        1
    }
}

// ---------------------------------------------------------------------------
// Route table model
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
struct RouteEntry {
    path: String,
    component: Option<String>,
    redirect_to: Option<String>,
    /// `(module path, module class)`
    load_children: Option<(String, String)>,
    guards: Vec<String>,
    /// `(key, resolver class)`
    resolvers: Vec<(String, String)>,
    comments: Vec<String>,
    children: Vec<RouteEntry>,
}

impl RouteEntry {
    fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            ..Default::default()
        }
    }

    fn render(&self, depth: usize) -> String {
        let pad = "  ".repeat(depth);
        let inner = "  ".repeat(depth + 1);
        let mut props = vec![format!("{}path: '{}'", inner, quote(&self.path))];
        if let Some(component) = &self.component {
            props.push(format!("{}component: {}", inner, component));
        }
        if let Some(target) = &self.redirect_to {
            props.push(format!("{}redirectTo: '{}'", inner, quote(target)));
            if self.path.is_empty() {
                props.push(format!("{}pathMatch: 'full'", inner));
            }
        }
        if let Some((module, class)) = &self.load_children {
            props.push(format!(
                "{}loadChildren: () => import('{}').then(m => m.{})",
                inner, module, class
            ));
        }
        if !self.guards.is_empty() {
            props.push(format!("{}canActivate: [{}]", inner, self.guards.join(", ")));
        }
        if !self.resolvers.is_empty() {
            let pairs: Vec<String> = self
                .resolvers
                .iter()
                .map(|(key, class)| format!("{}: {}", key, class))
                .collect();
            props.push(format!("{}resolve: {{ {} }}", inner, pairs.join(", ")));
        }
        if !self.children.is_empty() {
            let children: Vec<String> = self.children.iter().map(|c| c.render(depth + 2)).collect();
            props.push(format!("{}children: [\n{}\n{}]", inner, children.join(",\n"), inner));
        }

        let mut text = format!("{}{{\n", pad);
        for comment in &self.comments {
            text.push_str(&format!("{}{}\n", inner, comment));
        }
        text.push_str(&props.join(",\n"));
        text.push_str(&format!("\n{}}}", pad));
        text
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StubKind {
    Guard,
    Resolver,
}

#[derive(Debug)]
struct Stub {
    kind: StubKind,
    key: String,
    class: String,
    file: String,
}

impl Stub {
    fn for_key(key: &str) -> Self {
        let (kind, suffix, ext) = if is_auth_key(key) {
            (StubKind::Guard, "Guard", "guard")
        } else {
            (StubKind::Resolver, "Resolver", "resolver")
        };
        Stub {
            kind,
            key: key.to_string(),
            class: format!("{}{}", pascal(key), suffix),
            file: format!("{}.{}.ts", kebab(key), ext),
        }
    }

    fn module_path(&self) -> String {
        format!("./{}", self.file.trim_end_matches(".ts"))
    }

    fn render(&self) -> String {
        match self.kind {
            StubKind::Guard => format!(
                "import {{ Injectable }} from '@angular/core';\n\
                 import {{ CanActivate, Router }} from '@angular/router';\n\
                 \n\
                 @Injectable({{ providedIn: 'root' }})\n\
                 export class {} implements CanActivate {{\n\
                 \x20 constructor(private router: Router) {{}}\n\
                 \n\
                 \x20 canActivate(): boolean {{\n\
                 \x20   // TODO: port the legacy '{}' resolve check\n\
                 \x20   return true;\n\
                 \x20 }}\n\
                 }}\n",
                self.class, self.key
            ),
            StubKind::Resolver => format!(
                "import {{ Injectable }} from '@angular/core';\n\
                 import {{ Resolve }} from '@angular/router';\n\
                 import {{ Observable, of }} from 'rxjs';\n\
                 \n\
                 @Injectable({{ providedIn: 'root' }})\n\
                 export class {} implements Resolve<any> {{\n\
                 \x20 resolve(): Observable<any> {{\n\
                 \x20   // TODO: port the legacy '{}' resolve\n\
                 \x20   return of(null);\n\
                 \x20 }}\n\
                 }}\n",
                self.class, self.key
            ),
        }
    }
}

// ---------------------------------------------------------------------------
// State tree
// ---------------------------------------------------------------------------

#[derive(Debug)]
struct StateNode<'a> {
    name: String,
    /// `None` for synthesized ancestors.
    route: Option<&'a Route>,
    children: Vec<usize>,
}

#[derive(Debug, Default)]
struct StateTree<'a> {
    nodes: Vec<StateNode<'a>>,
    roots: Vec<usize>,
    by_name: HashMap<String, usize>,
}

impl<'a> StateTree<'a> {
    fn build(states: &[&'a Route]) -> Self {
        let mut tree = StateTree::default();
        for route in states {
            let Some(name) = route.state.as_deref() else {
                continue;
            };
            let idx = tree.ensure(name);
            // First declaration wins.
            if tree.nodes[idx].route.is_none() {
                tree.nodes[idx].route = Some(*route);
            }
        }
        tree
    }

    fn ensure(&mut self, name: &str) -> usize {
        if let Some(&idx) = self.by_name.get(name) {
            return idx;
        }
        let parent = name.rsplit_once('.').map(|(p, _)| self.ensure(p));
        let idx = self.nodes.len();
        self.nodes.push(StateNode {
            name: name.to_string(),
            route: None,
            children: Vec::new(),
        });
        self.by_name.insert(name.to_string(), idx);
        match parent {
            Some(p) => self.nodes[p].children.push(idx),
            None => self.roots.push(idx),
        }
        idx
    }

    /// Own path segment relative to the parent.
    fn path(&self, idx: usize) -> String {
        let node = &self.nodes[idx];
        match node.route {
            Some(route) => route.path.as_deref().map(target_path).unwrap_or_default(),
            None => kebab(node.name.rsplit('.').next().unwrap_or(&node.name)),
        }
    }

    /// Static siblings first; stable otherwise.
    fn sorted(&self, indices: &[usize]) -> Vec<usize> {
        let mut sorted = indices.to_vec();
        sorted.sort_by_key(|&i| is_parameterized(&self.path(i)));
        sorted
    }

    fn summary(&self, idx: usize, depth: usize, lines: &mut Vec<String>) {
        for child in self.sorted(&self.nodes[idx].children) {
            let node = &self.nodes[child];
            let controller = node
                .route
                .and_then(|r| r.controller.as_deref())
                .map(|c| format!(" ({})", c))
                .unwrap_or_default();
            lines.push(format!(
                "//   {}{} -> '{}'{}",
                "  ".repeat(depth),
                node.name,
                self.path(child),
                controller
            ));
            self.summary(child, depth + 1, lines);
        }
    }

    fn descendants(&self, idx: usize, out: &mut Vec<usize>) {
        for &child in &self.nodes[idx].children {
            out.push(child);
            self.descendants(child, out);
        }
    }
}

/// Module path and class of the feature module replacing an abstract state.
fn feature_module(state: &str) -> (String, String) {
    let base = kebab(state);
    let mut class = format!("{}Module", pascal(&base));
    if class == "AppModule" {
        class = "AppFeatureModule".to_string();
    }
    (format!("./{}/{}.module", base, base), class)
}

// ---------------------------------------------------------------------------
// Table construction
// ---------------------------------------------------------------------------

struct TableBuilder<'c, 'a> {
    cx: &'c RuleContext<'a>,
    imports: Vec<(String, String)>,
    stubs: Vec<(Stub, String)>,
}

impl<'c, 'a> TableBuilder<'c, 'a> {
    fn new(cx: &'c RuleContext<'a>) -> Self {
        Self {
            cx,
            imports: Vec::new(),
            stubs: Vec::new(),
        }
    }

    fn import(&mut self, symbol: &str, module: String) {
        if !self.imports.iter().any(|(s, _)| s == symbol) {
            self.imports.push((symbol.to_string(), module));
        }
    }

    fn component(&mut self, controller: &str) -> Result<String, ForgeError> {
        let names = ComponentNames::for_controller(controller);
        ensure_component_shell(self.cx.out, &names)?;
        self.import(&names.class, names.module_path());
        Ok(names.class)
    }

    /// Writes the stub for `key` once per run; returns its index.
    fn stub(&mut self, key: &str, origin: &str) -> Result<usize, ForgeError> {
        if let Some(i) = self.stubs.iter().position(|(s, _)| s.key == key) {
            return Ok(i);
        }
        let stub = Stub::for_key(key);
        write_if_changed(&self.cx.out.app_file(&stub.file), &stub.render())?;
        self.stubs.push((stub, origin.to_string()));
        Ok(self.stubs.len() - 1)
    }

    fn attach_resolves(&mut self, entry: &mut RouteEntry, route: &Route, origin: &str) -> Result<(), ForgeError> {
        for key in &route.resolve {
            let i = self.stub(key, origin)?;
            let (class, module, kind) = {
                let stub = &self.stubs[i].0;
                (stub.class.clone(), stub.module_path(), stub.kind)
            };
            self.import(&class, module);
            match kind {
                StubKind::Guard if !entry.guards.contains(&class) => entry.guards.push(class),
                StubKind::Guard => {}
                StubKind::Resolver => entry.resolvers.push((key.clone(), class)),
            }
        }
        Ok(())
    }

    /// TODO comments for hooks with no route-table equivalent. A flat route's
    /// redirect is a real `redirectTo`, so only states note theirs.
    fn hook_comments(entry: &mut RouteEntry, route: &Route, note_redirect: bool) {
        if let Some(target) = route.redirect_to.as_ref().filter(|_| note_redirect) {
            entry
                .comments
                .push(format!("// TODO: legacy redirect to '{}'; add a redirect route", target));
        }
        if route.on_enter {
            entry
                .comments
                .push("// TODO: migrate the onEnter hook (a guard or the component's ngOnInit)".to_string());
        }
        if route.on_exit {
            entry
                .comments
                .push("// TODO: migrate the onExit hook (a CanDeactivate guard or ngOnDestroy)".to_string());
        }
        if route.inline_template {
            entry
                .comments
                .push("// TODO: inline template; move it into the component's markup".to_string());
        }
    }

    fn flat(&mut self, routes: &[&Route]) -> Result<Vec<RouteEntry>, ForgeError> {
        let mut ranked: Vec<(u8, RouteEntry)> = Vec::new();
        let mut catch_all = Vec::new();

        for route in routes {
            if route.otherwise {
                if let Some(target) = &route.redirect_to {
                    let mut entry = RouteEntry::new("**");
                    entry.redirect_to = Some(target.clone());
                    catch_all.push(entry);
                }
                continue;
            }
            let Some(raw) = route.path.as_deref() else {
                continue;
            };
            let path = target_path(raw);
            let mut entry = RouteEntry::new(path.clone());
            if let Some(controller) = &route.controller {
                entry.component = Some(self.component(controller)?);
            }
            if let Some(target) = &route.redirect_to {
                entry.redirect_to = Some(target.clone());
            }
            self.attach_resolves(&mut entry, route, raw)?;
            Self::hook_comments(&mut entry, route, false);
            ranked.push((flat_rank(&path), entry));
        }

        ranked.sort_by_key(|(rank, _)| *rank);
        let mut entries: Vec<RouteEntry> = ranked.into_iter().map(|(_, e)| e).collect();
        entries.extend(catch_all);
        Ok(entries)
    }

    fn hierarchical(&mut self, states: &[&Route]) -> Result<Vec<RouteEntry>, ForgeError> {
        let declared: Vec<&Route> = states.iter().copied().filter(|r| !r.otherwise).collect();
        let tree = StateTree::build(&declared);
        let mut entries = Vec::new();
        for root in tree.sorted(&tree.roots) {
            entries.push(self.state_entry(&tree, root)?);
        }
        for route in states.iter().filter(|r| r.otherwise) {
            if let Some(target) = &route.redirect_to {
                let mut entry = RouteEntry::new("**");
                entry.redirect_to = Some(target.clone());
                entries.push(entry);
            }
        }
        Ok(entries)
    }

    fn state_entry(&mut self, tree: &StateTree<'_>, idx: usize) -> Result<RouteEntry, ForgeError> {
        let node = &tree.nodes[idx];
        let mut entry = RouteEntry::new(tree.path(idx));

        let Some(route) = node.route else {
            entry
                .comments
                .push(format!("// Synthesized parent of undeclared state '{}'", node.name));
            for child in tree.sorted(&node.children) {
                entry.children.push(self.state_entry(tree, child)?);
            }
            return Ok(entry);
        };

        if route.is_abstract {
            let (module, class) = feature_module(&node.name);
            entry.comments.push(format!(
                "// TODO: abstract state '{}' is now the lazily loaded {}; move these children into its routes:",
                node.name, class
            ));
            tree.summary(idx, 0, &mut entry.comments);
            entry.load_children = Some((module, class));
            self.attach_resolves(&mut entry, route, &node.name)?;
            Self::hook_comments(&mut entry, route, true);

            let mut below = Vec::new();
            tree.descendants(idx, &mut below);
            for d in below {
                if let Some(r) = tree.nodes[d].route {
                    for key in &r.resolve {
                        self.stub(key, &tree.nodes[d].name)?;
                    }
                }
            }
            return Ok(entry);
        }

        if let Some(controller) = &route.controller {
            entry.component = Some(self.component(controller)?);
        }
        self.attach_resolves(&mut entry, route, &node.name)?;
        Self::hook_comments(&mut entry, route, true);
        for child in tree.sorted(&node.children) {
            entry.children.push(self.state_entry(tree, child)?);
        }
        Ok(entry)
    }

    /// One route per migrated controller when the source declares none.
    fn fallback(&mut self) -> Result<Vec<RouteEntry>, ForgeError> {
        let mut entries = Vec::new();
        for id in self.cx.roles.with_role(Role::Controller) {
            if self.cx.roles.has(id, Role::TemplateBinding) {
                continue;
            }
            let Some(class) = self.cx.analysis.class(id) else {
                continue;
            };
            let names = ComponentNames::for_controller(&class.name);
            let mut entry = RouteEntry::new(names.kebab.clone());
            entry.component = Some(self.component(&class.name)?);
            entries.push(entry);
        }
        Ok(entries)
    }
}

fn render_module(imports: &[(String, String)], entries: &[RouteEntry]) -> String {
    let mut text = String::from(
        "import { NgModule } from '@angular/core';\nimport { RouterModule, Routes } from '@angular/router';\n",
    );
    for (symbol, module) in imports {
        text.push_str(&format!("import {{ {} }} from '{}';\n", symbol, module));
    }
    text.push('\n');
    if entries.is_empty() {
        text.push_str("const routes: Routes = [];\n");
    } else {
        let rendered: Vec<String> = entries.iter().map(|e| e.render(1)).collect();
        text.push_str(&format!("const routes: Routes = [\n{}\n];\n", rendered.join(",\n")));
    }
    text.push_str(
        "\n@NgModule({\n  imports: [RouterModule.forRoot(routes)],\n  exports: [RouterModule]\n})\nexport class AppRoutingModule {}\n",
    );
    text
}

pub struct RoutesRule;

impl Rule for RoutesRule {
    fn name(&self) -> &'static str {
        "routes"
    }

    fn apply(&self, cx: &RuleContext<'_>) -> Result<Vec<Change>, ForgeError> {
        let (states, flat): (Vec<&Route>, Vec<&Route>) = cx
            .analysis
            .routes
            .iter()
            .partition(|r| r.family == RouterFamily::Hierarchical);

        let mut builder = TableBuilder::new(cx);
        let mut entries = builder.hierarchical(&states)?;
        entries.extend(builder.flat(&flat)?);
        let shape = match (states.is_empty(), flat.is_empty()) {
            (true, true) => {
                entries = builder.fallback()?;
                "fallback per controller"
            }
            (false, true) => "hierarchical",
            (true, false) => "flat",
            (false, false) => "hierarchical and flat",
        };

        let path = cx.out.app_file(ROUTING_FILE);
        write_if_changed(&path, &render_module(&builder.imports, &entries))?;
        register_in_app_module(cx.out, "imports", "AppRoutingModule", "./app-routing.module")?;
        info!(routes = entries.len(), shape, stubs = builder.stubs.len(), "route table written");

        let file = cx.out.relative(&path);
        let mut changes = vec![Change::new(
            ChangeTag::Routing,
            NodeId::synthetic("routes", "legacy"),
            NodeId::synthetic("routing", "AppRoutingModule"),
            format!(
                "{} legacy route(s) migrated to a {} route table with {} top-level entries",
                cx.analysis.routes.len(),
                shape,
                entries.len()
            ),
        )
        .in_file(file)];

        for (stub, origin) in &builder.stubs {
            let kind = match stub.kind {
                StubKind::Guard => "guard",
                StubKind::Resolver => "resolver",
            };
            changes.push(
                Change::new(
                    ChangeTag::RouteStub,
                    NodeId::synthetic("resolve", &format!("{}#{}", origin, stub.key)),
                    NodeId::synthetic(kind, &stub.class),
                    format!(
                        "Resolve key '{}' of '{}' migrated to {} stub {}",
                        stub.key, origin, kind, stub.class
                    ),
                )
                .in_file(cx.out.relative(&cx.out.app_file(&stub.file))),
            );
        }
        Ok(changes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::fixtures::analysis_of;
    use crate::{scaffold, Output};
    use std::fs;

    fn run(files: &[(&str, &str)]) -> (tempfile::TempDir, Output, Vec<Change>) {
        let (_src, analysis, roles) = analysis_of(files);
        let dir = tempfile::tempdir().unwrap();
        let out = Output::new(dir.path());
        scaffold::ensure_project(&out, "app").unwrap();
        let cx = RuleContext {
            analysis: &analysis,
            roles: &roles,
            out: &out,
        };
        let changes = RoutesRule.apply(&cx).unwrap();
        (dir, out, changes)
    }

    fn position(text: &str, needle: &str) -> usize {
        text.find(needle).unwrap_or_else(|| panic!("{} missing in\n{}", needle, text))
    }

    #[test]
    fn test_flat_routes_order_static_param_wildcard() {
        let (_dir, out, changes) = run(&[(
            "app/routes.js",
            r#"angular.module('app').config(['$routeProvider', function ($routeProvider) {
  $routeProvider
    .when('/users/:id', { controller: 'UserDetailController', templateUrl: 'views/user.html' })
    .when('/settings', { controller: 'SettingsCtrl' })
    .when('**', { controller: 'MissingController' })
    .otherwise({ redirectTo: '/settings' });
}]);"#,
        )]);
        let text = fs::read_to_string(out.app_file(ROUTING_FILE)).unwrap();
        let settings = position(&text, "path: 'settings'");
        let user = position(&text, "path: 'users/:id'");
        let wildcard = position(&text, "path: '**',\n    component: MissingComponent");
        let redirect = position(&text, "redirectTo: '/settings'");
        assert!(settings < user && user < wildcard && wildcard < redirect);
        assert!(text.contains("import { UserDetailComponent } from './user-detail.component';"));
        assert!(out.app_file("settings.component.ts").exists());
        assert!(text.contains("RouterModule.forRoot(routes)"));
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].tag, ChangeTag::Routing);

        let module = fs::read_to_string(out.app_module()).unwrap();
        assert!(module.contains("AppRoutingModule]"));
        assert!(module.contains("import { AppRoutingModule } from './app-routing.module';"));
    }

    #[test]
    fn test_state_tree_lazy_abstract_and_stubs() {
        let (_dir, out, changes) = run(&[(
            "app/states.js",
            r#"angular.module('app').config(function ($stateProvider, $urlRouterProvider) {
  $stateProvider
    .state('shop.items.detail', { url: '/{itemId:int}', controller: 'ItemController' })
    .state('shop.items.new', { url: '/new', controller: 'NewItemController' })
    .state('admin', { abstract: true, url: '/admin', resolve: { auth: function () {} } })
    .state('admin.users', { url: '/users', controller: 'AdminUsersController', resolve: { users: function () {} } })
    .state('home', { url: '/', controller: 'HomeController', onEnter: function () {} });
  $urlRouterProvider.otherwise('/home');
});"#,
        )]);
        let text = fs::read_to_string(out.app_file(ROUTING_FILE)).unwrap();

        // Synthesized ancestors for shop and shop.items.
        assert!(text.contains("// Synthesized parent of undeclared state 'shop'"));
        assert!(text.contains("path: 'items'"));
        let new = position(&text, "path: 'new'");
        let detail = position(&text, "path: ':itemId'");
        assert!(new < detail);

        // Abstract state: lazy entry, subtree summary, no inline children.
        assert!(text.contains("loadChildren: () => import('./admin/admin.module').then(m => m.AdminModule)"));
        assert!(text.contains("//   admin.users -> 'users' (AdminUsersController)"));
        assert!(!text.contains("component: AdminUsersComponent"));
        assert!(text.contains("canActivate: [AuthGuard]"));

        assert!(text.contains("// TODO: migrate the onEnter hook"));
        assert!(text.trim_end().contains("path: '**',\n    redirectTo: '/home'"));

        let guard = fs::read_to_string(out.app_file("auth.guard.ts")).unwrap();
        assert!(guard.contains("export class AuthGuard implements CanActivate"));
        let resolver = fs::read_to_string(out.app_file("users.resolver.ts")).unwrap();
        assert!(resolver.contains("export class UsersResolver implements Resolve<any>"));

        let stubs: Vec<&Change> = changes.iter().filter(|c| c.tag == ChangeTag::RouteStub).collect();
        assert_eq!(stubs.len(), 2);
        assert_eq!(stubs[0].after_id.as_str(), "guard:AuthGuard");
        assert_eq!(stubs[1].after_id.as_str(), "resolver:UsersResolver");
    }

    #[test]
    fn test_fallback_routes_per_controller() {
        let (_dir, out, _) = run(&[(
            "app/user.controller.js",
            "angular.module('app').controller('UserController', function ($scope) { $scope.x = 1; });",
        )]);
        let text = fs::read_to_string(out.app_file(ROUTING_FILE)).unwrap();
        assert!(text.contains("path: 'user',\n    component: UserComponent"));
    }

    #[test]
    fn test_auth_key_detection_and_paths() {
        assert!(is_auth_key("currentUser"));
        assert!(is_auth_key("authResolve"));
        assert!(is_auth_key("loginRequired"));
        assert!(!is_auth_key("users"));
        assert_eq!(target_path("/users/{id}?tab"), "users/:id");
        assert_eq!(target_path("^/abs/:x/"), "abs/:x");
        assert_eq!(target_path("*"), "**");
        assert_eq!(feature_module("app"), ("./app/app.module".to_string(), "AppFeatureModule".to_string()));
    }
}
