//! Controller → component.
//!
//! Markup is resolved through a fixed chain, first hit wins:
//! 1. the exact fragment under the controller's scope element in any markup
//!    file that binds it;
//! 2. a dedicated markup file (route `templateUrl`, or a file named after the
//!    component) that no other controller binds;
//! 3. markup synthesized from the detected directive facts;
//! 4. a stub that says the template is missing.

use anatomist::path_util::bare_stem;
use anatomist::Analysis;
use common::behavior::{BehaviorKind, LifecyclePhase};
use common::code::Class;
use common::migration::{Change, ChangeTag};
use common::roles::Role;
use common::NodeId;
use tracing::{debug, info};

use super::{class_body, note_lines, with_di_imports};
use crate::di::{resolve_tokens, DiResolution};
use crate::markup::{self, MigratedMarkup};
use crate::naming::ComponentNames;
use crate::writer::{ensure_import, register_in_app_module, write_if_changed};
use crate::{ForgeError, Rule, RuleContext};

pub struct ControllerRule;

impl Rule for ControllerRule {
    fn name(&self) -> &'static str {
        "controllers"
    }

    fn apply(&self, cx: &RuleContext<'_>) -> Result<Vec<Change>, ForgeError> {
        let mut changes = Vec::new();
        for id in cx.roles.with_role(Role::Controller) {
            let Some(class) = cx.analysis.class(id) else {
                continue;
            };
            if cx.roles.has(id, Role::TemplateBinding) {
                info!(class = %class.name, "template-coupled controller left for manual migration");
                continue;
            }
            changes.push(migrate_controller(cx, class)?);
        }
        Ok(changes)
    }
}

fn migrate_controller(cx: &RuleContext<'_>, class: &Class) -> Result<Change, ForgeError> {
    let names = ComponentNames::for_controller(&class.name);
    let di = resolve_tokens(&class.di_tokens, Some(&names.class));
    let hooks = lifecycle_hooks(cx.analysis, class);
    let (markup, markup_source) = resolve_markup(cx.analysis, class, &names)?;
    debug!(class = %class.name, source = %markup_source, "markup resolved");

    let ts_path = cx.out.app_file(&names.ts_file);
    write_if_changed(&ts_path, &render_component(class, &names, &di, &hooks))?;
    write_if_changed(&cx.out.app_file(&names.html_file), &markup.html)?;

    register_in_app_module(cx.out, "declarations", &names.class, &names.module_path())?;
    if markup.uses_forms {
        register_in_app_module(cx.out, "imports", "FormsModule", "@angular/forms")?;
    }

    Ok(Change::new(
        ChangeTag::Component,
        class.node.id.clone(),
        NodeId::synthetic("component", &names.class),
        format!(
            "Controller {} migrated to component {} (template: {})",
            class.name, names.class, markup_source
        ),
    )
    .in_file(cx.out.relative(&ts_path)))
}

/// Interface and method for each lifecycle phase, in first-registration order.
fn lifecycle_hooks(analysis: &Analysis, class: &Class) -> Vec<(&'static str, &'static str, &'static str)> {
    let mut hooks = Vec::new();
    for behavior in &analysis.behaviors {
        let BehaviorKind::LifecycleHook { phase, owner } = &behavior.kind else {
            continue;
        };
        if owner != &class.node.id {
            continue;
        }
        let hook = match phase {
            LifecyclePhase::Init => ("OnInit", "ngOnInit", "$onInit"),
            LifecyclePhase::Update => ("OnChanges", "ngOnChanges", "$onChanges"),
            LifecyclePhase::Destroy => ("OnDestroy", "ngOnDestroy", "$destroy"),
        };
        if !hooks.contains(&hook) {
            hooks.push(hook);
        }
    }
    hooks
}

fn render_component(
    class: &Class,
    names: &ComponentNames,
    di: &DiResolution,
    hooks: &[(&str, &str, &str)],
) -> String {
    let implements = if hooks.is_empty() {
        String::new()
    } else {
        let interfaces: Vec<&str> = hooks.iter().map(|(i, _, _)| *i).collect();
        format!(" implements {}", interfaces.join(", "))
    };
    let methods: Vec<(&str, &str)> = hooks.iter().map(|(_, m, h)| (*m, *h)).collect();
    let body = class_body(class, di, &methods);
    let body = if body.is_empty() { String::new() } else { format!("{}\n", body) };

    let text = format!(
        "import {{ Component }} from '@angular/core';\n\
         \n\
         {notes}@Component({{\n\
         \x20 selector: '{selector}',\n\
         \x20 templateUrl: './{html}'\n\
         }})\n\
         export class {class}{implements} {{\n\
         {body}}}\n",
        notes = note_lines(&di.notes),
        selector = names.selector,
        html = names.html_file,
        class = names.class,
    );
    let text = hooks
        .iter()
        .fold(text, |text, (interface, _, _)| ensure_import(&text, &[*interface], "@angular/core"));
    with_di_imports(text, di)
}

fn resolve_markup(
    analysis: &Analysis,
    class: &Class,
    names: &ComponentNames,
) -> Result<(MigratedMarkup, String), ForgeError> {
    let templates = analysis.templates_for(&class.name);

    let mut scoped_files: Vec<&str> = templates.iter().map(|t| t.file.as_str()).collect();
    scoped_files.dedup();
    for file in scoped_files {
        let Some(html) = analysis.markup.get(file) else {
            continue;
        };
        if let Some(fragment) = markup::extract_fragment(html, &class.name)? {
            let migrated = markup::migrate(&fragment.inner, fragment.alias.as_deref())?;
            return Ok((migrated, format!("scope fragment of {}", file)));
        }
    }

    if let Some(file) = dedicated_markup(analysis, class, names) {
        if let Some(html) = analysis.markup.get(file) {
            let migrated = markup::migrate(html, None)?;
            return Ok((migrated, format!("dedicated file {}", file)));
        }
    }

    if let Some(migrated) = markup::synthesize(&templates) {
        return Ok((migrated, "synthesized from directive facts".to_string()));
    }
    Ok((markup::stub(&names.class), "stub".to_string()))
}

/// A markup file that belongs to this controller alone.
fn dedicated_markup<'a>(analysis: &'a Analysis, class: &Class, names: &ComponentNames) -> Option<&'a str> {
    let bound_elsewhere = |file: &str| {
        analysis.templates.iter().any(|t| {
            t.file == file && t.controller.as_deref().is_some_and(|c| c != class.name)
        })
    };

    let from_routes = analysis
        .routes
        .iter()
        .filter(|r| r.controller.as_deref() == Some(class.name.as_str()))
        .filter_map(|r| r.template_url.as_deref())
        .find_map(|url| {
            let url = url.trim_start_matches("./").trim_start_matches('/');
            analysis
                .markup
                .keys()
                .find(|k| k.as_str() == url || k.ends_with(&format!("/{}", url)))
        });

    let by_name = || {
        analysis
            .markup
            .keys()
            .find(|k| bare_stem(k) == names.kebab)
    };

    from_routes
        .or_else(by_name)
        .map(String::as_str)
        .filter(|file| !bound_elsewhere(*file))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::fixtures::analysis_of;
    use crate::{scaffold, Output};
    use std::fs;

    const USER_CTRL: &str = r#"
angular.module('app').controller('UserController', ['$scope', '$state', '$location', 'AuthService', function ($scope, $state, $location, AuthService) {
  $scope.query = '';
  $scope.load = function () {};
  this.$onInit = function () {};
}]);
"#;

    fn run(files: &[(&str, &str)]) -> (tempfile::TempDir, tempfile::TempDir, Vec<Change>) {
        let (src, analysis, roles) = analysis_of(files);
        let out_dir = tempfile::tempdir().unwrap();
        let out = Output::new(out_dir.path());
        scaffold::ensure_project(&out, "app").unwrap();
        let cx = RuleContext {
            analysis: &analysis,
            roles: &roles,
            out: &out,
        };
        let changes = ControllerRule.apply(&cx).unwrap();
        (src, out_dir, changes)
    }

    #[test]
    fn test_component_from_scope_fragment() {
        let (_src, out, changes) = run(&[
            ("app/user.controller.js", USER_CTRL),
            (
                "index.html",
                r#"<html><body ng-app="app"><div ng-controller="UserController as vm"><input ng-model="vm.query"><button ng-click="vm.load()">Load</button></div></body></html>"#,
            ),
        ]);
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].tag, ChangeTag::Component);
        assert_eq!(changes[0].after_id.as_str(), "component:UserComponent");
        assert_eq!(changes[0].file.as_deref(), Some("src/app/user.component.ts"));
        assert!(changes[0].reason.contains("scope fragment of index.html"));

        let ts = fs::read_to_string(out.path().join("src/app/user.component.ts")).unwrap();
        assert!(ts.starts_with("import { Component, OnInit } from '@angular/core';\n"));
        assert!(ts.contains("import { Router } from '@angular/router';"));
        assert!(ts.contains("import { AuthService } from './auth.service';"));
        assert!(ts.contains("// TODO: $scope removed"));
        assert!(ts.contains("export class UserComponent implements OnInit {"));
        assert!(ts.contains("  query: any;"));
        assert!(ts.contains("constructor(private router: Router, private authService: AuthService) {}"));
        assert!(ts.contains("  ngOnInit(): void {"));
        assert!(ts.contains("// TODO: port UserController.load from app/user.controller.js"));
        assert!(!ts.contains("  load: any;"));

        let html = fs::read_to_string(out.path().join("src/app/user.component.html")).unwrap();
        assert!(html.contains(r#"[(ngModel)]="query""#));
        assert!(html.contains(r#"(click)="load()""#));
        assert!(!html.contains("ng-controller"));

        let module = fs::read_to_string(out.path().join("src/app/app.module.ts")).unwrap();
        assert!(module.contains("declarations: [AppComponent, UserComponent]"));
        assert!(module.contains("imports: [BrowserModule, FormsModule]"));
    }

    #[test]
    fn test_dedicated_file_then_stub() {
        let (_src, out, changes) = run(&[
            ("app/user.controller.js", USER_CTRL),
            (
                "app/orders.controller.js",
                "angular.module('app').controller('OrdersCtrl', function ($scope) { $scope.rows = []; });",
            ),
            ("views/user.html", r#"<ul><li ng-repeat="u in users">{{u.name}}</li></ul>"#),
        ]);
        assert_eq!(changes.len(), 2);
        let user = changes.iter().find(|c| c.after_id.as_str() == "component:UserComponent").unwrap();
        assert!(user.reason.contains("dedicated file views/user.html"));
        let html = fs::read_to_string(out.path().join("src/app/user.component.html")).unwrap();
        assert!(html.contains(r#"*ngFor="let u of users""#));

        let orders = changes.iter().find(|c| c.after_id.as_str() == "component:OrdersComponent").unwrap();
        assert!(orders.reason.ends_with("(template: stub)"));
        let stub = fs::read_to_string(out.path().join("src/app/orders.component.html")).unwrap();
        assert!(stub.contains("no template source found for OrdersComponent"));
    }

    #[test]
    fn test_template_coupled_controller_is_skipped() {
        let (_src, out, changes) = run(&[(
            "app/dyn.controller.js",
            "angular.module('app').controller('DynController', function ($scope, $compile) { var child = $scope.$new(); $compile('<div>')(child); });",
        )]);
        assert!(changes.is_empty());
        assert!(!out.path().join("src/app/dyn.component.ts").exists());
    }

    #[test]
    fn test_rerun_is_byte_stable() {
        let files = [("app/user.controller.js", USER_CTRL)];
        let (_src, analysis, roles) = analysis_of(&files);
        let out_dir = tempfile::tempdir().unwrap();
        let out = Output::new(out_dir.path());
        scaffold::ensure_project(&out, "app").unwrap();
        let cx = RuleContext {
            analysis: &analysis,
            roles: &roles,
            out: &out,
        };
        ControllerRule.apply(&cx).unwrap();
        let ts = fs::read_to_string(out.app_file("user.component.ts")).unwrap();
        let module = fs::read_to_string(out.app_module()).unwrap();
        ControllerRule.apply(&cx).unwrap();
        assert_eq!(fs::read_to_string(out.app_file("user.component.ts")).unwrap(), ts);
        assert_eq!(fs::read_to_string(out.app_module()).unwrap(), module);
    }
}
