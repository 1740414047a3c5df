//! Ordered rule engine.
//!
//! The rule order is fixed and part of the contract: scaffold first (later
//! rules patch the root module), then controllers, services, HTTP calls,
//! watches, routes and directive stubs. A selection narrows the list without
//! reordering it.

use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::str::FromStr;

use common::migration::{Change, RuleFailure};
use common::{IdAllocator, NodeId};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::rules::{
    ControllerRule, DirectiveStubRule, HttpRule, RoutesRule, ServiceRule, WatchRule,
};
use crate::scaffold::ScaffoldRule;
use crate::{Rule, RuleContext};

/// Selectable rule families (the scaffold is not selectable; it always runs).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleKind {
    Controllers,
    Services,
    Http,
    Watch,
    Routes,
    Directives,
}

impl RuleKind {
    pub const ALL: [RuleKind; 6] = [
        RuleKind::Controllers,
        RuleKind::Services,
        RuleKind::Http,
        RuleKind::Watch,
        RuleKind::Routes,
        RuleKind::Directives,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            RuleKind::Controllers => "controllers",
            RuleKind::Services => "services",
            RuleKind::Http => "http",
            RuleKind::Watch => "watch",
            RuleKind::Routes => "routes",
            RuleKind::Directives => "directives",
        }
    }

    fn rule(&self) -> Box<dyn Rule> {
        match self {
            RuleKind::Controllers => Box::new(ControllerRule),
            RuleKind::Services => Box::new(ServiceRule),
            RuleKind::Http => Box::new(HttpRule),
            RuleKind::Watch => Box::new(WatchRule),
            RuleKind::Routes => Box::new(RoutesRule),
            RuleKind::Directives => Box::new(DirectiveStubRule),
        }
    }
}

impl fmt::Display for RuleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RuleKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        RuleKind::ALL
            .into_iter()
            .find(|k| k.as_str() == s.trim().to_ascii_lowercase())
            .ok_or_else(|| {
                format!(
                    "unknown rule '{}' (expected one of: controllers, services, http, watch, routes, directives)",
                    s
                )
            })
    }
}

/// Output of one engine run.
#[derive(Debug, Default)]
pub struct Transformation {
    /// All changes in rule order, ids assigned (`chg-0001`, ...).
    pub changes: Vec<Change>,
    pub failures: Vec<RuleFailure>,
}

impl Transformation {
    pub fn change(&self, id: &NodeId) -> Option<&Change> {
        self.changes.iter().find(|c| &c.id == id)
    }
}

pub struct Engine {
    rules: Vec<Box<dyn Rule>>,
}

impl Engine {
    /// Scaffold plus every rule family.
    pub fn standard() -> Self {
        Self::selected(&RuleKind::ALL)
    }

    /// Scaffold plus the selected families, in their fixed relative order.
    pub fn selected(kinds: &[RuleKind]) -> Self {
        let mut rules: Vec<Box<dyn Rule>> = vec![Box::new(ScaffoldRule)];
        rules.extend(
            RuleKind::ALL
                .into_iter()
                .filter(|k| kinds.contains(k))
                .map(|k| k.rule()),
        );
        Self { rules }
    }

    /// Custom rule list, used as-is.
    pub fn from_rules(rules: Vec<Box<dyn Rule>>) -> Self {
        Self { rules }
    }

    pub fn rule_names(&self) -> Vec<&'static str> {
        self.rules.iter().map(|r| r.name()).collect()
    }

    /// Runs every rule in order. A failing rule is logged and recorded; its
    /// siblings still run.
    pub fn run(&self, cx: &RuleContext<'_>) -> Transformation {
        let mut result = Transformation::default();
        let mut ids = IdAllocator::new();

        for rule in &self.rules {
            let outcome = catch_unwind(AssertUnwindSafe(|| rule.apply(cx)));
            let failure = match outcome {
                Ok(Ok(changes)) => {
                    info!(rule = rule.name(), changes = changes.len(), "rule applied");
                    for mut change in changes {
                        change.id = ids.next("chg");
                        result.changes.push(change);
                    }
                    continue;
                }
                Ok(Err(e)) => RuleFailure::new(rule.name(), e.to_string()),
                Err(panic) => RuleFailure::from_panic(rule.name(), panic.as_ref()),
            };
            warn!(rule = rule.name(), error = %failure.message, "rule failed, skipping");
            result.failures.push(failure);
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ForgeError, Output};
    use anatomist::Analysis;
    use common::migration::ChangeTag;
    use common::roles::PatternRoles;

    struct Emit(&'static str);

    impl Rule for Emit {
        fn name(&self) -> &'static str {
            self.0
        }

        fn apply(&self, _cx: &RuleContext<'_>) -> Result<Vec<Change>, ForgeError> {
            Ok(vec![Change::new(
                ChangeTag::Component,
                NodeId::new(self.0),
                NodeId::synthetic("out", self.0),
                "emitted",
            )])
        }
    }

    struct Fails;

    impl Rule for Fails {
        fn name(&self) -> &'static str {
            "fails"
        }

        fn apply(&self, _cx: &RuleContext<'_>) -> Result<Vec<Change>, ForgeError> {
            Err(ForgeError::Markup("boom".into()))
        }
    }

    struct Panics;

    impl Rule for Panics {
        fn name(&self) -> &'static str {
            "panics"
        }

        fn apply(&self, _cx: &RuleContext<'_>) -> Result<Vec<Change>, ForgeError> {
            panic!("rule exploded")
        }
    }

    #[test]
    fn test_failing_rules_do_not_abort_siblings() {
        let dir = tempfile::tempdir().unwrap();
        let analysis = Analysis::default();
        let roles = PatternRoles::new();
        let out = Output::new(dir.path());
        let cx = RuleContext {
            analysis: &analysis,
            roles: &roles,
            out: &out,
        };
        let engine = Engine::from_rules(vec![
            Box::new(Emit("a")),
            Box::new(Fails),
            Box::new(Panics),
            Box::new(Emit("b")),
        ]);
        let result = engine.run(&cx);
        assert_eq!(result.changes.len(), 2);
        assert_eq!(result.changes[0].id.as_str(), "chg-0001");
        assert_eq!(result.changes[1].before_id.as_str(), "b");
        assert_eq!(result.failures.len(), 2);
        assert_eq!(result.failures[0].rule, "fails");
        assert!(result.failures[1].message.contains("rule exploded"));
    }

    fn snapshot(root: &std::path::Path) -> Vec<(String, String)> {
        let mut files: Vec<(String, String)> = walkdir::WalkDir::new(root)
            .sort_by_file_name()
            .into_iter()
            .filter_map(Result::ok)
            .filter(|e| e.file_type().is_file())
            .map(|e| {
                (
                    e.path().strip_prefix(root).unwrap().to_string_lossy().into_owned(),
                    std::fs::read_to_string(e.path()).unwrap(),
                )
            })
            .collect();
        files.sort();
        files
    }

    #[test]
    fn test_standard_engine_converges_on_rerun() {
        let (_src, analysis, roles) = crate::rules::fixtures::analysis_of(&[
            (
                "app/user.controller.js",
                r#"angular.module('app').controller('UserController', function ($scope, $http, $q) {
  $scope.query = '';
  $scope.$watch('query', function () {});
  $http.get('/api/users').then(function (r) { $scope.users = r.data; });
  var d = $q.defer();
});"#,
            ),
            (
                "app/auth.service.js",
                "angular.module('app').service('AuthService', function () { this.login = function () {}; });",
            ),
            (
                "app/routes.js",
                "angular.module('app').config(function ($routeProvider) { $routeProvider.when('/users', { controller: 'UserController', resolve: { auth: function () {} } }); });",
            ),
            (
                "index.html",
                r#"<div ng-controller="UserController"><input ng-model="query"><li ng-repeat="u in users">{{u.name}}</li></div>"#,
            ),
        ]);
        let dir = tempfile::tempdir().unwrap();
        let out = Output::new(dir.path());
        let cx = RuleContext {
            analysis: &analysis,
            roles: &roles,
            out: &out,
        };
        let engine = Engine::standard();
        let first = engine.run(&cx);
        assert!(first.failures.is_empty(), "{:?}", first.failures);
        let files = snapshot(dir.path());
        let second = engine.run(&cx);
        assert_eq!(snapshot(dir.path()), files);
        assert_eq!(first.changes.len(), second.changes.len());

        let component = &files
            .iter()
            .find(|(p, _)| p.ends_with("user.component.ts"))
            .unwrap()
            .1;
        assert_eq!(component.matches("getApiUsers(").count(), 1);
        assert_eq!(component.matches("query$ = new BehaviorSubject").count(), 1);
        assert_eq!(component.matches("migrateDeferred(").count(), 1);
        let module = &files.iter().find(|(p, _)| p.ends_with("app.module.ts")).unwrap().1;
        assert_eq!(module.matches("HttpClientModule").count(), 2);
        assert_eq!(module.matches("AppRoutingModule").count(), 2);
    }

    #[test]
    fn test_selection_keeps_fixed_order() {
        let engine = Engine::selected(&[RuleKind::Routes, RuleKind::Controllers]);
        assert_eq!(engine.rule_names(), vec!["scaffold", "controllers", "routes"]);
        assert_eq!(
            Engine::standard().rule_names(),
            vec!["scaffold", "controllers", "services", "http", "watch", "routes", "directives"]
        );
        assert_eq!("HTTP".parse::<RuleKind>().unwrap(), RuleKind::Http);
        assert!("bogus".parse::<RuleKind>().is_err());
    }
}
