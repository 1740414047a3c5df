//! End-to-end runs over small legacy repositories.

use std::fs;
use std::path::{Path, PathBuf};

use common::migration::{ChangeTag, RiskLevel};
use shadow::{hash_tree, FileAction, ProgressLog, RunState};
use tempfile::TempDir;

use crate::{migrate, AcceptAll, MigrationConfig, Report, Stage, StageController, Validator, Verdict};

const USER_CONTROLLER: &str = r#"angular.module('app').controller('UserController', ['$scope', '$http', function ($scope, $http) {
  $scope.query = '';
  $scope.$watch('query', function (value) { $scope.filtered = value; });
  $http.get('/api/users').then(function (res) { $scope.users = res.data; });
}]);
"#;

const AUTH_SERVICE: &str = r#"angular.module('app').service('AuthService', function () {
  this.login = function () { return true; };
});
"#;

struct Repo {
    _dir: TempDir,
    source: PathBuf,
    out: PathBuf,
}

impl Repo {
    fn new(files: &[(&str, &str)]) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("legacy");
        for (rel, text) in files {
            let path = source.join(rel);
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(path, text).unwrap();
        }
        let out = dir.path().join("angular-app");
        Self {
            _dir: dir,
            source,
            out,
        }
    }

    fn config(&self) -> MigrationConfig {
        MigrationConfig::new(&self.source, &self.out)
    }

    fn read(&self, rel: &str) -> String {
        fs::read_to_string(self.out.join(rel)).unwrap_or_else(|e| panic!("{}: {}", rel, e))
    }
}

fn record<'a>(report: &'a Report, tag: ChangeTag, subject: &str) -> &'a crate::ChangeRecord {
    report
        .changes
        .iter()
        .find(|c| c.tag == tag && c.subject == subject)
        .unwrap_or_else(|| panic!("no {:?} change for {} in {:#?}", tag, subject, report.changes))
}

struct Rejects;

impl Validator for Rejects {
    fn name(&self) -> &str {
        "rejects"
    }

    fn validate(&self, _workspace: &Path, _report: &Report) -> anyhow::Result<Verdict> {
        Ok(Verdict::fail(vec!["snapshot mismatch".to_string()]))
    }
}

struct Explodes;

impl Validator for Explodes {
    fn name(&self) -> &str {
        "explodes"
    }

    fn validate(&self, _workspace: &Path, _report: &Report) -> anyhow::Result<Verdict> {
        panic!("validator crashed")
    }
}

#[test]
fn test_user_controller_and_auth_service_scenario() {
    let repo = Repo::new(&[
        ("app/user.controller.js", USER_CONTROLLER),
        ("app/auth.service.js", AUTH_SERVICE),
    ]);
    let outcome = migrate(&repo.config(), &AcceptAll).unwrap();
    assert_eq!(outcome.state, Some(RunState::Committed));

    let component = repo.read("src/app/user.component.ts");
    assert!(component.contains("export class UserComponent"));
    assert!(component.contains("query$ = new BehaviorSubject<any>(null);"));
    assert!(component.contains("getApiUsers(): Observable<any>"));
    assert!(repo.out.join("src/app/user.component.html").exists());
    assert!(repo.read("src/app/auth.service.ts").contains("export class AuthService"));

    let report = &outcome.report;
    assert_eq!(record(report, ChangeTag::Component, "UserController").risk_level, RiskLevel::Safe);
    let http = record(report, ChangeTag::Http, "UserController");
    assert_eq!(http.risk_level, RiskLevel::Safe);
    assert_eq!(http.file.as_deref(), Some("src/app/user.component.ts"));
    assert_eq!(record(report, ChangeTag::Injectable, "AuthService").risk_level, RiskLevel::Safe);
    assert!(!report.changes.iter().any(|c| c.tag == ChangeTag::DirectiveStub));
    assert_eq!(report.run.risk_totals.manual, 0);

    let state_dir = repo.source.join(".transmute");
    assert!(state_dir.join("report.json").exists());
    assert!(state_dir.join("report.md").exists());
    assert!(state_dir.join("progress.json").exists());
}

#[test]
fn test_second_run_converges() {
    let repo = Repo::new(&[
        ("app/user.controller.js", USER_CONTROLLER),
        ("app/auth.service.js", AUTH_SERVICE),
        (
            "index.html",
            r#"<div ng-controller="UserController"><input ng-model="query"><li ng-repeat="u in users">{{u.name}}</li></div>"#,
        ),
    ]);
    let first = migrate(&repo.config(), &AcceptAll).unwrap();
    let after_first = hash_tree(&repo.out).unwrap();
    let second = migrate(&repo.config(), &AcceptAll).unwrap();

    assert_eq!(hash_tree(&repo.out).unwrap(), after_first);
    assert_eq!(first.report.changes, second.report.changes);
    assert_eq!(second.report.run.diff.created, 0);
    assert_eq!(second.report.run.diff.updated, 0);

    let log = ProgressLog::load(second.progress_path.as_deref().unwrap()).unwrap();
    assert!(log.entries.iter().all(|e| e.action == FileAction::Unchanged));

    let component = repo.read("src/app/user.component.ts");
    assert_eq!(component.matches("getApiUsers(").count(), 1);
    assert_eq!(component.matches("import { BehaviorSubject }").count(), 1);

    // Seeding the workspace with the converged output changes nothing either.
    let mut incremental = repo.config();
    incremental.incremental = true;
    migrate(&incremental, &AcceptAll).unwrap();
    assert_eq!(hash_tree(&repo.out).unwrap(), after_first);
}

#[test]
fn test_failed_validation_and_panic_leave_output_untouched() {
    let repo = Repo::new(&[("app/user.controller.js", USER_CONTROLLER)]);
    fs::create_dir_all(repo.out.join("src")).unwrap();
    fs::write(repo.out.join("src/handwritten.ts"), "export const keep = 1;\n").unwrap();
    let before = hash_tree(&repo.out).unwrap();

    let rejected = migrate(&repo.config(), &Rejects).unwrap();
    assert_eq!(rejected.state, Some(RunState::Discarded));
    assert!(!rejected.succeeded());
    assert_eq!(hash_tree(&repo.out).unwrap(), before);
    let verdict = rejected.report.run.validation.as_ref().unwrap();
    assert_eq!(verdict.failures, vec!["snapshot mismatch".to_string()]);
    assert!(!rejected.report.changes.is_empty());
    let log = ProgressLog::load(rejected.progress_path.as_deref().unwrap()).unwrap();
    assert!(log.entries.iter().all(|e| e.rolled_back));

    let crashed = migrate(&repo.config(), &Explodes).unwrap();
    assert_eq!(crashed.state, Some(RunState::Discarded));
    assert!(crashed.report.run.error.as_deref().unwrap().contains("validator crashed"));
    assert_eq!(hash_tree(&repo.out).unwrap(), before);

    let markdown = fs::read_to_string(repo.source.join(".transmute/report.md")).unwrap();
    assert!(markdown.contains("- Run: **discarded**"));
}

#[test]
fn test_deep_watch_and_directive_are_manual() {
    let repo = Repo::new(&[
        (
            "app/deep.controller.js",
            "angular.module('app').controller('DeepController', function ($scope) { $scope.$watch('model', function () {}, true); });",
        ),
        (
            "app/panel.directive.js",
            "angular.module('app').directive('myPanel', function () { return { transclude: true, link: function () {} }; });",
        ),
        (
            "app/legacy.service.js",
            "angular.module('app').factory('LegacyFactory', function ($q) { return { later: function () { var d = $q.defer(); return d.promise; } }; });",
        ),
    ]);
    let report = migrate(&repo.config(), &AcceptAll).unwrap().report;

    let deep = record(&report, ChangeTag::Component, "DeepController");
    assert_eq!(deep.risk_level, RiskLevel::Manual);
    assert!(deep.risk_reason.contains("Deep $watch"));
    let panel = record(&report, ChangeTag::DirectiveStub, "myPanel");
    assert_eq!(panel.risk_level, RiskLevel::Manual);
    let deferred = report
        .changes
        .iter()
        .find(|c| c.tag == ChangeTag::DeferredPromise)
        .unwrap();
    assert_eq!(deferred.risk_level, RiskLevel::Manual);
    assert!(repo.out.join("src/app/my-panel.directive.ts").exists());
}

#[test]
fn test_constructor_order_and_nested_fragment() {
    let repo = Repo::new(&[
        (
            "app/report.controller.js",
            r#"angular.module('app').controller('ReportController', ['$state', '$location', 'ReportService', function ($state, $location, ReportService) {
  this.title = 'Reports';
}]);"#,
        ),
        (
            "index.html",
            r#"<body>
<div ng-controller="ReportController">
  <div class="outer"><div class="inner">Totals</div></div>
  <p>Footer</p>
</div>
<div>After</div>
</body>"#,
        ),
    ]);
    migrate(&repo.config(), &AcceptAll).unwrap();

    let component = repo.read("src/app/report.component.ts");
    assert!(
        component.contains("constructor(private router: Router, private reportService: ReportService) {}"),
        "{}",
        component
    );
    let html = repo.read("src/app/report.component.html");
    assert!(html.contains(r#"<div class="outer"><div class="inner">Totals</div></div>"#));
    assert!(html.contains("<p>Footer</p>"));
    assert!(!html.contains("After"));
}

#[test]
fn test_stage_controller_limits_the_run() {
    let repo = Repo::new(&[("app/user.controller.js", USER_CONTROLLER)]);

    let mut analysis_only = repo.config();
    analysis_only.stages = StageController::until(Stage::Patterns);
    let outcome = migrate(&analysis_only, &AcceptAll).unwrap();
    assert_eq!(outcome.state, None);
    assert!(outcome.report.changes.is_empty());
    assert_eq!(outcome.report.run.classes, 1);
    assert!(!repo.out.exists());
    assert!(outcome.report_paths.is_empty());

    let mut dry = repo.config();
    dry.dry_run = true;
    let preview = migrate(&dry, &Rejects).unwrap();
    assert_eq!(preview.state, Some(RunState::Discarded));

    let mut dry_unvalidated = repo.config();
    dry_unvalidated.dry_run = true;
    dry_unvalidated.stages = StageController::until(Stage::Risk);
    let preview = migrate(&dry_unvalidated, &Rejects).unwrap();
    assert_eq!(preview.state, Some(RunState::Previewed));
    assert!(preview.report.run.diff.created > 0);
    assert!(!repo.out.exists());
}

#[test]
fn test_missing_source_root_discards_with_report_and_log() {
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("out");
    let state = dir.path().join("state");
    let mut config = MigrationConfig::new(dir.path().join("nope"), &out);
    config.state_dir = Some(state.clone());

    let outcome = migrate(&config, &AcceptAll).unwrap();
    assert_eq!(outcome.state, Some(RunState::Discarded));
    assert!(!outcome.succeeded());
    let error = outcome.report.run.error.as_deref().unwrap();
    assert!(error.contains("scanning"), "{}", error);
    assert_eq!(error.matches("(os error").count(), 1, "{}", error);
    assert!(outcome.report.changes.is_empty());
    assert!(!out.exists());

    let log = ProgressLog::load(&state.join("progress.json")).unwrap();
    assert!(log.entries.is_empty());
    assert!(state.join("report.json").exists());
    assert!(fs::read_to_string(state.join("report.md")).unwrap().contains("- Run: **discarded**"));

    // Without the transformation stage the failure still lands in the report.
    config.stages = StageController::until(Stage::Patterns);
    let outcome = migrate(&config, &AcceptAll).unwrap();
    assert_eq!(outcome.state, None);
    assert!(!outcome.succeeded());
    assert!(outcome.report.run.error.as_deref().unwrap().starts_with("analysis error"));
}
