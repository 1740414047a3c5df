//! Minimal target project skeleton.
//!
//! Every file is created only when absent, so hand edits and rule injections
//! into `app.module.ts` survive later runs.

use std::path::PathBuf;

use common::migration::{Change, ChangeTag};
use common::NodeId;
use tracing::info;

use crate::naming::kebab;
use crate::writer::{write_if_absent, Output};
use crate::{ForgeError, Rule, RuleContext};

fn angular_json(project: &str) -> String {
    format!(
        r#"{{
  "$schema": "./node_modules/@angular/cli/lib/config/schema.json",
  "version": 1,
  "newProjectRoot": "projects",
  "projects": {{
    "{project}": {{
      "projectType": "application",
      "root": "",
      "sourceRoot": "src",
      "prefix": "app",
      "architect": {{
        "build": {{
          "builder": "@angular-devkit/build-angular:browser",
          "options": {{
            "outputPath": "dist/{project}",
            "index": "src/index.html",
            "main": "src/main.ts",
            "tsConfig": "tsconfig.app.json"
          }}
        }}
      }}
    }}
  }}
}}
"#
    )
}

const MAIN_TS: &str = "import { platformBrowserDynamic } from '@angular/platform-browser-dynamic';
import { AppModule } from './app/app.module';

platformBrowserDynamic()
  .bootstrapModule(AppModule)
  .catch(err => console.error(err));
";

fn index_html(project: &str) -> String {
    format!(
        r#"<!doctype html>
<html lang="en">
<head>
  <meta charset="utf-8">
  <title>{project}</title>
  <base href="/">
  <meta name="viewport" content="width=device-width, initial-scale=1">
</head>
<body>
  <app-root></app-root>
</body>
</html>
"#
    )
}

const APP_MODULE_TS: &str = "import { NgModule } from '@angular/core';
import { BrowserModule } from '@angular/platform-browser';
import { AppComponent } from './app.component';

@NgModule({
  declarations: [AppComponent],
  imports: [BrowserModule],
  providers: [],
  bootstrap: [AppComponent]
})
export class AppModule {}
";

const APP_COMPONENT_TS: &str = "import { Component } from '@angular/core';

@Component({
  selector: 'app-root',
  template: '<router-outlet></router-outlet>'
})
export class AppComponent {}
";

/// Creates the skeleton files that are missing; returns the created paths.
pub fn ensure_project(out: &Output, project: &str) -> Result<Vec<PathBuf>, ForgeError> {
    let files = [
        (out.root().join("angular.json"), angular_json(project)),
        (out.src_dir().join("main.ts"), MAIN_TS.to_string()),
        (out.src_dir().join("index.html"), index_html(project)),
        (out.app_module(), APP_MODULE_TS.to_string()),
        (out.app_file("app.component.ts"), APP_COMPONENT_TS.to_string()),
    ];
    let mut created = Vec::new();
    for (path, contents) in files {
        if write_if_absent(&path, &contents)? {
            created.push(path);
        }
    }
    Ok(created)
}

/// Always first in the engine; later rules patch `app.module.ts`.
pub struct ScaffoldRule;

impl Rule for ScaffoldRule {
    fn name(&self) -> &'static str {
        "scaffold"
    }

    fn apply(&self, cx: &RuleContext<'_>) -> Result<Vec<Change>, ForgeError> {
        let project = cx
            .analysis
            .root
            .file_name()
            .map(|n| kebab(&n.to_string_lossy()))
            .filter(|n| !n.is_empty())
            .unwrap_or_else(|| "migrated-app".to_string());
        let created = ensure_project(cx.out, &project)?;
        info!(project = %project, created = created.len(), "project scaffold ensured");

        let reason = if created.is_empty() {
            "Angular project skeleton already present".to_string()
        } else {
            let names: Vec<String> = created.iter().map(|p| cx.out.relative(p)).collect();
            format!("Angular project skeleton created: {}", names.join(", "))
        };
        Ok(vec![Change::new(
            ChangeTag::Scaffold,
            NodeId::synthetic("project", "legacy"),
            NodeId::synthetic("project", &project),
            reason,
        )
        .in_file("angular.json")])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scaffold_creates_once_and_keeps_edits() {
        let dir = tempfile::tempdir().unwrap();
        let out = Output::new(dir.path());
        let created = ensure_project(&out, "legacy-app").unwrap();
        assert_eq!(created.len(), 5);
        let json = std::fs::read_to_string(dir.path().join("angular.json")).unwrap();
        assert!(json.contains("\"legacy-app\""));

        std::fs::write(out.app_module(), "// edited").unwrap();
        assert!(ensure_project(&out, "legacy-app").unwrap().is_empty());
        assert_eq!(std::fs::read_to_string(out.app_module()).unwrap(), "// edited");
    }
}
