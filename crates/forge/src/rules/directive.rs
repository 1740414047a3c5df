//! Directives → manual-migration stubs.
//!
//! No directive is converted mechanically. Each one gets a `@Directive` stub
//! carrying its isolate-scope bindings as inputs/outputs and a TODO per
//! construct that needs a hand-written replacement. Stubs are not declared in
//! the root module until someone finishes them.

use common::code::{Class, ClassFlags};
use common::migration::{Change, ChangeTag};
use common::roles::Role;
use common::NodeId;

use super::{note_lines, with_di_imports};
use crate::di::resolve_tokens;
use crate::naming::{kebab, pascal};
use crate::writer::{ensure_import, write_if_changed};
use crate::{ForgeError, Rule, RuleContext};

pub struct DirectiveStubRule;

impl Rule for DirectiveStubRule {
    fn name(&self) -> &'static str {
        "directives"
    }

    fn apply(&self, cx: &RuleContext<'_>) -> Result<Vec<Change>, ForgeError> {
        let mut changes = Vec::new();
        for id in cx.roles.with_role(Role::Directive) {
            let Some(class) = cx.analysis.class(id) else {
                continue;
            };
            let stub_class = format!("{}Directive", pascal(&class.name));
            let path = cx.out.app_file(&format!("{}.directive.ts", kebab(&class.name)));
            write_if_changed(&path, &render_stub(class, &stub_class))?;
            changes.push(
                Change::new(
                    ChangeTag::DirectiveStub,
                    class.node.id.clone(),
                    NodeId::synthetic("directive", &stub_class),
                    format!(
                        "Directive {} emitted as manual-migration stub {}",
                        class.name, stub_class
                    ),
                )
                .in_file(cx.out.relative(&path)),
            );
        }
        Ok(changes)
    }
}

fn construct_notes(class: &Class) -> Vec<String> {
    let mut notes = vec![format!(
        "{} has no deterministic mapping; finish this stub, then declare it in AppModule",
        class.name
    )];
    if class.node.metadata.get("restrict").is_some_and(|r| r.contains('E')) {
        notes.push(format!(
            "element directive; consider a component with selector 'app-{}'",
            kebab(&class.name)
        ));
    }
    if class.flags.contains(ClassFlags::COMPILE_FN) {
        notes.push("compile function has no equivalent; restructure the template".to_string());
    }
    if class.flags.contains(ClassFlags::LINK) {
        notes.push("port the link function to ngOnInit, @HostListener and ElementRef".to_string());
    }
    if class.flags.contains(ClassFlags::TRANSCLUDE) {
        notes.push("transclusion: use <ng-content> in a component".to_string());
    }
    if class.flags.contains(ClassFlags::DYNAMIC_COMPILE) {
        notes.push("$compile usage: use ViewContainerRef and dynamic components".to_string());
    }
    notes
}

fn render_stub(class: &Class, stub_class: &str) -> String {
    let di = resolve_tokens(&class.di_tokens, None);
    let mut core = vec!["Directive"];
    let mut members: Vec<String> = Vec::new();
    for field in &class.fields {
        match field.type_hint.as_deref() {
            Some("&") => {
                members.push(format!("  @Output() {} = new EventEmitter<any>();", field.name));
                core.extend(["EventEmitter", "Output"]);
            }
            Some("=") => {
                members.push(format!(
                    "  @Input() {}: any; // TODO: two-way binding; pair with a {}Change output",
                    field.name, field.name
                ));
                core.push("Input");
            }
            _ => {
                members.push(format!("  @Input() {}: any;", field.name));
                core.push("Input");
            }
        }
    }
    let mut body = members.join("\n");
    if let Some(ctor) = di.constructor() {
        if !body.is_empty() {
            body.push_str("\n\n");
        }
        body.push_str(&format!("  {}", ctor));
    }
    let body = if body.is_empty() { body } else { format!("{}\n", body) };

    let mut notes = construct_notes(class);
    notes.extend(di.notes.iter().cloned());
    let text = format!(
        "import {{ Directive }} from '@angular/core';\n\
         \n\
         {}@Directive({{\n\
         \x20 selector: '[app{}]'\n\
         }})\n\
         export class {} {{\n\
         {}}}\n",
        note_lines(&notes),
        pascal(&class.name),
        stub_class,
        body
    );
    let text = ensure_import(&text, &core, "@angular/core");
    with_di_imports(text, &di)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::fixtures::analysis_of;
    use crate::Output;
    use std::fs;

    #[test]
    fn test_directive_stub_with_bindings_and_notes() {
        let (_src, analysis, roles) = analysis_of(&[(
            "app/panel.directive.js",
            r#"angular.module('app').directive('myPanel', ['$element', function ($element) {
  return {
    restrict: 'E',
    transclude: true,
    scope: { model: '=', title: '@', onClose: '&' },
    link: function (scope, el) {}
  };
}]);"#,
        )]);
        let dir = tempfile::tempdir().unwrap();
        let out = Output::new(dir.path());
        let cx = RuleContext {
            analysis: &analysis,
            roles: &roles,
            out: &out,
        };
        let changes = DirectiveStubRule.apply(&cx).unwrap();
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].tag, ChangeTag::DirectiveStub);
        assert_eq!(changes[0].file.as_deref(), Some("src/app/my-panel.directive.ts"));

        let ts = fs::read_to_string(out.app_file("my-panel.directive.ts")).unwrap();
        assert!(ts.starts_with(
            "import { Directive, Input, EventEmitter, Output, ElementRef } from '@angular/core';\n"
        ));
        assert!(ts.contains("selector: '[appMyPanel]'"));
        assert!(ts.contains("@Input() model: any; // TODO: two-way binding"));
        assert!(ts.contains("  @Input() title: any;\n"));
        assert!(ts.contains("@Output() onClose = new EventEmitter<any>();"));
        assert!(ts.contains("constructor(private el: ElementRef) {}"));
        assert!(ts.contains("// TODO: element directive"));
        assert!(ts.contains("// TODO: transclusion"));
        assert!(ts.contains("// TODO: port the link function"));

        assert!(!out.app_module().exists());
    }
}
