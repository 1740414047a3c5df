//! Service, factory and provider → root-provided injectable.

use common::code::Class;
use common::migration::{Change, ChangeTag};
use common::roles::Role;
use common::NodeId;

use super::{class_body, note_lines, with_di_imports};
use crate::di::resolve_tokens;
use crate::naming::ServiceNames;
use crate::writer::write_if_changed;
use crate::{ForgeError, Rule, RuleContext};

pub struct ServiceRule;

impl Rule for ServiceRule {
    fn name(&self) -> &'static str {
        "services"
    }

    fn apply(&self, cx: &RuleContext<'_>) -> Result<Vec<Change>, ForgeError> {
        let mut changes = Vec::new();
        for id in cx.roles.with_role(Role::Service) {
            let Some(class) = cx.analysis.class(id) else {
                continue;
            };
            let names = ServiceNames::for_service(&class.name);
            let path = cx.out.app_file(&names.file);
            write_if_changed(&path, &render_service(class, &names))?;
            changes.push(
                Change::new(
                    ChangeTag::Injectable,
                    class.node.id.clone(),
                    NodeId::synthetic("injectable", &names.class),
                    format!(
                        "{} {} migrated to injectable {}",
                        class.kind.as_str(),
                        class.name,
                        names.class
                    ),
                )
                .in_file(cx.out.relative(&path)),
            );
        }
        Ok(changes)
    }
}

fn render_service(class: &Class, names: &ServiceNames) -> String {
    let di = resolve_tokens(&class.di_tokens, Some(&names.class));
    let body = class_body(class, &di, &[]);
    let body = if body.is_empty() { String::new() } else { format!("{}\n", body) };
    let text = format!(
        "import {{ Injectable }} from '@angular/core';\n\
         \n\
         {}@Injectable({{ providedIn: 'root' }})\n\
         export class {} {{\n\
         {}}}\n",
        note_lines(&di.notes),
        names.class,
        body
    );
    with_di_imports(text, &di)
}
