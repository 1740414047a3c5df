//! Shallow observers → `BehaviorSubject` fields.

use common::migration::{Change, ChangeTag};
use common::roles::Role;
use common::NodeId;

use super::owner_target;
use crate::naming::stream_field;
use crate::writer::{edit_file, ensure_import, inject_member};
use crate::{ForgeError, Rule, RuleContext};

pub struct WatchRule;

impl Rule for WatchRule {
    fn name(&self) -> &'static str {
        "watch"
    }

    fn apply(&self, cx: &RuleContext<'_>) -> Result<Vec<Change>, ForgeError> {
        let mut changes = Vec::new();
        for id in cx.roles.with_role(Role::ShallowWatch) {
            let Some(class) = cx.analysis.class(id) else {
                continue;
            };
            let source = class.node.file().unwrap_or_default();
            let target = owner_target(cx.out, Some(class), source)?;
            let alias = cx
                .analysis
                .templates_for(&class.name)
                .into_iter()
                .find_map(|t| t.alias.as_deref());

            let mut fields: Vec<(String, &str)> = Vec::new();
            for expr in &class.watched {
                let field = stream_field(expr, alias);
                if !fields.iter().any(|(f, _)| *f == field) {
                    fields.push((field, expr.as_str()));
                }
            }
            if fields.is_empty() {
                continue;
            }

            edit_file(&target.path, |text| {
                let text = ensure_import(text, &["BehaviorSubject"], "rxjs");
                fields.iter().fold(text, |text, (field, expr)| {
                    let member = format!(
                        "  {} = new BehaviorSubject<any>(null); // was $watch('{}')",
                        field,
                        expr.replace('\n', " ")
                    );
                    inject_member(&text, &format!("  {} = new BehaviorSubject", field), &member)
                })
            })?;

            let names: Vec<&str> = fields.iter().map(|(f, _)| f.as_str()).collect();
            let file = cx.out.relative(&target.path);
            changes.push(
                Change::new(
                    ChangeTag::WatchStream,
                    class.node.id.clone(),
                    NodeId::synthetic("stream", &format!("{}#{}", target.class, names.join(","))),
                    format!(
                        "Shallow watches of {} migrated to BehaviorSubject fields: {}",
                        class.name,
                        names.join(", ")
                    ),
                )
                .in_file(file),
            );
        }
        Ok(changes)
    }
}
