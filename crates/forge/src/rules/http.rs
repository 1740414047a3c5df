//! HTTP calls → `HttpClient` methods on the owning class's generated file.
//!
//! One method per `(verb, url)` signature; the method name doubles as the
//! membership marker, so a second call with the same signature is a no-op.
//! Deferred promises are not rewritten: the target gets a single
//! `migrateDeferred()` stub and the change is tagged for manual conversion.

use common::code::HttpCall;
use common::migration::{Change, ChangeTag};
use common::NodeId;
use tracing::debug;

use super::owner_target;
use crate::naming::http_method_name;
use crate::writer::{edit_file, ensure_ctor_param, ensure_import, inject_member, register_in_app_module};
use crate::{ForgeError, Rule, RuleContext};

const DEFERRED_STUB: &str = "  migrateDeferred(): Observable<any> {
    // TODO: replace the deferred promise with an Observable
    return of(null);
  }";

pub struct HttpRule;

impl Rule for HttpRule {
    fn name(&self) -> &'static str {
        "http"
    }

    fn apply(&self, cx: &RuleContext<'_>) -> Result<Vec<Change>, ForgeError> {
        let mut changes = Vec::new();
        let mut client_registered = false;

        for call in &cx.analysis.calls {
            let owner = cx.analysis.owner_class(&call.node.id);
            let source = call.node.file().unwrap_or_default();
            let target = owner_target(cx.out, owner, source)?;
            let file = cx.out.relative(&target.path);

            if call.is_deferred() {
                edit_file(&target.path, |text| {
                    let text = ensure_import(text, &["Observable", "of"], "rxjs");
                    inject_member(&text, "migrateDeferred(", DEFERRED_STUB)
                })?;
                changes.push(
                    Change::new(
                        ChangeTag::DeferredPromise,
                        call.node.id.clone(),
                        NodeId::synthetic("http", &format!("{}#migrateDeferred", file)),
                        format!(
                            "Deferred promise in {} needs manual conversion to an Observable",
                            source
                        ),
                    )
                    .in_file(file),
                );
                continue;
            }

            let method = http_method_name(call.method.as_str(), &call.url);
            edit_file(&target.path, |text| {
                let text = ensure_import(text, &["HttpClient"], "@angular/common/http");
                let text = ensure_import(&text, &["Observable"], "rxjs");
                let text = ensure_ctor_param(&text, "private http: HttpClient", "HttpClient");
                inject_member(&text, &format!("  {}(", method), &render_method(&method, call))
            })?;
            if !client_registered {
                register_in_app_module(cx.out, "imports", "HttpClientModule", "@angular/common/http")?;
                client_registered = true;
            }
            debug!(method = %method, target = %target.class, "http method ensured");

            changes.push(
                Change::new(
                    ChangeTag::Http,
                    call.node.id.clone(),
                    NodeId::synthetic("http", &format!("{}#{}", file, method)),
                    format!(
                        "{} {} migrated to HttpClient method {}.{}",
                        call.method.as_str().to_ascii_uppercase(),
                        display_url(call),
                        target.class,
                        method
                    ),
                )
                .in_file(file),
            );
        }
        Ok(changes)
    }
}

fn display_url(call: &HttpCall) -> &str {
    if call.url.is_empty() {
        "<dynamic url>"
    } else {
        &call.url
    }
}

fn render_method(name: &str, call: &HttpCall) -> String {
    let url = call.url.replace('\\', "\\\\").replace('\'', "\\'");
    let verb = call.method.as_str();
    let (params, args) = if call.method.has_body() {
        ("body: any", format!("'{}', body", url))
    } else if verb == "jsonp" {
        ("", format!("'{}', 'callback'", url))
    } else {
        ("", format!("'{}'", url))
    };
    let note = if call.url.is_empty() {
        "    // TODO: request URL was not a literal\n"
    } else {
        ""
    };
    format!(
        "  {}({}): Observable<any> {{\n{}    return this.http.{}<any>({});\n  }}",
        name, params, note, verb, args
    )
}
