//! The rewrite rules and the helpers they share.
//!
//! HTTP and watch rewrites inject into the file generated for the owning
//! class. When that file does not exist yet (its rule was filtered out, or the
//! owner was left to manual migration), a minimal shell is created first so
//! the injection always has a target.

mod controller;
mod directive;
mod http;
mod routes;
mod service;
mod watch;

pub use controller::ControllerRule;
pub use directive::DirectiveStubRule;
pub use http::HttpRule;
pub use routes::RoutesRule;
pub use service::ServiceRule;
pub use watch::WatchRule;

use std::path::PathBuf;

use anatomist::heuristics::naming::has_service_suffix;
use anatomist::path_util::bare_stem;
use common::code::Class;

use crate::di::DiResolution;
use crate::naming::{pascal, ComponentNames, ServiceNames};
use crate::writer::{ensure_import, register_in_app_module, write_if_absent, Output};
use crate::ForgeError;

/// Generated file an injection lands in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct TargetFile {
    pub path: PathBuf,
    pub class: String,
    pub is_service: bool,
}

fn component_shell(names: &ComponentNames) -> String {
    format!(
        "import {{ Component }} from '@angular/core';\n\
         \n\
         @Component({{\n\
         \x20 selector: '{}',\n\
         \x20 templateUrl: './{}'\n\
         }})\n\
         export class {} {{\n\
         }}\n",
        names.selector, names.html_file, names.class
    )
}

fn service_shell(names: &ServiceNames) -> String {
    format!(
        "import {{ Injectable }} from '@angular/core';\n\
         \n\
         @Injectable({{ providedIn: 'root' }})\n\
         export class {} {{\n\
         }}\n",
        names.class
    )
}

/// Creates an empty component (and its markup) unless it already exists.
pub(crate) fn ensure_component_shell(out: &Output, names: &ComponentNames) -> Result<TargetFile, ForgeError> {
    let path = out.app_file(&names.ts_file);
    if write_if_absent(&path, &component_shell(names))? {
        write_if_absent(
            &out.app_file(&names.html_file),
            &crate::markup::stub(&names.class).html,
        )?;
        register_in_app_module(out, "declarations", &names.class, &names.module_path())?;
    }
    Ok(TargetFile {
        path,
        class: names.class.clone(),
        is_service: false,
    })
}

pub(crate) fn ensure_service_shell(out: &Output, names: &ServiceNames) -> Result<TargetFile, ForgeError> {
    let path = out.app_file(&names.file);
    write_if_absent(&path, &service_shell(names))?;
    Ok(TargetFile {
        path,
        class: names.class.clone(),
        is_service: true,
    })
}

/// Class body shared by components and injectables: state fields, the
/// resolved constructor, lifecycle hooks (`(method, legacy hook)` pairs) and
/// one stub per legacy method.
pub(crate) fn class_body(class: &Class, di: &DiResolution, hooks: &[(&str, &str)]) -> String {
    let origin = class.node.file().unwrap_or("unknown source");
    let mut sections: Vec<String> = Vec::new();

    let fields: Vec<String> = class
        .fields
        .iter()
        .filter(|f| !f.name.starts_with('$') && !class.methods.iter().any(|m| m.name == f.name))
        .map(|f| format!("  {}: any;", f.name))
        .collect();
    if !fields.is_empty() {
        sections.push(fields.join("\n"));
    }
    if let Some(ctor) = di.constructor() {
        sections.push(format!("  {}", ctor));
    }
    for (method, hook) in hooks {
        sections.push(format!(
            "  {}(): void {{\n    // TODO: port {} of {} from {}\n  }}",
            method, hook, class.name, origin
        ));
    }
    for method in class.methods.iter().filter(|m| !m.name.starts_with('$')) {
        sections.push(format!(
            "  {}(): void {{\n    // TODO: port {}.{} from {}\n  }}",
            method.name, class.name, method.name, origin
        ));
    }
    sections.join("\n\n")
}

/// `// TODO:` lines for tokens dropped from the constructor.
pub(crate) fn note_lines(notes: &[String]) -> String {
    notes.iter().map(|n| format!("// TODO: {}\n", n)).collect()
}

/// Adds the resolved imports to a freshly rendered file.
pub(crate) fn with_di_imports(text: String, di: &DiResolution) -> String {
    di.imports
        .iter()
        .fold(text, |text, (symbol, module)| {
            ensure_import(&text, &[symbol.as_str()], module)
        })
}

/// Service-like by name suffix or by registration kind.
pub(crate) fn is_service_owner(class: &Class) -> bool {
    has_service_suffix(&class.name) || class.kind.is_service_like()
}

/// Resolves the file that receives code for `owner`. Facts without an owner
/// go to a service named after their source file.
pub(crate) fn owner_target(
    out: &Output,
    owner: Option<&Class>,
    source_file: &str,
) -> Result<TargetFile, ForgeError> {
    match owner {
        Some(class) if is_service_owner(class) => {
            ensure_service_shell(out, &ServiceNames::for_service(&class.name))
        }
        Some(class) => ensure_component_shell(out, &ComponentNames::for_controller(&class.name)),
        None => {
            let stem = pascal(bare_stem(source_file));
            let stem = if stem.is_empty() { "Legacy".to_string() } else { stem };
            ensure_service_shell(out, &ServiceNames::for_service(&stem))
        }
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_owner_target_kinds() {
        let dir = tempfile::tempdir().unwrap();
        let out = Output::new(dir.path());
        crate::scaffold::ensure_project(&out, "app").unwrap();

        let none = owner_target(&out, None, "app/api.js").unwrap();
        assert!(none.is_service);
        assert_eq!(none.class, "ApiService");
        assert!(none.path.ends_with("src/app/api.service.ts"));

        let shell = ensure_component_shell(&out, &ComponentNames::for_controller("UserController")).unwrap();
        assert!(!shell.is_service);
        let module = std::fs::read_to_string(out.app_module()).unwrap();
        assert!(module.contains("declarations: [AppComponent, UserComponent]"));
        assert!(module.contains("import { UserComponent } from './user.component';"));
        assert!(out.app_file("user.component.html").exists());
    }
}
