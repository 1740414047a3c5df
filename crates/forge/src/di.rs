//! Legacy injection token → constructor parameter resolution.
//!
//! Shared by the controller and service rules. Token order is preserved end to
//! end: the generated constructor lists parameters in the order their first
//! token was declared. Several tokens mapping to the same target type collapse
//! into one parameter.

use crate::naming::ServiceNames;

/// What a known token becomes.
#[derive(Debug, Clone, Copy)]
enum Target {
    /// Constructor parameter of a framework type.
    Param {
        ty: &'static str,
        name: &'static str,
        symbol: &'static str,
        module: &'static str,
        /// Injection token for non-class types (`@Inject(DOCUMENT)`).
        inject: bool,
    },
    /// No constructor parameter; the note lands in a comment.
    Omit(&'static str),
}

const fn param(ty: &'static str, name: &'static str, module: &'static str) -> Target {
    Target::Param {
        ty,
        name,
        symbol: ty,
        module,
        inject: false,
    }
}

/// Known tokens. Anything not listed and not `$`-prefixed is a custom service.
const KNOWN_TOKENS: &[(&str, Target)] = &[
    ("$scope", Target::Omit("$scope removed; state lives on component fields")),
    ("$rootScope", Target::Omit("$rootScope removed; use a shared service with an RxJS Subject")),
    ("$http", param("HttpClient", "http", "@angular/common/http")),
    ("$resource", param("HttpClient", "http", "@angular/common/http")),
    ("$state", param("Router", "router", "@angular/router")),
    ("$location", param("Router", "router", "@angular/router")),
    ("$stateParams", param("ActivatedRoute", "route", "@angular/router")),
    ("$routeParams", param("ActivatedRoute", "route", "@angular/router")),
    ("$q", Target::Omit("$q removed; use RxJS Observables or native Promises")),
    ("$timeout", Target::Omit("$timeout removed; use setTimeout() or RxJS timer()")),
    ("$interval", Target::Omit("$interval removed; use RxJS interval()")),
    ("$compile", Target::Omit("$compile removed; use component composition")),
    ("$element", param("ElementRef", "el", "@angular/core")),
    (
        "$document",
        Target::Param {
            ty: "Document",
            name: "document",
            symbol: "DOCUMENT",
            module: "@angular/common",
            inject: true,
        },
    ),
    ("$window", Target::Omit("$window removed; use the global window object")),
    ("$injector", param("Injector", "injector", "@angular/core")),
    ("$sce", param("DomSanitizer", "sanitizer", "@angular/platform-browser")),
    ("$translate", Target::Omit("$translate: install @ngx-translate/core and inject TranslateService")),
    ("$uibModal", Target::Omit("$uibModal: install ng-bootstrap and inject NgbModal")),
    ("$modal", Target::Omit("$modal: install ng-bootstrap and inject NgbModal")),
    ("$filter", Target::Omit("$filter removed; use Angular pipes")),
    ("$log", Target::Omit("$log removed; use console directly")),
];

fn lookup(token: &str) -> Option<Target> {
    KNOWN_TOKENS
        .iter()
        .find(|(t, _)| *t == token)
        .map(|(_, target)| *target)
}

/// One generated constructor parameter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CtorParam {
    pub name: String,
    pub ty: String,
    /// `Some(TOKEN)` renders `@Inject(TOKEN)`.
    pub inject: Option<String>,
}

impl CtorParam {
    pub fn render(&self) -> String {
        match &self.inject {
            Some(token) => format!("@Inject({}) private {}: {}", token, self.name, self.ty),
            None => format!("private {}: {}", self.name, self.ty),
        }
    }
}

/// Result of resolving one class's token list.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DiResolution {
    pub params: Vec<CtorParam>,
    /// `(symbol, module)` pairs in first-use order.
    pub imports: Vec<(String, String)>,
    /// Notes for tokens omitted from the constructor.
    pub notes: Vec<String>,
    /// Custom service class names, in token order.
    pub custom: Vec<String>,
}

impl DiResolution {
    fn import(&mut self, symbol: &str, module: &str) {
        if !self.imports.iter().any(|(s, m)| s == symbol && m == module) {
            self.imports.push((symbol.to_string(), module.to_string()));
        }
    }

    /// `constructor(...) {}` line, or `None` when no parameter survives.
    pub fn constructor(&self) -> Option<String> {
        if self.params.is_empty() {
            return None;
        }
        let rendered: Vec<String> = self.params.iter().map(CtorParam::render).collect();
        Some(format!("constructor({}) {{}}", rendered.join(", ")))
    }

    /// Import lines grouped per module, in first-use order.
    pub fn import_lines(&self) -> Vec<String> {
        let mut modules: Vec<&str> = Vec::new();
        for (_, m) in &self.imports {
            if !modules.contains(&m.as_str()) {
                modules.push(m);
            }
        }
        modules
            .into_iter()
            .map(|m| {
                let symbols: Vec<&str> = self
                    .imports
                    .iter()
                    .filter(|(_, module)| module == m)
                    .map(|(s, _)| s.as_str())
                    .collect();
                format!("import {{ {} }} from '{}';", symbols.join(", "), m)
            })
            .collect()
    }
}

/// Resolves `tokens` for the class named `own_class` (a self-reference is skipped).
pub fn resolve_tokens(tokens: &[String], own_class: Option<&str>) -> DiResolution {
    let mut res = DiResolution::default();

    for token in tokens {
        match lookup(token) {
            Some(Target::Omit(note)) => {
                if !res.notes.iter().any(|n| n == note) {
                    res.notes.push(note.to_string());
                }
            }
            Some(Target::Param {
                ty,
                name,
                symbol,
                module,
                inject,
            }) => {
                if res.params.iter().any(|p| p.ty == ty) {
                    continue;
                }
                res.import(symbol, module);
                if inject {
                    res.import("Inject", "@angular/core");
                }
                res.params.push(CtorParam {
                    name: name.to_string(),
                    ty: ty.to_string(),
                    inject: inject.then(|| symbol.to_string()),
                });
            }
            None if token.starts_with('$') => {
                let note = format!("{} has no Angular equivalent; migrate manually", token);
                if !res.notes.contains(&note) {
                    res.notes.push(note);
                }
            }
            None => {
                let names = ServiceNames::for_service(token);
                if own_class == Some(names.class.as_str())
                    || res.params.iter().any(|p| p.ty == names.class)
                {
                    continue;
                }
                res.import(&names.class, &names.module_path());
                res.custom.push(names.class.clone());
                res.params.push(CtorParam {
                    name: names.param,
                    ty: names.class,
                    inject: None,
                });
            }
        }
    }
    res
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokens(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_shared_target_type_collapses_in_order() {
        let res = resolve_tokens(&tokens(&["$state", "$location", "UserService"]), None);
        assert_eq!(res.params.len(), 2);
        assert_eq!(res.params[0].render(), "private router: Router");
        assert_eq!(res.params[1].render(), "private userService: UserService");
        assert_eq!(
            res.constructor().unwrap(),
            "constructor(private router: Router, private userService: UserService) {}"
        );
        assert_eq!(
            res.import_lines(),
            vec![
                "import { Router } from '@angular/router';",
                "import { UserService } from './user.service';",
            ]
        );
        assert_eq!(res.custom, vec!["UserService"]);
    }

    #[test]
    fn test_omitted_tokens_become_notes() {
        let res = resolve_tokens(&tokens(&["$scope", "$q", "$http", "$timeout", "$mystery"]), None);
        assert_eq!(res.params.len(), 1);
        assert_eq!(res.params[0].ty, "HttpClient");
        assert_eq!(res.notes.len(), 4);
        assert!(res.notes[3].contains("$mystery"));
        assert!(resolve_tokens(&tokens(&["$scope"]), None).constructor().is_none());
    }

    #[test]
    fn test_document_uses_inject_token_and_self_reference_skipped() {
        let res = resolve_tokens(&tokens(&["$document", "AuthService", "authFactory"]), Some("AuthService"));
        assert_eq!(res.params.len(), 1);
        assert_eq!(res.params[0].render(), "@Inject(DOCUMENT) private document: Document");
        assert_eq!(
            res.import_lines(),
            vec![
                "import { DOCUMENT } from '@angular/common';",
                "import { Inject } from '@angular/core';",
            ]
        );
    }
}
