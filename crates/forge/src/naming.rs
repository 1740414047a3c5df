//! Target-side names derived from legacy identifiers.

/// `UserDetail` / `userDetail` / `user_detail` → `user-detail`.
pub fn kebab(name: &str) -> String {
    let chars: Vec<char> = name.chars().collect();
    let mut out = String::with_capacity(name.len() + 4);
    for (i, &c) in chars.iter().enumerate() {
        if c == '_' || c == ' ' || c == '-' || c == '.' {
            if !out.ends_with('-') && !out.is_empty() {
                out.push('-');
            }
            continue;
        }
        if c.is_ascii_uppercase() && i > 0 {
            let prev = chars[i - 1];
            let next_lower = chars.get(i + 1).is_some_and(|n| n.is_ascii_lowercase());
            let boundary = prev.is_ascii_lowercase()
                || prev.is_ascii_digit()
                || (prev.is_ascii_uppercase() && next_lower);
            if boundary && !out.ends_with('-') {
                out.push('-');
            }
        }
        if c.is_ascii_alphanumeric() {
            out.push(c.to_ascii_lowercase());
        }
    }
    out.trim_end_matches('-').to_string()
}

/// `user-detail` / `user_detail` / `userDetail` → `UserDetail`.
pub fn pascal(name: &str) -> String {
    name.split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(|w| {
            let mut chars = w.chars();
            match chars.next() {
                Some(first) => first.to_ascii_uppercase().to_string() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect()
}

/// `UserService` → `userService`.
pub fn lower_camel(name: &str) -> String {
    let p = pascal(name);
    let mut chars = p.chars();
    match chars.next() {
        Some(first) => first.to_ascii_lowercase().to_string() + chars.as_str(),
        None => String::new(),
    }
}

fn strip_any<'a>(name: &'a str, suffixes: &[&str]) -> &'a str {
    for suffix in suffixes {
        if let Some(base) = name.strip_suffix(suffix) {
            if !base.is_empty() {
                return base;
            }
        }
    }
    name
}

/// Names of the component generated for one legacy controller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComponentNames {
    /// `user-detail`
    pub kebab: String,
    /// `UserDetailComponent`
    pub class: String,
    /// `app-user-detail`
    pub selector: String,
    /// `user-detail.component.ts`
    pub ts_file: String,
    /// `user-detail.component.html`
    pub html_file: String,
}

impl ComponentNames {
    pub fn for_controller(controller: &str) -> Self {
        let base = strip_any(controller, &["Controller", "Ctrl"]);
        let kebab = kebab(base);
        Self {
            class: format!("{}Component", pascal(base)),
            selector: format!("app-{}", kebab),
            ts_file: format!("{}.component.ts", kebab),
            html_file: format!("{}.component.html", kebab),
            kebab,
        }
    }

    /// Module specifier used in import lines, e.g. `./user-detail.component`.
    pub fn module_path(&self) -> String {
        format!("./{}.component", self.kebab)
    }
}

/// Names of the injectable generated for one legacy service/factory/provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceNames {
    pub kebab: String,
    /// `AuthService`
    pub class: String,
    /// `auth.service.ts`
    pub file: String,
    /// Constructor parameter name, `authService`.
    pub param: String,
}

impl ServiceNames {
    pub fn for_service(name: &str) -> Self {
        let base = strip_any(name, &["Service", "Svc", "Factory", "Provider"]);
        let kebab = kebab(base);
        let class = format!("{}Service", pascal(base));
        Self {
            param: lower_camel(&class),
            file: format!("{}.service.ts", kebab),
            class,
            kebab,
        }
    }

    pub fn module_path(&self) -> String {
        format!("./{}.service", self.kebab)
    }
}

/// `get` + `/api/users/:id` → `getApiUsersId`.
pub fn http_method_name(method: &str, url: &str) -> String {
    let path = url.split(['?', '#']).next().unwrap_or_default();
    let path = path
        .strip_prefix("https://")
        .or_else(|| path.strip_prefix("http://"))
        .map(|rest| rest.split_once('/').map(|(_, p)| p).unwrap_or_default())
        .unwrap_or(path);
    let suffix = pascal(path);
    if suffix.is_empty() {
        format!("{}Root", method)
    } else {
        format!("{}{}", method, suffix)
    }
}

/// Watched expression → stream field name: `vm.filter.text` → `filterText$`.
pub fn stream_field(expression: &str, alias: Option<&str>) -> String {
    let trimmed = expression.trim();
    let without_alias = alias
        .and_then(|a| trimmed.strip_prefix(a).and_then(|r| r.strip_prefix('.')))
        .or_else(|| trimmed.strip_prefix("this."))
        .unwrap_or(trimmed);
    let is_path = without_alias
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '.');
    if !is_path {
        return "watch$".to_string();
    }
    let ident = lower_camel(without_alias);
    if ident.is_empty() || ident.chars().next().is_some_and(|c| c.is_ascii_digit()) {
        "watch$".to_string()
    } else {
        format!("{}$", ident)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kebab_and_pascal() {
        assert_eq!(kebab("UserDetail"), "user-detail");
        assert_eq!(kebab("HTTPClient"), "http-client");
        assert_eq!(kebab("user_profile"), "user-profile");
        assert_eq!(kebab("myPanel"), "my-panel");
        assert_eq!(pascal("user-detail"), "UserDetail");
        assert_eq!(pascal("currentUser"), "CurrentUser");
        assert_eq!(lower_camel("AuthService"), "authService");
    }

    #[test]
    fn test_component_names() {
        let n = ComponentNames::for_controller("UserDetailController");
        assert_eq!(n.kebab, "user-detail");
        assert_eq!(n.class, "UserDetailComponent");
        assert_eq!(n.selector, "app-user-detail");
        assert_eq!(n.ts_file, "user-detail.component.ts");
        assert_eq!(ComponentNames::for_controller("MainCtrl").class, "MainComponent");
        assert_eq!(ComponentNames::for_controller("Controller").kebab, "controller");
    }

    #[test]
    fn test_service_names() {
        let n = ServiceNames::for_service("AuthService");
        assert_eq!(n.file, "auth.service.ts");
        assert_eq!(n.class, "AuthService");
        assert_eq!(n.param, "authService");
        assert_eq!(ServiceNames::for_service("UserFactory").class, "UserService");
        assert_eq!(ServiceNames::for_service("session").class, "SessionService");
    }

    #[test]
    fn test_http_method_name() {
        assert_eq!(http_method_name("get", "/api/users"), "getApiUsers");
        assert_eq!(http_method_name("delete", "/api/users/:id"), "deleteApiUsersId");
        assert_eq!(http_method_name("get", "https://example.com/v1/items?x=1"), "getV1Items");
        assert_eq!(http_method_name("post", ""), "postRoot");
    }

    #[test]
    fn test_stream_field() {
        assert_eq!(stream_field("query", None), "query$");
        assert_eq!(stream_field("vm.filter.text", Some("vm")), "filterText$");
        assert_eq!(stream_field("", None), "watch$");
        assert_eq!(stream_field("function () { return a + b; }", None), "watch$");
    }
}
