//! Idempotent output writer.
//!
//! Two mechanisms keep repeated runs convergent:
//! - whole files go through [`write_if_changed`], which compares bytes first;
//! - fragments injected into an existing file (imports, members, constructor
//!   parameters, `@NgModule` list entries) check membership before editing.
//!
//! The text helpers are pure `&str -> String` functions so rules can chain them
//! and write once through [`edit_file`].

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use regex::Regex;
use tracing::debug;

use crate::ForgeError;

/// Output root of one transformation run (normally the orchestrator workspace).
#[derive(Debug, Clone)]
pub struct Output {
    root: PathBuf,
}

impl Output {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn src_dir(&self) -> PathBuf {
        self.root.join("src")
    }

    pub fn app_dir(&self) -> PathBuf {
        self.root.join("src").join("app")
    }

    pub fn app_file(&self, name: &str) -> PathBuf {
        self.app_dir().join(name)
    }

    pub fn app_module(&self) -> PathBuf {
        self.app_file("app.module.ts")
    }

    /// Path relative to the output root with forward slashes, for change records.
    pub fn relative(&self, path: &Path) -> String {
        anatomist::path_util::relative_path(&self.root, path)
    }
}

// ---------------------------------------------------------------------------
// Whole-file writes
// ---------------------------------------------------------------------------

/// Reads `path`; `Ok(None)` when it does not exist.
pub fn read_existing(path: &Path) -> Result<Option<String>, ForgeError> {
    match fs::read_to_string(path) {
        Ok(text) => Ok(Some(text)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(ForgeError::io(path, e)),
    }
}

/// Writes `contents` unless the file already holds exactly those bytes.
/// Returns whether a write happened.
pub fn write_if_changed(path: &Path, contents: &str) -> Result<bool, ForgeError> {
    if read_existing(path)?.as_deref() == Some(contents) {
        return Ok(false);
    }
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| ForgeError::io(parent, e))?;
    }
    fs::write(path, contents).map_err(|e| ForgeError::io(path, e))?;
    debug!(path = %path.display(), "written");
    Ok(true)
}

/// Writes `contents` only when `path` does not exist yet.
pub fn write_if_absent(path: &Path, contents: &str) -> Result<bool, ForgeError> {
    if path.exists() {
        return Ok(false);
    }
    write_if_changed(path, contents)
}

/// Applies `edit` to an existing file and writes the result if it differs.
/// Returns `Ok(false)` when the file is missing or unchanged.
pub fn edit_file(path: &Path, edit: impl FnOnce(&str) -> String) -> Result<bool, ForgeError> {
    let Some(text) = read_existing(path)? else {
        return Ok(false);
    };
    let updated = edit(&text);
    if updated == text {
        return Ok(false);
    }
    write_if_changed(path, &updated)
}

// ---------------------------------------------------------------------------
// Fragment injection
// ---------------------------------------------------------------------------

fn named_import_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"(?m)^import\s*\{([^}]*)\}\s*from\s*'([^']+)';[ \t]*$"#)
            .expect("valid named-import regex")
    })
}

fn module_list_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"\b(declarations|imports|providers|exports)\s*:\s*\[([^\]]*)\]")
            .expect("valid module-list regex")
    })
}

/// Ensures `import { symbols } from 'module';`, merging into an existing
/// import from the same module.
pub fn ensure_import(text: &str, symbols: &[&str], module: &str) -> String {
    let wanted: Vec<&str> = symbols.iter().copied().filter(|s| !s.is_empty()).collect();
    if wanted.is_empty() {
        return text.to_string();
    }

    if let Some(caps) = named_import_regex()
        .captures_iter(text)
        .find(|c| c.get(2).is_some_and(|m| m.as_str() == module))
    {
        let (Some(whole), Some(list)) = (caps.get(0), caps.get(1)) else {
            return text.to_string();
        };
        let mut present: Vec<String> = list
            .as_str()
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();
        let before = present.len();
        for symbol in &wanted {
            if !present.iter().any(|p| p == symbol) {
                present.push(symbol.to_string());
            }
        }
        if present.len() == before {
            return text.to_string();
        }
        let line = format!("import {{ {} }} from '{}';", present.join(", "), module);
        return format!("{}{}{}", &text[..whole.start()], line, &text[whole.end()..]);
    }

    let line = format!("import {{ {} }} from '{}';\n", wanted.join(", "), module);
    let mut insert_at = 0;
    let mut offset = 0;
    for l in text.split_inclusive('\n') {
        offset += l.len();
        if l.starts_with("import ") {
            insert_at = offset;
        }
    }
    if insert_at == 0 {
        return format!("{}{}", line, text);
    }
    let mut out = String::with_capacity(text.len() + line.len());
    out.push_str(&text[..insert_at]);
    if !text[..insert_at].ends_with('\n') {
        out.push('\n');
    }
    out.push_str(&line);
    out.push_str(&text[insert_at..]);
    out
}

/// Inserts `member` before the final closing brace unless `marker` is present.
pub fn inject_member(text: &str, marker: &str, member: &str) -> String {
    if text.contains(marker) {
        return text.to_string();
    }
    let Some(close) = text.rfind('}') else {
        return format!("{}\n{}\n", text.trim_end(), member);
    };
    let head = text[..close].trim_end();
    let gap = if head.ends_with('{') { "\n" } else { "\n\n" };
    format!("{}{}{}\n{}", head, gap, member, &text[close..])
}

/// Offset of the `)` closing an already-open parenthesis.
fn closing_paren(text: &str) -> Option<usize> {
    let mut depth = 0usize;
    for (i, c) in text.char_indices() {
        match c {
            '(' => depth += 1,
            ')' if depth == 0 => return Some(i),
            ')' => depth -= 1,
            _ => {}
        }
    }
    None
}

/// Adds a constructor parameter unless one of type `ty` is already declared.
pub fn ensure_ctor_param(text: &str, rendered: &str, ty: &str) -> String {
    let Some(start) = text.find("constructor(") else {
        return inject_member(text, "constructor(", &format!("  constructor({}) {{}}", rendered));
    };
    let params_start = start + "constructor(".len();
    let Some(len) = closing_paren(&text[params_start..]) else {
        return text.to_string();
    };
    let params = &text[params_start..params_start + len];
    let declared = params
        .split(',')
        .filter_map(|p| p.split_once(':').map(|(_, t)| t.trim()))
        .any(|t| t == ty);
    if declared {
        return text.to_string();
    }
    let joined = if params.trim().is_empty() {
        rendered.to_string()
    } else {
        format!("{}, {}", params.trim_end(), rendered)
    };
    format!("{}{}{}", &text[..params_start], joined, &text[params_start + len..])
}

/// Appends `entry` to an `@NgModule` list (`declarations`, `imports`, ...)
/// unless it is already listed. Unchanged when the list is absent.
pub fn ensure_module_entry(text: &str, list: &str, entry: &str) -> String {
    let Some(caps) = module_list_regex()
        .captures_iter(text)
        .find(|c| c.get(1).is_some_and(|m| m.as_str() == list))
    else {
        return text.to_string();
    };
    let Some(items) = caps.get(2) else {
        return text.to_string();
    };
    let mut present: Vec<&str> = items
        .as_str()
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect();
    if present.contains(&entry) {
        return text.to_string();
    }
    present.push(entry);
    format!(
        "{}{}{}",
        &text[..items.start()],
        present.join(", "),
        &text[items.end()..]
    )
}

/// Registers `symbol` (imported from `module`) in the root module's `list`.
pub fn register_in_app_module(
    out: &Output,
    list: &str,
    symbol: &str,
    module: &str,
) -> Result<bool, ForgeError> {
    let path = out.app_module();
    let changed = edit_file(&path, |text| {
        let text = ensure_import(text, &[symbol], module);
        ensure_module_entry(&text, list, symbol)
    })?;
    if changed {
        debug!(symbol, list, "registered in AppModule");
    }
    Ok(changed)
}

#[cfg(test)]
mod tests {
    use super::*;

    const MODULE: &str = "import { NgModule } from '@angular/core';\n\
import { BrowserModule } from '@angular/platform-browser';\n\
import { AppComponent } from './app.component';\n\
\n\
@NgModule({\n\
  declarations: [AppComponent],\n\
  imports: [BrowserModule],\n\
  providers: [],\n\
  bootstrap: [AppComponent]\n\
})\n\
export class AppModule {}\n";

    #[test]
    fn test_ensure_import_merges_and_is_idempotent() {
        let text = "import { Component } from '@angular/core';\n\nexport class A {}\n";
        let once = ensure_import(text, &["OnInit"], "@angular/core");
        assert!(once.starts_with("import { Component, OnInit } from '@angular/core';"));
        let twice = ensure_import(&once, &["OnInit", "Component"], "@angular/core");
        assert_eq!(once, twice);

        let added = ensure_import(&once, &["Observable"], "rxjs");
        assert!(added.contains("'@angular/core';\nimport { Observable } from 'rxjs';\n"));
        assert_eq!(ensure_import(&added, &["Observable"], "rxjs"), added);
    }

    #[test]
    fn test_inject_member_once() {
        let text = "export class A {\n  x = 1;\n}\n";
        let once = inject_member(text, "load(", "  load(): void {}");
        assert_eq!(once, "export class A {\n  x = 1;\n\n  load(): void {}\n}\n");
        assert_eq!(inject_member(&once, "load(", "  load(): void {}"), once);

        let empty = inject_member("export class B {\n}\n", "y =", "  y = 2;");
        assert_eq!(empty, "export class B {\n  y = 2;\n}\n");
    }

    #[test]
    fn test_ensure_ctor_param() {
        let text = "export class A {\n  x = 1;\n}\n";
        let with = ensure_ctor_param(text, "private http: HttpClient", "HttpClient");
        assert!(with.contains("  constructor(private http: HttpClient) {}\n}"));
        assert_eq!(ensure_ctor_param(&with, "private http: HttpClient", "HttpClient"), with);

        let more = ensure_ctor_param(&with, "private router: Router", "Router");
        assert!(more.contains("constructor(private http: HttpClient, private router: Router) {}"));

        let empty = ensure_ctor_param("class B {\n  constructor() {}\n}\n", "private http: HttpClient", "HttpClient");
        assert!(empty.contains("constructor(private http: HttpClient) {}"));

        let injected = ensure_ctor_param(
            "class C {\n  constructor(@Inject(DOCUMENT) private document: Document) {}\n}\n",
            "private http: HttpClient",
            "HttpClient",
        );
        assert!(injected.contains(
            "constructor(@Inject(DOCUMENT) private document: Document, private http: HttpClient) {}"
        ));
    }

    #[test]
    fn test_module_entries() {
        let once = ensure_module_entry(MODULE, "imports", "HttpClientModule");
        assert!(once.contains("imports: [BrowserModule, HttpClientModule],"));
        assert_eq!(ensure_module_entry(&once, "imports", "HttpClientModule"), once);

        let decl = ensure_module_entry(&once, "declarations", "UserComponent");
        assert!(decl.contains("declarations: [AppComponent, UserComponent],"));
        let prov = ensure_module_entry(&decl, "providers", "X");
        assert!(prov.contains("providers: [X],"));
        assert_eq!(ensure_module_entry(&prov, "entryComponents", "Y"), prov);
    }

    #[test]
    fn test_write_if_changed_and_register() {
        let dir = tempfile::tempdir().unwrap();
        let out = Output::new(dir.path());
        let module = out.app_module();
        assert!(write_if_changed(&module, MODULE).unwrap());
        assert!(!write_if_changed(&module, MODULE).unwrap());
        assert!(!write_if_absent(&module, "other").unwrap());

        assert!(register_in_app_module(&out, "imports", "HttpClientModule", "@angular/common/http").unwrap());
        assert!(!register_in_app_module(&out, "imports", "HttpClientModule", "@angular/common/http").unwrap());
        let text = std::fs::read_to_string(&module).unwrap();
        assert_eq!(text.matches("HttpClientModule").count(), 2);
        assert_eq!(out.relative(&module), "src/app/app.module.ts");
    }
}
