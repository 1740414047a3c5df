//! Analysis pipeline: ingestion output → raw facts → IR → roles.
//!
//! Stages:
//! - **Scripts**: marker prefilter ([`scan`]), then the script and route
//!   analyzers ([`parser`](crate::parser), [`routes`](crate::routes)).
//! - **Markup**: controller scopes and directive occurrences
//!   ([`markup`](crate::markup)); raw text kept out-of-band.
//! - **Build**: [`builder::build`] plus the id → owner index.
//! - **Detect**: [`detect`] folds the standard detectors.
//!
//! A file that fails to read or parse is logged, recorded in
//! [`Analysis::skipped`] and excluded; the batch always completes.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use common::behavior::Behavior;
use common::code::{Class, HttpCall, Module};
use common::graph::DependencyGraph;
use common::registry::OwnerIndex;
use common::roles::PatternRoles;
use common::template::Template;
use common::NodeId;
use tracing::{info, warn};

use crate::builder::{self, Ir};
use crate::heuristics::{run_detectors, standard_detectors};
use crate::ingest::{map_file, SourceSet};
use crate::markup::analyze_markup;
use crate::parser::ScriptAnalyzer;
use crate::path_util::relative_path;
use crate::{scan, AnatomistError, RawFacts, Route};

/// Read-only analysis of one source tree.
#[derive(Debug, Default)]
pub struct Analysis {
    pub root: PathBuf,
    pub modules: Vec<Module>,
    pub graph: DependencyGraph,
    pub templates: Vec<Template>,
    pub behaviors: Vec<Behavior>,
    pub calls: Vec<HttpCall>,
    /// Well-formed route facts in discovery order.
    pub routes: Vec<Route>,
    /// Full markup text per relative path.
    pub markup: BTreeMap<String, String>,
    pub index: OwnerIndex,
    /// `(file, reason)` for every file that could not be analyzed.
    pub skipped: Vec<(String, String)>,
}

impl Analysis {
    /// Normalizes raw facts. Pure; no file-system access.
    pub fn from_raw(root: &Path, raw: RawFacts) -> Self {
        let Ir {
            modules,
            graph,
            templates,
            behaviors,
            calls,
        } = builder::build(&raw);
        let index = OwnerIndex::build(&modules, &templates, &calls);
        let routes = raw.routes.into_iter().filter(Route::is_well_formed).collect();
        Self {
            root: root.to_path_buf(),
            modules,
            graph,
            templates,
            behaviors,
            calls,
            routes,
            markup: raw.markup_text,
            index,
            skipped: Vec::new(),
        }
    }

    pub fn classes(&self) -> impl Iterator<Item = &Class> {
        self.modules.iter().flat_map(|m| m.classes.iter())
    }

    pub fn class(&self, id: &NodeId) -> Option<&Class> {
        self.index.class(&self.modules, id)
    }

    pub fn class_named(&self, name: &str) -> Option<&Class> {
        self.index
            .class_named(name)
            .and_then(|id| self.class(id))
    }

    /// Owning class of any node id (a class owns itself).
    pub fn owner_class(&self, id: &NodeId) -> Option<&Class> {
        self.index.owner_class(&self.modules, id)
    }

    pub fn module_of(&self, class_id: &NodeId) -> Option<&Module> {
        self.index.module_of(&self.modules, class_id)
    }

    /// Templates bound to the named controller.
    pub fn templates_for(&self, controller: &str) -> Vec<&Template> {
        self.templates
            .iter()
            .filter(|t| t.controller.as_deref() == Some(controller))
            .collect()
    }
}

/// Collects raw facts from every classified file.
///
/// # Errors
/// `ParseFailure` only if a grammar fails to load. Per-file failures are skipped.
pub fn collect_facts(sources: &SourceSet) -> Result<(RawFacts, Vec<(String, String)>), AnatomistError> {
    let mut analyzer = ScriptAnalyzer::new()?;
    let mut raw = RawFacts::default();
    let mut skipped = Vec::new();

    for path in &sources.scripts {
        let rel = relative_path(&sources.root, path);
        let mmap = match map_file(path) {
            Ok(Some(m)) => m,
            Ok(None) => continue,
            Err(e) => {
                warn!(file = %rel, error = %e, "script skipped");
                skipped.push((rel, e.to_string()));
                continue;
            }
        };
        raw.scripts.push(rel.clone());
        if !scan::has_legacy_markers(&mmap[..]) {
            continue;
        }
        match analyzer.analyze_source(&mmap[..], &rel, crate::parser::ScriptLang::from_path(path)) {
            Ok(facts) => {
                raw.classes.extend(facts.classes);
                raw.directives.extend(facts.directives);
                raw.calls.extend(facts.calls);
                raw.routes.extend(facts.routes);
            }
            Err(e) => {
                warn!(file = %rel, error = %e, "script skipped");
                skipped.push((rel, e.to_string()));
            }
        }
    }

    for path in &sources.markup {
        let rel = relative_path(&sources.root, path);
        let text = match map_file(path) {
            Ok(Some(m)) => String::from_utf8_lossy(&m[..]).into_owned(),
            Ok(None) => String::new(),
            Err(e) => {
                warn!(file = %rel, error = %e, "markup skipped");
                skipped.push((rel, e.to_string()));
                continue;
            }
        };
        match analyze_markup(&text, &rel) {
            Ok(facts) => raw.markup.push(facts),
            Err(e) => {
                warn!(file = %rel, error = %e, "markup skipped");
                skipped.push((rel.clone(), e.to_string()));
            }
        }
        raw.markup_text.insert(rel, text);
    }

    info!(
        classes = raw.classes.len(),
        directives = raw.directives.len(),
        calls = raw.calls.len(),
        routes = raw.routes.len(),
        markup = raw.markup.len(),
        "raw facts collected"
    );
    Ok((raw, skipped))
}

/// Runs every analyzer over `sources` and builds the IR.
///
/// # Errors
/// `ParseFailure` only if a grammar fails to load.
pub fn analyze(sources: &SourceSet) -> Result<Analysis, AnatomistError> {
    let (raw, skipped) = collect_facts(sources)?;
    let mut analysis = Analysis::from_raw(&sources.root, raw);
    analysis.skipped = skipped;
    Ok(analysis)
}

/// Assigns roles with the standard detector list.
pub fn detect(analysis: &Analysis) -> PatternRoles {
    let roles = run_detectors(&standard_detectors(), analysis);
    info!(nodes = roles.roles.len(), "pattern detection finished");
    roles
}
