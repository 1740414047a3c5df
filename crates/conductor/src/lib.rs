//! # Conductor: Pipeline Driver
//!
//! **Role**: Wires the stages together for one migration run:
//! ingestion → analysis → patterns → (inside the orchestrator's workspace)
//! transformation → risk → validation, then reporting.
//!
//! **Modules**:
//! - [`config`]: `MigrationConfig`, report formats, rule selection.
//! - [`stages`]: the stage controller (`all`, `until`, `only`).
//! - [`validate`]: the verdict boundary (`Validator`, `AcceptAll`, `CommandValidator`).
//! - [`report`]: change records with risk, JSON and Markdown renderings.
//! - [`pipeline`]: [`migrate`] and [`analyze_source`].

pub mod config;
pub mod pipeline;
pub mod report;
pub mod stages;
pub mod validate;

#[cfg(test)]
mod scenarios;

pub use config::{parse_rule_list, MigrationConfig, ReportFormat};
pub use pipeline::{analyze_source, migrate, MigrationOutcome};
pub use report::{ChangeRecord, Report};
pub use stages::{Stage, StageController};
pub use validate::{AcceptAll, CommandValidator, Validator, Verdict};
