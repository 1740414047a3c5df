use clap::{Args, Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::Context;
use common::code::ClassKind;
use common::migration::RiskLevel;
use conductor::{
    parse_rule_list, AcceptAll, CommandValidator, MigrationConfig, MigrationOutcome, ReportFormat,
    Stage, StageController, Validator,
};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "transmute")]
#[command(about = "Deterministic AngularJS to Angular migration", long_about = None)]
struct Cli {
    /// Debug-level logging (RUST_LOG takes precedence).
    #[arg(long, short, global = true, env = "TRANSMUTE_VERBOSE")]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Migrate a legacy project into an Angular workspace, atomically.
    Migrate(MigrateArgs),
    /// Run ingestion, analysis and pattern detection only and print the facts.
    Analyze {
        /// Legacy project root.
        #[arg(env = "TRANSMUTE_SOURCE")]
        source: PathBuf,
        /// Print the facts as JSON.
        #[arg(long)]
        json: bool,
    },
}

#[derive(Args)]
struct MigrateArgs {
    /// Legacy project root.
    #[arg(env = "TRANSMUTE_SOURCE")]
    source: PathBuf,
    /// Output root (defaults to `<SOURCE>-angular` next to the source).
    #[arg(long, env = "TRANSMUTE_OUT")]
    out: Option<PathBuf>,
    /// Reports and progress log location (defaults to `<SOURCE>/.transmute`).
    #[arg(long, env = "TRANSMUTE_STATE_DIR")]
    state_dir: Option<PathBuf>,
    /// Comma-separated rule families: controllers, services, http, watch, routes, directives.
    #[arg(long, env = "TRANSMUTE_ONLY")]
    only: Option<String>,
    /// Last stage to run: ingestion, analysis, patterns, transformation, risk, validation, reporting.
    #[arg(long, env = "TRANSMUTE_UNTIL")]
    until: Option<Stage>,
    /// Build and report everything, but never touch the output root.
    #[arg(long, env = "TRANSMUTE_DRY_RUN")]
    dry_run: bool,
    /// Start from the current output instead of an empty workspace.
    #[arg(long, env = "TRANSMUTE_INCREMENTAL")]
    incremental: bool,
    /// Command run inside the workspace before commit; a non-zero exit discards the run.
    #[arg(long, env = "TRANSMUTE_VALIDATE_CMD")]
    validate_cmd: Option<String>,
    /// Report format: json, markdown or both.
    #[arg(long, env = "TRANSMUTE_FORMAT", default_value = "both")]
    format: ReportFormat,
}

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    if let Err(e) = dotenvy::dotenv() {
        if !e.not_found() {
            eprintln!("warning: .env: {}", e);
        }
    }

    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Commands::Migrate(args) => cmd_migrate(args).await,
        Commands::Analyze { source, json } => {
            tokio::task::spawn_blocking(move || cmd_analyze(&source, json))
                .await
                .context("analysis task")??;
            Ok(ExitCode::SUCCESS)
        }
    }
}

// ---------------------------------------------------------------------------
// migrate
// ---------------------------------------------------------------------------

fn default_output(source: &Path) -> PathBuf {
    let name = source
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "app".to_string());
    source.with_file_name(format!("{}-angular", name))
}

fn build_config(args: &MigrateArgs) -> anyhow::Result<MigrationConfig> {
    let source = resolve_source(&args.source)?;
    let out = args.out.clone().unwrap_or_else(|| default_output(&source));
    let mut config = MigrationConfig::new(source, out);
    config.state_dir = args.state_dir.clone();
    config.dry_run = args.dry_run;
    config.incremental = args.incremental;
    config.report_formats = args.format;
    if let Some(last) = args.until {
        config.stages = StageController::until(last);
    }
    if let Some(list) = &args.only {
        config.rules = Some(parse_rule_list(list).map_err(anyhow::Error::msg)?);
    }
    Ok(config)
}

fn resolve_source(source: &Path) -> anyhow::Result<PathBuf> {
    if !source.is_dir() {
        anyhow::bail!("source root {} is not a directory", source.display());
    }
    dunce::canonicalize(source).with_context(|| format!("resolving {}", source.display()))
}

async fn cmd_migrate(args: MigrateArgs) -> anyhow::Result<ExitCode> {
    let config = build_config(&args)?;
    info!(
        source = %config.source_root.display(),
        output = %config.output_root.display(),
        dry_run = config.dry_run,
        "starting migration"
    );
    debug!(stages = ?config.stages.enabled_stages(), rules = ?config.selected_rules(), "run selection");
    let validator: Box<dyn Validator + Send> = match args.validate_cmd.as_deref() {
        Some(cmd) => Box::new(
            CommandValidator::parse(cmd).with_context(|| format!("empty validation command '{}'", cmd))?,
        ),
        None => Box::new(AcceptAll),
    };

    let outcome = tokio::task::spawn_blocking(move || conductor::migrate(&config, validator.as_ref()))
        .await
        .context("migration task")??;

    print_summary(&outcome);
    Ok(if outcome.succeeded() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

fn print_summary(outcome: &MigrationOutcome) {
    let run = &outcome.report.run;
    let state = run
        .state
        .map(|s| s.to_string())
        .unwrap_or_else(|| "not run".to_string());

    println!("+------------------------------------------+");
    println!("| TRANSMUTE MIGRATION                      |");
    println!("+------------------------------------------+");
    println!("| Run            : {:>23} |", state);
    println!("| Files          : {:>23} |", run.files);
    println!("| Classes        : {:>23} |", run.classes);
    println!("| Changes        : {:>23} |", outcome.report.changes.len());
    println!("| Safe           : {:>23} |", run.risk_totals.safe);
    println!("| Risky          : {:>23} |", run.risk_totals.risky);
    println!("| Manual         : {:>23} |", run.risk_totals.manual);
    println!("+------------------------------------------+");

    for (level, title) in [
        (RiskLevel::Manual, "MANUAL MIGRATION REQUIRED"),
        (RiskLevel::Risky, "REVIEW RECOMMENDED"),
    ] {
        let records: Vec<_> = outcome.report.at_level(level).collect();
        if records.is_empty() {
            continue;
        }
        println!("\n{}:", title);
        for r in records {
            println!("  {} [{}] {}: {}", r.id, r.tag.as_str(), r.subject, r.risk_reason);
        }
    }

    if let Some(error) = &run.error {
        println!("\nRun discarded, output untouched: {}", error);
    }
    if let Some(verdict) = run.validation.as_ref().filter(|v| !v.passed) {
        for failure in &verdict.failures {
            println!("  validation: {}", failure);
        }
    }
    for failure in run.rule_failures.iter().chain(&run.risk_failures) {
        println!("  rule {} failed: {}", failure.rule, failure.message);
    }
    if run.state.is_some() {
        println!("\nOutput: {}", run.output_root);
    }
    for path in &outcome.report_paths {
        println!("Report: {}", path.display());
    }
}

// ---------------------------------------------------------------------------
// analyze
// ---------------------------------------------------------------------------

fn cmd_analyze(source: &Path, json: bool) -> anyhow::Result<()> {
    let mut config = MigrationConfig::new(resolve_source(source)?, PathBuf::new());
    config.stages = StageController::until(Stage::Patterns);
    let (analysis, roles, files) = conductor::analyze_source(&config)?;

    if json {
        let classes: Vec<serde_json::Value> = analysis
            .modules
            .iter()
            .flat_map(|m| m.classes.iter().map(move |c| (m, c)))
            .map(|(m, c)| {
                serde_json::json!({
                    "id": c.node.id.as_str(),
                    "name": c.name,
                    "kind": c.kind.as_str(),
                    "file": m.path,
                    "di_tokens": c.di_tokens,
                    "watched": c.watched,
                    "writes": c.writes,
                    "roles": roles.roles_of(&c.node.id),
                    "confidence": roles.confidence_of(&c.node.id),
                })
            })
            .collect();
        let doc = serde_json::json!({
            "files": files,
            "classes": classes,
            "http_calls": analysis.calls.len(),
            "routes": analysis.routes.len(),
            "templates": analysis.templates.len(),
            "skipped": analysis.skipped,
        });
        println!("{}", serde_json::to_string_pretty(&doc)?);
        return Ok(());
    }

    println!("+------------------------------------------+");
    println!("| TRANSMUTE ANALYSIS                       |");
    println!("+------------------------------------------+");
    println!("| Files          : {:>23} |", files);
    println!("| Modules        : {:>23} |", analysis.modules.len());
    println!("| HTTP calls     : {:>23} |", analysis.calls.len());
    println!("| Routes         : {:>23} |", analysis.routes.len());
    println!("| Templates      : {:>23} |", analysis.templates.len());
    println!("| Skipped        : {:>23} |", analysis.skipped.len());
    println!("+------------------------------------------+");

    for module in &analysis.modules {
        for class in &module.classes {
            let roles: Vec<String> = roles
                .roles_of(&class.node.id)
                .iter()
                .map(|r| format!("{:?}", r))
                .collect();
            let marker = if class.kind == ClassKind::Directive { "*" } else { " " };
            println!(
                "{} {} ({}) {} [{}]",
                marker,
                class.name,
                class.kind.as_str(),
                module.path,
                roles.join(", ")
            );
        }
    }
    for (file, reason) in &analysis.skipped {
        println!("  skipped {}: {}", file, reason);
    }
    Ok(())
}
