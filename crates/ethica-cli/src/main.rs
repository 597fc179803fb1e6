//! Ethica CLI
//!
//! Command-line interface for AI service ethics risk assessment.
//!
//! ## Usage
//!
//! ```bash
//! # Assess a service against a guideline corpus
//! ethica assess --service face-api.yaml --corpus guidelines.json
//!
//! # JSON report, fixed timestamp, custom config
//! ethica assess --service face-api.yaml --config ethica.yaml --format json \
//!     --assessed-at 2025-12-20T00:00:00Z
//!
//! # Previous runs of a service
//! ethica runs list --service "Face API"
//!
//! # Validate a config file
//! ethica config validate ethica.yaml
//! ```
//!
//! ## Exit Codes
//!
//! - 0: Completed cleanly
//! - 1: Completed with warnings
//! - 2: Assessment failed
//! - 3: Error

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand, ValueEnum};
use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use ethica_core::{AssessmentReport, ServiceDescription, SeverityLevel};
use ethica_runtime::providers::{
    CorpusRetriever, FileStore, InMemoryStore, OpenAiGenerator, RecordStore,
};
use ethica_runtime::{list_assessments, AssessmentConfig, AssessmentOrchestratorBuilder};

/// Ethica: ethics risk assessment for AI services
#[derive(Parser)]
#[command(name = "ethica")]
#[command(version)]
#[command(about = "Assess the ethical risk of AI services against reference guidelines", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a risk assessment for a service description
    Assess {
        /// Path to the service description (YAML or JSON)
        #[arg(short, long)]
        service: PathBuf,

        /// Path to the assessment config (YAML or JSON)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Path to the guideline passage corpus (JSON)
        #[arg(long)]
        corpus: Option<PathBuf>,

        /// Directory for persisted assessments
        #[arg(long, default_value = "./assessments")]
        store: PathBuf,

        /// Keep the assessment in memory instead of writing it
        #[arg(long)]
        dry_run: bool,

        /// Output format
        #[arg(short, long, default_value = "text")]
        format: OutputFormat,

        /// Explicit timestamp for deterministic runs (RFC 3339).
        /// Also fixes the persisted record id.
        /// Example: --assessed-at 2025-12-20T00:00:00Z
        #[arg(long, value_parser = parse_datetime)]
        assessed_at: Option<DateTime<Utc>>,
    },

    /// Persisted assessment commands
    Runs {
        #[command(subcommand)]
        action: RunsAction,
    },

    /// Configuration commands
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum RunsAction {
    /// List previous assessments of a service
    List {
        /// Service name, as given in the service description
        #[arg(short, long)]
        service: String,

        /// Directory holding persisted assessments
        #[arg(long, default_value = "./assessments")]
        store: PathBuf,

        /// Path to the assessment config (for the collection name)
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Validate a config file
    Validate {
        /// Path to the config file
        path: PathBuf,
    },

    /// Print the effective config, defaults included
    Show {
        /// Path to the config file (defaults only when omitted)
        path: Option<PathBuf>,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

/// Parse ISO 8601 / RFC 3339 datetime string to DateTime<Utc>.
fn parse_datetime(s: &str) -> Result<DateTime<Utc>, String> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| format!("Invalid datetime format: {}. Expected RFC 3339 (e.g., 2025-12-20T00:00:00Z)", e))
}

#[tokio::main]
async fn main() -> ExitCode {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .init();

    match run().await {
        Ok(exit_code) => exit_code,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::from(3)
        }
    }
}

async fn run() -> Result<ExitCode> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Assess {
            service,
            config,
            corpus,
            store,
            dry_run,
            format,
            assessed_at,
        } => {
            assess_command(service, config, corpus, store, dry_run, format, assessed_at).await
        }

        Commands::Runs { action } => match action {
            RunsAction::List {
                service,
                store,
                config,
            } => list_runs(service, store, config).await,
        },

        Commands::Config { action } => match action {
            ConfigAction::Validate { path } => validate_config(path),
            ConfigAction::Show { path } => show_config(path),
        },
    }
}

fn load_config(path: Option<&Path>) -> Result<AssessmentConfig> {
    match path {
        Some(path) => AssessmentConfig::from_file(path)
            .with_context(|| format!("Failed to load config from {:?}", path)),
        None => Ok(AssessmentConfig::default()),
    }
}

fn load_service(path: &Path) -> Result<ServiceDescription> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read service description from {:?}", path))?;

    let service = if path.extension().map(|e| e == "json").unwrap_or(false) {
        serde_json::from_str(&content)
            .with_context(|| format!("Invalid service description in {:?}", path))?
    } else {
        serde_yaml::from_str(&content)
            .with_context(|| format!("Invalid service description in {:?}", path))?
    };
    Ok(service)
}

#[allow(clippy::too_many_arguments)]
async fn assess_command(
    service_path: PathBuf,
    config_path: Option<PathBuf>,
    corpus_path: Option<PathBuf>,
    store_path: PathBuf,
    dry_run: bool,
    format: OutputFormat,
    assessed_at: Option<DateTime<Utc>>,
) -> Result<ExitCode> {
    let mut config = load_config(config_path.as_deref())?;
    if assessed_at.is_some() {
        config.determinism.assessed_at = assessed_at;
    }
    let service = load_service(&service_path)?;

    let retriever = match &corpus_path {
        Some(path) => CorpusRetriever::from_file(path)
            .with_context(|| format!("Failed to load guideline corpus from {:?}", path))?,
        None => {
            tracing::warn!("No guideline corpus given, every topic uses fallback guidance");
            CorpusRetriever::default()
        }
    };

    let generator = OpenAiGenerator::from_config(&config.generator)
        .context("Failed to configure text generator")?;

    let store: Arc<dyn RecordStore> = if dry_run {
        Arc::new(InMemoryStore::new())
    } else {
        Arc::new(FileStore::new(store_path))
    };

    let orchestrator = AssessmentOrchestratorBuilder::new()
        .generator(Arc::new(generator))
        .retriever(Arc::new(retriever))
        .store(store)
        .config(config)
        .build()
        .context("Failed to build assessment orchestrator")?;

    let report = orchestrator.assess_report(&service).await;

    match format {
        OutputFormat::Json => {
            let json = serde_json::to_string_pretty(&report)?;
            println!("{}", json);
        }
        OutputFormat::Text => {
            print!("{}", render_text(&report));
        }
    }

    Ok(exit_code(&report))
}

fn exit_code(report: &AssessmentReport) -> ExitCode {
    ExitCode::from(outcome_code(report))
}

fn outcome_code(report: &AssessmentReport) -> u8 {
    if report.is_failed() {
        2
    } else if report.has_warnings() {
        1
    } else {
        0
    }
}

fn render_text(report: &AssessmentReport) -> String {
    let mut out = String::new();

    if report.is_failed() {
        let _ = writeln!(out, "{}: FAILED", report.service_name);
        if let Some(error) = &report.error {
            let _ = writeln!(out);
            let _ = writeln!(out, "Error: {}", error);
        }
        render_warnings(&mut out, &report.warnings);
        return out;
    }

    let _ = writeln!(
        out,
        "{}: COMPLETED ({} retries, {} passes)",
        report.service_name, report.retry_count, report.passes
    );
    if let Some(reference) = &report.reference_id {
        let _ = writeln!(out, "Reference: {}", reference);
    }
    let _ = writeln!(out, "Assessed at: {}", report.assessed_at.to_rfc3339());
    let _ = writeln!(out);

    let _ = writeln!(
        out,
        "{:<18} {:<15} {:<9} {:>7} {:>5} {:>8}  TITLE",
        "ID", "CATEGORY", "SEVERITY", "P S D M", "BASIC", "WEIGHTED"
    );
    for scored in &report.items {
        let axes = scored
            .item
            .scores
            .as_ref()
            .map(|s| {
                format!(
                    "{} {} {} {}",
                    s.probability, s.severity, s.detectability, s.mitigation_difficulty
                )
            })
            .unwrap_or_else(|| "- - - -".to_string());
        let _ = writeln!(
            out,
            "{:<18} {:<15} {:<9} {:>7} {:>5} {:>8.1}  {}",
            scored.item.id,
            scored.item.category.as_str(),
            scored.severity().as_str(),
            axes,
            scored.basic_score,
            scored.weighted_score,
            scored.item.title
        );
    }
    let _ = writeln!(out);

    let counts: Vec<String> = SeverityLevel::ALL
        .iter()
        .map(|level| {
            format!(
                "{} {}",
                level,
                report.severity_counts.get(level).copied().unwrap_or(0)
            )
        })
        .collect();
    let _ = writeln!(out, "Severity: {}", counts.join(", "));

    if report.retry_budget_exhausted {
        let _ = writeln!(out, "Retry budget exhausted with high-risk items remaining");
    }
    if !report.improvement_targets.is_empty() {
        let _ = writeln!(
            out,
            "Improvement targets: {}",
            report.improvement_targets.join(", ")
        );
    }

    render_warnings(&mut out, &report.warnings);

    let usage = &report.usage;
    let _ = writeln!(out);
    let _ = writeln!(
        out,
        "Calls: {} generation, {} retrieval, {} persistence ({} timeouts, {} malformed)",
        usage.generation_calls,
        usage.retrieval_calls,
        usage.persistence_calls,
        usage.timeouts,
        usage.malformed
    );
    out
}

fn render_warnings(out: &mut String, warnings: &[String]) {
    if warnings.is_empty() {
        return;
    }
    let _ = writeln!(out);
    let _ = writeln!(out, "Warnings:");
    for warning in warnings {
        let _ = writeln!(out, "  - {}", warning);
    }
}

async fn list_runs(
    service_name: String,
    store_path: PathBuf,
    config_path: Option<PathBuf>,
) -> Result<ExitCode> {
    let config = load_config(config_path.as_deref())?;
    let store = FileStore::new(&store_path);

    let runs = list_assessments(&store, &config.persistence.collection, &service_name)
        .await
        .with_context(|| format!("Failed to list assessments in {:?}", store_path))?;

    if runs.is_empty() {
        println!("No assessments found for {}", service_name);
        return Ok(ExitCode::from(0));
    }

    for run in runs {
        let high_risk = run
            .assessment
            .severity_levels
            .iter()
            .filter(|entry| entry.level.is_high_risk())
            .count();
        println!(
            "{}: {} items, {} high/critical, {} retries ({})",
            run.id,
            run.assessment.risk_items.len(),
            high_risk,
            run.assessment.retry_count,
            run.assessment.timestamp.to_rfc3339()
        );
    }

    Ok(ExitCode::from(0))
}

fn validate_config(path: PathBuf) -> Result<ExitCode> {
    match AssessmentConfig::from_file(&path) {
        Ok(config) => {
            println!("Config is valid: {:?}", path);
            println!();
            println!("Max retries: {}", config.max_retries);
            println!("Rescore policy: {:?}", config.rescore_policy);
            println!("Scoring concurrency: {}", config.scoring.concurrency);
            println!("Generator: {} at {}", config.generator.model, config.generator.base_url);
            Ok(ExitCode::from(0))
        }
        Err(e) => {
            eprintln!("Config validation failed: {}", e);
            Ok(ExitCode::from(1))
        }
    }
}

fn show_config(path: Option<PathBuf>) -> Result<ExitCode> {
    let config = load_config(path.as_deref())?;
    print!("{}", serde_yaml::to_string(&config)?);
    Ok(ExitCode::from(0))
}
