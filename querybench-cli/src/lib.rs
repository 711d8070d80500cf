#![warn(missing_docs)]
//! QueryBench CLI Library
//!
//! Drives a benchmark session end to end:
//!
//! ```text
//! querybench.toml ──► engines ──┐
//!                               ├──► plan ──► one runner per engine (concurrent)
//! queries/*.txt ──► batches ────┘                  │
//!                                                  ▼
//!                             results/{engine}-{description}-{ts}.csv + summary
//! ```
//!
//! Use [`run`] from a binary's `main`, or [`run_with_cli`] with pre-parsed
//! arguments.

mod config;
mod engine;
mod ingest;
mod planner;
mod session;

pub use config::*;
pub use engine::{
    CommandExecutor, EngineExecutor, EngineSetupError, HttpSettings, HttpTransport,
    QUERY_PLACEHOLDER, StatementError, StatementExecutor, StatementPage, StatementStats,
    StatementTransport, TimingSource, build_executor,
};
pub use ingest::{IngestError, QUERY_FILE_EXTENSION, load_batches, parse_batch};
pub use planner::{ExecutionPlan, build_plan, select_engines};
pub use session::{CheckOutcome, EnginePlan, check_engines, run_engines};

use anyhow::Context;
use chrono::Local;
use clap::{Parser, Subcommand};
use querybench_report::{
    DirectorySinkFactory, EngineStatus, EngineSummary, OutputFormat, RunSummary,
    format_human_output, generate_json_report,
};
use regex::Regex;
use std::collections::BTreeMap;
use std::io::IsTerminal;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// QueryBench CLI arguments
#[derive(Parser, Debug)]
#[command(name = "querybench")]
#[command(
    author,
    version,
    about = "QueryBench - concurrent SQL benchmarking across query engines"
)]
pub struct Cli {
    /// Optional subcommand (Run, Check, List, Init); defaults to Run
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Filter batches by regex pattern on their description
    #[arg(default_value = ".*")]
    pub filter: String,

    /// Run only this engine (repeatable)
    #[arg(short, long = "engine", global = true)]
    pub engines: Vec<String>,

    /// Configuration file (discovered from the current directory if not specified)
    #[arg(short, long, global = true, env = "QUERYBENCH_CONFIG")]
    pub config: Option<PathBuf>,

    /// Worker threads per engine
    #[arg(long, global = true)]
    pub pool_size: Option<usize>,

    /// Directory holding query files
    #[arg(long, global = true)]
    pub input: Option<PathBuf>,

    /// Directory receiving artifacts
    #[arg(long, global = true)]
    pub output: Option<PathBuf>,

    /// Summary format: human, json
    #[arg(long, default_value = "human", global = true)]
    pub format: String,

    /// Write the summary to this file (stdout if not specified)
    #[arg(long, global = true)]
    pub summary_out: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

/// CLI subcommands
#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Commands {
    /// Check connections, then run every batch (default)
    Run,
    /// Only check engine connections
    Check,
    /// List discovered batches without executing
    List,
    /// Print a default querybench.toml
    Init,
}

/// Run the QueryBench CLI with process arguments, exiting with status 1
/// when an engine failed its check or a batch was aborted.
pub fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();
    if !run_with_cli(cli)? {
        std::process::exit(1);
    }
    Ok(())
}

/// Run the QueryBench CLI with pre-parsed arguments.
///
/// Returns `Ok(false)` when the session completed but some engine did not.
pub fn run_with_cli(cli: Cli) -> anyhow::Result<bool> {
    if cli.command == Some(Commands::Init) {
        print!("{}", QueryBenchConfig::default_toml());
        return Ok(true);
    }

    init_logging(cli.verbose);

    let config = load_config(&cli)?;

    match cli.command {
        Some(Commands::List) => list_batches(&cli, &config),
        Some(Commands::Check) => check_connections(&cli, &config),
        Some(Commands::Run) | None => run_benchmarks(&cli, &config),
        Some(Commands::Init) => Ok(true),
    }
}

fn init_logging(verbose: bool) {
    let default_directive = if verbose {
        "querybench=debug"
    } else {
        "querybench=info"
    };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive));
    // Already installed when embedded or called twice
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

fn load_config(cli: &Cli) -> anyhow::Result<QueryBenchConfig> {
    let path = match &cli.config {
        Some(path) => Some(path.clone()),
        None => QueryBenchConfig::discover(),
    };
    match path {
        Some(path) => {
            info!(path = %path.display(), "Loading configuration");
            Ok(QueryBenchConfig::load(&path)?)
        }
        None => anyhow::bail!(
            "No {} found; create one with `querybench init > {}`",
            CONFIG_FILE_NAME,
            CONFIG_FILE_NAME
        ),
    }
}

/// Input and output directories after CLI overrides
fn resolve_dirs(cli: &Cli, config: &QueryBenchConfig) -> (PathBuf, PathBuf) {
    let input = cli
        .input
        .clone()
        .unwrap_or_else(|| PathBuf::from(&config.runner.input_dir));
    let output = cli
        .output
        .clone()
        .unwrap_or_else(|| PathBuf::from(&config.runner.output_dir));
    (input, output)
}

fn selected_engines(cli: &Cli, config: &QueryBenchConfig) -> anyhow::Result<Vec<String>> {
    let engines = select_engines(config.engines.keys(), &cli.engines);
    if engines.is_empty() {
        anyhow::bail!("No engines selected; configure [engines.<name>] in {}", CONFIG_FILE_NAME);
    }
    Ok(engines)
}

fn load_plan(cli: &Cli, config: &QueryBenchConfig) -> anyhow::Result<ExecutionPlan> {
    let filter = Regex::new(&cli.filter)
        .with_context(|| format!("Invalid filter pattern: {}", cli.filter))?;
    let engines = selected_engines(cli, config)?;
    let (input_dir, _) = resolve_dirs(cli, config);
    let batches = load_batches(&input_dir, &engines)?;
    Ok(build_plan(batches, Some(&filter)))
}

/// Turn planned engines into runnable ones; engines that cannot be set up
/// are reported as misconfigured.
fn prepare_engines(
    config: &QueryBenchConfig,
    engines: BTreeMap<String, Vec<querybench_core::QueryBatch>>,
) -> (Vec<EnginePlan<EngineExecutor>>, Vec<EngineSummary>) {
    let mut plans = Vec::new();
    let mut rejected = Vec::new();

    for (name, batches) in engines {
        let engine_config = config.engines.get(&name).cloned().unwrap_or_default();
        let prepared = engine_config
            .engine_spec(&name)
            .map_err(EngineSetupError::from)
            .and_then(|spec| Ok((spec, build_executor(&name, &engine_config)?)));

        match prepared {
            Ok((spec, executor)) => plans.push(EnginePlan {
                spec,
                executor,
                batches,
            }),
            Err(e) => {
                tracing::error!("{}", e);
                rejected.push(EngineSummary::failed(
                    name,
                    EngineStatus::Misconfigured,
                    e.to_string(),
                    Vec::new(),
                ));
            }
        }
    }

    (plans, rejected)
}

fn list_batches(cli: &Cli, config: &QueryBenchConfig) -> anyhow::Result<bool> {
    let plan = load_plan(cli, config)?;

    println!("QueryBench Plan:");
    for (engine, batches) in &plan.engines {
        println!("├── engine: {}", engine);
        for batch in batches {
            let tags = if batch.tag_keys().is_empty() {
                String::new()
            } else {
                format!(" [{}]", batch.tag_keys().join(", "))
            };
            println!(
                "│   ├── {}{} ({} queries, {} attempts)",
                batch.description(),
                tags,
                batch.records().len(),
                batch.total_attempts()
            );
        }
    }
    println!("{} batches found.", plan.batch_count());

    Ok(true)
}

fn check_connections(cli: &Cli, config: &QueryBenchConfig) -> anyhow::Result<bool> {
    let engines = selected_engines(cli, config)?
        .into_iter()
        .map(|name| (name, Vec::new()))
        .collect();
    let (plans, rejected) = prepare_engines(config, engines);

    let mut ok = rejected.is_empty();
    for summary in &rejected {
        println!(
            "Checking connection for {} - ERROR - {}",
            summary.engine,
            summary.error.as_deref().unwrap_or("misconfigured")
        );
    }
    for outcome in check_engines(plans) {
        match &outcome.error {
            None => println!("Checking connection for {} - OK", outcome.engine),
            Some(message) => {
                ok = false;
                println!("{}", message);
            }
        }
    }

    Ok(ok)
}

fn run_benchmarks(cli: &Cli, config: &QueryBenchConfig) -> anyhow::Result<bool> {
    let format: OutputFormat = cli.format.parse().map_err(anyhow::Error::msg)?;
    let pool_size = cli.pool_size.unwrap_or(config.runner.pool_size);
    let (_, output_dir) = resolve_dirs(cli, config);

    let plan = load_plan(cli, config)?;
    info!(
        engines = plan.engines.len(),
        batches = plan.batch_count(),
        pool_size,
        output = %output_dir.display(),
        "Starting benchmark session"
    );

    let started_at = Local::now();
    let (plans, mut summaries) = prepare_engines(config, plan.engines);
    let sinks = DirectorySinkFactory::new(&output_dir);
    let progress = !cli.verbose && std::io::stderr().is_terminal();
    summaries.extend(run_engines(plans, &sinks, pool_size, progress));
    summaries.sort_by(|a, b| a.engine.cmp(&b.engine));

    let summary = RunSummary {
        started_at,
        finished_at: Local::now(),
        engines: summaries,
    };

    let output = match format {
        OutputFormat::Json => generate_json_report(&summary)?,
        OutputFormat::Human => format_human_output(&summary),
    };

    if let Some(path) = &cli.summary_out {
        std::fs::write(path, output.as_bytes())
            .with_context(|| format!("Failed to write summary to {}", path.display()))?;
        println!("Summary written to: {}", path.display());
    } else {
        print!("{}", output);
    }

    for engine in summary.engines.iter().filter(|e| e.status != EngineStatus::Completed) {
        eprintln!(
            "Engine {} did not complete: {}",
            engine.engine,
            engine.error.as_deref().unwrap_or("unknown error")
        );
    }

    Ok(summary.is_success())
}
