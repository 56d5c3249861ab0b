//! Chaos control plane CLI
//!
//! The `chaosctl` command drives experiments through the lifecycle engine.
//!
//! ## Commands
//!
//! - `run`: run a single experiment and print it with its result
//! - `suite`: run a directory of experiment definitions and write a report
//! - `list`: list the definitions in a directory

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn, Level};

use chaos_core::{
    load_definitions, run_suite, write_suite_report_json, write_suite_report_md, Experiment,
    ExperimentDefinition, ExperimentMetrics, ExperimentRegistry, ExperimentResult,
    ExperimentStatus, RegistryConfig, SuiteOptions, TimedExecutor,
};

#[derive(Parser)]
#[command(name = "chaosctl")]
#[command(author = "Stevedores Org")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Chaos experiment control plane", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long, global = true)]
    json: bool,

    /// Registry configuration file (JSON)
    #[arg(long, global = true, env = "CHAOS_CONFIG")]
    config: Option<PathBuf>,

    /// Delay between creation and scheduling
    #[arg(long, global = true, env = "CHAOS_SCHEDULING_DELAY_MS")]
    scheduling_delay_ms: Option<u64>,

    /// How long a stop waits for the injection to acknowledge
    #[arg(long, global = true, env = "CHAOS_STOP_GRACE_MS")]
    stop_grace_ms: Option<u64>,

    /// Upper bound on a single injection run
    #[arg(long, global = true, env = "CHAOS_RUN_TIMEOUT_MS")]
    run_timeout_ms: Option<u64>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a single experiment to completion
    Run {
        /// Fault type (e.g. cpu-stress, network-latency)
        #[arg(short = 't', long = "type")]
        kind: String,

        /// Experiment name
        #[arg(short, long)]
        name: Option<String>,

        /// Executor parameter as key=value (value parsed as JSON when possible)
        #[arg(short, long = "param", value_parser = parse_param)]
        params: Vec<(String, serde_json::Value)>,

        /// Injection window
        #[arg(short, long)]
        duration_ms: Option<u64>,
    },

    /// Run every experiment definition in a directory
    Suite {
        /// Directory of *.json experiment definitions
        #[arg(short, long, default_value = "experiments")]
        dir: PathBuf,

        /// Run all experiments concurrently
        #[arg(long)]
        parallel: bool,

        /// Pause between sequential experiments
        #[arg(long, default_value = "0")]
        pause_ms: u64,

        /// Run only the experiment with this name
        #[arg(long)]
        only: Option<String>,

        /// Directory for the markdown report
        #[arg(short, long, default_value = "chaos-reports")]
        output_dir: PathBuf,

        /// Also write the report as JSON to this path
        #[arg(long)]
        json_report: Option<PathBuf>,

        /// Skip invalid definition files instead of failing
        #[arg(long)]
        continue_on_error: bool,

        /// Print lifecycle metrics in Prometheus text format when done
        #[arg(long)]
        metrics: bool,
    },

    /// List experiment definitions in a directory
    List {
        /// Directory of *.json experiment definitions
        #[arg(short, long, default_value = "experiments")]
        dir: PathBuf,
    },
}

#[derive(Serialize)]
struct RunOutput {
    experiment: Experiment,
    result: Option<ExperimentResult>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging
    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    chaos_core::init_tracing(cli.json, level);

    let config = resolve_config(&cli)?;

    match cli.command {
        Commands::Run {
            kind,
            name,
            params,
            duration_ms,
        } => cmd_run(config, build_definition(kind, name, params, duration_ms)).await,
        Commands::Suite {
            dir,
            parallel,
            pause_ms,
            only,
            output_dir,
            json_report,
            continue_on_error,
            metrics,
        } => {
            let options = SuiteOptions {
                parallel,
                pause: Duration::from_millis(pause_ms),
                only,
            };
            cmd_suite(
                config,
                &dir,
                &options,
                &output_dir,
                json_report.as_deref(),
                continue_on_error,
                metrics,
            )
            .await
        }
        Commands::List { dir } => cmd_list(&dir),
    }
}

/// Config file (or defaults), then flag/env overrides.
fn resolve_config(cli: &Cli) -> Result<RegistryConfig> {
    let mut config = match &cli.config {
        Some(path) => RegistryConfig::from_json_file(path)
            .with_context(|| format!("Failed to load config {:?}", path))?,
        None => RegistryConfig::default(),
    };
    if let Some(ms) = cli.scheduling_delay_ms {
        config.scheduling_delay_ms = ms;
    }
    if let Some(ms) = cli.stop_grace_ms {
        config.stop_grace_ms = ms;
    }
    if let Some(ms) = cli.run_timeout_ms {
        config.run_timeout_ms = Some(ms);
    }
    config.validate()?;
    Ok(config)
}

fn parse_param(raw: &str) -> std::result::Result<(String, serde_json::Value), String> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected key=value, got '{raw}'"))?;
    let key = key.trim();
    if key.is_empty() {
        return Err(format!("empty parameter name in '{raw}'"));
    }
    let value = serde_json::from_str(value)
        .unwrap_or_else(|_| serde_json::Value::String(value.to_string()));
    Ok((key.to_string(), value))
}

fn build_definition(
    kind: String,
    name: Option<String>,
    params: Vec<(String, serde_json::Value)>,
    duration_ms: Option<u64>,
) -> ExperimentDefinition {
    let mut def = ExperimentDefinition::new(kind);
    def.name = name;
    def.duration_ms = duration_ms;
    for (key, value) in params {
        def = def.with_parameter(key, value);
    }
    def
}

fn build_registry(config: RegistryConfig, metrics: Arc<ExperimentMetrics>) -> ExperimentRegistry {
    ExperimentRegistry::builder(Arc::new(TimedExecutor::default()))
        .config(config)
        .metrics(metrics)
        .build()
}

/// Stop everything still running. Used on Ctrl-C.
async fn stop_running(registry: &ExperimentRegistry) {
    for experiment in registry.list_by_status(ExperimentStatus::Running).await {
        match registry.stop(experiment.id).await {
            Ok(_) => info!(experiment_id = %experiment.id, "stopped on interrupt"),
            Err(e) => warn!(experiment_id = %experiment.id, error = %e, "stop on interrupt failed"),
        }
    }
}

async fn drive(registry: &ExperimentRegistry, def: ExperimentDefinition) -> Result<RunOutput> {
    let id = registry.create(def).await?.id;
    let admitted = registry
        .wait_for(id, |s| s != ExperimentStatus::Pending)
        .await?;
    if admitted.status == ExperimentStatus::Scheduled {
        registry.start(id).await?;
    }
    let experiment = registry.wait_for_terminal(id).await?;
    let result = match experiment.result_id {
        Some(result_id) => Some(registry.get_result(result_id).await?),
        None => None,
    };
    Ok(RunOutput { experiment, result })
}

async fn cmd_run(config: RegistryConfig, def: ExperimentDefinition) -> Result<()> {
    let registry = build_registry(config, Arc::new(ExperimentMetrics::new()));

    let output = tokio::select! {
        output = drive(&registry, def) => output?,
        _ = tokio::signal::ctrl_c() => {
            stop_running(&registry).await;
            bail!("Interrupted");
        }
    };

    let json = serde_json::to_string_pretty(&output).context("Failed to serialize run output")?;
    println!("{}", json);
    Ok(())
}

async fn cmd_suite(
    config: RegistryConfig,
    dir: &Path,
    options: &SuiteOptions,
    output_dir: &Path,
    json_report: Option<&Path>,
    continue_on_error: bool,
    print_metrics: bool,
) -> Result<()> {
    let entries = load_definitions(dir, continue_on_error)
        .with_context(|| format!("Failed to load experiments from {:?}", dir))?;

    let metrics = Arc::new(ExperimentMetrics::new());
    let registry = build_registry(config, metrics.clone());

    let report = tokio::select! {
        report = run_suite(&registry, &entries, options) => report?,
        _ = tokio::signal::ctrl_c() => {
            stop_running(&registry).await;
            bail!("Interrupted; running experiments were stopped");
        }
    };

    let path = write_suite_report_md(output_dir, &report)?;
    if let Some(json_path) = json_report {
        write_suite_report_json(json_path, &report)?;
    }
    metrics.flush();

    println!("Experiments: {}", report.runs.len());
    println!("  completed: {}", report.count(ExperimentStatus::Completed));
    println!("  stopped:   {}", report.count(ExperimentStatus::Stopped));
    println!("  failed:    {}", report.count(ExperimentStatus::Failed));
    println!("Report: {}", path.display());
    if print_metrics {
        println!();
        print!("{}", metrics.render_prometheus());
    }

    if !report.all_completed() {
        let incomplete = report.runs.len() - report.count(ExperimentStatus::Completed);
        bail!("{} experiment(s) did not complete", incomplete);
    }
    Ok(())
}

fn cmd_list(dir: &Path) -> Result<()> {
    let entries = load_definitions(dir, true)
        .with_context(|| format!("Failed to load experiments from {:?}", dir))?;
    for entry in entries {
        let window = entry
            .definition
            .duration_ms
            .map(|ms| format!("{ms}ms"))
            .unwrap_or_else(|| "default".to_string());
        println!(
            "{:<24} {:<20} {:<10} {}",
            entry.name(),
            entry.definition.kind,
            window,
            entry.source.display()
        );
    }
    Ok(())
}
