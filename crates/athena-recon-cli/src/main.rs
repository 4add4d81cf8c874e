//! athena-recon CLI - two-table reconciliation over AWS Athena.

use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{info, Level};

use athena_recon::{
    columns_from_file, plan_subsets, render_report, write_report, ComparisonSpec, ReconConfig,
    ReconError, ReconOrchestrator, RunSummary, TableRef,
};

#[cfg(unix)]
use tokio::signal::unix::{signal, SignalKind};

#[derive(Parser)]
#[command(name = "athena-recon")]
#[command(about = "Two-table reconciliation over AWS Athena")]
#[command(version)]
struct Cli {
    /// Path to YAML configuration file
    #[arg(short, long, default_value = "config.yaml")]
    config: PathBuf,

    /// Output JSON summary to stdout
    #[arg(long)]
    output_json: bool,

    /// Log format: text or json
    #[arg(long, default_value = "text")]
    log_format: String,

    /// Log verbosity: debug, info, warn, error
    #[arg(long, default_value = "info")]
    verbosity: String,

    /// Print progress updates as JSON lines to stderr
    #[arg(long)]
    progress: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a reconciliation and write the diff report
    Run {
        /// Table A as database.table
        #[arg(long)]
        table_a: String,

        /// Table B as database.table
        #[arg(long)]
        table_b: String,

        /// File listing the join (key) columns, one per line
        #[arg(long)]
        join_columns: PathBuf,

        /// File listing the compare columns, one per line
        #[arg(long)]
        compare_columns: PathBuf,

        /// SQL predicate applied to both tables
        #[arg(long)]
        filter: Option<String>,

        /// Override the Athena workgroup
        #[arg(long)]
        workgroup: Option<String>,

        /// Adjustment table as database.table [default: table A plus the configured suffix]
        #[arg(long)]
        adjustment_table: Option<String>,

        /// Disable adjustment-table exclusions
        #[arg(long)]
        no_adjustments: bool,

        /// Report destination, or - for stdout
        #[arg(short, long, default_value = "report.csv")]
        output: PathBuf,
    },

    /// Show the subset query plan without contacting Athena
    Plan {
        /// Table A as database.table
        #[arg(long)]
        table_a: String,

        /// Table B as database.table
        #[arg(long)]
        table_b: String,

        /// File listing the join (key) columns, one per line
        #[arg(long)]
        join_columns: PathBuf,

        /// File listing the compare columns, one per line
        #[arg(long)]
        compare_columns: PathBuf,

        /// SQL predicate applied to both tables
        #[arg(long)]
        filter: Option<String>,

        /// Adjustment table as database.table [default: table A plus the configured suffix]
        #[arg(long)]
        adjustment_table: Option<String>,

        /// Disable adjustment-table exclusions
        #[arg(long)]
        no_adjustments: bool,
    },

    /// Submit a probe query to verify Athena connectivity
    HealthCheck,
}

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{}", e.format_detailed());
            ExitCode::from(e.exit_code())
        }
    }
}

async fn run() -> Result<(), ReconError> {
    let cli = Cli::parse();

    setup_logging(&cli.verbosity, &cli.log_format).map_err(ReconError::Config)?;

    let config = load_config(&cli.config)?;

    // Setup signal handling for graceful shutdown (SIGINT and SIGTERM)
    let cancel_token = setup_signal_handler();

    match cli.command {
        Commands::Run {
            table_a,
            table_b,
            join_columns,
            compare_columns,
            filter,
            workgroup,
            adjustment_table,
            no_adjustments,
            output,
        } => {
            let mut config = config;
            if let Some(w) = workgroup {
                config.athena.workgroup = w;
            }

            let spec = build_spec(
                &config,
                &table_a,
                &table_b,
                &join_columns,
                &compare_columns,
                filter,
                adjustment_table,
                no_adjustments,
            )?;

            let mut orchestrator = ReconOrchestrator::new(config).await?;

            // Forward progress events as JSON lines on stderr
            if cli.progress {
                let (sender, mut receiver) = mpsc::channel(64);
                orchestrator = orchestrator.with_progress(sender);
                tokio::spawn(async move {
                    while let Some(event) = receiver.recv().await {
                        if let Ok(line) = serde_json::to_string(&event) {
                            eprintln!("{line}");
                        }
                    }
                });
            }

            let outcome = orchestrator.run(&spec, cancel_token).await?;

            if output.as_os_str() == "-" {
                print!("{}", render_report(&outcome.report)?);
            } else {
                write_report(&outcome.report, &output)?;
                if cli.output_json {
                    println!("{}", serde_json::to_string_pretty(&outcome.summary)?);
                } else {
                    print_summary(&outcome.summary, &output);
                }
            }
        }

        Commands::Plan {
            table_a,
            table_b,
            join_columns,
            compare_columns,
            filter,
            adjustment_table,
            no_adjustments,
        } => {
            let spec = build_spec(
                &config,
                &table_a,
                &table_b,
                &join_columns,
                &compare_columns,
                filter,
                adjustment_table,
                no_adjustments,
            )?;

            let plans = plan_subsets(&spec, &config)?;

            if cli.output_json {
                println!("{}", serde_json::to_string_pretty(&plans)?);
            } else {
                println!(
                    "Plan: {} subset queries (size ceiling: {} bytes)",
                    plans.len(),
                    config.run.size_ceiling_bytes
                );
                for (index, plan) in plans.iter().enumerate() {
                    println!(
                        "  {}. {} ({} columns, {} bytes)",
                        index + 1,
                        plan.label,
                        plan.columns.len(),
                        plan.query_bytes
                    );
                }
            }
        }

        Commands::HealthCheck => {
            let orchestrator = ReconOrchestrator::new(config).await?;
            orchestrator.health_check().await?;
            println!("Health check passed");
        }
    }

    Ok(())
}

fn load_config(path: &Path) -> Result<ReconConfig, ReconError> {
    if path.exists() {
        let config = ReconConfig::load(path)?;
        info!("Loaded configuration from {:?}", path);
        Ok(config)
    } else if path.as_os_str() == "config.yaml" {
        // Every knob has a default, so a missing default config is fine
        info!("No config.yaml found, using defaults");
        Ok(ReconConfig::default())
    } else {
        Err(ReconError::Config(format!(
            "Config file not found: {:?}",
            path
        )))
    }
}

#[allow(clippy::too_many_arguments)]
fn build_spec(
    config: &ReconConfig,
    table_a: &str,
    table_b: &str,
    join_columns: &Path,
    compare_columns: &Path,
    filter: Option<String>,
    adjustment_table: Option<String>,
    no_adjustments: bool,
) -> Result<ComparisonSpec, ReconError> {
    let mut spec = ComparisonSpec::new(
        TableRef::parse(table_a)?,
        TableRef::parse(table_b)?,
        columns_from_file(join_columns)?,
        columns_from_file(compare_columns)?,
    )?;

    if let Some(predicate) = filter {
        spec = spec.with_row_filter(predicate)?;
    }

    if !no_adjustments {
        if let Some(raw) = adjustment_table {
            spec = spec.with_adjustments(TableRef::parse(&raw)?);
        } else if config.run.apply_adjustments {
            let table = spec.table_a.with_suffix(&config.run.adjustment_suffix)?;
            spec = spec.with_adjustments(table);
        }
    }

    Ok(spec)
}

fn print_summary(summary: &RunSummary, output: &Path) {
    println!("\nReconciliation completed!");
    println!("  Run ID: {}", summary.run_id);
    println!("  Duration: {:.2}s", summary.duration_seconds);
    println!("  Subset queries: {}", summary.subsets_executed);
    println!("  Rows reported: {}", summary.rows_reported);
    println!("  Missing in A: {}", summary.counts.missing_in_a);
    println!("  Missing in B: {}", summary.counts.missing_in_b);
    println!("  Duplicate keys in A: {}", summary.counts.duplicate_in_a);
    println!("  Duplicate keys in B: {}", summary.counts.duplicate_in_b);
    println!(
        "  Matched with differences: {}",
        summary.counts.matched_with_differences
    );
    println!("  Report: {}", output.display());
}

fn setup_logging(verbosity: &str, format: &str) -> Result<(), String> {
    let level = match verbosity.to_lowercase().as_str() {
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    // RUST_LOG wins over --verbosity when set
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level.to_string()));

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr);

    if format == "json" {
        subscriber.json().init();
    } else {
        subscriber.init();
    }

    Ok(())
}

/// Setup signal handlers for graceful shutdown.
/// Handles both SIGINT (Ctrl-C) and SIGTERM (Kubernetes/Airflow shutdown).
/// Returns a CancellationToken that will be cancelled when a signal is received.
#[cfg(unix)]
fn setup_signal_handler() -> CancellationToken {
    let cancel_token = CancellationToken::new();

    // Clone token for each signal handler
    let token_int = cancel_token.clone();
    let token_term = cancel_token.clone();

    // SIGINT handler (Ctrl-C)
    tokio::spawn(async move {
        let mut sigint = signal(SignalKind::interrupt()).expect("Failed to setup SIGINT handler");
        sigint.recv().await;
        eprintln!("\nReceived SIGINT. Stopping in-flight queries...");
        token_int.cancel();
    });

    // SIGTERM handler (Kubernetes/Airflow)
    tokio::spawn(async move {
        let mut sigterm = signal(SignalKind::terminate()).expect("Failed to setup SIGTERM handler");
        sigterm.recv().await;
        eprintln!("\nReceived SIGTERM. Stopping in-flight queries...");
        token_term.cancel();
    });

    cancel_token
}

/// Setup signal handler for Windows (only SIGINT/Ctrl-C)
#[cfg(not(unix))]
fn setup_signal_handler() -> CancellationToken {
    let cancel_token = CancellationToken::new();
    let token = cancel_token.clone();

    tokio::spawn(async move {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to setup Ctrl-C handler");
        eprintln!("\nReceived Ctrl-C. Stopping in-flight queries...");
        token.cancel();
    });

    cancel_token
}
