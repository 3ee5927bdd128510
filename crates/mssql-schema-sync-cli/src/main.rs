//! mssql-schema-sync CLI - Snapshot SQL Server schema objects into GitLab.

mod wizard;

use clap::{Parser, Subcommand};
use mssql_schema_sync::{
    Config, Orchestrator, PublishOutcome, RunPhase, RunStatistics, SyncError,
};
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Mutex;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{info, Level};
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::prelude::*;

#[cfg(unix)]
use tokio::signal::unix::{signal, SignalKind};

#[derive(Parser)]
#[command(name = "mssql-schema-sync")]
#[command(about = "Snapshot SQL Server schema objects into a GitLab repository")]
#[command(version)]
struct Cli {
    /// Path to YAML configuration file
    #[arg(short, long, default_value = "config.yaml")]
    config: PathBuf,

    /// Build the configuration from environment variables only
    #[arg(long)]
    from_env: bool,

    /// Output JSON result to stdout
    #[arg(long)]
    output_json: bool,

    /// Log format: text or json
    #[arg(long, default_value = "text")]
    log_format: String,

    /// Log verbosity: trace, debug, info, warn, error
    #[arg(long, default_value = "info")]
    verbosity: String,

    /// Also append plain-text logs to this file
    #[arg(long)]
    log_file: Option<PathBuf>,

    /// Seconds to wait for a cancelled run to stop before exiting (default: 60)
    #[arg(long, default_value = "60")]
    shutdown_timeout: u64,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Scan the selected databases and publish the snapshot as one commit
    Run {
        /// Compute and log the commit actions without publishing
        #[arg(long)]
        dry_run: bool,
    },

    /// Test SQL Server connection and GitLab access
    HealthCheck,

    /// List the online user databases on the server
    ListDatabases,

    /// Create or edit a configuration file interactively
    Init {
        /// Output path for configuration file [default: config.yaml]
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Also prompt for retry, timeout and sync options
        #[arg(long)]
        advanced: bool,

        /// Force overwrite existing file without confirmation
        #[arg(long, short)]
        force: bool,
    },
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

async fn run() -> Result<(), SyncError> {
    let cli = Cli::parse();

    // Init doesn't need an existing config
    if let Commands::Init {
        output,
        advanced,
        force,
    } = cli.command
    {
        // No logging setup for wizard - keeps terminal clean for interactive prompts
        let output_path = output.unwrap_or_else(|| PathBuf::from("config.yaml"));
        wizard::run_wizard(&output_path, advanced, force)
            .await
            .map_err(|e| SyncError::Config(e.to_string()))?;
        return Ok(());
    }

    setup_logging(&cli.verbosity, &cli.log_format, cli.log_file.as_deref())
        .map_err(SyncError::Config)?;

    let config = if cli.from_env {
        let config = Config::from_env()?;
        info!("Loaded configuration from environment");
        config
    } else {
        let config = Config::load(&cli.config)?;
        info!("Loaded configuration from {:?}", cli.config);
        config
    };

    match cli.command {
        Commands::Init { .. } => unreachable!(), // Handled above
        Commands::Run { dry_run } => {
            let cancel_token = setup_signal_handler(cli.shutdown_timeout).await?;
            let orchestrator = Orchestrator::new(config).await?;

            // A commit already sent is awaited, whatever the timeout
            let forced_exit = {
                let token = cancel_token.clone();
                let timeout = Duration::from_secs(cli.shutdown_timeout);
                let mut phase = orchestrator.subscribe_phase();
                async move {
                    token.cancelled().await;
                    let publishing = async {
                        let _ = phase
                            .wait_for(|p| matches!(p, RunPhase::Publishing | RunPhase::Finished))
                            .await;
                    };
                    if tokio::time::timeout(timeout, publishing).await.is_ok() {
                        std::future::pending::<()>().await;
                    }
                }
            };

            let stats = tokio::select! {
                result = orchestrator.run(cancel_token.clone(), dry_run) => result?,
                _ = forced_exit => {
                    eprintln!("Shutdown timeout reached, exiting");
                    return Err(SyncError::Cancelled);
                }
            };

            if cli.output_json {
                println!("{}", serde_json::to_string_pretty(&stats)?);
            } else {
                print_run_summary(&stats);
            }
        }

        Commands::HealthCheck => {
            let result = Orchestrator::health_check_config(&config).await?;

            if cli.output_json {
                println!("{}", serde_json::to_string_pretty(&result)?);
            } else {
                println!("Health Check Results:");
                println!(
                    "  SQL Server: {} ({}ms)",
                    if result.database_connected { "OK" } else { "FAILED" },
                    result.database_latency_ms
                );
                if let Some(ref version) = result.server_version {
                    println!("    Version: {}", first_line(version));
                }
                if let Some(ref err) = result.database_error {
                    println!("    Error: {}", err);
                }
                println!(
                    "  GitLab: {} ({}ms)",
                    if result.repository_accessible { "OK" } else { "FAILED" },
                    result.repository_latency_ms
                );
                if let Some(ref err) = result.repository_error {
                    println!("    Error: {}", err);
                }
                println!(
                    "\n  Overall: {}",
                    if result.healthy { "HEALTHY" } else { "UNHEALTHY" }
                );
            }

            if !result.database_connected {
                return Err(SyncError::pool(
                    result.database_error.unwrap_or_default(),
                    "health check",
                ));
            }
            if !result.repository_accessible {
                return Err(SyncError::RemoteListing {
                    message: result.repository_error.unwrap_or_default(),
                    retryable: false,
                });
            }
        }

        Commands::ListDatabases => {
            let orchestrator = Orchestrator::new(config).await?;
            let databases = orchestrator.list_databases().await?;

            if cli.output_json {
                println!("{}", serde_json::to_string_pretty(&databases)?);
            } else {
                for name in &databases {
                    println!("{}", name);
                }
            }
        }
    }

    Ok(())
}

fn print_run_summary(stats: &RunStatistics) {
    let status_msg = if stats.dry_run {
        "Dry run completed!"
    } else {
        "Sync completed!"
    };
    println!("\n{}", status_msg);
    println!("  Run ID: {}", stats.run_id);
    println!("  Duration: {:.2}s", stats.duration_seconds);
    println!("  Databases: {}", stats.databases.len());
    println!(
        "  Files: {} created, {} updated, {} deleted",
        stats.created(),
        stats.updated(),
        stats.deleted()
    );
    match &stats.commit {
        Some(PublishOutcome::Committed(commit)) => println!(
            "  Commit: {} (+{} -{})",
            commit.id, commit.additions, commit.deletions
        ),
        Some(PublishOutcome::Skipped) => println!("  Commit: nothing to commit"),
        None => {}
    }
    if !stats.failures.is_empty() {
        println!("  Failures: {}", stats.failures.len());
        for failure in &stats.failures {
            println!("    {}", failure);
        }
    }
}

fn first_line(text: &str) -> &str {
    text.lines().next().unwrap_or_default().trim()
}

fn setup_logging(verbosity: &str, format: &str, log_file: Option<&Path>) -> Result<(), String> {
    let level = match verbosity.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    // Logs go to stderr so --output-json keeps stdout clean
    let console = if format == "json" {
        tracing_subscriber::fmt::layer()
            .json()
            .with_target(false)
            .with_writer(std::io::stderr)
            .boxed()
    } else {
        tracing_subscriber::fmt::layer()
            .with_target(false)
            .with_writer(std::io::stderr)
            .boxed()
    };

    let file = match log_file {
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .map_err(|e| format!("cannot open log file {}: {}", path.display(), e))?;
            Some(
                tracing_subscriber::fmt::layer()
                    .with_ansi(false)
                    .with_target(false)
                    .with_writer(Mutex::new(file)),
            )
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(LevelFilter::from_level(level))
        .with(console)
        .with(file)
        .init();

    Ok(())
}

/// Setup signal handlers for graceful shutdown.
/// Handles both SIGINT (Ctrl-C) and SIGTERM (scheduler shutdown).
/// Returns a CancellationToken that will be cancelled when a signal is received.
#[cfg(unix)]
async fn setup_signal_handler(shutdown_timeout: u64) -> Result<CancellationToken, SyncError> {
    let cancel_token = CancellationToken::new();

    let mut sigint = signal(SignalKind::interrupt())?;
    let mut sigterm = signal(SignalKind::terminate())?;

    let token = cancel_token.clone();
    tokio::spawn(async move {
        let name = tokio::select! {
            _ = sigint.recv() => "SIGINT",
            _ = sigterm.recv() => "SIGTERM",
        };
        eprintln!(
            "\nReceived {}. Stopping before the next phase (timeout: {}s)...",
            name, shutdown_timeout
        );
        token.cancel();
    });

    Ok(cancel_token)
}

/// Setup signal handler for Windows (only Ctrl-C)
#[cfg(not(unix))]
async fn setup_signal_handler(shutdown_timeout: u64) -> Result<CancellationToken, SyncError> {
    let cancel_token = CancellationToken::new();
    let token = cancel_token.clone();

    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!(
                "\nReceived Ctrl-C. Stopping before the next phase (timeout: {}s)...",
                shutdown_timeout
            );
            token.cancel();
        }
    });

    Ok(cancel_token)
}
