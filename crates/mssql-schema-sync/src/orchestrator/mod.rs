//! Sync orchestrator - main workflow coordinator.

use crate::catalog::{CatalogReader, MssqlCatalog};
use crate::config::{Config, DeletionScope};
use crate::diff::{diff_with_scope, CommitAction};
use crate::error::{Result, SyncError};
use crate::publish::{commit_message, CommitPublisher, RetryPolicy};
use crate::remote::{GitLabRepository, Repository};
use crate::scanner::{resolve_databases, CatalogScanner};
use crate::stats::RunStatistics;
use chrono::Local;
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Sync orchestrator.
pub struct Orchestrator {
    config: Config,
    catalog: Arc<dyn CatalogReader>,
    repository: Arc<dyn Repository>,
    phase: watch::Sender<RunPhase>,
}

/// Phase a run is currently in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunPhase {
    Idle,
    Resolving,
    Scanning,
    Listing,
    Diffing,
    /// The commit request may be in flight.
    Publishing,
    Finished,
}

/// Result of a health check.
#[derive(Debug, Clone, Serialize)]
pub struct HealthCheckResult {
    /// Database connection succeeded.
    pub database_connected: bool,

    /// Server version reported by the database.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub server_version: Option<String>,

    /// Database connection latency in milliseconds.
    pub database_latency_ms: u64,

    /// Database error message if connection failed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub database_error: Option<String>,

    /// Repository is reachable with the configured token.
    pub repository_accessible: bool,

    /// Repository latency in milliseconds.
    pub repository_latency_ms: u64,

    /// Repository error message if the check failed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub repository_error: Option<String>,

    /// Overall health status.
    pub healthy: bool,
}

impl Orchestrator {
    /// Connect to SQL Server and build the GitLab client.
    pub async fn new(config: Config) -> Result<Self> {
        let max_size = pool_size(config.sync.parallel_databases);
        let catalog = MssqlCatalog::connect(&config.server, max_size).await?;
        let repository = GitLabRepository::new(&config.repository)?;

        Ok(Self::with_backends(
            config,
            Arc::new(catalog),
            Arc::new(repository),
        ))
    }

    /// Build an orchestrator over any catalog and repository.
    pub fn with_backends(
        config: Config,
        catalog: Arc<dyn CatalogReader>,
        repository: Arc<dyn Repository>,
    ) -> Self {
        Self {
            config,
            catalog,
            repository,
            phase: watch::channel(RunPhase::Idle).0,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Follow the phase of runs on this orchestrator.
    pub fn subscribe_phase(&self) -> watch::Receiver<RunPhase> {
        self.phase.subscribe()
    }

    fn enter(&self, phase: RunPhase) {
        self.phase.send_replace(phase);
    }

    /// Names of the online user databases on the server.
    pub async fn list_databases(&self) -> Result<Vec<String>> {
        let mut databases = self.catalog.list_databases().await?;
        databases.retain(|d| !crate::catalog::is_system_database(d));
        Ok(databases)
    }

    /// Run one sync: scan, list, diff and publish.
    ///
    /// Cancellation is honored before the listing and before the commit is
    /// sent. Once [`RunPhase::Publishing`] is entered the run completes.
    /// With `dry_run` the plan is computed and logged but not published.
    pub async fn run(&self, cancel: CancellationToken, dry_run: bool) -> Result<RunStatistics> {
        let mut stats = RunStatistics::new(dry_run);
        let branch = &self.config.repository.branch;

        info!("Starting sync run: {}", stats.run_id);
        if self.config.sync.deletion_scope == DeletionScope::ScannedDatabases {
            info!("Deletion scope: scanned_databases (files of unscanned databases are kept)");
        }

        // Phase 1: Resolve selection
        self.enter(RunPhase::Resolving);
        info!(
            "Phase 1: Resolving databases (mode: {})",
            self.config.selection.mode.as_str()
        );
        let live = self.catalog.list_databases().await?;
        let (databases, failures) = resolve_databases(&self.config.selection, &live);
        // Configured but offline or missing: keep whatever was published for it
        let mut retained: Vec<String> = failures.iter().map(|f| f.database.clone()).collect();
        for failure in failures {
            warn!("{}", failure);
            stats.databases.entry(failure.database.clone()).or_default().failed = true;
            stats.failures.push(failure);
        }
        info!("Selected {} databases", databases.len());

        // Phase 2: Scan
        self.enter(RunPhase::Scanning);
        info!("Phase 2: Scanning catalogs");
        let scanner = CatalogScanner::new(
            Arc::clone(&self.catalog),
            self.config.sync.parallel_databases,
        );
        let outcome = scanner.scan(&databases).await;
        stats.databases.extend(outcome.databases);
        stats.failures.extend(outcome.failures);
        retained.extend(
            databases
                .iter()
                .filter(|d| !outcome.scanned.contains(d))
                .cloned(),
        );
        info!(
            "Snapshot: {} files from {} databases",
            outcome.target.len(),
            outcome.scanned.len()
        );

        if cancel.is_cancelled() {
            return Err(SyncError::Cancelled);
        }

        // Phase 3: List remote
        self.enter(RunPhase::Listing);
        info!("Phase 3: Listing repository branch {}", branch);
        let remote = self.repository.list_paths(branch).await?;
        stats.remote_files = remote.len();
        info!("Repository holds {} managed files", remote.len());

        // Phase 4: Diff
        self.enter(RunPhase::Diffing);
        if !retained.is_empty() {
            warn!(
                "Keeping existing files of unreadable databases: {}",
                retained.join(", ")
            );
        }
        let actions = diff_with_scope(
            &outcome.target,
            &remote,
            self.config.sync.deletion_scope,
            &outcome.scanned,
            &retained,
        );
        stats.apply_actions(&actions);
        info!(
            "Phase 4: Diff: {} create, {} update, {} delete",
            stats.created(),
            stats.updated(),
            stats.deleted()
        );

        if dry_run {
            for action in &actions {
                log_action(action);
            }
            stats.finish();
            stats.log_summary();
            self.enter(RunPhase::Finished);
            return Ok(stats);
        }

        if cancel.is_cancelled() {
            return Err(SyncError::Cancelled);
        }

        // Phase 5: Publish
        self.enter(RunPhase::Publishing);
        info!("Phase 5: Publishing");
        let message = commit_message(&self.config.repository.commit_message, Local::now());
        let publisher = CommitPublisher::new(
            Arc::clone(&self.repository),
            RetryPolicy::from_config(&self.config.repository),
        );
        let outcome = publisher.publish(&actions, branch, &message).await;
        self.enter(RunPhase::Finished);
        stats.commit = Some(outcome?);

        stats.finish();
        stats.log_summary();
        Ok(stats)
    }

    /// Check the database connection and repository access.
    pub async fn health_check(&self) -> Result<HealthCheckResult> {
        let start = Instant::now();
        let database = self.catalog.test_connection().await;
        let database_latency_ms = elapsed_ms(start);

        Ok(health_report(
            database,
            database_latency_ms,
            self.repository.as_ref(),
            &self.config.repository.branch,
        )
        .await)
    }

    /// Health check straight from a configuration.
    ///
    /// A server that refuses the connection is reported, and the repository
    /// is still checked.
    pub async fn health_check_config(config: &Config) -> Result<HealthCheckResult> {
        let repository = GitLabRepository::new(&config.repository)?;

        let start = Instant::now();
        let database = match MssqlCatalog::connect(&config.server, 1).await {
            Ok(catalog) => catalog.test_connection().await,
            Err(e) => Err(e),
        };
        let database_latency_ms = elapsed_ms(start);

        Ok(health_report(database, database_latency_ms, &repository, &config.repository.branch).await)
    }
}

async fn health_report(
    database: Result<String>,
    database_latency_ms: u64,
    repository: &dyn Repository,
    branch: &str,
) -> HealthCheckResult {
    let (database_connected, server_version, database_error) = match database {
        Ok(version) => (true, Some(version), None),
        Err(e) => (false, None, Some(e.to_string())),
    };

    let start = Instant::now();
    let (repository_accessible, repository_error) = match repository.check_access(branch).await {
        Ok(()) => (true, None),
        Err(e) => (false, Some(e.to_string())),
    };
    let repository_latency_ms = elapsed_ms(start);

    HealthCheckResult {
        database_connected,
        server_version,
        database_latency_ms,
        database_error,
        repository_accessible,
        repository_latency_ms,
        repository_error,
        healthy: database_connected && repository_accessible,
    }
}

fn elapsed_ms(start: Instant) -> u64 {
    u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX)
}

/// Connection pool size for `parallel_databases` concurrent scans.
fn pool_size(parallel_databases: usize) -> u32 {
    u32::try_from(parallel_databases).unwrap_or(u32::MAX)
}

fn log_action(action: &CommitAction) {
    match action {
        CommitAction::Create { path, .. } => info!("  create {}", path),
        CommitAction::Update { path, .. } => debug!("  update {}", path),
        CommitAction::Delete { path } => info!("  delete {}", path),
    }
}
