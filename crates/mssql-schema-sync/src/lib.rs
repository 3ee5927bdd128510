//! # mssql-schema-sync
//!
//! Snapshot SQL Server schema objects into a GitLab repository.
//!
//! Each run reads the catalogs of the selected databases, renders every
//! procedure, function, view, trigger and table as an idempotent T-SQL script
//! and publishes the difference against the target branch as one commit:
//!
//! - **Rendering** of modules as `CREATE OR ALTER` and tables from catalog rows
//! - **Parallel scans** across databases with per-database failure isolation
//! - **Single-commit publish** with whole-batch retry of transient failures
//! - **Dry runs** that compute and log the plan without committing
//!
//! ## Example
//!
//! ```rust,no_run
//! use mssql_schema_sync::{Config, Orchestrator};
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::load("config.yaml")?;
//!     let orchestrator = Orchestrator::new(config).await?;
//!     let stats = orchestrator.run(CancellationToken::new(), false).await?;
//!     println!("{} created, {} deleted", stats.created(), stats.deleted());
//!     Ok(())
//! }
//! ```

pub mod catalog;
pub mod config;
pub mod diff;
pub mod error;
pub mod orchestrator;
pub mod publish;
pub mod remote;
pub mod render;
pub mod scanner;
pub mod stats;

// Re-exports for convenient access
pub use catalog::{CatalogReader, MemoryCatalog, MssqlCatalog};
pub use config::{Config, DatabaseMode, DeletionScope};
pub use diff::{diff, diff_with_scope, CommitAction};
pub use error::{Result, SyncError};
pub use orchestrator::{HealthCheckResult, Orchestrator, RunPhase};
pub use publish::{CommitPublisher, PublishOutcome, RetryPolicy};
pub use remote::{GitLabRepository, MemoryRepository, RemotePathSet, Repository};
pub use render::{render, RenderedFile};
pub use scanner::{CatalogScanner, TargetMap};
pub use stats::{RunStatistics, RecordedFailure};
