//! Run statistics.
//!
//! Every pipeline stage returns its counts and failures; the orchestrator
//! folds them into one [`RunStatistics`] value per run.

use crate::diff::CommitAction;
use crate::error::SyncError;
use crate::publish::PublishOutcome;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use tracing::{info, warn};

/// Category of a non-fatal failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// A database could not be read (missing, offline, permission denied).
    CatalogQuery,
    /// One object could not be mapped or rendered.
    Render,
    /// Two objects of one database mapped to the same path.
    DuplicatePath,
    /// Two paths differ only by letter case.
    CaseCollision,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::CatalogQuery => "catalog_query",
            Self::Render => "render",
            Self::DuplicatePath => "duplicate_path",
            Self::CaseCollision => "case_collision",
        };
        f.write_str(s)
    }
}

/// A failure that skipped an object or a database without aborting the run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordedFailure {
    pub database: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub object: Option<String>,
    pub kind: FailureKind,
    pub message: String,
}

impl RecordedFailure {
    /// Record an error against a database and optionally an object.
    pub fn from_error(database: &str, object: Option<String>, error: &SyncError) -> Self {
        let kind = match error {
            SyncError::Render { .. } => FailureKind::Render,
            SyncError::DuplicatePath { .. } => FailureKind::DuplicatePath,
            _ => FailureKind::CatalogQuery,
        };
        Self {
            database: database.to_string(),
            object,
            kind,
            message: error.to_string(),
        }
    }
}

impl fmt::Display for RecordedFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.object {
            Some(object) => write!(f, "[{}] {} {}: {}", self.kind, self.database, object, self.message),
            None => write!(f, "[{}] {}: {}", self.kind, self.database, self.message),
        }
    }
}

/// Counts for one database.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatabaseStats {
    /// Objects read from the catalog.
    pub objects: usize,
    /// Files contributed to the snapshot.
    pub files: usize,
    pub created: usize,
    pub updated: usize,
    pub deleted: usize,
    /// The database contributed nothing this run.
    pub failed: bool,
}

/// Result of a sync run.
#[derive(Debug, Clone, Serialize)]
pub struct RunStatistics {
    /// Unique run identifier.
    pub run_id: String,

    /// When the run started.
    pub started_at: DateTime<Utc>,

    /// Total duration in seconds.
    pub duration_seconds: f64,

    /// The plan was computed but not published.
    pub dry_run: bool,

    /// Per-database counts, keyed by database name.
    pub databases: BTreeMap<String, DatabaseStats>,

    /// Non-fatal failures in the order they were recorded.
    pub failures: Vec<RecordedFailure>,

    /// Remote files already present before the run.
    pub remote_files: usize,

    /// Commit outcome; `None` for dry runs.
    pub commit: Option<PublishOutcome>,
}

impl RunStatistics {
    pub fn new(dry_run: bool) -> Self {
        Self {
            run_id: uuid::Uuid::new_v4().to_string(),
            started_at: Utc::now(),
            duration_seconds: 0.0,
            dry_run,
            databases: BTreeMap::new(),
            failures: Vec::new(),
            remote_files: 0,
            commit: None,
        }
    }

    /// Count each action against the database named by the first path segment.
    pub fn apply_actions(&mut self, actions: &[CommitAction]) {
        for action in actions {
            let database = action.path().split('/').next().unwrap_or_default();
            let stats = self.databases.entry(database.to_string()).or_default();
            match action {
                CommitAction::Create { .. } => stats.created += 1,
                CommitAction::Update { .. } => stats.updated += 1,
                CommitAction::Delete { .. } => stats.deleted += 1,
            }
        }
    }

    pub fn created(&self) -> usize {
        self.databases.values().map(|d| d.created).sum()
    }

    pub fn updated(&self) -> usize {
        self.databases.values().map(|d| d.updated).sum()
    }

    pub fn deleted(&self) -> usize {
        self.databases.values().map(|d| d.deleted).sum()
    }

    /// Stop the clock.
    pub fn finish(&mut self) {
        let elapsed = Utc::now() - self.started_at;
        self.duration_seconds = elapsed.num_milliseconds() as f64 / 1000.0;
    }

    /// Log per-database counts, every recorded failure and the commit outcome.
    pub fn log_summary(&self) {
        for (name, db) in &self.databases {
            info!(
                "{}: {} objects, {} files (created {}, updated {}, deleted {}){}",
                name,
                db.objects,
                db.files,
                db.created,
                db.updated,
                db.deleted,
                if db.failed { " [FAILED]" } else { "" }
            );
        }

        for failure in &self.failures {
            warn!("{}", failure);
        }

        match &self.commit {
            Some(PublishOutcome::Committed(info)) if info.additions == 0 && info.deletions == 0 => {
                info!("Commit {}: no actual changes", info.id)
            }
            Some(PublishOutcome::Committed(info)) => info!(
                "Commit {}: +{} -{} lines",
                info.id, info.additions, info.deletions
            ),
            Some(PublishOutcome::Skipped) => info!("Nothing to commit"),
            None if self.dry_run => info!("Dry run: nothing published"),
            None => {}
        }

        info!(
            "Sync {}: {} created, {} updated, {} deleted, {} failures in {:.1}s",
            self.run_id,
            self.created(),
            self.updated(),
            self.deleted(),
            self.failures.len(),
            self.duration_seconds
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_apply_actions_attributes_by_database_folder() {
        let mut stats = RunStatistics::new(false);
        stats.apply_actions(&[
            CommitAction::Create {
                path: "SalesDB/tables/dbo.Orders.sql".into(),
                content: "x\n".into(),
            },
            CommitAction::Update {
                path: "SalesDB/views/dbo.v.sql".into(),
                content: "x\n".into(),
            },
            CommitAction::Delete {
                path: "Legacy/procedures/dbo.p.sql".into(),
            },
        ]);

        assert_eq!(stats.databases["SalesDB"].created, 1);
        assert_eq!(stats.databases["SalesDB"].updated, 1);
        assert_eq!(stats.databases["Legacy"].deleted, 1);
        assert_eq!((stats.created(), stats.updated(), stats.deleted()), (1, 1, 1));
    }

    #[test]
    fn test_failure_kind_from_error() {
        let failure = RecordedFailure::from_error(
            "SalesDB",
            Some("dbo.usp_Secret".into()),
            &SyncError::render("SalesDB.dbo.usp_Secret", "encrypted"),
        );
        assert_eq!(failure.kind, FailureKind::Render);
        assert!(failure.to_string().starts_with("[render] SalesDB dbo.usp_Secret"));

        let failure =
            RecordedFailure::from_error("HR", None, &SyncError::catalog("HR", "offline"));
        assert_eq!(failure.kind, FailureKind::CatalogQuery);
    }

    #[test]
    fn test_serializes_to_json() {
        let mut stats = RunStatistics::new(true);
        stats.finish();
        let json = serde_json::to_value(&stats).unwrap();
        assert_eq!(json["dry_run"], true);
        assert!(json["commit"].is_null());
        assert!(json["run_id"].as_str().unwrap().len() == 36);
    }
}
