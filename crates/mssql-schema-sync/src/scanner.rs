//! Catalog scanner.
//!
//! Resolves the database selection against the server, reads each selected
//! database with one query per result set, renders every object and merges
//! the per-database results into a single [`TargetMap`].

use crate::catalog::{is_system_database, map_module, map_tables, CatalogReader, DatabaseObject};
use crate::config::{DatabaseMode, SelectionConfig};
use crate::error::{Result, SyncError};
use crate::render::{render, RenderedFile};
use crate::stats::{DatabaseStats, FailureKind, RecordedFailure};
use futures::stream::{self, StreamExt};
use std::collections::btree_map::{self, Entry};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Snapshot files keyed by repository path.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TargetMap(BTreeMap<String, RenderedFile>);

impl TargetMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a file; a path already present is a [`SyncError::DuplicatePath`].
    pub fn insert(&mut self, file: RenderedFile) -> Result<()> {
        match self.0.entry(file.path.clone()) {
            Entry::Occupied(_) => Err(SyncError::DuplicatePath { path: file.path }),
            Entry::Vacant(slot) => {
                slot.insert(file);
                Ok(())
            }
        }
    }

    /// Move every file of `other` into this map.
    ///
    /// Nothing is moved if any path is already present.
    pub fn merge(&mut self, other: TargetMap) -> Result<()> {
        if let Some(path) = other.paths().find(|p| self.contains(p)) {
            return Err(SyncError::DuplicatePath {
                path: path.to_string(),
            });
        }
        self.0.extend(other.0);
        Ok(())
    }

    pub fn get(&self, path: &str) -> Option<&RenderedFile> {
        self.0.get(path)
    }

    pub fn contains(&self, path: &str) -> bool {
        self.0.contains_key(path)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Paths in ascending order.
    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn iter(&self) -> btree_map::Values<'_, String, RenderedFile> {
        self.0.values()
    }

    /// Groups of paths that are equal ignoring letter case.
    pub fn case_collisions(&self) -> Vec<Vec<String>> {
        let mut groups: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for path in self.0.keys() {
            groups.entry(path.to_lowercase()).or_default().push(path.clone());
        }
        groups.into_values().filter(|g| g.len() > 1).collect()
    }
}

impl<'a> IntoIterator for &'a TargetMap {
    type Item = &'a RenderedFile;
    type IntoIter = btree_map::Values<'a, String, RenderedFile>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Resolve the configured selection against the server's online databases.
///
/// Matching is case-insensitive and the server's spelling is returned.
/// System databases are never selected. A name configured in `specific`
/// mode that the server does not have becomes a recorded failure.
pub fn resolve_databases(
    selection: &SelectionConfig,
    live: &[String],
) -> (Vec<String>, Vec<RecordedFailure>) {
    let live: Vec<&String> = live.iter().filter(|d| !is_system_database(d)).collect();
    let lookup = |name: &str| {
        live.iter()
            .find(|d| d.eq_ignore_ascii_case(name.trim()))
            .map(|d| d.to_string())
    };

    let mut selected = BTreeSet::new();
    let mut failures = Vec::new();

    match selection.mode {
        DatabaseMode::Specific => {
            for name in selection.databases.iter().filter(|n| !n.trim().is_empty()) {
                if is_system_database(name) {
                    warn!("Ignoring system database in selection: {}", name.trim());
                    continue;
                }
                match lookup(name) {
                    Some(server_name) => {
                        selected.insert(server_name);
                    }
                    None => failures.push(RecordedFailure {
                        database: name.trim().to_string(),
                        object: None,
                        kind: FailureKind::CatalogQuery,
                        message: "database does not exist or is not online".to_string(),
                    }),
                }
            }
        }
        DatabaseMode::All => {
            selected.extend(live.iter().map(|d| d.to_string()));
        }
        DatabaseMode::AllExcept => {
            let excluded: Vec<String> = selection
                .exclude_databases
                .iter()
                .map(|d| d.trim().to_lowercase())
                .collect();
            selected.extend(
                live.iter()
                    .filter(|d| !excluded.contains(&d.to_lowercase()))
                    .map(|d| d.to_string()),
            );
        }
    }

    (selected.into_iter().collect(), failures)
}

/// Files and counts produced by scanning one database.
#[derive(Debug, Default)]
pub struct DatabaseScan {
    pub files: TargetMap,
    pub objects: usize,
    pub failures: Vec<RecordedFailure>,
    /// A duplicate path was rendered; `files` is empty.
    pub aborted: bool,
}

/// Merged result of scanning every selected database.
#[derive(Debug, Default)]
pub struct ScanOutcome {
    pub target: TargetMap,
    pub databases: BTreeMap<String, DatabaseStats>,
    /// Databases whose files made it into `target`.
    pub scanned: Vec<String>,
    pub failures: Vec<RecordedFailure>,
}

/// Scans databases concurrently through a [`CatalogReader`].
pub struct CatalogScanner {
    catalog: Arc<dyn CatalogReader>,
    parallel_databases: usize,
}

impl CatalogScanner {
    pub fn new(catalog: Arc<dyn CatalogReader>, parallel_databases: usize) -> Self {
        Self {
            catalog,
            parallel_databases: parallel_databases.max(1),
        }
    }

    /// Scan `databases`, up to `parallel_databases` at a time.
    ///
    /// A failing database is recorded and skipped. Results are merged in
    /// database name order once every scan has finished.
    pub async fn scan(&self, databases: &[String]) -> ScanOutcome {
        let mut results: Vec<(String, Result<DatabaseScan>)> = stream::iter(databases.to_vec())
            .map(|database| {
                let catalog = Arc::clone(&self.catalog);
                async move {
                    let result = scan_database(catalog.as_ref(), &database).await;
                    (database, result)
                }
            })
            .buffer_unordered(self.parallel_databases)
            .collect()
            .await;
        results.sort_by(|a, b| a.0.cmp(&b.0));

        let mut outcome = ScanOutcome::default();
        for (database, result) in results {
            let stats = outcome.databases.entry(database.clone()).or_default();
            match result {
                Ok(scan) => {
                    stats.objects = scan.objects;
                    stats.files = scan.files.len();
                    outcome.failures.extend(scan.failures);

                    if scan.aborted {
                        warn!("{}: skipped: duplicate file paths", database);
                        stats.failed = true;
                        continue;
                    }

                    if let Err(e) = outcome.target.merge(scan.files) {
                        warn!("{}: {}", database, e);
                        stats.failed = true;
                        outcome
                            .failures
                            .push(RecordedFailure::from_error(&database, None, &e));
                        continue;
                    }

                    info!("{}: {} objects, {} files", database, stats.objects, stats.files);
                    outcome.scanned.push(database);
                }
                Err(e) => {
                    warn!("{}: skipped: {}", database, e);
                    stats.failed = true;
                    outcome
                        .failures
                        .push(RecordedFailure::from_error(&database, None, &e));
                }
            }
        }

        for group in outcome.target.case_collisions() {
            let database = group[0].split('/').next().unwrap_or_default().to_string();
            warn!("Paths differ only by case: {}", group.join(", "));
            outcome.failures.push(RecordedFailure {
                database,
                object: None,
                kind: FailureKind::CaseCollision,
                message: format!("paths differ only by letter case: {}", group.join(", ")),
            });
        }

        outcome
    }
}

/// Read, map and render every object of one database.
///
/// Object failures are recorded in the returned scan. Catalog failures fail
/// the whole database. A duplicate path is recorded alongside the object
/// failures and leaves the scan aborted with no files.
pub async fn scan_database(catalog: &dyn CatalogReader, database: &str) -> Result<DatabaseScan> {
    let modules = catalog.read_modules(database).await?;
    let tables = catalog.read_tables(database).await?;
    debug!(
        "{}: {} modules, {} tables, {} columns, {} index columns",
        database,
        modules.len(),
        tables.tables.len(),
        tables.columns.len(),
        tables.index_columns.len()
    );

    let mut scan = DatabaseScan {
        objects: modules.len() + tables.tables.len(),
        ..DatabaseScan::default()
    };

    let objects = modules
        .into_iter()
        .map(|row| {
            let object = format!("{}.{}", row.schema, row.name);
            map_module(database, row).map_err(|e| (object, e))
        })
        .chain(map_tables(database, tables).into_iter().map(|r| {
            r.map_err(|e| {
                let object = match &e {
                    SyncError::Render { object, .. } => object
                        .strip_prefix(&format!("{}.", database))
                        .unwrap_or(object)
                        .to_string(),
                    _ => String::new(),
                };
                (object, e)
            })
        }));

    for result in objects {
        let rendered = result.and_then(|object: DatabaseObject| {
            let name = format!("{}.{}", object.name().schema, object.name().name);
            render(&object).map_err(|e| (name, e))
        });
        match rendered {
            Ok(file) => {
                if let Err(e) = scan.files.insert(file) {
                    warn!("{}: {}", database, e);
                    scan.failures
                        .push(RecordedFailure::from_error(database, None, &e));
                    scan.aborted = true;
                }
            }
            Err((object, e)) => {
                warn!("{}: skipping {}: {}", database, object, e);
                scan.failures
                    .push(RecordedFailure::from_error(database, Some(object), &e));
            }
        }
    }

    if scan.aborted {
        scan.files = TargetMap::new();
    }

    Ok(scan)
}
