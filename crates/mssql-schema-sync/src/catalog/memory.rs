//! In-memory catalog reader.

use super::types::{ModuleRow, TableRows};
use super::CatalogReader;
use crate::error::{Result, SyncError};
use async_trait::async_trait;
use std::collections::BTreeMap;

#[derive(Debug, Clone, Default)]
struct MemoryDatabase {
    modules: Vec<ModuleRow>,
    tables: TableRows,
    failure: Option<String>,
}

/// Catalog reader serving rows held in memory.
///
/// Used by tests and by dry runs against a captured catalog. Individual
/// databases can be marked as failing to exercise per-database error paths.
#[derive(Debug, Clone, Default)]
pub struct MemoryCatalog {
    databases: BTreeMap<String, MemoryDatabase>,
    unreachable: bool,
}

impl MemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an empty online database.
    pub fn with_database(mut self, name: &str) -> Self {
        self.databases.entry(name.to_string()).or_default();
        self
    }

    /// Add a module row to a database, creating the database if needed.
    pub fn with_module(mut self, database: &str, row: ModuleRow) -> Self {
        self.databases
            .entry(database.to_string())
            .or_default()
            .modules
            .push(row);
        self
    }

    /// Replace the table result sets of a database.
    pub fn with_tables(mut self, database: &str, tables: TableRows) -> Self {
        self.databases.entry(database.to_string()).or_default().tables = tables;
        self
    }

    /// Make every catalog query against `database` fail.
    pub fn with_failing_database(mut self, database: &str, message: &str) -> Self {
        self.databases.entry(database.to_string()).or_default().failure = Some(message.to_string());
        self
    }

    /// Make every call fail as if the server were down.
    pub fn unreachable(mut self) -> Self {
        self.unreachable = true;
        self
    }

    fn check_reachable(&self) -> Result<()> {
        if self.unreachable {
            return Err(SyncError::pool("connection refused", "memory catalog"));
        }
        Ok(())
    }

    fn database(&self, name: &str) -> Result<&MemoryDatabase> {
        self.check_reachable()?;
        let db = self
            .databases
            .get(name)
            .ok_or_else(|| SyncError::catalog(name, "database does not exist"))?;
        if let Some(message) = &db.failure {
            return Err(SyncError::catalog(name, message));
        }
        Ok(db)
    }
}

#[async_trait]
impl CatalogReader for MemoryCatalog {
    async fn list_databases(&self) -> Result<Vec<String>> {
        self.check_reachable()?;
        Ok(self.databases.keys().cloned().collect())
    }

    async fn read_modules(&self, database: &str) -> Result<Vec<ModuleRow>> {
        Ok(self.database(database)?.modules.clone())
    }

    async fn read_tables(&self, database: &str) -> Result<TableRows> {
        Ok(self.database(database)?.tables.clone())
    }

    async fn test_connection(&self) -> Result<String> {
        self.check_reachable()?;
        Ok("memory".to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_failing_database() {
        let catalog = MemoryCatalog::new()
            .with_database("SalesDB")
            .with_failing_database("HR", "permission denied");

        assert_eq!(catalog.list_databases().await.unwrap(), vec!["HR", "SalesDB"]);
        assert!(catalog.read_modules("SalesDB").await.unwrap().is_empty());

        let err = catalog.read_tables("HR").await.unwrap_err();
        assert!(matches!(err, SyncError::CatalogQuery { .. }));
    }

    #[tokio::test]
    async fn test_unreachable() {
        let catalog = MemoryCatalog::new().with_database("SalesDB").unreachable();
        assert!(catalog.test_connection().await.is_err());
        assert_eq!(catalog.list_databases().await.unwrap_err().exit_code(), 2);
    }
}
