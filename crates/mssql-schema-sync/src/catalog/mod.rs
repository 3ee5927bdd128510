//! SQL Server catalog access.
//!
//! [`CatalogReader`] is the seam between the scanner and the database driver.
//! [`MssqlCatalog`] reads the system catalog over a pooled tiberius connection;
//! [`MemoryCatalog`] serves canned rows for tests and offline runs.

mod mapping;
mod memory;
mod types;

pub use mapping::{map_module, map_tables};
pub use memory::MemoryCatalog;
pub use types::*;

use crate::config::ServerConfig;
use crate::error::{Result, SyncError};
use crate::render::identifier::quote_mssql;
use async_trait::async_trait;
use bb8::{Pool, PooledConnection};
use std::time::Duration;
use tiberius::{AuthMethod, Client, Config, EncryptionLevel, Query, Row};
use tokio::net::TcpStream;
use tokio_util::compat::{Compat, TokioAsyncWriteCompatExt};
use tracing::{debug, info};

/// Databases that are never snapshotted.
pub const SYSTEM_DATABASES: [&str; 4] = ["master", "tempdb", "model", "msdb"];

/// Returns true for `master`, `tempdb`, `model` and `msdb` in any letter case.
pub fn is_system_database(name: &str) -> bool {
    SYSTEM_DATABASES
        .iter()
        .any(|s| s.eq_ignore_ascii_case(name.trim()))
}

/// Read-only access to the catalog of a SQL Server instance.
///
/// Every method issues one query per result set for the whole database.
#[async_trait]
pub trait CatalogReader: Send + Sync {
    /// Names of the online user databases.
    async fn list_databases(&self) -> Result<Vec<String>>;

    /// Procedures, functions, views and triggers of one database.
    async fn read_modules(&self, database: &str) -> Result<Vec<ModuleRow>>;

    /// Tables, columns and index columns of one database.
    async fn read_tables(&self, database: &str) -> Result<TableRows>;

    /// Test the connection; returns the server version string.
    async fn test_connection(&self) -> Result<String>;
}

/// Connection manager for bb8 pool with tiberius.
#[derive(Clone)]
struct TiberiusConnectionManager {
    config: ServerConfig,
}

impl TiberiusConnectionManager {
    fn new(config: ServerConfig) -> Self {
        Self { config }
    }

    fn build_config(&self) -> Config {
        let mut config = Config::new();
        config.host(&self.config.host);
        config.port(self.config.port);
        config.database("master");
        config.application_name("mssql-schema-sync");
        config.authentication(AuthMethod::sql_server(
            &self.config.user,
            &self.config.password,
        ));

        if self.config.encrypt {
            if self.config.trust_server_cert {
                config.trust_cert();
            }
            config.encryption(EncryptionLevel::Required);
        } else {
            config.encryption(EncryptionLevel::NotSupported);
        }

        config
    }
}

#[async_trait]
impl bb8::ManageConnection for TiberiusConnectionManager {
    type Connection = Client<Compat<TcpStream>>;
    type Error = tiberius::error::Error;

    async fn connect(&self) -> std::result::Result<Self::Connection, Self::Error> {
        let config = self.build_config();
        let tcp = TcpStream::connect(config.get_addr())
            .await
            .map_err(|e| tiberius::error::Error::Io {
                kind: e.kind(),
                message: e.to_string(),
            })?;

        tcp.set_nodelay(true).ok();

        Client::connect(config, tcp.compat_write()).await
    }

    async fn is_valid(&self, conn: &mut Self::Connection) -> std::result::Result<(), Self::Error> {
        conn.simple_query("SELECT 1").await?.into_row().await?;
        Ok(())
    }

    fn has_broken(&self, _conn: &mut Self::Connection) -> bool {
        false
    }
}

const LIST_DATABASES: &str = r#"
    SELECT name
    FROM sys.databases
    WHERE state_desc = 'ONLINE'
      AND name NOT IN ('master', 'tempdb', 'model', 'msdb')
    ORDER BY name
"#;

/// Catalog reader backed by a bb8 pool of tiberius connections.
pub struct MssqlCatalog {
    pool: Pool<TiberiusConnectionManager>,
    config: ServerConfig,
}

impl MssqlCatalog {
    /// Connect to the server and verify the connection.
    ///
    /// `max_size` bounds the pool; the scanner never holds more connections
    /// than databases scanned concurrently.
    pub async fn connect(config: &ServerConfig, max_size: u32) -> Result<Self> {
        let timeout = Duration::from_secs(config.connect_timeout_secs);
        let manager = TiberiusConnectionManager::new(config.clone());
        let pool = Pool::builder()
            .max_size(max_size.max(1))
            .connection_timeout(timeout)
            .build_unchecked(manager);

        let catalog = Self {
            pool,
            config: config.clone(),
        };

        let version = tokio::time::timeout(timeout, catalog.test_connection())
            .await
            .map_err(|_| SyncError::Timeout {
                operation: format!("Connecting to {}", config.display_addr()),
                seconds: config.connect_timeout_secs,
            })??;

        info!(
            "Connected to SQL Server: {} (pool_size={})",
            config.display_addr(),
            max_size.max(1)
        );
        debug!("Server version: {}", version);

        Ok(catalog)
    }

    /// Get a pooled connection.
    async fn get_client(&self) -> Result<PooledConnection<'_, TiberiusConnectionManager>> {
        self.pool.get().await.map_err(|e| {
            SyncError::pool(e, format!("getting connection to {}", self.config.display_addr()))
        })
    }

    /// Run one catalog query against `database` and return its only result set.
    async fn query_database(&self, database: &str, sql: &str) -> Result<Vec<Row>> {
        let quoted = quote_mssql(database)
            .map_err(|_| SyncError::catalog(database, "invalid database name"))?;
        let sql = sql.replace("{db}", &quoted);

        let mut client = self.get_client().await?;
        let stream = Query::new(sql)
            .query(&mut *client)
            .await
            .map_err(|e| SyncError::catalog(database, e))?;
        stream
            .into_first_result()
            .await
            .map_err(|e| SyncError::catalog(database, e))
    }
}

const MODULES: &str = r#"
    SELECT s.name, o.name, o.type, m.definition
    FROM {db}.sys.objects o
    JOIN {db}.sys.schemas s ON s.schema_id = o.schema_id
    LEFT JOIN {db}.sys.sql_modules m ON m.object_id = o.object_id
    WHERE o.type IN ('P', 'FN', 'IF', 'TF', 'V', 'TR')
      AND o.is_ms_shipped = 0
    ORDER BY s.name, o.name
"#;

const TABLES: &str = r#"
    SELECT t.object_id, s.name, t.name
    FROM {db}.sys.tables t
    JOIN {db}.sys.schemas s ON s.schema_id = t.schema_id
    WHERE t.is_ms_shipped = 0
    ORDER BY s.name, t.name
"#;

const COLUMNS: &str = r#"
    SELECT
        c.object_id,
        c.column_id,
        c.name,
        ty.name,
        CAST(c.max_length AS INT),
        CAST(c.precision AS INT),
        CAST(c.scale AS INT),
        CAST(c.is_nullable AS INT),
        CAST(c.is_identity AS INT),
        CAST(ic.seed_value AS NVARCHAR(40)),
        CAST(ic.increment_value AS NVARCHAR(40))
    FROM {db}.sys.columns c
    JOIN {db}.sys.tables t ON t.object_id = c.object_id
    JOIN {db}.sys.types ty ON ty.user_type_id = c.user_type_id
    LEFT JOIN {db}.sys.identity_columns ic
        ON ic.object_id = c.object_id AND ic.column_id = c.column_id
    WHERE t.is_ms_shipped = 0
    ORDER BY c.object_id, c.column_id
"#;

const INDEX_COLUMNS: &str = r#"
    SELECT
        i.object_id,
        i.name,
        CAST(i.is_primary_key AS INT),
        CAST(i.is_unique AS INT),
        CASE WHEN i.type = 1 THEN 1 ELSE 0 END,
        CASE WHEN i.has_filter = 1 THEN i.filter_definition END,
        c.name,
        CAST(ic.key_ordinal AS INT),
        ic.index_column_id,
        CAST(ic.is_descending_key AS INT),
        CAST(ic.is_included_column AS INT)
    FROM {db}.sys.indexes i
    JOIN {db}.sys.tables t ON t.object_id = i.object_id
    JOIN {db}.sys.index_columns ic
        ON ic.object_id = i.object_id AND ic.index_id = i.index_id
    JOIN {db}.sys.columns c
        ON c.object_id = ic.object_id AND c.column_id = ic.column_id
    WHERE t.is_ms_shipped = 0
      AND i.type IN (1, 2)
      AND i.is_hypothetical = 0
    ORDER BY i.object_id, i.name, ic.key_ordinal, ic.index_column_id
"#;

fn get_str(row: &Row, idx: usize) -> String {
    row.get::<&str, _>(idx).unwrap_or_default().to_string()
}

fn get_flag(row: &Row, idx: usize) -> bool {
    row.get::<i32, _>(idx).unwrap_or(0) == 1
}

#[async_trait]
impl CatalogReader for MssqlCatalog {
    async fn list_databases(&self) -> Result<Vec<String>> {
        let mut client = self.get_client().await?;
        let rows = client
            .simple_query(LIST_DATABASES)
            .await?
            .into_first_result()
            .await?;

        Ok(rows.iter().map(|row| get_str(row, 0)).collect())
    }

    async fn read_modules(&self, database: &str) -> Result<Vec<ModuleRow>> {
        let rows = self.query_database(database, MODULES).await?;
        debug!("{}: {} module rows", database, rows.len());

        Ok(rows
            .iter()
            .map(|row| ModuleRow {
                schema: get_str(row, 0),
                name: get_str(row, 1),
                type_code: get_str(row, 2),
                definition: row.get::<&str, _>(3).map(String::from),
            })
            .collect())
    }

    async fn read_tables(&self, database: &str) -> Result<TableRows> {
        let tables = self
            .query_database(database, TABLES)
            .await?
            .iter()
            .map(|row| TableRow {
                object_id: row.get::<i32, _>(0).unwrap_or(0),
                schema: get_str(row, 1),
                name: get_str(row, 2),
            })
            .collect();

        let columns = self
            .query_database(database, COLUMNS)
            .await?
            .iter()
            .map(|row| ColumnRow {
                object_id: row.get::<i32, _>(0).unwrap_or(0),
                column_id: row.get::<i32, _>(1).unwrap_or(0),
                name: get_str(row, 2),
                data_type: get_str(row, 3),
                max_length: row.get::<i32, _>(4).unwrap_or(0),
                precision: row.get::<i32, _>(5).unwrap_or(0),
                scale: row.get::<i32, _>(6).unwrap_or(0),
                is_nullable: get_flag(row, 7),
                is_identity: get_flag(row, 8),
                identity_seed: row.get::<&str, _>(9).map(String::from),
                identity_increment: row.get::<&str, _>(10).map(String::from),
            })
            .collect();

        let index_columns = self
            .query_database(database, INDEX_COLUMNS)
            .await?
            .iter()
            .map(|row| IndexColumnRow {
                object_id: row.get::<i32, _>(0).unwrap_or(0),
                index_name: get_str(row, 1),
                is_primary_key: get_flag(row, 2),
                is_unique: get_flag(row, 3),
                is_clustered: get_flag(row, 4),
                filter_definition: row.get::<&str, _>(5).map(String::from),
                column_name: get_str(row, 6),
                key_ordinal: row.get::<i32, _>(7).unwrap_or(0),
                index_column_id: row.get::<i32, _>(8).unwrap_or(0),
                is_descending: get_flag(row, 9),
                is_included: get_flag(row, 10),
            })
            .collect();

        Ok(TableRows {
            tables,
            columns,
            index_columns,
        })
    }

    async fn test_connection(&self) -> Result<String> {
        let mut client = self.get_client().await?;
        let row = client
            .simple_query("SELECT CAST(SERVERPROPERTY('ProductVersion') AS NVARCHAR(128))")
            .await?
            .into_row()
            .await?;

        Ok(row
            .as_ref()
            .and_then(|r| r.get::<&str, _>(0))
            .unwrap_or("unknown")
            .to_string())
    }
}
