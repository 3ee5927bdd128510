//! Configuration type definitions.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Root configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// SQL Server connection settings.
    pub server: ServerConfig,

    /// Which databases to snapshot.
    #[serde(default)]
    pub selection: SelectionConfig,

    /// GitLab repository receiving the snapshot.
    pub repository: RepositoryConfig,

    /// Sync behavior.
    #[serde(default)]
    pub sync: SyncConfig,
}

/// SQL Server connection configuration.
#[derive(Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Server host.
    pub host: String,

    /// Server port (default: 1433).
    #[serde(default = "default_mssql_port")]
    pub port: u16,

    /// SQL login.
    pub user: String,

    /// SQL login password.
    #[serde(default)]
    pub password: String,

    /// Encrypt connection (default: true).
    #[serde(default = "default_true")]
    pub encrypt: bool,

    /// Trust server certificate (default: false).
    #[serde(default)]
    pub trust_server_cert: bool,

    /// Connect timeout in seconds (default: 10).
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: String::new(),
            port: default_mssql_port(),
            user: String::new(),
            password: String::new(),
            encrypt: true,
            trust_server_cert: false,
            connect_timeout_secs: default_connect_timeout(),
        }
    }
}

impl fmt::Debug for ServerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServerConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("password", &"[REDACTED]")
            .field("encrypt", &self.encrypt)
            .field("trust_server_cert", &self.trust_server_cert)
            .field("connect_timeout_secs", &self.connect_timeout_secs)
            .finish()
    }
}

/// Database selection mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DatabaseMode {
    /// Only the databases listed in `databases`.
    #[default]
    Specific,

    /// Every database except the system databases.
    All,

    /// Every database except the system databases and `exclude_databases`.
    AllExcept,
}

impl DatabaseMode {
    /// Parse the mode names used in configuration and environment.
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "specific" => Some(Self::Specific),
            "all" => Some(Self::All),
            "all_except" => Some(Self::AllExcept),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Specific => "specific",
            Self::All => "all",
            Self::AllExcept => "all_except",
        }
    }
}

/// Database selection configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SelectionConfig {
    /// Selection mode (default: specific).
    #[serde(default)]
    pub mode: DatabaseMode,

    /// Allow-list used by `specific` mode.
    #[serde(default)]
    pub databases: Vec<String>,

    /// Deny-list used by `all_except` mode.
    #[serde(default)]
    pub exclude_databases: Vec<String>,
}

/// GitLab repository configuration.
#[derive(Clone, Serialize, Deserialize)]
pub struct RepositoryConfig {
    /// GitLab base URL, e.g. `https://gitlab.example.com`.
    pub url: String,

    /// Personal or project access token with `api` scope.
    #[serde(default)]
    pub token: String,

    /// Project id or full path (`group/project`).
    pub project: String,

    /// Branch receiving the commits (default: main).
    #[serde(default = "default_branch")]
    pub branch: String,

    /// Commit message template; `{timestamp}` is replaced at run time.
    #[serde(default = "default_commit_message")]
    pub commit_message: String,

    /// HTTP request timeout in seconds (default: 60).
    #[serde(default = "default_http_timeout")]
    pub timeout_secs: u64,

    /// Whole-batch retries for transient failures (default: 2).
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Base delay between retries in milliseconds, multiplied by the attempt number.
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,
}

impl Default for RepositoryConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            token: String::new(),
            project: String::new(),
            branch: default_branch(),
            commit_message: default_commit_message(),
            timeout_secs: default_http_timeout(),
            max_retries: default_max_retries(),
            retry_delay_ms: default_retry_delay_ms(),
        }
    }
}

impl fmt::Debug for RepositoryConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RepositoryConfig")
            .field("url", &self.url)
            .field("token", &"[REDACTED]")
            .field("project", &self.project)
            .field("branch", &self.branch)
            .field("commit_message", &self.commit_message)
            .field("timeout_secs", &self.timeout_secs)
            .field("max_retries", &self.max_retries)
            .field("retry_delay_ms", &self.retry_delay_ms)
            .finish()
    }
}

/// Which remote files are eligible for deletion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeletionScope {
    /// Any remote file missing from the snapshot is deleted, including files
    /// of databases that are no longer selected.
    #[default]
    Global,

    /// Only files under folders of databases scanned successfully this run.
    ScannedDatabases,
}

/// Sync behavior configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Databases scanned concurrently (default: 4).
    #[serde(default = "default_parallel_databases")]
    pub parallel_databases: usize,

    /// Deletion scope (default: global).
    #[serde(default)]
    pub deletion_scope: DeletionScope,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            parallel_databases: default_parallel_databases(),
            deletion_scope: DeletionScope::default(),
        }
    }
}

// Default value functions for serde
fn default_mssql_port() -> u16 {
    1433
}

fn default_true() -> bool {
    true
}

fn default_connect_timeout() -> u64 {
    10
}

fn default_branch() -> String {
    "main".to_string()
}

fn default_commit_message() -> String {
    "mssql sync: {timestamp}".to_string()
}

fn default_http_timeout() -> u64 {
    60
}

fn default_max_retries() -> u32 {
    2
}

fn default_retry_delay_ms() -> u64 {
    2_000
}

fn default_parallel_databases() -> usize {
    4
}
