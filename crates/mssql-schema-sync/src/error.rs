//! Error types for the schema sync library.

use thiserror::Error;

/// Main error type for sync operations.
#[derive(Error, Debug)]
pub enum SyncError {
    /// Configuration error (invalid YAML, missing fields, etc.)
    #[error("Configuration error: {0}")]
    Config(String),

    /// SQL Server connection or protocol error
    #[error("Database connection error: {0}")]
    Connection(#[from] tiberius::error::Error),

    /// Connection pool error with context
    #[error("Pool error: {message}\n  Context: {context}")]
    Pool { message: String, context: String },

    /// Catalog query failed for one database
    #[error("Catalog query failed for database {database}: {message}")]
    CatalogQuery { database: String, message: String },

    /// A single object could not be rendered
    #[error("Cannot render {object}: {message}")]
    Render { object: String, message: String },

    /// Two objects of one database mapped to the same file path
    #[error("Duplicate file path in snapshot: {path}")]
    DuplicatePath { path: String },

    /// Listing the repository tree failed
    #[error("Remote listing failed: {message}")]
    RemoteListing { message: String, retryable: bool },

    /// The commit request was rejected or could not be delivered
    #[error("Commit failed: {message}")]
    Publish { message: String, retryable: bool },

    /// A network operation exceeded its deadline
    #[error("{operation} timed out after {seconds}s")]
    Timeout { operation: String, seconds: u64 },

    /// HTTP client error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// IO error (file operations)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML serialization/deserialization error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Run was cancelled (SIGINT, etc.)
    #[error("Sync cancelled")]
    Cancelled,
}

impl SyncError {
    /// Create a Pool error with context about where it occurred
    pub fn pool(message: impl ToString, context: impl Into<String>) -> Self {
        SyncError::Pool {
            message: message.to_string(),
            context: context.into(),
        }
    }

    /// Create a CatalogQuery error for a database
    pub fn catalog(database: impl Into<String>, message: impl ToString) -> Self {
        SyncError::CatalogQuery {
            database: database.into(),
            message: message.to_string(),
        }
    }

    /// Create a Render error for an object
    pub fn render(object: impl Into<String>, message: impl Into<String>) -> Self {
        SyncError::Render {
            object: object.into(),
            message: message.into(),
        }
    }

    /// Whether retrying the whole operation may succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            SyncError::Timeout { .. } => true,
            SyncError::RemoteListing { retryable, .. } | SyncError::Publish { retryable, .. } => {
                *retryable
            }
            SyncError::Http(e) => e.is_timeout() || e.is_connect(),
            _ => false,
        }
    }

    /// Process exit code for this error.
    pub fn exit_code(&self) -> u8 {
        match self {
            SyncError::Config(_) | SyncError::Yaml(_) => 1,
            SyncError::Connection(_) | SyncError::Pool { .. } => 2,
            SyncError::CatalogQuery { .. }
            | SyncError::Render { .. }
            | SyncError::DuplicatePath { .. } => 3,
            SyncError::RemoteListing { .. } => 4,
            SyncError::Publish { .. } | SyncError::Http(_) | SyncError::Json(_) => 5,
            SyncError::Timeout { .. } => 6,
            SyncError::Io(_) => 7,
            SyncError::Cancelled => 130,
        }
    }

    /// Format error with full details including error chain
    pub fn format_detailed(&self) -> String {
        let mut output = format!("Error: {}\n", self);

        let mut source = std::error::Error::source(self);
        let mut depth = 1;
        while let Some(err) = source {
            output.push_str(&format!("\nCaused by:\n  {}: {}", depth, err));
            source = err.source();
            depth += 1;
        }

        output
    }
}

/// Result type alias for sync operations.
pub type Result<T> = std::result::Result<T, SyncError>;
