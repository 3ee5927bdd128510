//! Configuration loading and validation.

mod types;
mod validation;

pub use types::*;

use crate::error::{Result, SyncError};
use std::path::Path;

impl Config {
    /// Load configuration from a YAML file, then apply environment overrides.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = serde_yaml::from_str(&content)?;
        let config = config.with_overrides(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Parse configuration from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: Config = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Build configuration purely from environment variables.
    pub fn from_env() -> Result<Self> {
        let config = Self::empty().with_overrides(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        validation::validate(self)
    }

    /// Apply `SQL_*`, `DATABASE*` and `GITLAB_*` overrides from a lookup function.
    pub fn with_overrides<F>(mut self, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(host) = get("SQL_HOST") {
            self.server.host = host;
        }
        if let Some(port) = get("SQL_PORT") {
            self.server.port = port
                .trim()
                .parse()
                .map_err(|_| SyncError::Config(format!("SQL_PORT is not a valid port: {}", port)))?;
        }
        if let Some(user) = get("SQL_USER") {
            self.server.user = user;
        }
        if let Some(password) = get("SQL_PASSWORD") {
            self.server.password = password;
        }

        if let Some(mode) = get("DATABASE_MODE") {
            self.selection.mode = DatabaseMode::parse(&mode).ok_or_else(|| {
                SyncError::Config(format!(
                    "DATABASE_MODE must be one of specific, all, all_except (got '{}')",
                    mode
                ))
            })?;
        }
        if let Some(list) = get("DATABASES") {
            self.selection.databases = split_list(&list);
        }
        if let Some(list) = get("EXCLUDE_DATABASES") {
            self.selection.exclude_databases = split_list(&list);
        }

        if let Some(url) = get("GITLAB_URL") {
            self.repository.url = url;
        }
        if let Some(token) = get("GITLAB_TOKEN") {
            self.repository.token = token;
        }
        if let Some(project) = get("GITLAB_PROJECT") {
            self.repository.project = project;
        }
        if let Some(branch) = get("GITLAB_BRANCH") {
            self.repository.branch = branch;
        }

        Ok(self)
    }

    fn empty() -> Self {
        Self {
            server: ServerConfig::default(),
            selection: SelectionConfig::default(),
            repository: RepositoryConfig::default(),
            sync: SyncConfig::default(),
        }
    }
}

impl ServerConfig {
    /// Address used in log lines.
    pub fn display_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}
