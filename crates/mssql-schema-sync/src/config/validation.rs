//! Configuration validation.

use super::{Config, DatabaseMode};
use crate::error::{Result, SyncError};

/// Validate the configuration.
pub fn validate(config: &Config) -> Result<()> {
    // Server validation
    if config.server.host.is_empty() {
        return Err(SyncError::Config("server.host is required".into()));
    }
    if config.server.user.is_empty() {
        return Err(SyncError::Config("server.user is required".into()));
    }
    if config.server.connect_timeout_secs == 0 {
        return Err(SyncError::Config(
            "server.connect_timeout_secs must be at least 1".into(),
        ));
    }

    // Selection validation
    if config.selection.mode == DatabaseMode::Specific
        && config.selection.databases.iter().all(|d| d.trim().is_empty())
    {
        return Err(SyncError::Config(
            "selection.databases must list at least one database in 'specific' mode".into(),
        ));
    }

    // Repository validation
    let url = &config.repository.url;
    if url.is_empty() {
        return Err(SyncError::Config("repository.url is required".into()));
    }
    if !(url.starts_with("http://") || url.starts_with("https://")) {
        return Err(SyncError::Config(format!(
            "repository.url must start with http:// or https://, got '{}'",
            url
        )));
    }
    if config.repository.token.is_empty() {
        return Err(SyncError::Config("repository.token is required".into()));
    }
    if config.repository.project.is_empty() {
        return Err(SyncError::Config("repository.project is required".into()));
    }
    if config.repository.branch.is_empty() {
        return Err(SyncError::Config("repository.branch is required".into()));
    }
    if config.repository.commit_message.trim().is_empty() {
        return Err(SyncError::Config(
            "repository.commit_message must not be empty".into(),
        ));
    }
    if config.repository.timeout_secs == 0 {
        return Err(SyncError::Config(
            "repository.timeout_secs must be at least 1".into(),
        ));
    }

    // Sync validation
    if config.sync.parallel_databases == 0 {
        return Err(SyncError::Config(
            "sync.parallel_databases must be at least 1".into(),
        ));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{RepositoryConfig, SelectionConfig, ServerConfig, SyncConfig};

    fn valid_config() -> Config {
        Config {
            server: ServerConfig {
                host: "localhost".to_string(),
                user: "sa".to_string(),
                password: "password".to_string(),
                ..ServerConfig::default()
            },
            selection: SelectionConfig {
                mode: DatabaseMode::Specific,
                databases: vec!["SalesDB".to_string()],
                exclude_databases: Vec::new(),
            },
            repository: RepositoryConfig {
                url: "https://gitlab.example.com".to_string(),
                token: "token".to_string(),
                project: "dba/schema".to_string(),
                ..RepositoryConfig::default()
            },
            sync: SyncConfig::default(),
        }
    }

    #[test]
    fn test_valid_config() {
        let config = valid_config();
        assert!(validate(&config).is_ok());
    }

    #[test]
    fn test_missing_server_host() {
        let mut config = valid_config();
        config.server.host = "".to_string();
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_specific_mode_requires_databases() {
        let mut config = valid_config();
        config.selection.databases = vec!["  ".to_string()];
        assert!(validate(&config).is_err());

        config.selection.mode = DatabaseMode::All;
        assert!(validate(&config).is_ok());
    }

    #[test]
    fn test_repository_url_scheme() {
        let mut config = valid_config();
        config.repository.url = "gitlab.example.com".to_string();
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_missing_token() {
        let mut config = valid_config();
        config.repository.token = String::new();
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_zero_parallel_databases() {
        let mut config = valid_config();
        config.sync.parallel_databases = 0;
        assert!(validate(&config).is_err());
    }
}
