//! Interactive configuration wizard for creating/editing config files.

use dialoguer::{Confirm, Input, Password, Select};
use mssql_schema_sync::config::{
    DatabaseMode, DeletionScope, RepositoryConfig, SelectionConfig, ServerConfig, SyncConfig,
};
use mssql_schema_sync::{Config, Orchestrator};
use std::path::Path;

/// Result type for wizard operations.
pub type WizardResult<T> = Result<T, WizardError>;

/// Errors that can occur during wizard execution.
#[derive(Debug)]
pub enum WizardError {
    /// User cancelled the wizard.
    Cancelled,
    /// IO error (file read/write).
    Io(std::io::Error),
    /// Config serialization error.
    Config(String),
    /// Validation error.
    Validation(String),
}

impl std::fmt::Display for WizardError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Cancelled => write!(f, "Configuration cancelled"),
            Self::Io(e) => write!(f, "IO error: {}", e),
            Self::Config(msg) => write!(f, "Config error: {}", msg),
            Self::Validation(msg) => write!(f, "Validation error: {}", msg),
        }
    }
}

impl std::error::Error for WizardError {}

impl From<std::io::Error> for WizardError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e)
    }
}

impl From<dialoguer::Error> for WizardError {
    fn from(e: dialoguer::Error) -> Self {
        Self::Io(std::io::Error::other(e.to_string()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum ExistingFileAction {
    Edit,
    Overwrite,
    Abort,
}

/// Run the configuration wizard.
pub async fn run_wizard(output: &Path, advanced: bool, force: bool) -> WizardResult<()> {
    println!();
    println!("MSSQL Schema Sync - Configuration Wizard");
    println!("========================================");
    println!();

    let existing = if output.exists() && !force {
        match prompt_existing_file_action(output)? {
            ExistingFileAction::Edit => {
                println!("Loading existing configuration...");
                match std::fs::read_to_string(output)
                    .map_err(|e| e.to_string())
                    .and_then(|s| serde_yaml::from_str::<Config>(&s).map_err(|e| e.to_string()))
                {
                    Ok(config) => Some(config),
                    Err(e) => {
                        println!("Warning: Could not parse existing file: {}", e);
                        println!("Starting with fresh configuration.\n");
                        None
                    }
                }
            }
            ExistingFileAction::Overwrite => {
                println!("Starting with fresh configuration.\n");
                None
            }
            ExistingFileAction::Abort => return Err(WizardError::Cancelled),
        }
    } else {
        None
    };

    let server = prompt_server_config(existing.as_ref().map(|c| &c.server))?;
    let selection = prompt_selection_config(existing.as_ref().map(|c| &c.selection))?;
    let repository = prompt_repository_config(existing.as_ref().map(|c| &c.repository), advanced)?;
    let sync = prompt_sync_config(existing.as_ref().map(|c| &c.sync), advanced)?;

    let config = Config {
        server,
        selection,
        repository,
        sync,
    };

    if let Err(e) = config.validate() {
        return Err(WizardError::Validation(e.to_string()));
    }

    print_summary(&config);

    if prompt_connection_test()? {
        test_connections(&config).await?;
    }

    if !prompt_save_confirm(output)? {
        return Err(WizardError::Cancelled);
    }

    write_config(&config, output)?;

    println!("\nConfiguration saved to {}", output.display());
    println!("Run 'mssql-schema-sync run --dry-run' to preview the first sync.");

    Ok(())
}

fn prompt_existing_file_action(path: &Path) -> WizardResult<ExistingFileAction> {
    println!("File already exists: {}\n", path.display());

    let options = &["Edit existing configuration", "Overwrite with new", "Abort"];
    let selection = Select::new()
        .with_prompt("What would you like to do?")
        .items(options)
        .default(0)
        .interact()?;

    Ok(match selection {
        0 => ExistingFileAction::Edit,
        1 => ExistingFileAction::Overwrite,
        _ => ExistingFileAction::Abort,
    })
}

fn prompt_server_config(existing: Option<&ServerConfig>) -> WizardResult<ServerConfig> {
    println!("SQL Server");
    println!("----------");

    let defaults = existing.cloned().unwrap_or_default();

    let host: String = Input::new()
        .with_prompt("  Host")
        .default(defaults.host.clone())
        .interact_text()?;

    let port: u16 = Input::new()
        .with_prompt("  Port")
        .default(defaults.port)
        .interact_text()?;

    let user: String = Input::new()
        .with_prompt("  User")
        .default(defaults.user.clone())
        .interact_text()?;

    let password = prompt_password("  Password", existing.is_some())?;
    let password = if password.is_empty() {
        defaults.password.clone()
    } else {
        password
    };

    let encrypt = Confirm::new()
        .with_prompt("  Encrypt connection?")
        .default(defaults.encrypt)
        .interact()?;

    let trust_server_cert = Confirm::new()
        .with_prompt("  Trust server certificate?")
        .default(defaults.trust_server_cert)
        .interact()?;

    println!();

    Ok(ServerConfig {
        host,
        port,
        user,
        password,
        encrypt,
        trust_server_cert,
        connect_timeout_secs: defaults.connect_timeout_secs,
    })
}

fn prompt_selection_config(existing: Option<&SelectionConfig>) -> WizardResult<SelectionConfig> {
    println!("Database Selection");
    println!("------------------");

    let defaults = existing.cloned().unwrap_or_default();
    let modes = [DatabaseMode::Specific, DatabaseMode::All, DatabaseMode::AllExcept];
    let labels = &[
        "specific - only the listed databases",
        "all - every user database",
        "all_except - every user database except the listed ones",
    ];
    let current = modes
        .iter()
        .position(|m| *m == defaults.mode)
        .unwrap_or(0);

    let mode_idx = Select::new()
        .with_prompt("  Mode")
        .items(labels)
        .default(current)
        .interact()?;
    let mode = modes[mode_idx];

    let mut selection = SelectionConfig {
        mode,
        ..SelectionConfig::default()
    };

    match mode {
        DatabaseMode::Specific => {
            selection.databases = prompt_list("  Databases (comma-separated)", &defaults.databases)?;
        }
        DatabaseMode::AllExcept => {
            selection.exclude_databases = prompt_list(
                "  Excluded databases (comma-separated)",
                &defaults.exclude_databases,
            )?;
        }
        DatabaseMode::All => {}
    }

    println!();

    Ok(selection)
}

fn prompt_repository_config(
    existing: Option<&RepositoryConfig>,
    advanced: bool,
) -> WizardResult<RepositoryConfig> {
    println!("GitLab Repository");
    println!("-----------------");

    let defaults = existing.cloned().unwrap_or_default();

    let url: String = Input::new()
        .with_prompt("  GitLab URL")
        .default(if defaults.url.is_empty() {
            "https://gitlab.com".to_string()
        } else {
            defaults.url.clone()
        })
        .interact_text()?;

    let project: String = Input::new()
        .with_prompt("  Project (id or group/project)")
        .default(defaults.project.clone())
        .interact_text()?;

    let token = prompt_password("  Access token", existing.is_some())?;
    let token = if token.is_empty() {
        defaults.token.clone()
    } else {
        token
    };

    let branch: String = Input::new()
        .with_prompt("  Branch")
        .default(defaults.branch.clone())
        .interact_text()?;

    let mut repository = RepositoryConfig {
        url,
        token,
        project,
        branch,
        ..defaults
    };

    if advanced {
        repository.commit_message = Input::new()
            .with_prompt("  Commit message ({timestamp} is replaced)")
            .default(repository.commit_message.clone())
            .interact_text()?;

        repository.timeout_secs = Input::new()
            .with_prompt("  HTTP timeout (seconds)")
            .default(repository.timeout_secs)
            .interact_text()?;

        repository.max_retries = Input::new()
            .with_prompt("  Commit retries")
            .default(repository.max_retries)
            .interact_text()?;
    }

    println!();

    Ok(repository)
}

fn prompt_sync_config(existing: Option<&SyncConfig>, advanced: bool) -> WizardResult<SyncConfig> {
    let mut sync = existing.cloned().unwrap_or_default();
    if !advanced {
        return Ok(sync);
    }

    println!("Sync Options");
    println!("------------");

    sync.parallel_databases = Input::new()
        .with_prompt("  Databases scanned in parallel")
        .default(sync.parallel_databases)
        .interact_text()?;

    let scoped = Confirm::new()
        .with_prompt("  Only delete files of databases scanned in this run?")
        .default(sync.deletion_scope == DeletionScope::ScannedDatabases)
        .interact()?;
    sync.deletion_scope = if scoped {
        DeletionScope::ScannedDatabases
    } else {
        DeletionScope::Global
    };

    println!();

    Ok(sync)
}

fn prompt_password(prompt: &str, has_existing: bool) -> WizardResult<String> {
    if has_existing {
        let input: String = Password::new()
            .with_prompt(format!("{} (blank to keep existing)", prompt))
            .allow_empty_password(true)
            .interact()?;
        Ok(input)
    } else {
        let input: String = Password::new().with_prompt(prompt).interact()?;
        Ok(input)
    }
}

fn prompt_list(prompt: &str, existing: &[String]) -> WizardResult<Vec<String>> {
    let input: String = Input::new()
        .with_prompt(prompt)
        .default(existing.join(", "))
        .allow_empty(true)
        .interact_text()?;

    Ok(parse_list(&input))
}

fn parse_list(input: &str) -> Vec<String> {
    input
        .split(',')
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

fn print_summary(config: &Config) {
    println!("Configuration Summary");
    println!("---------------------");
    println!(
        "  Server: {}@{}:{}",
        config.server.user, config.server.host, config.server.port
    );
    println!("  Mode: {}", config.selection.mode.as_str());
    if !config.selection.databases.is_empty() {
        println!("  Databases: {}", config.selection.databases.join(", "));
    }
    if !config.selection.exclude_databases.is_empty() {
        println!("  Excluded: {}", config.selection.exclude_databases.join(", "));
    }
    println!(
        "  Repository: {} ({}) branch {}",
        config.repository.url, config.repository.project, config.repository.branch
    );
    if config.sync.deletion_scope == DeletionScope::ScannedDatabases {
        println!("  Deletion scope: scanned databases only");
    }

    println!();
}

fn prompt_connection_test() -> WizardResult<bool> {
    Ok(Confirm::new()
        .with_prompt("Test SQL Server and GitLab access?")
        .default(false)
        .interact()?)
}

async fn test_connections(config: &Config) -> WizardResult<()> {
    use std::time::Duration;
    use tokio::time::timeout;

    println!("\nTesting connections...");

    let timeout_duration = Duration::from_secs(30);

    let orchestrator = match timeout(timeout_duration, Orchestrator::new(config.clone())).await {
        Ok(Ok(orch)) => orch,
        Ok(Err(e)) => {
            println!("  Failed to initialize: {}", e);
            println!();
            return Ok(());
        }
        Err(_) => {
            println!("  Connection timed out after 30 seconds");
            println!();
            return Ok(());
        }
    };

    match timeout(timeout_duration, orchestrator.health_check()).await {
        Ok(Ok(health)) => {
            println!(
                "  SQL Server: {} ({}ms)",
                if health.database_connected { "OK" } else { "FAILED" },
                health.database_latency_ms
            );
            if let Some(ref err) = health.database_error {
                println!("    Error: {}", err);
            }
            println!(
                "  GitLab: {} ({}ms)",
                if health.repository_accessible { "OK" } else { "FAILED" },
                health.repository_latency_ms
            );
            if let Some(ref err) = health.repository_error {
                println!("    Error: {}", err);
            }
            if !health.healthy {
                println!("\n  Warning: One or more checks failed.");
            }
        }
        Ok(Err(e)) => println!("  Connection test failed: {}", e),
        Err(_) => println!("  Health check timed out after 30 seconds"),
    }

    println!();
    Ok(())
}

fn prompt_save_confirm(path: &Path) -> WizardResult<bool> {
    Ok(Confirm::new()
        .with_prompt(format!("Save to {}?", path.display()))
        .default(true)
        .interact()?)
}

fn write_config(config: &Config, path: &Path) -> WizardResult<()> {
    let header = "# MSSQL schema sync configuration\n\
# Generated by mssql-schema-sync init\n\
# SQL_PASSWORD and GITLAB_TOKEN override the secrets below when set.\n\n";

    let yaml = serde_yaml::to_string(config).map_err(|e| WizardError::Config(e.to_string()))?;

    std::fs::write(path, format!("{}{}", header, yaml))?;

    Ok(())
}
