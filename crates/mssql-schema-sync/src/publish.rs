//! Commit publisher.
//!
//! Submits the whole action list as one commit. Transient failures retry the
//! entire batch with linear backoff; rejections fail immediately.

use crate::config::RepositoryConfig;
use crate::diff::CommitAction;
use crate::error::Result;
use crate::remote::{CommitInfo, Repository};
use chrono::{DateTime, Local};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// Placeholder replaced by the run time in commit message templates.
pub const TIMESTAMP_PLACEHOLDER: &str = "{timestamp}";

/// Whole-batch retry policy for transient publish failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt.
    pub max_retries: u32,
    /// Base delay; attempt `n` waits `base_delay * n`.
    pub base_delay: Duration,
}

impl RetryPolicy {
    pub fn from_config(config: &RepositoryConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            base_delay: Duration::from_millis(config.retry_delay_ms),
        }
    }

    fn delay(&self, attempt: u32) -> Duration {
        self.base_delay * attempt
    }
}

/// Outcome of a publish call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum PublishOutcome {
    /// Nothing to commit; no request was sent.
    Skipped,
    Committed(CommitInfo),
}

/// Render the commit message template at `now`.
pub fn commit_message(template: &str, now: DateTime<Local>) -> String {
    template.replace(
        TIMESTAMP_PLACEHOLDER,
        &now.format("%Y-%m-%d %H:%M:%S").to_string(),
    )
}

/// Publishes action lists to a [`Repository`].
pub struct CommitPublisher {
    repository: Arc<dyn Repository>,
    retry: RetryPolicy,
}

impl CommitPublisher {
    pub fn new(repository: Arc<dyn Repository>, retry: RetryPolicy) -> Self {
        Self { repository, retry }
    }

    /// Submit `actions` to `branch` as one commit.
    pub async fn publish(
        &self,
        actions: &[CommitAction],
        branch: &str,
        message: &str,
    ) -> Result<PublishOutcome> {
        if actions.is_empty() {
            info!("No changes to publish");
            return Ok(PublishOutcome::Skipped);
        }

        info!(
            "Publishing {} actions to branch {}",
            actions.len(),
            branch
        );

        let mut attempt = 0;
        loop {
            match self.repository.commit(branch, message, actions).await {
                Ok(commit) => {
                    if commit.additions == 0 && commit.deletions == 0 {
                        info!("Committed {}: no actual changes", commit.id);
                    } else {
                        info!(
                            "Committed {}: +{} -{} lines",
                            commit.id, commit.additions, commit.deletions
                        );
                    }
                    return Ok(PublishOutcome::Committed(commit));
                }
                Err(e) if e.is_retryable() && attempt < self.retry.max_retries => {
                    attempt += 1;
                    let delay = self.retry.delay(attempt);
                    warn!(
                        "Commit failed ({}), retry {}/{} in {:?}",
                        e, attempt, self.retry.max_retries, delay
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => return Err(e),
            }
        }
    }
}
