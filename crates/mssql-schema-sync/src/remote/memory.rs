//! In-memory repository.

use super::{CommitInfo, RemotePathSet, Repository};
use crate::diff::CommitAction;
use crate::error::{Result, SyncError};
use async_trait::async_trait;
use std::collections::{BTreeMap, VecDeque};
use std::sync::Mutex;

/// A commit received by [`MemoryRepository`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedCommit {
    pub branch: String,
    pub message: String,
    pub actions: Vec<CommitAction>,
}

#[derive(Debug, Default)]
struct State {
    branches: BTreeMap<String, BTreeMap<String, String>>,
    commits: Vec<RecordedCommit>,
    commit_failures: VecDeque<SyncError>,
    list_failure: Option<String>,
    list_calls: usize,
}

/// Repository keeping branch contents in memory.
///
/// Applies committed actions to its branches so consecutive runs see each
/// other's results. Failures can be queued to exercise retry handling.
#[derive(Debug, Default)]
pub struct MemoryRepository {
    state: Mutex<State>,
}

impl MemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a file on a branch.
    pub fn with_file(self, branch: &str, path: &str, content: &str) -> Self {
        self.lock()
            .branches
            .entry(branch.to_string())
            .or_default()
            .insert(path.to_string(), content.to_string());
        self
    }

    /// Fail the next commit with `error`. Queued failures are used in order.
    pub fn fail_next_commit(&self, error: SyncError) {
        self.lock().commit_failures.push_back(error);
    }

    /// Fail every listing.
    pub fn fail_listing(&self, message: &str) {
        self.lock().list_failure = Some(message.to_string());
    }

    /// Commits received so far.
    pub fn commits(&self) -> Vec<RecordedCommit> {
        self.lock().commits.clone()
    }

    /// Listing requests received so far.
    pub fn list_calls(&self) -> usize {
        self.lock().list_calls
    }

    /// Content of a file on a branch.
    pub fn file(&self, branch: &str, path: &str) -> Option<String> {
        self.lock().branches.get(branch)?.get(path).cloned()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl Repository for MemoryRepository {
    async fn list_paths(&self, branch: &str) -> Result<RemotePathSet> {
        let mut state = self.lock();
        state.list_calls += 1;
        if let Some(message) = &state.list_failure {
            return Err(SyncError::RemoteListing {
                message: message.clone(),
                retryable: false,
            });
        }
        Ok(state
            .branches
            .get(branch)
            .map(|files| files.keys().cloned().collect())
            .unwrap_or_default())
    }

    async fn commit(
        &self,
        branch: &str,
        message: &str,
        actions: &[CommitAction],
    ) -> Result<CommitInfo> {
        let mut state = self.lock();
        if let Some(error) = state.commit_failures.pop_front() {
            return Err(error);
        }

        // Applied to a copy so a rejected commit changes nothing
        let mut files = state.branches.get(branch).cloned().unwrap_or_default();
        let (mut additions, mut deletions) = (0u64, 0u64);
        for action in actions {
            match action {
                CommitAction::Create { path, content } => {
                    if files.contains_key(path) {
                        return Err(SyncError::Publish {
                            message: format!("A file with this name already exists: {}", path),
                            retryable: false,
                        });
                    }
                    additions += content.lines().count() as u64;
                    files.insert(path.clone(), content.clone());
                }
                CommitAction::Update { path, content } => {
                    let old = files.insert(path.clone(), content.clone()).ok_or_else(|| {
                        SyncError::Publish {
                            message: format!("A file with this name doesn't exist: {}", path),
                            retryable: false,
                        }
                    })?;
                    if old != *content {
                        deletions += old.lines().count() as u64;
                        additions += content.lines().count() as u64;
                    }
                }
                CommitAction::Delete { path } => {
                    let old = files.remove(path).ok_or_else(|| SyncError::Publish {
                        message: format!("A file with this name doesn't exist: {}", path),
                        retryable: false,
                    })?;
                    deletions += old.lines().count() as u64;
                }
            }
        }

        state.branches.insert(branch.to_string(), files);
        state.commits.push(RecordedCommit {
            branch: branch.to_string(),
            message: message.to_string(),
            actions: actions.to_vec(),
        });

        Ok(CommitInfo {
            id: format!("{:040x}", state.commits.len()),
            additions,
            deletions,
        })
    }

    async fn check_access(&self, _branch: &str) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_commit_applies_actions() {
        let repo = MemoryRepository::new()
            .with_file("main", "A/views/dbo.old.sql", "x\n")
            .with_file("main", "A/views/dbo.v.sql", "a\n");

        let info = repo
            .commit(
                "main",
                "sync",
                &[
                    CommitAction::Delete {
                        path: "A/views/dbo.old.sql".into(),
                    },
                    CommitAction::Update {
                        path: "A/views/dbo.v.sql".into(),
                        content: "a\n".into(),
                    },
                    CommitAction::Create {
                        path: "A/views/dbo.new.sql".into(),
                        content: "b\nc\n".into(),
                    },
                ],
            )
            .await
            .unwrap();

        assert_eq!((info.additions, info.deletions), (2, 1));
        let paths = repo.list_paths("main").await.unwrap();
        assert_eq!(
            paths.iter().collect::<Vec<_>>(),
            vec!["A/views/dbo.new.sql", "A/views/dbo.v.sql"]
        );
    }

    #[tokio::test]
    async fn test_missing_branch_lists_empty() {
        let repo = MemoryRepository::new();
        assert!(repo.list_paths("main").await.unwrap().is_empty());
        assert_eq!(repo.list_calls(), 1);
    }
}
