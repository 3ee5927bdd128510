//! Remote repository access.
//!
//! [`Repository`] lists the managed files of a branch and submits commits.
//! [`GitLabRepository`] talks to the GitLab REST v4 API; [`MemoryRepository`]
//! keeps the branch in memory for tests.

mod gitlab;
mod memory;

pub use gitlab::GitLabRepository;
pub use memory::{MemoryRepository, RecordedCommit};

use crate::diff::CommitAction;
use crate::error::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Extension of the files managed by the sync.
pub const MANAGED_EXTENSION: &str = ".sql";

/// Managed file paths currently stored in the repository.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RemotePathSet(BTreeSet<String>);

impl RemotePathSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a path if it is a managed file.
    pub fn insert(&mut self, path: impl Into<String>) -> bool {
        let path = path.into();
        if is_managed(&path) {
            self.0.insert(path)
        } else {
            false
        }
    }

    pub fn contains(&self, path: &str) -> bool {
        self.0.contains(path)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Paths in ascending order.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }
}

impl FromIterator<String> for RemotePathSet {
    fn from_iter<I: IntoIterator<Item = String>>(iter: I) -> Self {
        let mut set = Self::new();
        for path in iter {
            set.insert(path);
        }
        set
    }
}

/// Whether a repository path is managed by the sync.
pub fn is_managed(path: &str) -> bool {
    path.ends_with(MANAGED_EXTENSION)
}

/// Commit created by [`Repository::commit`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitInfo {
    pub id: String,
    /// Lines added, as reported by the platform.
    pub additions: u64,
    /// Lines removed, as reported by the platform.
    pub deletions: u64,
}

/// A branch of a remote repository.
#[async_trait]
pub trait Repository: Send + Sync {
    /// Every managed file path on `branch`. A missing branch is an empty set.
    async fn list_paths(&self, branch: &str) -> Result<RemotePathSet>;

    /// Submit all actions as one commit.
    async fn commit(
        &self,
        branch: &str,
        message: &str,
        actions: &[CommitAction],
    ) -> Result<CommitInfo>;

    /// Verify the project is reachable with the configured credentials.
    async fn check_access(&self, branch: &str) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_sql_files_are_managed() {
        let set: RemotePathSet = [
            "SalesDB/views/dbo.v.sql",
            "README.md",
            "SalesDB/tables/dbo.t.sql",
            "SalesDB/tables/.gitkeep",
        ]
        .into_iter()
        .map(String::from)
        .collect();

        assert_eq!(
            set.iter().collect::<Vec<_>>(),
            vec!["SalesDB/tables/dbo.t.sql", "SalesDB/views/dbo.v.sql"]
        );
    }
}
