//! Diff between the snapshot and the repository listing.

use crate::config::DeletionScope;
use crate::remote::RemotePathSet;
use crate::scanner::TargetMap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One file change of the commit, in the GitLab commit action shape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum CommitAction {
    Create {
        #[serde(rename = "file_path")]
        path: String,
        content: String,
    },
    Update {
        #[serde(rename = "file_path")]
        path: String,
        content: String,
    },
    Delete {
        #[serde(rename = "file_path")]
        path: String,
    },
}

impl CommitAction {
    pub fn path(&self) -> &str {
        match self {
            Self::Create { path, .. } | Self::Update { path, .. } | Self::Delete { path } => path,
        }
    }
}

/// Compute the actions turning `remote` into `target`, deleting any remote
/// path the snapshot does not have.
pub fn diff(target: &TargetMap, remote: &RemotePathSet) -> Vec<CommitAction> {
    diff_with_scope(target, remote, DeletionScope::Global, &[], &[])
}

/// Compute the actions turning `remote` into `target`.
///
/// Target paths missing remotely are created and present ones updated
/// unconditionally. With [`DeletionScope::ScannedDatabases`] only remote
/// paths under the folder of a database in `scanned` may be deleted. Paths
/// under the folder of a database in `retained` (matched ignoring ASCII case)
/// are never deleted, whatever the scope. Actions are sorted by path.
pub fn diff_with_scope(
    target: &TargetMap,
    remote: &RemotePathSet,
    scope: DeletionScope,
    scanned: &[String],
    retained: &[String],
) -> Vec<CommitAction> {
    let mut actions: BTreeMap<&str, CommitAction> = BTreeMap::new();

    for file in target {
        let action = if remote.contains(&file.path) {
            CommitAction::Update {
                path: file.path.clone(),
                content: file.content.clone(),
            }
        } else {
            CommitAction::Create {
                path: file.path.clone(),
                content: file.content.clone(),
            }
        };
        actions.insert(&file.path, action);
    }

    for path in remote.iter() {
        if target.contains(path) || !deletable(path, scope, scanned, retained) {
            continue;
        }
        actions.insert(
            path,
            CommitAction::Delete {
                path: path.to_string(),
            },
        );
    }

    actions.into_values().collect()
}

fn deletable(path: &str, scope: DeletionScope, scanned: &[String], retained: &[String]) -> bool {
    let folder = path.split_once('/').map(|(database, _)| database);
    if folder.is_some_and(|database| retained.iter().any(|r| r.eq_ignore_ascii_case(database))) {
        return false;
    }
    match scope {
        DeletionScope::Global => true,
        DeletionScope::ScannedDatabases => {
            folder.is_some_and(|database| scanned.iter().any(|s| s == database))
        }
    }
}
