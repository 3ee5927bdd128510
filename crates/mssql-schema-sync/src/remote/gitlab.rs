//! GitLab REST v4 repository.

use super::{CommitInfo, RemotePathSet, Repository};
use crate::config::RepositoryConfig;
use crate::diff::CommitAction;
use crate::error::{Result, SyncError};
use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode, Url};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Entries requested per page of the tree listing.
const PER_PAGE: u32 = 100;

/// Longest response body quoted in an error message.
const MAX_ERROR_BODY: usize = 500;

#[derive(Debug, Deserialize)]
struct TreeEntry {
    path: String,
    #[serde(rename = "type")]
    kind: String,
}

#[derive(Debug, Serialize)]
struct CommitRequest<'a> {
    branch: &'a str,
    commit_message: &'a str,
    actions: &'a [CommitAction],
}

#[derive(Debug, Default, Deserialize)]
struct CommitStats {
    #[serde(default)]
    additions: u64,
    #[serde(default)]
    deletions: u64,
}

#[derive(Debug, Deserialize)]
struct CommitResponse {
    id: String,
    #[serde(default)]
    stats: CommitStats,
}

/// Repository hosted on a GitLab instance.
pub struct GitLabRepository {
    client: Client,
    base_url: Url,
    project: String,
    token: String,
    timeout_secs: u64,
}

impl GitLabRepository {
    /// Build the HTTP client for a project.
    pub fn new(config: &RepositoryConfig) -> Result<Self> {
        let base_url = Url::parse(&config.url)
            .map_err(|e| SyncError::Config(format!("repository.url is invalid: {}", e)))?;
        if base_url.cannot_be_a_base() {
            return Err(SyncError::Config(format!(
                "repository.url cannot be used as a base URL: {}",
                config.url
            )));
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(concat!("mssql-schema-sync/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            client,
            base_url,
            project: config.project.clone(),
            token: config.token.clone(),
            timeout_secs: config.timeout_secs,
        })
    }

    /// `<base>/api/v4/projects/<url-encoded project>/<tail...>`
    fn endpoint(&self, tail: &[&str]) -> Result<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| SyncError::Config("repository.url cannot be used as a base URL".into()))?
            .pop_if_empty()
            .extend(["api", "v4", "projects", self.project.as_str()])
            .extend(tail);
        Ok(url)
    }

    fn timeout(&self, operation: &str) -> SyncError {
        SyncError::Timeout {
            operation: operation.to_string(),
            seconds: self.timeout_secs,
        }
    }

    async fn fetch_tree_page(&self, branch: &str, page: u32) -> Result<Option<(Vec<TreeEntry>, Option<u32>)>> {
        let mut url = self.endpoint(&["repository", "tree"])?;
        url.query_pairs_mut()
            .append_pair("ref", branch)
            .append_pair("recursive", "true")
            .append_pair("per_page", &PER_PAGE.to_string())
            .append_pair("page", &page.to_string());

        let response = self
            .client
            .get(url)
            .header("PRIVATE-TOKEN", &self.token)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    self.timeout("Listing repository tree")
                } else {
                    SyncError::RemoteListing {
                        message: e.to_string(),
                        retryable: e.is_connect(),
                    }
                }
            })?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !status.is_success() {
            let message = error_message(response).await;
            return Err(SyncError::RemoteListing {
                message,
                retryable: is_transient(status),
            });
        }

        let next_page = response
            .headers()
            .get("x-next-page")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse::<u32>().ok());

        let entries = response
            .json::<Vec<TreeEntry>>()
            .await
            .map_err(|e| SyncError::RemoteListing {
                message: format!("invalid tree listing: {}", e),
                retryable: false,
            })?;

        Ok(Some((entries, next_page)))
    }
}

/// HTTP 429 and 5xx may succeed on retry; other statuses are rejections.
fn is_transient(status: StatusCode) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
}

async fn error_message(response: Response) -> String {
    let status = response.status();
    let mut body = response.text().await.unwrap_or_default();
    if body.chars().count() > MAX_ERROR_BODY {
        body = body.chars().take(MAX_ERROR_BODY).collect::<String>() + "...";
    }
    if body.trim().is_empty() {
        status.to_string()
    } else {
        format!("{}: {}", status, body.trim())
    }
}

#[async_trait]
impl Repository for GitLabRepository {
    async fn list_paths(&self, branch: &str) -> Result<RemotePathSet> {
        let mut paths = RemotePathSet::new();
        let mut page = 1;

        loop {
            let Some((entries, next_page)) = self.fetch_tree_page(branch, page).await? else {
                if page > 1 {
                    // Never return a partial listing
                    return Err(SyncError::RemoteListing {
                        message: format!("tree page {} of branch {} returned 404 Not Found", page, branch),
                        retryable: false,
                    });
                }
                info!("Branch {} not found or repository empty; starting from an empty listing", branch);
                break;
            };

            debug!("Tree page {}: {} entries", page, entries.len());
            for entry in entries.into_iter().filter(|e| e.kind == "blob") {
                paths.insert(entry.path);
            }

            match next_page {
                Some(next) if next > page => page = next,
                _ => break,
            }
        }

        Ok(paths)
    }

    async fn commit(
        &self,
        branch: &str,
        message: &str,
        actions: &[CommitAction],
    ) -> Result<CommitInfo> {
        let url = self.endpoint(&["repository", "commits"])?;
        let request = CommitRequest {
            branch,
            commit_message: message,
            actions,
        };

        let response = self
            .client
            .post(url)
            .header("PRIVATE-TOKEN", &self.token)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    self.timeout("Submitting commit")
                } else if e.is_connect() {
                    SyncError::Publish {
                        message: e.to_string(),
                        retryable: true,
                    }
                } else {
                    SyncError::Http(e)
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let message = error_message(response).await;
            return Err(SyncError::Publish {
                message,
                retryable: is_transient(status),
            });
        }

        let body: CommitResponse = response.json().await?;
        Ok(CommitInfo {
            id: body.id,
            additions: body.stats.additions,
            deletions: body.stats.deletions,
        })
    }

    async fn check_access(&self, branch: &str) -> Result<()> {
        let url = self.endpoint(&[])?;
        let response = self
            .client
            .get(url)
            .header("PRIVATE-TOKEN", &self.token)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    self.timeout("Checking project access")
                } else {
                    SyncError::Http(e)
                }
            })?;

        if !response.status().is_success() {
            let message = error_message(response).await;
            return Err(SyncError::RemoteListing {
                message: format!("project {} is not accessible: {}", self.project, message),
                retryable: false,
            });
        }

        let url = self.endpoint(&["repository", "branches", branch])?;
        let response = self
            .client
            .get(url)
            .header("PRIVATE-TOKEN", &self.token)
            .send()
            .await?;
        if response.status() == StatusCode::NOT_FOUND {
            warn!("Branch {} does not exist yet in {}", branch, self.project);
        }

        info!("GitLab project {} is accessible", self.project);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    fn config(url: &str) -> RepositoryConfig {
        RepositoryConfig {
            url: url.to_string(),
            token: "glpat-test".to_string(),
            project: "dba/mssql-schema".to_string(),
            timeout_secs: 5,
            ..RepositoryConfig::default()
        }
    }

    /// Serve one canned HTTP response per accepted connection and return the
    /// request lines that were received.
    async fn serve(responses: Vec<String>) -> (String, tokio::task::JoinHandle<Vec<String>>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let handle = tokio::spawn(async move {
            let mut requests = Vec::new();
            for response in responses {
                let (mut socket, _) = listener.accept().await.unwrap();
                let mut buf = Vec::new();
                let mut chunk = [0u8; 4096];
                loop {
                    let n = socket.read(&mut chunk).await.unwrap();
                    buf.extend_from_slice(&chunk[..n]);
                    let text = String::from_utf8_lossy(&buf);
                    if let Some(end) = text.find("\r\n\r\n") {
                        let length = text[..end]
                            .lines()
                            .find_map(|l| {
                                let (k, v) = l.split_once(':')?;
                                k.eq_ignore_ascii_case("content-length")
                                    .then(|| v.trim().parse::<usize>().ok())
                                    .flatten()
                            })
                            .unwrap_or(0);
                        if buf.len() >= end + 4 + length || n == 0 {
                            break;
                        }
                    }
                    if n == 0 {
                        break;
                    }
                }
                let text = String::from_utf8_lossy(&buf).to_string();
                requests.push(text);
                socket.write_all(response.as_bytes()).await.unwrap();
                socket.shutdown().await.ok();
            }
            requests
        });
        (format!("http://{}", addr), handle)
    }

    fn response(status: &str, headers: &[(&str, &str)], body: &str) -> String {
        let mut out = format!("HTTP/1.1 {}\r\nContent-Length: {}\r\nConnection: close\r\n", status, body.len());
        out.push_str("Content-Type: application/json\r\n");
        for (k, v) in headers {
            out.push_str(&format!("{}: {}\r\n", k, v));
        }
        out.push_str("\r\n");
        out.push_str(body);
        out
    }

    #[test]
    fn test_endpoint_encodes_project_path() {
        let repo = GitLabRepository::new(&config("https://gitlab.example.com/")).unwrap();
        let url = repo.endpoint(&["repository", "tree"]).unwrap();
        assert_eq!(
            url.as_str(),
            "https://gitlab.example.com/api/v4/projects/dba%2Fmssql-schema/repository/tree"
        );

        let repo = GitLabRepository::new(&config("https://example.com/gitlab")).unwrap();
        let url = repo.endpoint(&[]).unwrap();
        assert_eq!(
            url.as_str(),
            "https://example.com/gitlab/api/v4/projects/dba%2Fmssql-schema"
        );
    }

    #[test]
    fn test_transient_statuses() {
        assert!(is_transient(StatusCode::TOO_MANY_REQUESTS));
        assert!(is_transient(StatusCode::BAD_GATEWAY));
        assert!(!is_transient(StatusCode::UNAUTHORIZED));
        assert!(!is_transient(StatusCode::BAD_REQUEST));
    }

    #[tokio::test]
    async fn test_list_paths_follows_pages_and_keeps_sql_blobs() {
        let (url, server) = serve(vec![
            response(
                "200 OK",
                &[("X-Next-Page", "2")],
                r#"[{"path":"SalesDB","type":"tree"},{"path":"SalesDB/views/dbo.v.sql","type":"blob"},{"path":"README.md","type":"blob"}]"#,
            ),
            response(
                "200 OK",
                &[("X-Next-Page", "")],
                r#"[{"path":"HR/tables/dbo.t.sql","type":"blob"}]"#,
            ),
        ])
        .await;

        let repo = GitLabRepository::new(&config(&url)).unwrap();
        let paths = repo.list_paths("main").await.unwrap();
        assert_eq!(
            paths.iter().collect::<Vec<_>>(),
            vec!["HR/tables/dbo.t.sql", "SalesDB/views/dbo.v.sql"]
        );

        let requests = server.await.unwrap();
        assert!(requests[0].starts_with(
            "GET /api/v4/projects/dba%2Fmssql-schema/repository/tree?ref=main&recursive=true&per_page=100&page=1 "
        ));
        assert!(requests[1].contains("page=2 "));
        assert!(requests[0].to_lowercase().contains("private-token: glpat-test"));
    }

    #[tokio::test]
    async fn test_list_paths_missing_branch_is_empty() {
        let (url, _server) = serve(vec![response(
            "404 Not Found",
            &[],
            r#"{"message":"404 Tree Not Found"}"#,
        )])
        .await;
        let repo = GitLabRepository::new(&config(&url)).unwrap();
        assert!(repo.list_paths("main").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_list_paths_missing_later_page_fails() {
        let (url, _server) = serve(vec![
            response(
                "200 OK",
                &[("X-Next-Page", "2")],
                r#"[{"path":"SalesDB/views/dbo.v.sql","type":"blob"}]"#,
            ),
            response("404 Not Found", &[], r#"{"message":"404 Tree Not Found"}"#),
        ])
        .await;
        let repo = GitLabRepository::new(&config(&url)).unwrap();

        let err = repo.list_paths("main").await.unwrap_err();
        assert!(matches!(err, SyncError::RemoteListing { retryable: false, .. }));
        assert!(err.to_string().contains("tree page 2"));
        assert_eq!(err.exit_code(), 4);
    }

    #[tokio::test]
    async fn test_commit_posts_all_actions() {
        let (url, server) = serve(vec![response(
            "201 Created",
            &[],
            r#"{"id":"abc123","stats":{"additions":3,"deletions":1,"total":4}}"#,
        )])
        .await;
        let repo = GitLabRepository::new(&config(&url)).unwrap();
        let actions = vec![
            CommitAction::Create {
                path: "SalesDB/views/dbo.v.sql".into(),
                content: "CREATE OR ALTER VIEW v AS SELECT 1\n".into(),
            },
            CommitAction::Delete {
                path: "HR/tables/dbo.t.sql".into(),
            },
        ];

        let info = repo.commit("main", "mssql sync", &actions).await.unwrap();
        assert_eq!(
            info,
            CommitInfo {
                id: "abc123".into(),
                additions: 3,
                deletions: 1
            }
        );

        let requests = server.await.unwrap();
        assert!(requests[0].starts_with("POST /api/v4/projects/dba%2Fmssql-schema/repository/commits "));
        assert!(requests[0].contains(r#""commit_message":"mssql sync""#));
        assert!(requests[0].contains(r#""action":"delete""#));
    }

    #[tokio::test]
    async fn test_commit_rejection_is_not_retryable() {
        let (url, _server) = serve(vec![response(
            "400 Bad Request",
            &[],
            r#"{"message":"A file with this name doesn't exist"}"#,
        )])
        .await;
        let repo = GitLabRepository::new(&config(&url)).unwrap();
        let err = repo.commit("main", "m", &[]).await.unwrap_err();
        assert!(matches!(err, SyncError::Publish { retryable: false, .. }));
        assert!(err.to_string().contains("doesn't exist"));
    }

    #[tokio::test]
    async fn test_commit_server_error_is_retryable() {
        let (url, _server) = serve(vec![response("502 Bad Gateway", &[], "")]).await;
        let repo = GitLabRepository::new(&config(&url)).unwrap();
        let err = repo.commit("main", "m", &[]).await.unwrap_err();
        assert!(err.is_retryable());
    }
}
