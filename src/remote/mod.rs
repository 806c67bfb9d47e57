//! Boundary to the remote file-hosting backend.
//!
//! The store only ever talks to the `RemoteRepository` trait; the GitHub
//! contents-API client in `github` is the production implementation and
//! the tests supply an in-memory one. Failures carry a discriminated kind
//! so callers never have to string-match error messages.

use serde::{Deserialize, Serialize};

mod github;
pub use github::GithubClient;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RepoInfo {
    pub name: String,
    #[serde(default)]
    pub private: bool,
}

/// A file fetched from the remote, together with its optimistic
/// concurrency token ("sha"). The token is required to overwrite or
/// delete the file.
#[derive(Debug, Clone)]
pub struct RemoteFile {
    pub content: Vec<u8>,
    pub sha: String,
}

#[derive(Debug, Clone)]
pub struct RemoteDirEntry {
    pub name: String,
    pub path: String,
    pub is_file: bool,
}

#[derive(Debug, thiserror::Error)]
pub enum RemoteError {
    #[error("not found")]
    NotFound,

    /// Stale version token on a write or delete.
    #[error("version token is stale")]
    Conflict,

    /// Repository name already taken (possibly by a repo this identity
    /// cannot see).
    #[error("name already exists")]
    AlreadyExists,

    #[error("bad credentials")]
    Unauthorized,

    #[error("api error ({status}): {message}")]
    Api { status: u16, message: String },

    /// Network or transport failure. Triggers local-cache fallback.
    #[error("remote unreachable: {0}")]
    Unreachable(String),
}

impl RemoteError {
    /// True for failures that should degrade the backend mode instead of
    /// aborting the operation.
    pub fn degrades_backend(&self) -> bool {
        matches!(
            self,
            RemoteError::Unreachable(_) | RemoteError::Api { .. } | RemoteError::Unauthorized
        )
    }
}

impl From<reqwest::Error> for RemoteError {
    fn from(err: reqwest::Error) -> Self {
        RemoteError::Unreachable(err.to_string())
    }
}

pub trait RemoteRepository: Send + Sync {
    /// Resolve the canonical account identifier for the configured
    /// credentials.
    fn viewer_login(&self) -> Result<String, RemoteError>;

    fn list_repositories(&self) -> Result<Vec<RepoInfo>, RemoteError>;
    fn get_repository(&self, name: &str) -> Result<RepoInfo, RemoteError>;
    fn create_repository(
        &self,
        name: &str,
        description: &str,
        private: bool,
    ) -> Result<RepoInfo, RemoteError>;

    fn get_file(&self, repo: &str, path: &str) -> Result<RemoteFile, RemoteError>;

    /// Create or overwrite a file. `sha` must be the current token when
    /// overwriting; `None` creates. Returns the new token.
    fn put_file(
        &self,
        repo: &str,
        path: &str,
        content: &[u8],
        sha: Option<&str>,
        message: &str,
    ) -> Result<String, RemoteError>;

    fn delete_file(
        &self,
        repo: &str,
        path: &str,
        sha: &str,
        message: &str,
    ) -> Result<(), RemoteError>;

    /// List the direct children of a directory. `""` lists the root.
    fn list_dir(&self, repo: &str, path: &str) -> Result<Vec<RemoteDirEntry>, RemoteError>;
}
