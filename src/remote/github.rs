use std::sync::RwLock;
use std::time::Duration;

use base64::Engine;
use serde::Deserialize;
use serde_json::json;

use super::{RemoteDirEntry, RemoteError, RemoteFile, RemoteRepository, RepoInfo};

/// Per-request timeout. Anything slower is treated as unreachable and the
/// store falls back to the local cache.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

/// GitHub contents-API client. File contents travel base64-encoded; the
/// blob `sha` doubles as the optimistic concurrency token.
pub struct GithubClient {
    api_base: String,
    token: String,
    client: reqwest::blocking::Client,
    /// Viewer login, resolved once per client.
    login: RwLock<Option<String>>,
}

#[derive(Deserialize)]
struct UserResponse {
    login: String,
}

#[derive(Deserialize)]
struct ContentResponse {
    sha: String,
    #[serde(default)]
    content: Option<String>,
}

#[derive(Deserialize)]
struct PutResponse {
    content: ContentSha,
}

#[derive(Deserialize)]
struct ContentSha {
    sha: String,
}

#[derive(Deserialize)]
struct DirItem {
    name: String,
    path: String,
    #[serde(rename = "type")]
    kind: String,
}

#[derive(Deserialize)]
struct ApiMessage {
    #[serde(default)]
    message: String,
}

impl GithubClient {
    pub fn new(api_base: &str, token: &str) -> Self {
        let api_base = api_base.strip_suffix('/').unwrap_or(api_base).to_string();
        let client = reqwest::blocking::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .user_agent("jot")
            .build()
            .unwrap_or_else(|_| reqwest::blocking::Client::new());

        GithubClient {
            api_base,
            token: token.to_string(),
            client,
            login: RwLock::new(None),
        }
    }

    fn request(
        &self,
        method: reqwest::Method,
        path: &str,
    ) -> reqwest::blocking::RequestBuilder {
        log::debug!("{method} {}{path}", self.api_base);
        self.client
            .request(method, format!("{}{path}", self.api_base))
            .bearer_auth(&self.token)
            .header("Accept", "application/vnd.github+json")
    }

    fn owner(&self) -> Result<String, RemoteError> {
        if let Some(login) = self.login.read().unwrap_or_else(|e| e.into_inner()).clone() {
            return Ok(login);
        }
        let login = self.viewer_login()?;
        Ok(login)
    }

    /// Read the body as a structured API message for error reporting.
    fn api_error(status: u16, body: &str) -> RemoteError {
        let message = serde_json::from_str::<ApiMessage>(body)
            .map(|m| m.message)
            .unwrap_or_else(|_| body.chars().take(200).collect());

        match status {
            401 | 403 => RemoteError::Unauthorized,
            404 => RemoteError::NotFound,
            _ => RemoteError::Api { status, message },
        }
    }

    fn read_body(response: reqwest::blocking::Response) -> Result<(u16, String), RemoteError> {
        let status = response.status().as_u16();
        let body = response.text()?;
        Ok((status, body))
    }

    fn decode_content(encoded: &str) -> Result<Vec<u8>, RemoteError> {
        // the contents API wraps base64 payloads with newlines
        let compact: String = encoded.chars().filter(|c| !c.is_whitespace()).collect();
        base64::engine::general_purpose::STANDARD
            .decode(compact)
            .map_err(|err| RemoteError::Api {
                status: 200,
                message: format!("undecodable file content: {err}"),
            })
    }

    fn encode_path(path: &str) -> String {
        // conservative escaping; entry and folder paths only contain
        // `[A-Za-z0-9._/-]` but config-provided prefixes may not
        path.split('/')
            .map(|part| {
                part.bytes()
                    .map(|b| match b {
                        b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' => {
                            (b as char).to_string()
                        }
                        _ => format!("%{b:02X}"),
                    })
                    .collect::<String>()
            })
            .collect::<Vec<_>>()
            .join("/")
    }
}

impl RemoteRepository for GithubClient {
    fn viewer_login(&self) -> Result<String, RemoteError> {
        let response = self.request(reqwest::Method::GET, "/user").send()?;
        let (status, body) = Self::read_body(response)?;
        if status >= 400 {
            return Err(Self::api_error(status, &body));
        }

        let user: UserResponse = serde_json::from_str(&body).map_err(|err| RemoteError::Api {
            status,
            message: format!("unexpected user payload: {err}"),
        })?;

        *self.login.write().unwrap_or_else(|e| e.into_inner()) = Some(user.login.clone());
        Ok(user.login)
    }

    fn list_repositories(&self) -> Result<Vec<RepoInfo>, RemoteError> {
        let response = self
            .request(
                reqwest::Method::GET,
                "/user/repos?per_page=100&affiliation=owner",
            )
            .send()?;
        let (status, body) = Self::read_body(response)?;
        if status >= 400 {
            return Err(Self::api_error(status, &body));
        }

        serde_json::from_str(&body).map_err(|err| RemoteError::Api {
            status,
            message: format!("unexpected repo list payload: {err}"),
        })
    }

    fn get_repository(&self, name: &str) -> Result<RepoInfo, RemoteError> {
        let owner = self.owner()?;
        let response = self
            .request(reqwest::Method::GET, &format!("/repos/{owner}/{name}"))
            .send()?;
        let (status, body) = Self::read_body(response)?;
        if status >= 400 {
            return Err(Self::api_error(status, &body));
        }

        serde_json::from_str(&body).map_err(|err| RemoteError::Api {
            status,
            message: format!("unexpected repo payload: {err}"),
        })
    }

    fn create_repository(
        &self,
        name: &str,
        description: &str,
        private: bool,
    ) -> Result<RepoInfo, RemoteError> {
        let response = self
            .request(reqwest::Method::POST, "/user/repos")
            .json(&json!({
                "name": name,
                "description": description,
                "private": private,
                "auto_init": true,
            }))
            .send()?;
        let (status, body) = Self::read_body(response)?;

        // 422 on this endpoint means the name is taken, possibly by a
        // repository this identity cannot see
        if status == 422 {
            return Err(RemoteError::AlreadyExists);
        }
        if status >= 400 {
            return Err(Self::api_error(status, &body));
        }

        serde_json::from_str(&body).map_err(|err| RemoteError::Api {
            status,
            message: format!("unexpected repo payload: {err}"),
        })
    }

    fn get_file(&self, repo: &str, path: &str) -> Result<RemoteFile, RemoteError> {
        let owner = self.owner()?;
        let path = Self::encode_path(path);
        let response = self
            .request(
                reqwest::Method::GET,
                &format!("/repos/{owner}/{repo}/contents/{path}"),
            )
            .send()?;
        let (status, body) = Self::read_body(response)?;
        if status >= 400 {
            return Err(Self::api_error(status, &body));
        }

        let file: ContentResponse =
            serde_json::from_str(&body).map_err(|err| RemoteError::Api {
                status,
                message: format!("unexpected file payload: {err}"),
            })?;

        let content = match file.content {
            Some(encoded) => Self::decode_content(&encoded)?,
            None => Vec::new(),
        };

        Ok(RemoteFile {
            content,
            sha: file.sha,
        })
    }

    fn put_file(
        &self,
        repo: &str,
        path: &str,
        content: &[u8],
        sha: Option<&str>,
        message: &str,
    ) -> Result<String, RemoteError> {
        let owner = self.owner()?;
        let encoded_path = Self::encode_path(path);

        let mut payload = json!({
            "message": message,
            "content": base64::engine::general_purpose::STANDARD.encode(content),
        });
        if let Some(sha) = sha {
            payload["sha"] = json!(sha);
        }

        let response = self
            .request(
                reqwest::Method::PUT,
                &format!("/repos/{owner}/{repo}/contents/{encoded_path}"),
            )
            .json(&payload)
            .send()?;
        let (status, body) = Self::read_body(response)?;

        // 409 (and 422 with a sha) signal a stale token
        if status == 409 || (status == 422 && sha.is_some()) {
            return Err(RemoteError::Conflict);
        }
        if status >= 400 {
            return Err(Self::api_error(status, &body));
        }

        let put: PutResponse = serde_json::from_str(&body).map_err(|err| RemoteError::Api {
            status,
            message: format!("unexpected put payload: {err}"),
        })?;

        Ok(put.content.sha)
    }

    fn delete_file(
        &self,
        repo: &str,
        path: &str,
        sha: &str,
        message: &str,
    ) -> Result<(), RemoteError> {
        let owner = self.owner()?;
        let encoded_path = Self::encode_path(path);

        let response = self
            .request(
                reqwest::Method::DELETE,
                &format!("/repos/{owner}/{repo}/contents/{encoded_path}"),
            )
            .json(&json!({ "message": message, "sha": sha }))
            .send()?;
        let (status, body) = Self::read_body(response)?;

        if status == 409 {
            return Err(RemoteError::Conflict);
        }
        if status >= 400 {
            return Err(Self::api_error(status, &body));
        }

        Ok(())
    }

    fn list_dir(&self, repo: &str, path: &str) -> Result<Vec<RemoteDirEntry>, RemoteError> {
        let owner = self.owner()?;
        let encoded_path = Self::encode_path(path);
        let response = self
            .request(
                reqwest::Method::GET,
                &format!("/repos/{owner}/{repo}/contents/{encoded_path}"),
            )
            .send()?;
        let (status, body) = Self::read_body(response)?;
        if status >= 400 {
            return Err(Self::api_error(status, &body));
        }

        let items: Vec<DirItem> = serde_json::from_str(&body).map_err(|err| RemoteError::Api {
            status,
            message: format!("unexpected listing payload: {err}"),
        })?;

        Ok(items
            .into_iter()
            .map(|item| RemoteDirEntry {
                is_file: item.kind == "file",
                name: item.name,
                path: item.path,
            })
            .collect())
    }
}
