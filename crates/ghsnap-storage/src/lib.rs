//! GitHub REST client + snapshot file sink for ghsnap.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use ghsnap_core::api::{ApiEvent, ApiRepository, ApiSearchResults, ApiUser, SearchQuery};
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION};
use serde::de::DeserializeOwned;
use serde::Serialize;
use sha2::{Digest, Sha256};
use thiserror::Error;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info_span, Instrument};
use uuid::Uuid;

pub const CRATE_NAME: &str = "ghsnap-storage";

pub const DEFAULT_API_BASE_URL: &str = "https://api.github.com";

/// Failure of a single call against the GitHub API.
///
/// Callers treat every variant the same way; the split only exists so log
/// lines say what went wrong.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("http status {status} for {url}")]
    HttpStatus { status: u16, url: String },
    #[error("malformed response from {url}: {source}")]
    Decode {
        url: String,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Debug, Clone)]
pub struct GitHubClientConfig {
    pub api_base_url: String,
    pub token: Option<String>,
    pub user_agent: String,
    /// Per-request timeout. `None` leaves requests unbounded.
    pub timeout: Option<Duration>,
}

impl Default for GitHubClientConfig {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            token: None,
            user_agent: "ghsnap/0.1".to_string(),
            timeout: None,
        }
    }
}

/// Thin typed wrapper over the four GitHub endpoints ghsnap reads.
#[derive(Debug, Clone)]
pub struct GitHubClient {
    client: reqwest::Client,
    api_base_url: String,
    authenticated: bool,
}

impl GitHubClient {
    pub fn new(config: GitHubClientConfig) -> anyhow::Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(
            ACCEPT,
            HeaderValue::from_static("application/vnd.github+json"),
        );
        if let Some(token) = config.token.as_deref().filter(|t| !t.is_empty()) {
            let mut value = HeaderValue::from_str(&format!("Bearer {token}"))
                .context("GitHub token is not a valid header value")?;
            value.set_sensitive(true);
            headers.insert(AUTHORIZATION, value);
        }
        let authenticated = headers.contains_key(AUTHORIZATION);

        let mut builder = reqwest::Client::builder()
            .gzip(true)
            .brotli(true)
            .user_agent(config.user_agent)
            .default_headers(headers);
        if let Some(timeout) = config.timeout {
            builder = builder.timeout(timeout);
        }

        let client = builder.build().context("building reqwest client")?;
        Ok(Self {
            client,
            api_base_url: config.api_base_url.trim_end_matches('/').to_string(),
            authenticated,
        })
    }

    pub fn is_authenticated(&self) -> bool {
        self.authenticated
    }

    pub async fn get_user(&self, username: &str) -> Result<ApiUser, FetchError> {
        self.get_json(&format!("/users/{username}"), &[] as &[(&str, String)])
            .await
    }

    pub async fn list_repos_for_user(
        &self,
        username: &str,
        per_page: u32,
    ) -> Result<Vec<ApiRepository>, FetchError> {
        self.get_json(
            &format!("/users/{username}/repos"),
            &[
                ("per_page", per_page.to_string()),
                ("sort", "updated".to_string()),
            ],
        )
        .await
    }

    pub async fn list_public_events_for_user(
        &self,
        username: &str,
        per_page: u32,
    ) -> Result<Vec<ApiEvent>, FetchError> {
        self.get_json(
            &format!("/users/{username}/events/public"),
            &[("per_page", per_page.to_string())],
        )
        .await
    }

    pub async fn search_issues_and_prs(
        &self,
        query: &SearchQuery,
    ) -> Result<ApiSearchResults, FetchError> {
        self.get_json("/search/issues", query).await
    }

    async fn get_json<T, Q>(&self, path: &str, query: &Q) -> Result<T, FetchError>
    where
        T: DeserializeOwned,
        Q: Serialize + ?Sized,
    {
        let url = format!("{}{}", self.api_base_url, path);
        let span = info_span!("github_request", path);

        async {
            let resp = self.client.get(&url).query(query).send().await?;
            let status = resp.status();
            let final_url = resp.url().to_string();
            debug!(status = status.as_u16(), "github response");

            if !status.is_success() {
                return Err(FetchError::HttpStatus {
                    status: status.as_u16(),
                    url: final_url,
                });
            }

            let body = resp.bytes().await?;
            serde_json::from_slice(&body).map_err(|source| FetchError::Decode {
                url: final_url,
                source,
            })
        }
        .instrument(span)
        .await
    }
}

/// Result of a successful snapshot write.
#[derive(Debug, Clone)]
pub struct WrittenSnapshot {
    pub path: PathBuf,
    pub byte_size: usize,
    pub sha256: String,
}

/// Writes the snapshot document to one fixed path.
#[derive(Debug, Clone)]
pub struct SnapshotWriter {
    path: PathBuf,
}

impl SnapshotWriter {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn sha256_hex(bytes: &[u8]) -> String {
        let mut hasher = Sha256::new();
        hasher.update(bytes);
        hex::encode(hasher.finalize())
    }

    /// Serialize `value` as two-space indented JSON and replace the target file.
    pub async fn write<T: Serialize>(&self, value: &T) -> anyhow::Result<WrittenSnapshot> {
        let bytes = serde_json::to_vec_pretty(value).context("serializing snapshot")?;
        self.write_bytes(&bytes).await
    }

    /// Replace the target file through a sibling temp file and an atomic rename.
    pub async fn write_bytes(&self, bytes: &[u8]) -> anyhow::Result<WrittenSnapshot> {
        let parent = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        fs::create_dir_all(&parent)
            .await
            .with_context(|| format!("creating snapshot directory {}", parent.display()))?;

        let temp_path = parent.join(format!(".{}.{}.tmp", Uuid::new_v4(), bytes.len()));

        let mut file = fs::OpenOptions::new()
            .create_new(true)
            .write(true)
            .open(&temp_path)
            .await
            .with_context(|| format!("opening temp snapshot file {}", temp_path.display()))?;
        file.write_all(bytes)
            .await
            .with_context(|| format!("writing temp snapshot file {}", temp_path.display()))?;
        file.flush()
            .await
            .with_context(|| format!("flushing temp snapshot file {}", temp_path.display()))?;
        drop(file);

        if let Err(err) = fs::rename(&temp_path, &self.path).await {
            let _ = fs::remove_file(&temp_path).await;
            return Err(err).with_context(|| {
                format!(
                    "atomically renaming temp snapshot {} -> {}",
                    temp_path.display(),
                    self.path.display()
                )
            });
        }

        Ok(WrittenSnapshot {
            path: self.path.clone(),
            byte_size: bytes.len(),
            sha256: Self::sha256_hex(bytes),
        })
    }
}
