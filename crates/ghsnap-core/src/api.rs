//! Wire shapes of the GitHub REST responses ghsnap reads.
//!
//! Only the fields the normalizers touch are modeled; serde ignores the rest.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::EventKind;

/// `GET /users/{username}`
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ApiUser {
    pub login: String,
    pub id: u64,
    pub avatar_url: String,
    pub html_url: String,
    #[serde(default)]
    pub name: Option<String>,
}

/// Element of `GET /users/{username}/repos`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ApiRepository {
    pub id: u64,
    pub name: String,
    pub full_name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub html_url: String,
    #[serde(default)]
    pub language: Option<String>,
    #[serde(default)]
    pub stargazers_count: u64,
    #[serde(default)]
    pub forks_count: u64,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub fork: bool,
}

/// Element of `GET /users/{username}/events/public`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ApiEvent {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: EventKind,
    pub created_at: DateTime<Utc>,
    pub repo: ApiEventRepo,
    #[serde(default)]
    pub payload: ApiEventPayload,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ApiEventRepo {
    /// Full `owner/name` of the repository.
    pub name: String,
}

/// Union of the payload fields ghsnap reads across event kinds.
#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
pub struct ApiEventPayload {
    #[serde(default)]
    pub action: Option<String>,
    #[serde(default)]
    pub pull_request: Option<ApiPayloadItem>,
    #[serde(default)]
    pub issue: Option<ApiPayloadItem>,
    #[serde(default)]
    pub commits: Option<Vec<ApiCommit>>,
    #[serde(default)]
    pub head: Option<String>,
    #[serde(default)]
    pub sha: Option<String>,
}

/// Pull request or issue embedded in an event payload.
#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
pub struct ApiPayloadItem {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub html_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
pub struct ApiCommit {
    #[serde(default)]
    pub message: Option<String>,
}

/// `GET /search/issues`
#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
pub struct ApiSearchResults {
    #[serde(default)]
    pub total_count: u64,
    #[serde(default)]
    pub incomplete_results: bool,
    #[serde(default)]
    pub items: Vec<ApiSearchItem>,
}

/// Issue or pull request returned by the search endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ApiSearchItem {
    pub id: u64,
    pub number: u64,
    pub title: String,
    pub html_url: String,
    /// API endpoint of the owning repository, e.g.
    /// `https://api.github.com/repos/owner/name`.
    pub repository_url: String,
    pub state: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub closed_at: Option<DateTime<Utc>>,
    /// Present only on pull requests.
    #[serde(default)]
    pub pull_request: Option<ApiPullRequestRef>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
pub struct ApiPullRequestRef {
    #[serde(default)]
    pub merged_at: Option<DateTime<Utc>>,
}

/// Query parameters for `GET /search/issues`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SearchQuery {
    pub q: String,
    pub sort: String,
    pub order: String,
    pub per_page: u32,
}

impl SearchQuery {
    /// Most recently updated first, which is how every facet searches.
    pub fn recently_updated(q: impl Into<String>, per_page: u32) -> Self {
        Self {
            q: q.into(),
            sort: "updated".to_string(),
            order: "desc".to_string(),
            per_page,
        }
    }
}
