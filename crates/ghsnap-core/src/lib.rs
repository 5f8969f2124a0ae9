//! Core snapshot model for ghsnap.
//!
//! Everything in here is a plain value record. A run materializes each record
//! once, assembles them into a [`ContributionsSnapshot`], and hands it to the
//! sink; nothing is mutated after assembly.

pub mod api;

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const CRATE_NAME: &str = "ghsnap-core";

/// Browsable host used to build repository and commit links.
pub const GITHUB_WEB_BASE: &str = "https://github.com";

/// Profile facet. Absent from the snapshot when the lookup fails.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    pub username: String,
    pub profile_url: String,
    pub avatar_url: String,
    pub last_updated: DateTime<Utc>,
}

/// Aggregate counters. The all-zero value doubles as the failure fallback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Statistics {
    pub total_contributions: u64,
    pub total_repositories: u64,
    pub total_stars: u64,
    pub total_forks: u64,
    pub total_issues: u64,
    pub total_pull_requests: u64,
    pub total_commits: u64,
}

/// GitHub public event type.
///
/// Unknown types are kept verbatim in [`EventKind::Other`] so they still reach
/// the output document unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum EventKind {
    Push,
    PullRequest,
    PullRequestReview,
    PullRequestReviewComment,
    Issues,
    IssueComment,
    Create,
    Delete,
    Fork,
    Watch,
    Release,
    Public,
    Member,
    Gollum,
    CommitComment,
    Other(String),
}

impl EventKind {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Push => "PushEvent",
            Self::PullRequest => "PullRequestEvent",
            Self::PullRequestReview => "PullRequestReviewEvent",
            Self::PullRequestReviewComment => "PullRequestReviewCommentEvent",
            Self::Issues => "IssuesEvent",
            Self::IssueComment => "IssueCommentEvent",
            Self::Create => "CreateEvent",
            Self::Delete => "DeleteEvent",
            Self::Fork => "ForkEvent",
            Self::Watch => "WatchEvent",
            Self::Release => "ReleaseEvent",
            Self::Public => "PublicEvent",
            Self::Member => "MemberEvent",
            Self::Gollum => "GollumEvent",
            Self::CommitComment => "CommitCommentEvent",
            Self::Other(raw) => raw,
        }
    }
}

impl From<String> for EventKind {
    fn from(value: String) -> Self {
        match value.as_str() {
            "PushEvent" => Self::Push,
            "PullRequestEvent" => Self::PullRequest,
            "PullRequestReviewEvent" => Self::PullRequestReview,
            "PullRequestReviewCommentEvent" => Self::PullRequestReviewComment,
            "IssuesEvent" => Self::Issues,
            "IssueCommentEvent" => Self::IssueComment,
            "CreateEvent" => Self::Create,
            "DeleteEvent" => Self::Delete,
            "ForkEvent" => Self::Fork,
            "WatchEvent" => Self::Watch,
            "ReleaseEvent" => Self::Release,
            "PublicEvent" => Self::Public,
            "MemberEvent" => Self::Member,
            "GollumEvent" => Self::Gollum,
            "CommitCommentEvent" => Self::CommitComment,
            _ => Self::Other(value),
        }
    }
}

impl From<EventKind> for String {
    fn from(kind: EventKind) -> Self {
        match kind {
            EventKind::Other(raw) => raw,
            known => known.as_str().to_string(),
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One entry of the recent activity feed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivityEvent {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: EventKind,
    pub created_at: DateTime<Utc>,
    pub repo: String,
    pub repo_url: String,
    pub action: Option<String>,
    pub title: String,
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Repository {
    pub id: u64,
    pub name: String,
    pub full_name: String,
    pub description: Option<String>,
    pub url: String,
    pub language: Option<String>,
    pub stars: u64,
    pub forks: u64,
    pub updated_at: DateTime<Utc>,
    pub is_fork: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PullRequestRecord {
    pub id: u64,
    pub number: u64,
    pub title: String,
    pub url: String,
    pub repo: String,
    pub repo_url: String,
    pub state: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub closed_at: Option<DateTime<Utc>>,
    pub merged_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssueRecord {
    pub id: u64,
    pub number: u64,
    pub title: String,
    pub url: String,
    pub repo: String,
    pub repo_url: String,
    pub state: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub closed_at: Option<DateTime<Utc>>,
}

/// Disjoint pull-request buckets. A record lives in exactly one of them.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PullRequestBuckets {
    pub open: Vec<PullRequestRecord>,
    pub merged: Vec<PullRequestRecord>,
    pub closed: Vec<PullRequestRecord>,
}

impl PullRequestBuckets {
    pub fn len(&self) -> usize {
        self.open.len() + self.merged.len() + self.closed.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Disjoint issue buckets.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct IssueBuckets {
    pub open: Vec<IssueRecord>,
    pub closed: Vec<IssueRecord>,
}

impl IssueBuckets {
    pub fn len(&self) -> usize {
        self.open.len() + self.closed.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Root output document, written whole to the sink once per run.
///
/// `Default` is the shape produced when every facet falls back.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ContributionsSnapshot {
    pub user: Option<UserProfile>,
    pub statistics: Statistics,
    pub recent_activity: Vec<ActivityEvent>,
    pub repositories: Vec<Repository>,
    pub pull_requests: PullRequestBuckets,
    pub issues: IssueBuckets,
}
