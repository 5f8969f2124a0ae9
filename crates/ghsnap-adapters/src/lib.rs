//! Facet fetchers: the GitHub API contract plus the rules that reshape raw
//! responses into snapshot records.
//!
//! Every fetcher resolves to a plain value. Failures are logged and replaced by
//! the facet's fallback, so callers can join them without an error path.

use std::future::Future;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use ghsnap_core::api::{
    ApiEvent, ApiEventPayload, ApiRepository, ApiSearchItem, ApiSearchResults, ApiUser,
    SearchQuery,
};
use ghsnap_core::{
    ActivityEvent, EventKind, IssueBuckets, IssueRecord, PullRequestBuckets, PullRequestRecord,
    Repository, Statistics, UserProfile, GITHUB_WEB_BASE,
};
use ghsnap_storage::{FetchError, GitHubClient};
use serde::{Deserialize, Serialize};
use tracing::{debug, info_span, warn, Instrument};
use uuid::Uuid;

pub const CRATE_NAME: &str = "ghsnap-adapters";

/// Title used when an event carries nothing more descriptive.
pub const FALLBACK_ACTIVITY_TITLE: &str = "Activity";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Facet {
    User,
    Statistics,
    RecentActivity,
    Repositories,
    PullRequests,
    Issues,
}

impl Facet {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Statistics => "statistics",
            Self::RecentActivity => "recent_activity",
            Self::Repositories => "repositories",
            Self::PullRequests => "pull_requests",
            Self::Issues => "issues",
        }
    }

    fn failure_message(&self) -> &'static str {
        match self {
            Self::User => "error fetching user data",
            Self::Statistics => "error fetching user stats",
            Self::RecentActivity => "error fetching recent activity",
            Self::Repositories => "error fetching repositories",
            Self::PullRequests => "error fetching pull requests",
            Self::Issues => "error fetching issues",
        }
    }
}

/// Identity of one run, shared by every fetcher.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchContext {
    pub run_id: Uuid,
    pub fetched_at: DateTime<Utc>,
}

impl FetchContext {
    pub fn start(fetched_at: DateTime<Utc>) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            fetched_at,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PageSizes {
    /// Repo and event lists feeding the statistics facet.
    pub stats: u32,
    pub activity: u32,
    pub repositories: u32,
    pub pull_requests: u32,
    pub issues: u32,
}

impl Default for PageSizes {
    fn default() -> Self {
        Self {
            stats: 100,
            activity: 20,
            repositories: 20,
            pull_requests: 30,
            issues: 20,
        }
    }
}

/// What to fetch, bound once before the fan-out.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FetchSettings {
    pub username: String,
    /// Full repository names to keep. Empty keeps everything.
    pub show_repositories: Vec<String>,
    /// Earliest pull-request creation date. `None` disables the date filter.
    pub pr_filter_date: Option<NaiveDate>,
    pub page_sizes: PageSizes,
}

/// Operations ghsnap needs from the GitHub REST API.
#[async_trait]
pub trait GitHubApi: Send + Sync {
    async fn get_user(&self, username: &str) -> Result<ApiUser, FetchError>;

    async fn list_repos_for_user(
        &self,
        username: &str,
        per_page: u32,
    ) -> Result<Vec<ApiRepository>, FetchError>;

    async fn list_public_events_for_user(
        &self,
        username: &str,
        per_page: u32,
    ) -> Result<Vec<ApiEvent>, FetchError>;

    async fn search_issues_and_prs(
        &self,
        query: &SearchQuery,
    ) -> Result<ApiSearchResults, FetchError>;
}

#[async_trait]
impl GitHubApi for GitHubClient {
    async fn get_user(&self, username: &str) -> Result<ApiUser, FetchError> {
        GitHubClient::get_user(self, username).await
    }

    async fn list_repos_for_user(
        &self,
        username: &str,
        per_page: u32,
    ) -> Result<Vec<ApiRepository>, FetchError> {
        GitHubClient::list_repos_for_user(self, username, per_page).await
    }

    async fn list_public_events_for_user(
        &self,
        username: &str,
        per_page: u32,
    ) -> Result<Vec<ApiEvent>, FetchError> {
        GitHubClient::list_public_events_for_user(self, username, per_page).await
    }

    async fn search_issues_and_prs(
        &self,
        query: &SearchQuery,
    ) -> Result<ApiSearchResults, FetchError> {
        GitHubClient::search_issues_and_prs(self, query).await
    }
}

/// Runs the six facet fetches against one API handle.
pub struct FacetFetcher<'a> {
    api: &'a dyn GitHubApi,
    settings: &'a FetchSettings,
    ctx: &'a FetchContext,
}

impl<'a> FacetFetcher<'a> {
    pub fn new(api: &'a dyn GitHubApi, settings: &'a FetchSettings, ctx: &'a FetchContext) -> Self {
        Self { api, settings, ctx }
    }

    pub async fn user_profile(&self) -> Option<UserProfile> {
        self.settle(Facet::User, None, async {
            let user = self.api.get_user(&self.settings.username).await?;
            Ok::<_, FetchError>(Some(UserProfile {
                username: user.login,
                profile_url: user.html_url,
                avatar_url: user.avatar_url,
                last_updated: self.ctx.fetched_at,
            }))
        })
        .await
    }

    pub async fn statistics(&self) -> Statistics {
        self.settle(Facet::Statistics, Statistics::default(), async {
            let per_page = self.settings.page_sizes.stats;
            let repos = self
                .api
                .list_repos_for_user(&self.settings.username, per_page)
                .await?;
            let events = self
                .api
                .list_public_events_for_user(&self.settings.username, per_page)
                .await?;
            Ok::<_, FetchError>(compute_statistics(&repos, &events))
        })
        .await
    }

    pub async fn recent_activity(&self) -> Vec<ActivityEvent> {
        self.settle(Facet::RecentActivity, Vec::new(), async {
            let events = self
                .api
                .list_public_events_for_user(
                    &self.settings.username,
                    self.settings.page_sizes.activity,
                )
                .await?;
            Ok::<_, FetchError>(events.iter().map(normalize_event).collect())
        })
        .await
    }

    pub async fn repositories(&self) -> Vec<Repository> {
        self.settle(Facet::Repositories, Vec::new(), async {
            let repos = self
                .api
                .list_repos_for_user(
                    &self.settings.username,
                    self.settings.page_sizes.repositories,
                )
                .await?;
            Ok::<_, FetchError>(
                filter_repositories(repos, &self.settings.show_repositories)
                    .iter()
                    .map(normalize_repository)
                    .collect(),
            )
        })
        .await
    }

    pub async fn pull_requests(&self) -> PullRequestBuckets {
        self.settle(Facet::PullRequests, PullRequestBuckets::default(), async {
            let query = SearchQuery::recently_updated(
                pull_request_query(&self.settings.username, self.settings.pr_filter_date),
                self.settings.page_sizes.pull_requests,
            );
            let results = self.api.search_issues_and_prs(&query).await?;
            Ok::<_, FetchError>(classify_pull_requests(
                &results.items,
                self.settings.pr_filter_date,
            ))
        })
        .await
    }

    pub async fn issues(&self) -> IssueBuckets {
        self.settle(Facet::Issues, IssueBuckets::default(), async {
            let query = SearchQuery::recently_updated(
                issue_query(&self.settings.username),
                self.settings.page_sizes.issues,
            );
            let results = self.api.search_issues_and_prs(&query).await?;
            Ok::<_, FetchError>(classify_issues(&results.items))
        })
        .await
    }

    async fn settle<T, F>(&self, facet: Facet, fallback: T, fetch: F) -> T
    where
        F: Future<Output = Result<T, FetchError>>,
    {
        let span = info_span!("facet", run_id = %self.ctx.run_id, facet = facet.as_str());
        match fetch.instrument(span).await {
            Ok(value) => {
                debug!(run_id = %self.ctx.run_id, facet = facet.as_str(), "facet fetched");
                value
            }
            Err(err) => {
                warn!(
                    run_id = %self.ctx.run_id,
                    facet = facet.as_str(),
                    error = %err,
                    "{}",
                    facet.failure_message()
                );
                fallback
            }
        }
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|s| !s.is_empty())
}

/// `https://api.github.com/repos/owner/name` -> (`owner/name`, `https://github.com/owner/name`).
pub fn repo_from_api_url(repository_url: &str) -> (String, String) {
    let segments: Vec<&str> = repository_url.trim_end_matches('/').split('/').collect();
    let tail = &segments[segments.len().saturating_sub(2)..];
    let repo = tail.join("/");
    let repo_url = format!("{GITHUB_WEB_BASE}/{repo}");
    (repo, repo_url)
}

pub fn activity_title(payload: &ApiEventPayload) -> String {
    non_empty(payload.pull_request.as_ref().and_then(|pr| pr.title.as_deref()))
        .or_else(|| non_empty(payload.issue.as_ref().and_then(|i| i.title.as_deref())))
        .or_else(|| {
            non_empty(
                payload
                    .commits
                    .as_ref()
                    .and_then(|commits| commits.first())
                    .and_then(|c| c.message.as_deref()),
            )
        })
        .unwrap_or(FALLBACK_ACTIVITY_TITLE)
        .to_string()
}

/// Falls back to the commit link, and to the repository itself when the
/// payload carries no commit reference either.
pub fn activity_url(repo: &str, payload: &ApiEventPayload) -> String {
    if let Some(url) =
        non_empty(payload.pull_request.as_ref().and_then(|pr| pr.html_url.as_deref()))
            .or_else(|| non_empty(payload.issue.as_ref().and_then(|i| i.html_url.as_deref())))
    {
        return url.to_string();
    }
    match non_empty(payload.head.as_deref()).or_else(|| non_empty(payload.sha.as_deref())) {
        Some(reference) => format!("{GITHUB_WEB_BASE}/{repo}/commit/{reference}"),
        None => format!("{GITHUB_WEB_BASE}/{repo}"),
    }
}

pub fn normalize_event(event: &ApiEvent) -> ActivityEvent {
    let repo = event.repo.name.clone();
    ActivityEvent {
        id: event.id.clone(),
        kind: event.kind.clone(),
        created_at: event.created_at,
        repo_url: format!("{GITHUB_WEB_BASE}/{repo}"),
        action: event.payload.action.clone(),
        title: activity_title(&event.payload),
        url: activity_url(&repo, &event.payload),
        repo,
    }
}

pub fn normalize_repository(repo: &ApiRepository) -> Repository {
    Repository {
        id: repo.id,
        name: repo.name.clone(),
        full_name: repo.full_name.clone(),
        description: repo.description.clone(),
        url: repo.html_url.clone(),
        language: repo.language.clone(),
        stars: repo.stargazers_count,
        forks: repo.forks_count,
        updated_at: repo.updated_at,
        is_fork: repo.fork,
    }
}

/// Keeps repositories named in `allow_list`, in their original order.
pub fn filter_repositories(repos: Vec<ApiRepository>, allow_list: &[String]) -> Vec<ApiRepository> {
    if allow_list.is_empty() {
        return repos;
    }
    repos
        .into_iter()
        .filter(|repo| allow_list.iter().any(|name| name == &repo.full_name))
        .collect()
}

pub fn compute_statistics(repos: &[ApiRepository], events: &[ApiEvent]) -> Statistics {
    let count_kind = |kind: &EventKind| events.iter().filter(|e| &e.kind == kind).count() as u64;
    Statistics {
        total_contributions: events.len() as u64,
        total_repositories: repos.len() as u64,
        total_stars: repos.iter().map(|r| r.stargazers_count).sum(),
        total_forks: repos.iter().map(|r| r.forks_count).sum(),
        total_issues: count_kind(&EventKind::Issues),
        total_pull_requests: count_kind(&EventKind::PullRequest),
        total_commits: events
            .iter()
            .filter(|e| e.kind == EventKind::Push)
            .map(|e| e.payload.commits.as_ref().map_or(0, Vec::len) as u64)
            .sum(),
    }
}

pub fn pull_request_query(username: &str, created_since: Option<NaiveDate>) -> String {
    match created_since {
        Some(date) => format!("author:{username} type:pr created:>={}", date.format("%Y-%m-%d")),
        None => format!("author:{username} type:pr"),
    }
}

pub fn issue_query(username: &str) -> String {
    format!("author:{username} type:issue")
}

/// Midnight UTC at the start of `date`.
pub fn cutoff_instant(date: NaiveDate) -> DateTime<Utc> {
    date.and_time(NaiveTime::MIN).and_utc()
}

pub fn pull_request_record(item: &ApiSearchItem) -> PullRequestRecord {
    let (repo, repo_url) = repo_from_api_url(&item.repository_url);
    PullRequestRecord {
        id: item.id,
        number: item.number,
        title: item.title.clone(),
        url: item.html_url.clone(),
        repo,
        repo_url,
        state: item.state.clone(),
        created_at: item.created_at,
        updated_at: item.updated_at,
        closed_at: item.closed_at,
        merged_at: item.pull_request.as_ref().and_then(|pr| pr.merged_at),
    }
}

pub fn issue_record(item: &ApiSearchItem) -> IssueRecord {
    let (repo, repo_url) = repo_from_api_url(&item.repository_url);
    IssueRecord {
        id: item.id,
        number: item.number,
        title: item.title.clone(),
        url: item.html_url.clone(),
        repo,
        repo_url,
        state: item.state.clone(),
        created_at: item.created_at,
        updated_at: item.updated_at,
        closed_at: item.closed_at,
    }
}

/// Merged wins over state; items created before `created_since` are dropped
/// even if the search returned them.
pub fn classify_pull_requests(
    items: &[ApiSearchItem],
    created_since: Option<NaiveDate>,
) -> PullRequestBuckets {
    let cutoff = created_since.map(cutoff_instant);
    let mut buckets = PullRequestBuckets::default();

    for record in items.iter().map(pull_request_record) {
        if cutoff.is_some_and(|cutoff| record.created_at < cutoff) {
            continue;
        }
        if record.merged_at.is_some() {
            buckets.merged.push(record);
        } else if record.state == "open" {
            buckets.open.push(record);
        } else {
            buckets.closed.push(record);
        }
    }

    buckets
}

pub fn classify_issues(items: &[ApiSearchItem]) -> IssueBuckets {
    let mut buckets = IssueBuckets::default();
    for record in items.iter().map(issue_record) {
        if record.state == "open" {
            buckets.open.push(record);
        } else {
            buckets.closed.push(record);
        }
    }
    buckets
}
