//! Snapshot pipeline orchestration: configuration, concurrent facet fan-out,
//! and the hand-off to the file sink.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{bail, Context, Result};
use chrono::{DateTime, NaiveDate, Utc};
use ghsnap_adapters::{FacetFetcher, FetchContext, FetchSettings, GitHubApi, PageSizes};
use ghsnap_core::ContributionsSnapshot;
use ghsnap_storage::{GitHubClient, GitHubClientConfig, SnapshotWriter, DEFAULT_API_BASE_URL};
use serde::{Deserialize, Deserializer, Serialize};
use tokio::fs;
use tracing::info;
use uuid::Uuid;

pub const CRATE_NAME: &str = "ghsnap-sync";

pub const DEFAULT_CONFIG_PATH: &str = "contributions.yaml";
pub const DEFAULT_OUTPUT_PATH: &str = "data/github_contributions.json";

/// Process-level settings read from the environment.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    pub github_token: Option<String>,
    pub config_path: PathBuf,
    /// Takes precedence over `output_path` from the config file.
    pub output_override: Option<PathBuf>,
    pub api_base_url: String,
    pub user_agent: String,
    pub http_timeout_secs: Option<u64>,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            github_token: None,
            config_path: PathBuf::from(DEFAULT_CONFIG_PATH),
            output_override: None,
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            user_agent: "ghsnap/0.1".to_string(),
            http_timeout_secs: None,
        }
    }
}

impl SyncConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            github_token: std::env::var("GITHUB_TOKEN").ok().filter(|t| !t.is_empty()),
            config_path: std::env::var("GHSNAP_CONFIG")
                .map(PathBuf::from)
                .unwrap_or(defaults.config_path),
            output_override: std::env::var("GHSNAP_OUTPUT")
                .ok()
                .filter(|p| !p.is_empty())
                .map(PathBuf::from),
            api_base_url: std::env::var("GHSNAP_API_BASE_URL").unwrap_or(defaults.api_base_url),
            user_agent: std::env::var("GHSNAP_USER_AGENT").unwrap_or(defaults.user_agent),
            http_timeout_secs: std::env::var("GHSNAP_HTTP_TIMEOUT_SECS")
                .ok()
                .and_then(|v| v.parse().ok()),
        }
    }

    pub fn output_path_for(&self, target: &ContributionsConfig) -> PathBuf {
        self.output_override
            .clone()
            .unwrap_or_else(|| target.output_path.clone())
    }
}

/// Contents of `contributions.yaml`: whose activity to snapshot and how.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ContributionsConfig {
    pub username: String,
    #[serde(default = "default_output_path")]
    pub output_path: PathBuf,
    #[serde(default)]
    pub show_repositories: Vec<String>,
    #[serde(default, deserialize_with = "deserialize_optional_date")]
    pub pr_filter_date: Option<NaiveDate>,
    #[serde(default)]
    pub page_sizes: PageSizes,
}

fn default_output_path() -> PathBuf {
    PathBuf::from(DEFAULT_OUTPUT_PATH)
}

/// Accepts `YYYY-MM-DD`; a missing or blank value disables the filter.
fn deserialize_optional_date<'de, D>(deserializer: D) -> Result<Option<NaiveDate>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<String>::deserialize(deserializer)?;
    match raw.as_deref().map(str::trim) {
        None | Some("") => Ok(None),
        Some(text) => NaiveDate::parse_from_str(text, "%Y-%m-%d")
            .map(Some)
            .map_err(serde::de::Error::custom),
    }
}

impl ContributionsConfig {
    pub fn fetch_settings(&self) -> FetchSettings {
        FetchSettings {
            username: self.username.clone(),
            show_repositories: self.show_repositories.clone(),
            pr_filter_date: self.pr_filter_date,
            page_sizes: self.page_sizes,
        }
    }
}

pub fn parse_contributions_config(text: &str) -> Result<ContributionsConfig> {
    let config: ContributionsConfig =
        serde_yaml::from_str(text).context("parsing contributions config")?;
    if config.username.trim().is_empty() {
        bail!("contributions config must name a username");
    }
    Ok(config)
}

pub async fn load_contributions_config(path: &Path) -> Result<ContributionsConfig> {
    let text = fs::read_to_string(path)
        .await
        .with_context(|| format!("reading {}", path.display()))?;
    parse_contributions_config(&text).with_context(|| format!("loading {}", path.display()))
}

#[derive(Debug, Clone, Serialize)]
pub struct SnapshotRunSummary {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub output_path: String,
    pub bytes: usize,
    pub sha256: String,
    pub user_found: bool,
    pub activity: usize,
    pub repositories: usize,
    pub pull_requests: usize,
    pub issues: usize,
}

pub struct SnapshotPipeline {
    target: ContributionsConfig,
    api: Box<dyn GitHubApi>,
    writer: SnapshotWriter,
}

impl SnapshotPipeline {
    pub fn new(config: &SyncConfig, target: ContributionsConfig) -> Result<Self> {
        let client = GitHubClient::new(GitHubClientConfig {
            api_base_url: config.api_base_url.clone(),
            token: config.github_token.clone(),
            user_agent: config.user_agent.clone(),
            timeout: config.http_timeout_secs.map(Duration::from_secs),
        })?;
        if !client.is_authenticated() {
            info!("GITHUB_TOKEN not set; using unauthenticated rate limits");
        }
        let writer = SnapshotWriter::new(config.output_path_for(&target));
        Ok(Self {
            target,
            api: Box::new(client),
            writer,
        })
    }

    pub fn with_api(mut self, api: Box<dyn GitHubApi>) -> Self {
        self.api = api;
        self
    }

    pub fn output_path(&self) -> &Path {
        self.writer.path()
    }

    /// Fetch every facet concurrently and assemble the snapshot.
    ///
    /// Facet failures are already folded into fallbacks, so this cannot fail.
    pub async fn collect(&self, ctx: &FetchContext) -> ContributionsSnapshot {
        let settings = self.target.fetch_settings();
        let fetcher = FacetFetcher::new(self.api.as_ref(), &settings, ctx);

        let (user, statistics, recent_activity, repositories, pull_requests, issues) = tokio::join!(
            fetcher.user_profile(),
            fetcher.statistics(),
            fetcher.recent_activity(),
            fetcher.repositories(),
            fetcher.pull_requests(),
            fetcher.issues(),
        );

        ContributionsSnapshot {
            user,
            statistics,
            recent_activity,
            repositories,
            pull_requests,
            issues,
        }
    }

    pub async fn run_once(&self) -> Result<SnapshotRunSummary> {
        let started_at = Utc::now();
        let ctx = FetchContext::start(started_at);
        info!(
            run_id = %ctx.run_id,
            username = %self.target.username,
            "fetching GitHub contributions data"
        );

        let snapshot = self.collect(&ctx).await;
        let written = self
            .writer
            .write(&snapshot)
            .await
            .with_context(|| format!("writing snapshot to {}", self.writer.path().display()))?;

        let finished_at = Utc::now();
        info!(
            run_id = %ctx.run_id,
            path = %written.path.display(),
            bytes = written.byte_size,
            "GitHub contributions data updated"
        );

        Ok(SnapshotRunSummary {
            run_id: ctx.run_id,
            started_at,
            finished_at,
            output_path: written.path.display().to_string(),
            bytes: written.byte_size,
            sha256: written.sha256,
            user_found: snapshot.user.is_some(),
            activity: snapshot.recent_activity.len(),
            repositories: snapshot.repositories.len(),
            pull_requests: snapshot.pull_requests.len(),
            issues: snapshot.issues.len(),
        })
    }
}

pub async fn run_snapshot_once_from_env() -> Result<SnapshotRunSummary> {
    let config = SyncConfig::from_env();
    let target = load_contributions_config(&config.config_path).await?;
    SnapshotPipeline::new(&config, target)?.run_once().await
}

/// Where `fetch` would write, without fetching anything.
pub async fn snapshot_path_from_env() -> Result<PathBuf> {
    let config = SyncConfig::from_env();
    if let Some(path) = &config.output_override {
        return Ok(path.clone());
    }
    let target = load_contributions_config(&config.config_path).await?;
    Ok(config.output_path_for(&target))
}

/// Markdown digest of a snapshot previously written by `fetch`.
pub fn snapshot_summary_markdown(path: &Path) -> Result<String> {
    let text =
        std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    let snapshot: ContributionsSnapshot =
        serde_json::from_str(&text).with_context(|| format!("parsing {}", path.display()))?;

    let mut lines = vec!["# GitHub Contributions Snapshot".to_string(), String::new()];
    match &snapshot.user {
        Some(user) => {
            lines.push(format!("- User: {} ({})", user.username, user.profile_url));
            lines.push(format!("- Last updated: {}", user.last_updated.to_rfc3339()));
        }
        None => lines.push("- User: unavailable".to_string()),
    }
    lines.push(format!("- Snapshot: `{}`", path.display()));
    lines.push(String::new());

    let stats = &snapshot.statistics;
    lines.push("## Statistics".to_string());
    lines.push(format!("- contributions: {}", stats.total_contributions));
    lines.push(format!("- repositories: {}", stats.total_repositories));
    lines.push(format!("- stars: {}", stats.total_stars));
    lines.push(format!("- forks: {}", stats.total_forks));
    lines.push(format!("- issues: {}", stats.total_issues));
    lines.push(format!("- pull requests: {}", stats.total_pull_requests));
    lines.push(format!("- commits: {}", stats.total_commits));
    lines.push(String::new());

    lines.push("## Pull Requests".to_string());
    lines.push(format!("- open: {}", snapshot.pull_requests.open.len()));
    lines.push(format!("- merged: {}", snapshot.pull_requests.merged.len()));
    lines.push(format!("- closed: {}", snapshot.pull_requests.closed.len()));
    lines.push(String::new());

    lines.push("## Issues".to_string());
    lines.push(format!("- open: {}", snapshot.issues.open.len()));
    lines.push(format!("- closed: {}", snapshot.issues.closed.len()));
    lines.push(String::new());

    lines.push(format!("## Repositories ({})", snapshot.repositories.len()));
    for repo in &snapshot.repositories {
        lines.push(format!("- {} ({} stars)", repo.full_name, repo.stars));
    }
    lines.push(String::new());

    lines.push(format!("## Recent Activity ({})", snapshot.recent_activity.len()));
    for event in snapshot.recent_activity.iter().take(5) {
        lines.push(format!("- {} {}: {}", event.kind, event.repo, event.title));
    }

    Ok(lines.join("\n"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use ghsnap_core::{Repository, Statistics, UserProfile};
    use tempfile::tempdir;

    #[test]
    fn config_defaults_disable_filters_and_use_standard_page_sizes() {
        let config = parse_contributions_config("username: alice\n").unwrap();
        assert_eq!(config.username, "alice");
        assert_eq!(config.output_path, PathBuf::from(DEFAULT_OUTPUT_PATH));
        assert!(config.show_repositories.is_empty());
        assert_eq!(config.pr_filter_date, None);
        assert_eq!(config.page_sizes, PageSizes::default());
        assert_eq!(config.page_sizes.stats, 100);
        assert_eq!(config.page_sizes.pull_requests, 30);
    }

    #[test]
    fn config_reads_allow_list_cutoff_and_partial_page_sizes() {
        let config = parse_contributions_config(
            r#"
username: alice
output_path: site/data/contributions.json
pr_filter_date: "2024-01-01"
show_repositories:
  - alice/seedsigner
  - alice/embit
page_sizes:
  issues: 5
"#,
        )
        .unwrap();

        assert_eq!(config.output_path, PathBuf::from("site/data/contributions.json"));
        assert_eq!(config.pr_filter_date, NaiveDate::from_ymd_opt(2024, 1, 1));
        assert_eq!(config.show_repositories, vec!["alice/seedsigner", "alice/embit"]);
        assert_eq!(config.page_sizes.issues, 5);
        assert_eq!(config.page_sizes.activity, 20);

        let settings = config.fetch_settings();
        assert_eq!(settings.username, "alice");
        assert_eq!(settings.pr_filter_date, config.pr_filter_date);
    }

    #[test]
    fn blank_cutoff_means_no_date_filter() {
        let config = parse_contributions_config("username: alice\npr_filter_date: \"\"\n").unwrap();
        assert_eq!(config.pr_filter_date, None);
    }

    #[test]
    fn malformed_cutoff_and_blank_username_are_rejected() {
        assert!(parse_contributions_config("username: alice\npr_filter_date: 01/01/2024\n").is_err());
        assert!(parse_contributions_config("username: \"  \"\n").is_err());
    }

    #[test]
    fn output_override_wins_over_config_file() {
        let target = parse_contributions_config("username: alice\n").unwrap();
        let mut config = SyncConfig::default();
        assert_eq!(config.output_path_for(&target), PathBuf::from(DEFAULT_OUTPUT_PATH));

        config.output_override = Some(PathBuf::from("/tmp/out.json"));
        assert_eq!(config.output_path_for(&target), PathBuf::from("/tmp/out.json"));
    }

    #[test]
    fn summary_markdown_reports_counts() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("snapshot.json");
        let snapshot = ContributionsSnapshot {
            user: Some(UserProfile {
                username: "alice".into(),
                profile_url: "https://github.com/alice".into(),
                avatar_url: "https://avatars.example.com/u/1".into(),
                last_updated: Utc.with_ymd_and_hms(2024, 6, 3, 12, 0, 0).single().unwrap(),
            }),
            statistics: Statistics {
                total_contributions: 6,
                total_stars: 19,
                ..Statistics::default()
            },
            repositories: vec![Repository {
                id: 1,
                name: "blog".into(),
                full_name: "alice/blog".into(),
                description: None,
                url: "https://github.com/alice/blog".into(),
                language: None,
                stars: 2,
                forks: 0,
                updated_at: Utc.with_ymd_and_hms(2024, 3, 1, 8, 0, 0).single().unwrap(),
                is_fork: false,
            }],
            ..ContributionsSnapshot::default()
        };
        std::fs::write(&path, serde_json::to_vec_pretty(&snapshot).unwrap()).unwrap();

        let markdown = snapshot_summary_markdown(&path).unwrap();
        assert!(markdown.contains("- User: alice (https://github.com/alice)"));
        assert!(markdown.contains("- contributions: 6"));
        assert!(markdown.contains("- stars: 19"));
        assert!(markdown.contains("## Repositories (1)"));
        assert!(markdown.contains("- alice/blog (2 stars)"));
        assert!(markdown.contains("- merged: 0"));
    }

    #[test]
    fn summary_of_missing_snapshot_is_an_error() {
        let dir = tempdir().expect("tempdir");
        assert!(snapshot_summary_markdown(&dir.path().join("absent.json")).is_err());
    }
}
