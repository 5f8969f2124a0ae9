use std::path::PathBuf;

use async_trait::async_trait;
use ghsnap_adapters::{FetchContext, GitHubApi};
use ghsnap_core::api::{ApiEvent, ApiRepository, ApiSearchResults, ApiUser, SearchQuery};
use ghsnap_core::{ContributionsSnapshot, Statistics};
use ghsnap_storage::FetchError;
use ghsnap_sync::{parse_contributions_config, SnapshotPipeline, SyncConfig};
use serde::de::DeserializeOwned;
use tempfile::tempdir;

fn fixture<T: DeserializeOwned>(name: &str) -> T {
    let path = PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("../../fixtures/github")
        .join(name);
    serde_json::from_str(&std::fs::read_to_string(path).unwrap()).unwrap()
}

struct FixtureApi;

#[async_trait]
impl GitHubApi for FixtureApi {
    async fn get_user(&self, _username: &str) -> Result<ApiUser, FetchError> {
        Ok(fixture("user.json"))
    }

    async fn list_repos_for_user(
        &self,
        _username: &str,
        _per_page: u32,
    ) -> Result<Vec<ApiRepository>, FetchError> {
        Ok(fixture("repos.json"))
    }

    async fn list_public_events_for_user(
        &self,
        _username: &str,
        _per_page: u32,
    ) -> Result<Vec<ApiEvent>, FetchError> {
        Ok(fixture("events.json"))
    }

    async fn search_issues_and_prs(
        &self,
        query: &SearchQuery,
    ) -> Result<ApiSearchResults, FetchError> {
        if query.q.contains("type:pr") {
            Ok(fixture("search_pull_requests.json"))
        } else {
            Ok(fixture("search_issues.json"))
        }
    }
}

/// Profile lookups work, everything else is rate limited.
struct PartiallyFailingApi;

fn rate_limited() -> FetchError {
    FetchError::HttpStatus {
        status: 403,
        url: "https://api.github.com/rate_limited".into(),
    }
}

#[async_trait]
impl GitHubApi for PartiallyFailingApi {
    async fn get_user(&self, _username: &str) -> Result<ApiUser, FetchError> {
        Ok(fixture("user.json"))
    }

    async fn list_repos_for_user(
        &self,
        _username: &str,
        _per_page: u32,
    ) -> Result<Vec<ApiRepository>, FetchError> {
        Err(rate_limited())
    }

    async fn list_public_events_for_user(
        &self,
        _username: &str,
        _per_page: u32,
    ) -> Result<Vec<ApiEvent>, FetchError> {
        Err(rate_limited())
    }

    async fn search_issues_and_prs(
        &self,
        _query: &SearchQuery,
    ) -> Result<ApiSearchResults, FetchError> {
        Err(rate_limited())
    }
}

struct FailingApi;

#[async_trait]
impl GitHubApi for FailingApi {
    async fn get_user(&self, _username: &str) -> Result<ApiUser, FetchError> {
        Err(rate_limited())
    }

    async fn list_repos_for_user(
        &self,
        _username: &str,
        _per_page: u32,
    ) -> Result<Vec<ApiRepository>, FetchError> {
        Err(rate_limited())
    }

    async fn list_public_events_for_user(
        &self,
        _username: &str,
        _per_page: u32,
    ) -> Result<Vec<ApiEvent>, FetchError> {
        Err(rate_limited())
    }

    async fn search_issues_and_prs(
        &self,
        _query: &SearchQuery,
    ) -> Result<ApiSearchResults, FetchError> {
        Err(rate_limited())
    }
}

fn pipeline(output: PathBuf, api: Box<dyn GitHubApi>) -> SnapshotPipeline {
    let target = parse_contributions_config(
        r#"
username: alice
pr_filter_date: "2024-01-01"
show_repositories:
  - alice/seedsigner
  - alice/embit
"#,
    )
    .unwrap();
    let config = SyncConfig {
        output_override: Some(output),
        ..SyncConfig::default()
    };
    SnapshotPipeline::new(&config, target).unwrap().with_api(api)
}

fn read_snapshot(path: &PathBuf) -> (serde_json::Value, ContributionsSnapshot) {
    let text = std::fs::read_to_string(path).unwrap();
    (
        serde_json::from_str(&text).unwrap(),
        serde_json::from_str(&text).unwrap(),
    )
}

#[tokio::test]
async fn total_failure_still_writes_a_well_formed_snapshot() {
    let dir = tempdir().expect("tempdir");
    let output = dir.path().join("data").join("github_contributions.json");
    let summary = pipeline(output.clone(), Box::new(FailingApi))
        .run_once()
        .await
        .expect("run succeeds even when every facet fails");

    assert!(!summary.user_found);
    assert_eq!(summary.activity + summary.repositories + summary.pull_requests + summary.issues, 0);

    let (value, snapshot) = read_snapshot(&output);
    assert_eq!(snapshot, ContributionsSnapshot::default());
    assert!(value["user"].is_null());
    assert_eq!(value["statistics"]["total_commits"], 0);
    assert_eq!(value["pull_requests"]["merged"], serde_json::json!([]));
    assert_eq!(value["issues"]["closed"], serde_json::json!([]));
}

#[tokio::test]
async fn one_failing_facet_does_not_affect_the_others() {
    let dir = tempdir().expect("tempdir");
    let output = dir.path().join("snapshot.json");
    let summary = pipeline(output.clone(), Box::new(PartiallyFailingApi))
        .run_once()
        .await
        .unwrap();

    assert!(summary.user_found);
    let (_, snapshot) = read_snapshot(&output);
    assert_eq!(snapshot.user.unwrap().username, "alice");
    assert_eq!(snapshot.statistics, Statistics::default());
    assert!(snapshot.repositories.is_empty());
}

#[tokio::test]
async fn full_run_assembles_every_facet() {
    let dir = tempdir().expect("tempdir");
    let output = dir.path().join("snapshot.json");
    let pipeline = pipeline(output.clone(), Box::new(FixtureApi));
    assert_eq!(pipeline.output_path(), output.as_path());

    let summary = pipeline.run_once().await.unwrap();
    assert!(summary.user_found);
    assert_eq!(summary.activity, 6);
    assert_eq!(summary.repositories, 2);
    assert_eq!(summary.pull_requests, 4);
    assert_eq!(summary.issues, 3);
    assert_eq!(summary.output_path, output.display().to_string());

    let bytes = std::fs::read(&output).unwrap();
    assert_eq!(summary.bytes, bytes.len());

    let (value, snapshot) = read_snapshot(&output);
    assert_eq!(snapshot.statistics.total_repositories, 4);
    assert_eq!(snapshot.statistics.total_commits, 3);
    assert_eq!(
        snapshot
            .repositories
            .iter()
            .map(|r| r.full_name.as_str())
            .collect::<Vec<_>>(),
        vec!["alice/seedsigner", "alice/embit"]
    );
    assert_eq!(snapshot.pull_requests.merged.len(), 1);
    assert_eq!(value["recent_activity"][0]["type"], "PushEvent");
    assert_eq!(value["recent_activity"][0]["title"], "fix bug");
}

#[tokio::test]
async fn collect_stamps_the_profile_with_the_run_time() {
    let dir = tempdir().expect("tempdir");
    let pipeline = pipeline(dir.path().join("unused.json"), Box::new(FixtureApi));
    let ctx = FetchContext::start(chrono::Utc::now());

    let snapshot = pipeline.collect(&ctx).await;
    assert_eq!(snapshot.user.unwrap().last_updated, ctx.fetched_at);
    assert!(!dir.path().join("unused.json").exists());
}

#[tokio::test]
async fn rerun_overwrites_the_previous_snapshot() {
    let dir = tempdir().expect("tempdir");
    let output = dir.path().join("snapshot.json");

    pipeline(output.clone(), Box::new(FixtureApi))
        .run_once()
        .await
        .unwrap();
    pipeline(output.clone(), Box::new(FailingApi))
        .run_once()
        .await
        .unwrap();

    let (_, snapshot) = read_snapshot(&output);
    assert_eq!(snapshot, ContributionsSnapshot::default());
}
