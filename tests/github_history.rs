use chrono::{Duration, Utc};
use httpmock::prelude::*;
use serde_json::json;
use tempfile::TempDir;

use winget_batch::github::{CommitQuery, GithubClient, GithubError, mine_new_packages};
use winget_batch::storage::RateLimitStore;

const COMMITS_PATH: &str = "/repos/microsoft/winget-pkgs/commits";

fn commit(sha: &str, message: &str, hours_ago: i64) -> serde_json::Value {
    let date = Utc::now() - Duration::hours(hours_ago);
    json!({
        "sha": sha,
        "commit": {
            "message": message,
            "author": {"name": "bot", "date": date.to_rfc3339()}
        }
    })
}

fn query(per_page: u32, max_pages: u32) -> CommitQuery {
    CommitQuery {
        since: Utc::now() - Duration::days(7),
        per_page,
        max_pages,
    }
}

fn client(server: &MockServer, dir: &TempDir, token: Option<&str>) -> GithubClient {
    let rate = RateLimitStore::new(dir.path().join("github_rate_limit.json"));
    GithubClient::new("microsoft/winget-pkgs", token.map(String::from), rate)
        .unwrap()
        .with_base_url(server.base_url())
}

#[tokio::test]
async fn pages_until_short_page_and_counts_requests() {
    let server = MockServer::start_async().await;
    let first = server
        .mock_async(|when, then| {
            when.method(GET)
                .path(COMMITS_PATH)
                .query_param("per_page", "2")
                .query_param("page", "1")
                .header("authorization", "Bearer ghp_test");
            then.status(200).json_body(json!([
                commit("aaaaaaaaaa", "New package: Acme.Widget version 1.0.0 (#10)", 1),
                commit("bbbbbbbbbb", "Update: Acme.Old version 2.0", 2),
            ]));
        })
        .await;
    let second = server
        .mock_async(|when, then| {
            when.method(GET)
                .path(COMMITS_PATH)
                .query_param("per_page", "2")
                .query_param("page", "2")
                .header("authorization", "Bearer ghp_test");
            then.status(200)
                .json_body(json!([commit("cccccccccc", "Zed.Editor version 0.9.1 (#12)", 30)]));
        })
        .await;
    let dir = TempDir::new().unwrap();
    let client = client(&server, &dir, Some("ghp_test"));

    let mut pages_seen = Vec::new();
    let history = client
        .fetch_commits(&query(2, 10), |page, total| pages_seen.push((page, total)))
        .await
        .unwrap();

    assert_eq!(history.pages, 2);
    assert_eq!(history.commits.len(), 3);
    assert!(history.stopped_early.is_none());
    assert_eq!(pages_seen, vec![(1, 2), (2, 3)]);
    first.assert_hits_async(1).await;
    second.assert_hits_async(1).await;

    let rate = RateLimitStore::new(dir.path().join("github_rate_limit.json"));
    assert_eq!(rate.get().request_count, 2);

    let candidates = mine_new_packages(&history.commits, None);
    let names: Vec<&str> = candidates.iter().map(|c| c.name.as_str()).collect();
    assert_eq!(names, vec!["Acme.Widget", "Zed.Editor"]);
    assert_eq!(candidates[0].short_hash, "aaaaaaa");
}

#[tokio::test]
async fn anonymous_requests_send_no_authorization() {
    let server = MockServer::start_async().await;
    let anonymous = server
        .mock_async(|when, then| {
            when.method(GET)
                .path(COMMITS_PATH)
                .query_param("page", "1")
                .header_missing("authorization");
            then.status(200).json_body(json!([]));
        })
        .await;
    let dir = TempDir::new().unwrap();

    let history = client(&server, &dir, None)
        .fetch_commits(&query(100, 10), |_, _| {})
        .await
        .unwrap();

    assert_eq!(history.pages, 1);
    assert!(history.commits.is_empty());
    anonymous.assert_hits_async(1).await;
}

#[tokio::test]
async fn rate_limit_on_first_page_is_an_error() {
    let server = MockServer::start_async().await;
    let limited = server
        .mock_async(|when, then| {
            when.method(GET).path(COMMITS_PATH).query_param("page", "1");
            then.status(403)
                .json_body(json!({"message": "API rate limit exceeded"}));
        })
        .await;
    let dir = TempDir::new().unwrap();

    let err = client(&server, &dir, None)
        .fetch_commits(&query(100, 10), |_, _| {})
        .await
        .unwrap_err();
    assert!(matches!(err, GithubError::RateLimited { .. }));
    assert!(err.to_string().contains("wgb token set"));
    limited.assert_hits_async(1).await;
}

#[tokio::test]
async fn rate_limit_after_first_page_keeps_partial_history() {
    let server = MockServer::start_async().await;
    let first = server
        .mock_async(|when, then| {
            when.method(GET).path(COMMITS_PATH).query_param("page", "1");
            then.status(200).json_body(json!([
                commit("aaaaaaaaaa", "New package: Acme.Widget version 1.0.0", 1),
                commit("bbbbbbbbbb", "Add: Beta.Tool version 2.1", 2),
            ]));
        })
        .await;
    let second = server
        .mock_async(|when, then| {
            when.method(GET).path(COMMITS_PATH).query_param("page", "2");
            then.status(429).json_body(json!({"message": "slow down"}));
        })
        .await;
    let third = server
        .mock_async(|when, then| {
            when.method(GET).path(COMMITS_PATH).query_param("page", "3");
            then.status(200).json_body(json!([]));
        })
        .await;
    let dir = TempDir::new().unwrap();

    let history = client(&server, &dir, None)
        .fetch_commits(&query(2, 10), |_, _| {})
        .await
        .unwrap();

    assert_eq!(history.pages, 1);
    assert_eq!(history.commits.len(), 2);
    assert!(matches!(
        history.stopped_early,
        Some(GithubError::RateLimited { .. })
    ));
    first.assert_hits_async(1).await;
    second.assert_hits_async(1).await;
    assert_eq!(third.hits_async().await, 0);
}

#[tokio::test]
async fn other_failures_carry_status() {
    let server = MockServer::start_async().await;
    let missing = server
        .mock_async(|when, then| {
            when.method(GET).path(COMMITS_PATH).query_param("page", "1");
            then.status(404).json_body(json!({"message": "Not Found"}));
        })
        .await;
    let dir = TempDir::new().unwrap();

    let err = client(&server, &dir, None)
        .fetch_commits(&query(100, 1), |_, _| {})
        .await
        .unwrap_err();
    match err {
        GithubError::Status { status, body } => {
            assert_eq!(status.as_u16(), 404);
            assert!(body.contains("Not Found"));
        }
        other => panic!("expected status error, got {other:?}"),
    }
    missing.assert_hits_async(1).await;
}

#[tokio::test]
async fn exhausted_budget_skips_the_request() {
    let server = MockServer::start_async().await;
    let commits = server
        .mock_async(|when, then| {
            when.method(GET).path(COMMITS_PATH);
            then.status(200).json_body(json!([]));
        })
        .await;
    let dir = TempDir::new().unwrap();
    let rate = RateLimitStore::new(dir.path().join("github_rate_limit.json"));
    for _ in 0..60 {
        rate.record_request();
    }

    let err = client(&server, &dir, None)
        .fetch_commits(&query(100, 1), |_, _| {})
        .await
        .unwrap_err();
    assert!(err.to_string().contains("60/60"));
    assert_eq!(commits.hits_async().await, 0);
}
