use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use commit_lens::error::LensError;
use commit_lens::github::{
    ledger_cache, CommitLedger, CommitSource, Credentials, GitHubClient, RepoRef,
};
use serde_json::{json, Value};
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Commit object in the shape returned by the GitHub commits API.
fn commit_json(sha: &str) -> Value {
    json!({
        "sha": sha,
        "commit": {
            "message": format!("Message of {sha}"),
            "author": {"name": "Ada", "email": "ada@example.com", "date": "2024-01-01T00:00:00Z"},
            "committer": {"name": "Ada", "email": "ada@example.com", "date": "2024-01-01T00:00:00Z"}
        },
        "author": {"login": "ada"},
        "html_url": format!("https://github.com/octo/demo/commit/{sha}")
    })
}

fn repo() -> RepoRef {
    RepoRef::new("octo", "demo")
}

fn creds() -> Credentials {
    Credentials::new("ghp_test_token")
}

async fn mount_page(server: &MockServer, page: u32, shas: &[String]) {
    let body: Vec<Value> = shas.iter().map(|sha| commit_json(sha)).collect();
    Mock::given(method("GET"))
        .and(path("/repos/octo/demo/commits"))
        .and(query_param("per_page", "100"))
        .and(query_param("page", page.to_string()))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .expect(1)
        .mount(server)
        .await;
}

fn ledger_over(server: &MockServer) -> Result<CommitLedger> {
    let client = GitHubClient::new(&server.uri())?;
    Ok(CommitLedger::new(
        Arc::new(client),
        ledger_cache(8, Duration::from_secs(60)),
    ))
}

#[tokio::test]
async fn ledger_walks_every_page_and_numbers_oldest_first() -> Result<()> {
    let server = MockServer::start().await;
    // Newest first: sha-149 .. sha-0.
    let newest_first: Vec<String> = (0..150).rev().map(|i| format!("sha-{i}")).collect();
    mount_page(&server, 1, &newest_first[..100]).await;
    mount_page(&server, 2, &newest_first[100..]).await;
    mount_page(&server, 3, &[]).await;

    let ledger = ledger_over(&server)?;
    let entry = ledger.ensure_numbered(&repo(), &creds()).await?;

    assert_eq!(entry.len(), 150);
    assert_eq!(entry.number_of("sha-0"), Some(1));
    assert_eq!(entry.number_of("sha-149"), Some(150));
    let listed = entry.numbered_commits();
    assert_eq!(listed[0].author, "ada");
    assert_eq!(listed[0].summary, "Message of sha-0");

    // Served from the cache; the `expect(1)` counts would fail otherwise.
    ledger.ensure_numbered(&repo(), &creds()).await?;
    Ok(())
}

#[tokio::test]
async fn empty_repository_conflict_is_an_empty_ledger() -> Result<()> {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/repos/octo/demo/commits"))
        .respond_with(
            ResponseTemplate::new(409).set_body_json(json!({"message": "Git Repository is empty."})),
        )
        .mount(&server)
        .await;

    let entry = ledger_over(&server)?
        .ensure_numbered(&repo(), &creds())
        .await?;
    assert!(entry.is_empty());
    Ok(())
}

#[tokio::test]
async fn missing_repository_is_not_found() -> Result<()> {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/repos/octo/demo/commits"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({"message": "Not Found"})))
        .mount(&server)
        .await;

    let err = ledger_over(&server)?
        .ensure_numbered(&repo(), &creds())
        .await
        .unwrap_err();
    assert!(matches!(err, LensError::NotFound(_)), "{err:?}");
    Ok(())
}

#[tokio::test]
async fn rejected_token_is_forbidden() -> Result<()> {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/user"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({"message": "Bad credentials"})))
        .mount(&server)
        .await;

    let err = GitHubClient::new(&server.uri())?
        .current_user(&creds())
        .await
        .unwrap_err();
    assert!(matches!(err, LensError::Forbidden(_)), "{err:?}");
    Ok(())
}

#[tokio::test]
async fn server_error_is_transient() -> Result<()> {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/repos/octo/demo/commits/abc123"))
        .respond_with(ResponseTemplate::new(502))
        .mount(&server)
        .await;

    let err = GitHubClient::new(&server.uri())?
        .fetch_diff_text(&repo(), "abc123", &creds())
        .await
        .unwrap_err();
    assert!(err.is_retryable());
    Ok(())
}

#[tokio::test]
async fn diff_is_requested_in_diff_media_type() -> Result<()> {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/repos/octo/demo/commits/abc123"))
        .and(header("Accept", "application/vnd.github.v3.diff"))
        .and(header("Authorization", "Bearer ghp_test_token"))
        .respond_with(ResponseTemplate::new(200).set_body_string("diff --git a/x b/x\n+new\n"))
        .expect(1)
        .mount(&server)
        .await;

    let diff = GitHubClient::new(&server.uri())?
        .fetch_diff_text(&repo(), "abc123", &creds())
        .await?;
    assert_eq!(diff, "diff --git a/x b/x\n+new\n");
    Ok(())
}

#[tokio::test]
async fn readme_is_optional() -> Result<()> {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/repos/octo/demo/readme"))
        .and(header("Accept", "application/vnd.github.raw"))
        .respond_with(ResponseTemplate::new(200).set_body_string("# Demo\n"))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/repos/octo/bare/readme"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let client = GitHubClient::new(&server.uri())?;
    assert_eq!(
        client.fetch_readme(&repo(), &creds()).await?.as_deref(),
        Some("# Demo\n")
    );
    assert_eq!(
        client
            .fetch_readme(&RepoRef::new("octo", "bare"), &creds())
            .await?,
        None
    );
    Ok(())
}

#[tokio::test]
async fn repo_listing_skips_entries_without_owner() -> Result<()> {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/user/repos"))
        .and(query_param("type", "all"))
        .and(query_param("per_page", "100"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"id": 1, "name": "demo", "full_name": "octo/demo", "private": false, "owner": {"login": "octo"}},
            {"id": 2, "name": "ghost", "full_name": "?/ghost", "private": true, "owner": null},
            {"id": 3, "name": "secret", "full_name": "octo/secret", "private": true, "owner": {"login": "octo"}}
        ])))
        .mount(&server)
        .await;

    let repos = GitHubClient::new(&server.uri())?.list_repos(&creds()).await?;
    let names: Vec<&str> = repos.iter().map(|r| r.full_name.as_str()).collect();
    assert_eq!(names, vec!["octo/demo", "octo/secret"]);
    assert!(repos[1].private);
    Ok(())
}

#[tokio::test]
async fn current_user_profile() -> Result<()> {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/user"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "login": "ada",
            "avatar_url": "https://avatars.example.com/ada",
            "html_url": "https://github.com/ada",
            "id": 42
        })))
        .mount(&server)
        .await;

    let user = GitHubClient::new(&server.uri())?.current_user(&creds()).await?;
    assert_eq!(user.login, "ada");
    assert_eq!(user.html_url.as_deref(), Some("https://github.com/ada"));
    Ok(())
}

#[tokio::test]
async fn single_commit_metadata() -> Result<()> {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/repos/octo/demo/commits/abc123"))
        .and(header("Accept", "application/vnd.github+json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(commit_json("abc123")))
        .mount(&server)
        .await;

    let commit = GitHubClient::new(&server.uri())?
        .fetch_commit(&repo(), "abc123", &creds())
        .await?;
    assert_eq!(commit.sha, "abc123");
    assert_eq!(commit.summary(), "Message of abc123");
    assert_eq!(commit.author_name(), "ada");
    Ok(())
}
