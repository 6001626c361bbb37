//! HTTP client for the GitHub REST API.

use std::time::Duration;

use futures::future::BoxFuture;
use reqwest::{Client, Response, StatusCode};
use serde::Deserialize;
use tracing::{debug, info, warn};
use url::Url;

use super::types::{short_sha, Commit, Credentials, GitHubUser, RepoRef, RepoSummary};
use super::{CommitSource, COMMITS_PER_PAGE};
use crate::error::{LensError, Result};

/// HTTP request timeout for GitHub API calls.
pub(crate) const GITHUB_TIMEOUT: Duration = Duration::from_secs(30);

/// Media type for the JSON REST representation.
const ACCEPT_JSON: &str = "application/vnd.github+json";

/// Media type asking for a commit as a unified diff.
const ACCEPT_DIFF: &str = "application/vnd.github.v3.diff";

/// Media type asking for raw file content.
const ACCEPT_RAW: &str = "application/vnd.github.raw";

/// Upper bound on error body text carried into error messages.
const MAX_ERROR_BODY: usize = 200;

/// Repository entry as returned by `GET /user/repos`.
#[derive(Deserialize)]
struct RawRepo {
    id: u64,
    name: String,
    full_name: String,
    #[serde(default)]
    private: bool,
    owner: Option<RawOwner>,
}

#[derive(Deserialize)]
struct RawOwner {
    login: Option<String>,
}

/// GitHub REST API client.
#[derive(Debug, Clone)]
pub struct GitHubClient {
    http: Client,
    api_base: Url,
}

impl GitHubClient {
    /// Creates a client against the given API base URL.
    pub fn new(api_base: &str) -> Result<Self> {
        let api_base = Url::parse(api_base).map_err(|e| {
            LensError::InvalidInput(format!("Invalid GitHub API URL {api_base:?}: {e}"))
        })?;
        if api_base.cannot_be_a_base() {
            return Err(LensError::InvalidInput(format!(
                "GitHub API URL cannot be used as a base: {api_base}"
            )));
        }
        let http = Client::builder()
            .timeout(GITHUB_TIMEOUT)
            .user_agent(concat!("commit-lens/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| LensError::Internal(format!("Failed to build HTTP client: {e}")))?;
        Ok(Self { http, api_base })
    }

    /// Builds an API URL from path segments, escaping each one.
    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.api_base.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    /// Sends an authenticated GET without inspecting the status.
    async fn send(&self, url: Url, creds: &Credentials, accept: &str) -> Result<Response> {
        debug!(url = %url, accept, "Sending GitHub API request");
        self.http
            .get(url)
            .header("Authorization", creds.bearer())
            .header("Accept", accept)
            .header("X-GitHub-Api-Version", "2022-11-28")
            .send()
            .await
            .map_err(|e| LensError::Transient(format!("Error connecting to GitHub API: {e}")))
    }

    /// Sends an authenticated GET and maps non-success statuses.
    async fn get(
        &self,
        url: Url,
        creds: &Credentials,
        accept: &str,
        subject: &str,
    ) -> Result<Response> {
        let response = self.send(url, creds, accept).await?;
        check_status(response, subject).await
    }

    /// Returns the profile of the token's owner.
    pub async fn current_user(&self, creds: &Credentials) -> Result<GitHubUser> {
        let url = self.endpoint(&["user"]);
        let response = self.get(url, creds, ACCEPT_JSON, "User").await?;
        let user: GitHubUser = response.json().await?;
        info!(login = %user.login, "Fetched GitHub user");
        Ok(user)
    }

    /// Lists repositories visible to the token (first 100).
    ///
    /// Entries without an owner login are skipped.
    pub async fn list_repos(&self, creds: &Credentials) -> Result<Vec<RepoSummary>> {
        let mut url = self.endpoint(&["user", "repos"]);
        url.query_pairs_mut()
            .append_pair("type", "all")
            .append_pair("per_page", "100");
        let response = self
            .get(url, creds, ACCEPT_JSON, "Repository list")
            .await?;
        let raw: Vec<RawRepo> = response.json().await?;

        let repos: Vec<RepoSummary> = raw
            .into_iter()
            .filter_map(|repo| match repo.owner.and_then(|o| o.login) {
                Some(owner) => Some(RepoSummary {
                    id: repo.id,
                    name: repo.name,
                    full_name: repo.full_name,
                    private: repo.private,
                    owner,
                }),
                None => {
                    warn!(id = repo.id, name = %repo.name, "Skipping repo without owner login");
                    None
                }
            })
            .collect();
        info!(count = repos.len(), "Fetched repositories");
        Ok(repos)
    }

    /// Fetches metadata for a single commit.
    pub async fn fetch_commit(
        &self,
        repo: &RepoRef,
        sha: &str,
        creds: &Credentials,
    ) -> Result<Commit> {
        let url = self.endpoint(&["repos", &repo.owner, &repo.name, "commits", sha]);
        let subject = format!("Commit {} in {repo}", short_sha(sha));
        let response = self.get(url, creds, ACCEPT_JSON, &subject).await?;
        Ok(response.json().await?)
    }

    async fn commits_page(
        &self,
        repo: &RepoRef,
        creds: &Credentials,
        page: u32,
    ) -> Result<Vec<Commit>> {
        let mut url = self.endpoint(&["repos", &repo.owner, &repo.name, "commits"]);
        url.query_pairs_mut()
            .append_pair("per_page", &COMMITS_PER_PAGE.to_string())
            .append_pair("page", &page.to_string());

        let response = self.send(url, creds, ACCEPT_JSON).await?;
        // GitHub answers 409 Conflict when the repository has no commits.
        if page == 1 && response.status() == StatusCode::CONFLICT {
            info!(repo = %repo, "Repository is empty");
            return Ok(Vec::new());
        }
        let response = check_status(response, &format!("Repository {repo}")).await?;
        let commits: Vec<Commit> = response.json().await?;
        debug!(repo = %repo, page, count = commits.len(), "Fetched commit page");
        Ok(commits)
    }

    async fn diff_text(&self, repo: &RepoRef, sha: &str, creds: &Credentials) -> Result<String> {
        let url = self.endpoint(&["repos", &repo.owner, &repo.name, "commits", sha]);
        let subject = format!("Commit {} in {repo}", short_sha(sha));
        let response = self.get(url, creds, ACCEPT_DIFF, &subject).await?;
        Ok(response.text().await?)
    }

    async fn readme(&self, repo: &RepoRef, creds: &Credentials) -> Result<Option<String>> {
        let url = self.endpoint(&["repos", &repo.owner, &repo.name, "readme"]);
        let subject = format!("README of {repo}");
        match self.get(url, creds, ACCEPT_RAW, &subject).await {
            Ok(response) => {
                let text = response.text().await?;
                debug!(repo = %repo, len = text.len(), "Fetched README");
                Ok(Some(text))
            }
            Err(LensError::NotFound(_)) => {
                debug!(repo = %repo, "Repository has no README");
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }
}

impl CommitSource for GitHubClient {
    fn list_commits_page<'a>(
        &'a self,
        repo: &'a RepoRef,
        creds: &'a Credentials,
        page: u32,
    ) -> BoxFuture<'a, Result<Vec<Commit>>> {
        Box::pin(self.commits_page(repo, creds, page))
    }

    fn fetch_diff_text<'a>(
        &'a self,
        repo: &'a RepoRef,
        sha: &'a str,
        creds: &'a Credentials,
    ) -> BoxFuture<'a, Result<String>> {
        Box::pin(self.diff_text(repo, sha, creds))
    }

    fn fetch_readme<'a>(
        &'a self,
        repo: &'a RepoRef,
        creds: &'a Credentials,
    ) -> BoxFuture<'a, Result<Option<String>>> {
        Box::pin(self.readme(repo, creds))
    }
}

/// Passes successful responses through and maps failures to [`LensError`].
pub(crate) async fn check_status(response: Response, subject: &str) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_else(|e| {
        debug!("Failed to read error response body: {e}");
        String::new()
    });
    warn!(status = %status, subject, "GitHub API request failed");
    Err(status_error(status, subject, &body))
}

/// Maps an upstream HTTP status to an error kind.
pub(crate) fn status_error(status: StatusCode, subject: &str, body: &str) -> LensError {
    match status {
        StatusCode::UNAUTHORIZED => {
            LensError::Forbidden("Invalid or expired GitHub access token.".to_string())
        }
        StatusCode::FORBIDDEN | StatusCode::TOO_MANY_REQUESTS => LensError::Forbidden(
            "GitHub API rate limit exceeded or token lacks permissions.".to_string(),
        ),
        StatusCode::NOT_FOUND | StatusCode::UNPROCESSABLE_ENTITY => {
            LensError::NotFound(format!("{subject} not found or access denied."))
        }
        s if s.is_server_error() => {
            LensError::Transient(format!("GitHub API unavailable (HTTP {s}) for {subject}"))
        }
        s => {
            let snippet: String = body.chars().take(MAX_ERROR_BODY).collect();
            LensError::InvalidInput(format!("GitHub API rejected request (HTTP {s}): {snippet}"))
        }
    }
}
