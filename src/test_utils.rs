//! Shared test utilities: a scripted commit source and a mock generation
//! backend.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use chrono::{TimeZone, Utc};
use futures::future::BoxFuture;

use crate::assistant::backend::{
    BackendMetadata, FinishReason, Generation, GenerationBackend, Turn,
};
use crate::error::{LensError, Result};
use crate::github::types::{Commit, CommitDetail, Credentials, GitActor, RepoRef};
use crate::github::{CommitSource, COMMITS_PER_PAGE};

/// Builds a commit with a predictable message and date.
pub(crate) fn commit(sha: &str) -> Commit {
    let actor = GitActor {
        name: "Ada".to_string(),
        email: "ada@example.com".to_string(),
        date: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).single(),
    };
    Commit {
        sha: sha.to_string(),
        commit: CommitDetail {
            message: format!("Commit {sha}\n\nBody of {sha}"),
            author: Some(actor.clone()),
            committer: Some(actor),
        },
        author: None,
        html_url: None,
    }
}

/// In-memory commit history served in GitHub's newest-first pages.
///
/// Commits are given oldest first, so `new(vec!["a1", "b2", "c3"])`
/// describes a history where `a1` is commit 1. Every commit has a default
/// diff of `diff of {sha}\n` unless overridden; unknown SHAs are
/// [`LensError::NotFound`].
pub(crate) struct FakeCommitSource {
    newest_first: Vec<Commit>,
    diffs: HashMap<String, String>,
    diff_failures: HashMap<String, LensError>,
    page_failures: HashMap<u32, LensError>,
    readme: Option<String>,
    calls: SourceCalls,
}

impl FakeCommitSource {
    /// Creates a source over the given oldest-first history.
    pub(crate) fn new(oldest_first: Vec<&str>) -> Self {
        let diffs = oldest_first
            .iter()
            .map(|sha| ((*sha).to_string(), format!("diff of {sha}\n")))
            .collect();
        Self {
            newest_first: oldest_first.iter().rev().map(|sha| commit(sha)).collect(),
            diffs,
            diff_failures: HashMap::new(),
            page_failures: HashMap::new(),
            readme: None,
            calls: SourceCalls::default(),
        }
    }

    /// Overrides the diff text of `sha`.
    pub(crate) fn with_diff(mut self, sha: &str, diff: impl Into<String>) -> Self {
        self.diffs.insert(sha.to_string(), diff.into());
        self
    }

    /// Makes fetching the diff of `sha` fail with `err`.
    pub(crate) fn failing_diff(mut self, sha: &str, err: LensError) -> Self {
        self.diff_failures.insert(sha.to_string(), err);
        self
    }

    /// Makes listing page `page` fail with `err`.
    pub(crate) fn failing_page(mut self, page: u32, err: LensError) -> Self {
        self.page_failures.insert(page, err);
        self
    }

    /// Sets the README text.
    pub(crate) fn with_readme(mut self, readme: &str) -> Self {
        self.readme = Some(readme.to_string());
        self
    }

    /// Returns a handle for inspecting calls after the source is moved.
    pub(crate) fn calls(&self) -> SourceCalls {
        self.calls.clone()
    }
}

/// Shared record of calls made to a [`FakeCommitSource`].
#[derive(Clone, Default)]
pub(crate) struct SourceCalls {
    list_calls: Arc<AtomicUsize>,
    diff_requests: Arc<Mutex<Vec<String>>>,
}

impl SourceCalls {
    /// Number of commit pages requested.
    pub(crate) fn list_calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }

    /// SHAs whose diffs were requested, in request order.
    pub(crate) fn diff_requests(&self) -> Vec<String> {
        self.diff_requests.lock().unwrap().clone()
    }
}

impl CommitSource for FakeCommitSource {
    fn list_commits_page<'a>(
        &'a self,
        _repo: &'a RepoRef,
        _creds: &'a Credentials,
        page: u32,
    ) -> BoxFuture<'a, Result<Vec<Commit>>> {
        Box::pin(async move {
            self.calls.list_calls.fetch_add(1, Ordering::SeqCst);
            // Let concurrent callers interleave with the walk.
            tokio::task::yield_now().await;
            if let Some(err) = self.page_failures.get(&page) {
                return Err(err.clone());
            }
            let size = COMMITS_PER_PAGE as usize;
            let start = (page as usize - 1) * size;
            Ok(self
                .newest_first
                .iter()
                .skip(start)
                .take(size)
                .cloned()
                .collect())
        })
    }

    fn fetch_diff_text<'a>(
        &'a self,
        repo: &'a RepoRef,
        sha: &'a str,
        _creds: &'a Credentials,
    ) -> BoxFuture<'a, Result<String>> {
        Box::pin(async move {
            self.calls
                .diff_requests
                .lock()
                .unwrap()
                .push(sha.to_string());
            if let Some(err) = self.diff_failures.get(sha) {
                return Err(err.clone());
            }
            self.diffs.get(sha).cloned().ok_or_else(|| {
                LensError::NotFound(format!("Commit {sha} in {repo} not found or access denied."))
            })
        })
    }

    fn fetch_readme<'a>(
        &'a self,
        _repo: &'a RepoRef,
        _creds: &'a Credentials,
    ) -> BoxFuture<'a, Result<Option<String>>> {
        Box::pin(async move { Ok(self.readme.clone()) })
    }
}

/// Builds a completed generation with the given text.
pub(crate) fn complete(text: &str) -> Generation {
    Generation {
        text: text.to_string(),
        finish: FinishReason::Complete,
        block_reason: None,
    }
}

/// Mock generation backend with a pre-programmed queue of results.
///
/// Results are returned in FIFO order. When the queue is exhausted,
/// subsequent calls fail with [`LensError::Transient`]. Every request is
/// recorded so tests can inspect the turns that were sent.
pub(crate) struct MockBackend {
    responses: Arc<Mutex<VecDeque<Result<Generation>>>>,
    metadata: BackendMetadata,
    recorded: Arc<Mutex<Vec<Vec<Turn>>>>,
}

impl MockBackend {
    /// Creates a mock that answers with the given results in order.
    pub(crate) fn new(responses: Vec<Result<Generation>>) -> Self {
        Self {
            responses: Arc::new(Mutex::new(VecDeque::from(responses))),
            metadata: BackendMetadata {
                provider: "Mock".to_string(),
                model: "mock-model".to_string(),
                max_context_length: 1_000_000,
                max_response_length: 8_192,
            },
            recorded: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Creates a mock that answers each request with the given texts.
    pub(crate) fn answering(texts: &[&str]) -> Self {
        Self::new(texts.iter().map(|t| Ok(complete(t))).collect())
    }

    /// Returns the mock with a custom context window.
    pub(crate) fn with_context_length(mut self, max_context_length: usize) -> Self {
        self.metadata.max_context_length = max_context_length;
        self
    }

    /// Returns a handle for inspecting recorded requests.
    pub(crate) fn request_handle(&self) -> RequestRecordHandle {
        RequestRecordHandle {
            recorded: self.recorded.clone(),
        }
    }
}

/// Shared handle to a mock backend's recorded requests.
pub(crate) struct RequestRecordHandle {
    recorded: Arc<Mutex<Vec<Vec<Turn>>>>,
}

impl RequestRecordHandle {
    /// Every request sent, as the full list of turns.
    pub(crate) fn requests(&self) -> Vec<Vec<Turn>> {
        self.recorded.lock().unwrap().clone()
    }

    /// Number of requests made.
    pub(crate) fn request_count(&self) -> usize {
        self.recorded.lock().unwrap().len()
    }
}

impl GenerationBackend for MockBackend {
    fn generate<'a>(&'a self, turns: &'a [Turn]) -> BoxFuture<'a, Result<Generation>> {
        let responses = self.responses.clone();
        let recorded = self.recorded.clone();
        let turns = turns.to_vec();
        Box::pin(async move {
            recorded.lock().unwrap().push(turns);
            responses
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(LensError::Transient("no more mock responses".into())))
        })
    }

    fn metadata(&self) -> BoxFuture<'_, Result<BackendMetadata>> {
        Box::pin(async move { Ok(self.metadata.clone()) })
    }
}
