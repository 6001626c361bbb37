//! GitHub REST API access: commit history, diffs and account operations.

pub mod client;
pub mod diff;
pub mod ledger;
pub mod oauth;
pub mod types;

use futures::future::BoxFuture;

use crate::error::Result;

pub use client::GitHubClient;
pub use diff::{DiffBlob, DiffFetcher, TRUNCATION_MARKER};
pub use ledger::{ledger_cache, CommitLedger, LedgerCache, LedgerEntry};
pub use types::{
    short_sha, Commit, Credentials, GitHubUser, NumberedCommit, RepoRef, RepoSummary,
    SHORT_SHA_LEN,
};

/// Page size used when walking the commit history.
pub const COMMITS_PER_PAGE: u32 = 100;

/// Upstream operations the ledger and diff fetcher depend on.
///
/// [`GitHubClient`] is the production implementation; tests substitute
/// scripted fakes.
pub trait CommitSource: Send + Sync {
    /// Fetches one page (1-based) of the commit listing, newest first.
    ///
    /// An empty page marks the end of the history.
    fn list_commits_page<'a>(
        &'a self,
        repo: &'a RepoRef,
        creds: &'a Credentials,
        page: u32,
    ) -> BoxFuture<'a, Result<Vec<Commit>>>;

    /// Fetches the raw patch text of one commit.
    fn fetch_diff_text<'a>(
        &'a self,
        repo: &'a RepoRef,
        sha: &'a str,
        creds: &'a Credentials,
    ) -> BoxFuture<'a, Result<String>>;

    /// Fetches the repository README as raw text; `None` when there is none.
    fn fetch_readme<'a>(
        &'a self,
        repo: &'a RepoRef,
        creds: &'a Credentials,
    ) -> BoxFuture<'a, Result<Option<String>>>;
}
