//! Numbered, cached view of a repository's commit history.
//!
//! Commits are numbered 1..=N from oldest to newest. An entry is built from
//! a complete walk of the upstream history and replaced only as a whole:
//! a failed walk leaves nothing behind, and concurrent misses for the same
//! repository share a single walk.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use moka::future::Cache;
use tracing::{debug, info};

use super::types::{Commit, Credentials, NumberedCommit, RepoRef};
use super::{CommitSource, COMMITS_PER_PAGE};
use crate::error::{LensError, Result};

/// Shortest SHA prefix accepted by [`LedgerEntry::resolve`].
pub const MIN_PREFIX_LEN: usize = 4;

/// Numbered commit history of one repository.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct LedgerEntry {
    /// Commits as fetched, newest first.
    commits: Vec<Commit>,
    /// SHA to 1-based number, oldest = 1.
    numbers: HashMap<String, u32>,
}

impl LedgerEntry {
    /// Builds an entry from a newest-first commit list.
    pub fn from_newest_first(commits: Vec<Commit>) -> Self {
        let numbers = commits
            .iter()
            .rev()
            .zip(1..)
            .map(|(commit, number)| (commit.sha.clone(), number))
            .collect();
        Self { commits, numbers }
    }

    /// Commits as fetched, newest first.
    pub fn commits(&self) -> &[Commit] {
        &self.commits
    }

    /// The SHA to number mapping.
    pub fn numbers(&self) -> &HashMap<String, u32> {
        &self.numbers
    }

    /// Number of commits in the history.
    pub fn len(&self) -> usize {
        self.commits.len()
    }

    /// Whether the repository has no commits.
    pub fn is_empty(&self) -> bool {
        self.commits.is_empty()
    }

    /// Number assigned to `sha`, if it is part of the history.
    pub fn number_of(&self, sha: &str) -> Option<u32> {
        self.numbers.get(sha).copied()
    }

    /// Resolves a full SHA or an unambiguous prefix to its number and full SHA.
    pub fn resolve(&self, sha: &str) -> Option<(u32, &str)> {
        if let Some((full, number)) = self.numbers.get_key_value(sha) {
            return Some((*number, full.as_str()));
        }
        if sha.len() < MIN_PREFIX_LEN {
            return None;
        }
        let mut matches = self.numbers.iter().filter(|(full, _)| full.starts_with(sha));
        match (matches.next(), matches.next()) {
            (Some((full, number)), None) => Some((*number, full.as_str())),
            _ => None,
        }
    }

    /// The chronologically first commit.
    pub fn oldest(&self) -> Option<&Commit> {
        self.commits.last()
    }

    /// Commits in ascending number order with their numbers.
    pub fn chronological(&self) -> impl Iterator<Item = (u32, &Commit)> + '_ {
        (1..).zip(self.commits.iter().rev())
    }

    /// Commits numbered `1..=number`, oldest first.
    pub fn up_to(&self, number: u32) -> impl Iterator<Item = (u32, &Commit)> + '_ {
        self.chronological().take_while(move |(n, _)| *n <= number)
    }

    /// Summaries of every commit in ascending number order.
    pub fn numbered_commits(&self) -> Vec<NumberedCommit> {
        self.chronological()
            .map(|(number, commit)| NumberedCommit {
                number,
                sha: commit.sha.clone(),
                summary: commit.summary().to_string(),
                author: commit.author_name().to_string(),
                date: commit.date(),
            })
            .collect()
    }
}

/// Cache of ledger entries keyed by `owner/repo`.
pub type LedgerCache = Cache<String, Arc<LedgerEntry>>;

/// Builds a ledger cache bounded by entry count and lifetime.
pub fn ledger_cache(capacity: u64, ttl: Duration) -> LedgerCache {
    Cache::builder()
        .max_capacity(capacity)
        .time_to_live(ttl)
        .build()
}

/// Fetches, numbers and caches repository histories.
#[derive(Clone)]
pub struct CommitLedger {
    source: Arc<dyn CommitSource>,
    cache: LedgerCache,
}

impl CommitLedger {
    /// Creates a ledger over `source` using the injected cache.
    pub fn new(source: Arc<dyn CommitSource>, cache: LedgerCache) -> Self {
        Self { source, cache }
    }

    /// Returns the numbered history of `repo`, fetching it on a cache miss.
    ///
    /// A cache hit performs no upstream calls. On a miss the full history
    /// is paged through; any page failure aborts and nothing is cached.
    pub async fn ensure_numbered(
        &self,
        repo: &RepoRef,
        creds: &Credentials,
    ) -> Result<Arc<LedgerEntry>> {
        let key = repo.key();
        if let Some(entry) = self.cache.get(&key).await {
            debug!(repo = %key, commits = entry.len(), "Ledger cache hit");
            return Ok(entry);
        }

        self.cache
            .try_get_with(key, async {
                info!(repo = %repo, "Ledger cache miss, fetching commit history");
                let commits = self.fetch_history(repo, creds).await?;
                let entry = LedgerEntry::from_newest_first(commits);
                info!(repo = %repo, commits = entry.len(), "Numbered commit history");
                Ok::<_, LensError>(Arc::new(entry))
            })
            .await
            .map_err(|e| (*e).clone())
    }

    /// Drops the cached entry for `repo`.
    pub async fn invalidate(&self, repo: &RepoRef) {
        self.cache.invalidate(&repo.key()).await;
    }

    async fn fetch_history(&self, repo: &RepoRef, creds: &Credentials) -> Result<Vec<Commit>> {
        let mut commits = Vec::new();
        let mut page = 1;
        loop {
            let batch = self.source.list_commits_page(repo, creds, page).await?;
            if batch.is_empty() {
                break;
            }
            debug!(repo = %repo, page, count = batch.len(), per_page = COMMITS_PER_PAGE, "Collected commit page");
            commits.extend(batch);
            page += 1;
        }
        Ok(commits)
    }
}
