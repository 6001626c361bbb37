//! GitHub API data types.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::LensError;

/// Number of characters shown for abbreviated SHAs in prompts and output.
pub const SHORT_SHA_LEN: usize = 7;

/// Returns the abbreviated form of a SHA.
pub fn short_sha(sha: &str) -> &str {
    sha.get(..SHORT_SHA_LEN).unwrap_or(sha)
}

/// An `owner/name` repository reference.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RepoRef {
    /// Repository owner (user or organisation login).
    pub owner: String,
    /// Repository name.
    pub name: String,
}

impl RepoRef {
    /// Creates a repository reference.
    pub fn new(owner: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            name: name.into(),
        }
    }

    /// Cache key for this repository.
    pub fn key(&self) -> String {
        format!("{}/{}", self.owner, self.name)
    }
}

impl fmt::Display for RepoRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.owner, self.name)
    }
}

impl FromStr for RepoRef {
    type Err = LensError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim().trim_end_matches(".git");
        match s.split_once('/') {
            Some((owner, name))
                if !owner.is_empty() && !name.is_empty() && !name.contains('/') =>
            {
                Ok(Self::new(owner, name))
            }
            _ => Err(LensError::InvalidInput(format!(
                "Expected a repository in owner/name form, got {s:?}"
            ))),
        }
    }
}

/// A GitHub access token.
///
/// `Debug` only reveals the last four characters.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials(String);

impl Credentials {
    /// Wraps a raw access token.
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    /// Returns the raw token.
    pub fn token(&self) -> &str {
        &self.0
    }

    /// Returns the `Authorization` header value.
    pub(crate) fn bearer(&self) -> String {
        format!("Bearer {}", self.0)
    }

    /// Token suffix safe to log.
    pub fn redacted(&self) -> String {
        let tail: String = self
            .0
            .chars()
            .rev()
            .take(4)
            .collect::<Vec<_>>()
            .into_iter()
            .rev()
            .collect();
        format!("...{tail}")
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Credentials({})", self.redacted())
    }
}

/// Git identity attached to a commit.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct GitActor {
    /// Name recorded in the commit.
    #[serde(default)]
    pub name: String,
    /// Email recorded in the commit.
    #[serde(default)]
    pub email: String,
    /// Timestamp recorded in the commit.
    pub date: Option<DateTime<Utc>>,
}

/// The git-level portion of a GitHub commit object.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CommitDetail {
    /// Full commit message.
    #[serde(default)]
    pub message: String,
    /// Author identity.
    pub author: Option<GitActor>,
    /// Committer identity.
    pub committer: Option<GitActor>,
}

/// A GitHub account reference.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Account {
    /// Account login.
    pub login: String,
}

/// A commit as returned by the GitHub commits API.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Commit {
    /// Full commit SHA.
    pub sha: String,
    /// Git metadata.
    pub commit: CommitDetail,
    /// Linked GitHub account of the author, if any.
    #[serde(default)]
    pub author: Option<Account>,
    /// Web URL of the commit.
    #[serde(default)]
    pub html_url: Option<String>,
}

impl Commit {
    /// First line of the commit message.
    pub fn summary(&self) -> &str {
        self.commit.message.lines().next().unwrap_or("")
    }

    /// Best available author name.
    pub fn author_name(&self) -> &str {
        self.author
            .as_ref()
            .map(|a| a.login.as_str())
            .or_else(|| self.commit.author.as_ref().map(|a| a.name.as_str()))
            .unwrap_or("unknown")
    }

    /// Commit timestamp, preferring the committer date.
    pub fn date(&self) -> Option<DateTime<Utc>> {
        self.commit
            .committer
            .as_ref()
            .and_then(|c| c.date)
            .or_else(|| self.commit.author.as_ref().and_then(|a| a.date))
    }
}

/// Commit summary with its assigned sequence number.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct NumberedCommit {
    /// 1-based position, oldest first.
    pub number: u32,
    /// Full commit SHA.
    pub sha: String,
    /// First line of the commit message.
    pub summary: String,
    /// Author login or name.
    pub author: String,
    /// Commit timestamp.
    pub date: Option<DateTime<Utc>>,
}

/// Authenticated GitHub user profile.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct GitHubUser {
    /// Account login.
    pub login: String,
    /// Avatar image URL.
    #[serde(default)]
    pub avatar_url: Option<String>,
    /// Profile page URL.
    #[serde(default)]
    pub html_url: Option<String>,
}

/// Repository listing entry.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct RepoSummary {
    /// GitHub repository id.
    pub id: u64,
    /// Repository name.
    pub name: String,
    /// `owner/name`.
    pub full_name: String,
    /// Whether the repository is private.
    pub private: bool,
    /// Owner login.
    pub owner: String,
}
