//! Assembly of commit diffs into a size-bounded prompt context.
//!
//! Budgets are measured in characters of diff text; the per-commit segment
//! header and fences are not charged. Assembly stops at the first diff that
//! does not fit rather than skipping ahead, so an included set is always a
//! prefix of the candidates in walk order.

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::error::{LensError, Result};
use crate::github::types::{short_sha, Credentials, RepoRef};
use crate::github::{DiffBlob, DiffFetcher};

/// A commit identified by its number and SHA.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommitRef {
    /// 1-based commit number.
    pub number: u32,
    /// Full SHA.
    pub sha: String,
}

impl CommitRef {
    /// Creates a commit reference.
    pub fn new(number: u32, sha: impl Into<String>) -> Self {
        Self {
            number,
            sha: sha.into(),
        }
    }
}

/// Why a commit was left out of a context block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "reason", content = "detail")]
pub enum ExclusionReason {
    /// The character budget was used up before this commit.
    BudgetExhausted,
    /// The commit count cap was reached.
    CountLimit,
    /// The diff could not be fetched.
    FetchFailed(String),
}

/// A commit left out of a context block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExcludedCommit {
    /// The commit.
    #[serde(flatten)]
    pub commit: CommitRef,
    /// Why it was left out.
    #[serde(flatten)]
    pub reason: ExclusionReason,
}

/// Limits applied while assembling a context block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContextPolicy {
    /// Maximum characters of diff text.
    pub budget: usize,
    /// Maximum number of included commits.
    pub max_commits: usize,
}

/// Assembled diff context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContextBlock {
    /// Rendered segments, in assembly order.
    pub text: String,
    /// Commits whose diffs are in `text`.
    pub included: Vec<CommitRef>,
    /// Commits left out, with reasons.
    pub excluded: Vec<ExcludedCommit>,
}

impl ContextBlock {
    /// Whether any candidate commit was left out.
    pub fn is_partial(&self) -> bool {
        !self.excluded.is_empty()
    }
}

/// Context ending at a target commit, plus the target's own diff.
#[derive(Debug, Clone)]
pub struct TargetContext {
    /// The assembled block, chronological and ending with the target.
    pub block: ContextBlock,
    /// The target diff as fetched.
    pub target: DiffBlob,
}

/// Renders one diff as a numbered segment.
pub fn render_segment(number: u32, sha: &str, diff: &str) -> String {
    format!(
        "--- Diff for Commit {number} (SHA: {}) ---\n```diff\n{diff}\n```\n\n",
        short_sha(sha)
    )
}

fn char_len(text: &str) -> usize {
    text.chars().count()
}

/// Builds context blocks from commit diffs.
#[derive(Clone)]
pub struct ContextBudgeter {
    fetcher: DiffFetcher,
}

impl ContextBudgeter {
    /// Creates a budgeter over the given diff fetcher.
    pub fn new(fetcher: DiffFetcher) -> Self {
        Self { fetcher }
    }

    /// Assembles diffs of `commits` in the given order.
    ///
    /// Stops at the first diff that would exceed the budget; that commit
    /// and every later one is excluded. Commits whose diff cannot be fetched
    /// are excluded and skipped.
    pub async fn build_context(
        &self,
        repo: &RepoRef,
        creds: &Credentials,
        commits: &[CommitRef],
        policy: ContextPolicy,
    ) -> Result<ContextBlock> {
        if commits.is_empty() {
            return Err(LensError::InvalidInput(
                "At least one commit is required to build a context".to_string(),
            ));
        }

        let mut text = String::new();
        let mut emitted = 0;
        let mut included = Vec::new();
        let mut excluded = Vec::new();
        let mut first_oversize = None;

        for (idx, commit) in commits.iter().enumerate() {
            if included.len() >= policy.max_commits {
                debug!(number = commit.number, "Commit count cap reached");
                excluded.extend(exclude_all(&commits[idx..], ExclusionReason::CountLimit));
                break;
            }

            let blob = match self.fetcher.fetch_diff(repo, &commit.sha, creds).await {
                Ok(blob) => blob,
                Err(e) => {
                    warn!(
                        number = commit.number,
                        sha = short_sha(&commit.sha),
                        error = %e,
                        "Skipping commit whose diff could not be fetched"
                    );
                    excluded.push(ExcludedCommit {
                        commit: commit.clone(),
                        reason: ExclusionReason::FetchFailed(e.to_string()),
                    });
                    continue;
                }
            };

            let size = char_len(&blob.text);
            if emitted + size > policy.budget {
                info!(
                    number = commit.number,
                    diff = size,
                    emitted,
                    budget = policy.budget,
                    "Context budget exhausted"
                );
                if included.is_empty() {
                    first_oversize = Some(size);
                }
                excluded.extend(exclude_all(&commits[idx..], ExclusionReason::BudgetExhausted));
                break;
            }

            emitted += size;
            text.push_str(&render_segment(commit.number, &commit.sha, &blob.text));
            included.push(commit.clone());
        }

        if included.is_empty() {
            return Err(match first_oversize {
                Some(size) => LensError::OversizeInput {
                    detail: "The first selected commit's diff does not fit the context budget"
                        .to_string(),
                    size,
                    limit: policy.budget,
                },
                None => LensError::NotFound(
                    "Could not fetch the diff of any selected commit".to_string(),
                ),
            });
        }

        debug!(
            included = included.len(),
            excluded = excluded.len(),
            diff_chars = emitted,
            "Assembled context block"
        );
        Ok(ContextBlock {
            text,
            included,
            excluded,
        })
    }

    /// Assembles context ending at the last commit of `history`.
    ///
    /// `history` is chronological and ends at the target. The target is
    /// always included; nearer predecessors are preferred over older ones,
    /// and the walk stops at the first predecessor that does not fit.
    pub async fn build_target_context(
        &self,
        repo: &RepoRef,
        creds: &Credentials,
        history: &[CommitRef],
        policy: ContextPolicy,
    ) -> Result<TargetContext> {
        let Some((target, predecessors)) = history.split_last() else {
            return Err(LensError::InvalidInput(
                "A target commit is required to build a context".to_string(),
            ));
        };

        let target_blob = self.fetcher.fetch_diff(repo, &target.sha, creds).await?;
        let target_segment = render_segment(target.number, &target.sha, &target_blob.text);
        let mut emitted = char_len(&target_blob.text);
        if emitted > policy.budget {
            warn!(
                number = target.number,
                diff = emitted,
                budget = policy.budget,
                "Target diff alone exceeds the context budget"
            );
        }

        let mut earlier: Vec<(CommitRef, String)> = Vec::new();
        let mut excluded = Vec::new();
        let slots = policy.max_commits.saturating_sub(1);

        for (idx, commit) in predecessors.iter().enumerate().rev() {
            if earlier.len() >= slots {
                excluded.extend(exclude_all(&predecessors[..=idx], ExclusionReason::CountLimit));
                break;
            }

            let blob = match self.fetcher.fetch_diff(repo, &commit.sha, creds).await {
                Ok(blob) => blob,
                Err(e) => {
                    warn!(
                        number = commit.number,
                        sha = short_sha(&commit.sha),
                        error = %e,
                        "Skipping predecessor whose diff could not be fetched"
                    );
                    excluded.push(ExcludedCommit {
                        commit: commit.clone(),
                        reason: ExclusionReason::FetchFailed(e.to_string()),
                    });
                    continue;
                }
            };

            let size = char_len(&blob.text);
            if emitted + size > policy.budget {
                info!(
                    number = commit.number,
                    diff = size,
                    emitted,
                    budget = policy.budget,
                    "Context budget exhausted, dropping older commits"
                );
                excluded.extend(exclude_all(
                    &predecessors[..=idx],
                    ExclusionReason::BudgetExhausted,
                ));
                break;
            }
            emitted += size;
            earlier.push((
                commit.clone(),
                render_segment(commit.number, &commit.sha, &blob.text),
            ));
        }

        earlier.reverse();
        excluded.sort_by_key(|e| e.commit.number);

        let mut text = String::new();
        let mut included = Vec::with_capacity(earlier.len() + 1);
        for (commit, segment) in earlier {
            text.push_str(&segment);
            included.push(commit);
        }
        text.push_str(&target_segment);
        included.push(target.clone());

        debug!(
            target = target.number,
            included = included.len(),
            excluded = excluded.len(),
            diff_chars = emitted,
            "Assembled target context"
        );
        Ok(TargetContext {
            block: ContextBlock {
                text,
                included,
                excluded,
            },
            target: target_blob,
        })
    }
}

fn exclude_all(
    commits: &[CommitRef],
    reason: ExclusionReason,
) -> impl Iterator<Item = ExcludedCommit> + '_ {
    commits.iter().map(move |commit| ExcludedCommit {
        commit: commit.clone(),
        reason: reason.clone(),
    })
}
