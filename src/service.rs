//! Caller-facing operations: numbered commit listing, repository overview,
//! multi-commit chat and single-commit analysis.

use std::collections::HashSet;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::assistant::context::{
    CommitRef, ContextBudgeter, ContextPolicy, ExcludedCommit,
};
use crate::assistant::conversation::{self, advance};
use crate::assistant::extract::{extract_section, extract_sections, AnalysisSections};
use crate::assistant::prompts;
use crate::assistant::{GenerationBackend, Turn};
use crate::config::LensConfig;
use crate::error::{LensError, Result};
use crate::github::ledger::{ledger_cache, CommitLedger, LedgerEntry};
use crate::github::types::{short_sha, Credentials, NumberedCommit, RepoRef};
use crate::github::{CommitSource, DiffFetcher};

/// A chat question about selected commits.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChatRequest {
    /// SHAs (or unambiguous prefixes) of the commits to discuss.
    pub commits: Vec<String>,
    /// The question.
    pub question: String,
    /// Prior conversation, owned by the caller.
    #[serde(default)]
    pub history: Vec<Turn>,
}

/// Answer to a [`ChatRequest`].
#[derive(Debug, Clone, Serialize)]
pub struct ChatResponse {
    /// The model answer.
    pub answer: String,
    /// Request history plus the question and the answer.
    pub history: Vec<Turn>,
    /// Commits whose diffs were part of the context.
    pub included: Vec<CommitRef>,
    /// Commits left out of the context.
    pub excluded: Vec<ExcludedCommit>,
}

/// Summary of a repository based on its first commit.
#[derive(Debug, Clone, Serialize)]
pub struct RepositoryOverview {
    /// Number of the first commit (always 1), absent for empty repositories.
    pub commit_number: Option<u32>,
    /// SHA of the first commit.
    pub sha: Option<String>,
    /// Overview text.
    pub overview: String,
}

/// Review of one commit in the context of its predecessors.
#[derive(Debug, Clone, Serialize)]
pub struct CommitAnalysis {
    /// Full SHA of the analyzed commit.
    pub sha: String,
    /// Number of the analyzed commit.
    pub commit_number: u32,
    /// Diff of the analyzed commit, possibly truncated.
    pub diff: String,
    /// Whether `diff` was truncated at the ceiling.
    pub diff_truncated: bool,
    /// Full analysis text.
    pub analysis: String,
    /// Codebase snapshot section of the analysis, if present.
    pub overview: Option<String>,
    /// Every recognized section of the analysis.
    pub sections: AnalysisSections,
    /// Commits whose diffs were part of the context.
    pub included: Vec<CommitRef>,
    /// Commits left out of the context.
    pub excluded: Vec<ExcludedCommit>,
}

/// The commit-context engine behind every caller operation.
pub struct CommitLens {
    source: Arc<dyn CommitSource>,
    backend: Arc<dyn GenerationBackend>,
    ledger: CommitLedger,
    fetcher: DiffFetcher,
    budgeter: ContextBudgeter,
    chat_policy: ContextPolicy,
    analysis_policy: ContextPolicy,
}

impl CommitLens {
    /// Wires the engine from its upstreams and configuration.
    pub fn new(
        source: Arc<dyn CommitSource>,
        backend: Arc<dyn GenerationBackend>,
        config: &LensConfig,
    ) -> Self {
        let cache = ledger_cache(config.cache_capacity, config.cache_ttl);
        let fetcher = DiffFetcher::new(source.clone(), config.diff_ceiling);
        Self {
            ledger: CommitLedger::new(source.clone(), cache),
            budgeter: ContextBudgeter::new(fetcher.clone()),
            fetcher,
            source,
            backend,
            chat_policy: ContextPolicy {
                budget: config.chat_budget,
                max_commits: config.max_context_commits,
            },
            analysis_policy: ContextPolicy {
                budget: config.analysis_budget,
                max_commits: config.max_context_commits,
            },
        }
    }

    /// The commit ledger, for cache control.
    pub fn ledger(&self) -> &CommitLedger {
        &self.ledger
    }

    /// Lists every commit with its number, ascending.
    pub async fn list_numbered_commits(
        &self,
        repo: &RepoRef,
        creds: &Credentials,
    ) -> Result<Vec<NumberedCommit>> {
        let entry = self.ledger.ensure_numbered(repo, creds).await?;
        Ok(entry.numbered_commits())
    }

    /// Summarizes the repository from its first commit and README.
    pub async fn overview(&self, repo: &RepoRef, creds: &Credentials) -> Result<RepositoryOverview> {
        let entry = self.ledger.ensure_numbered(repo, creds).await?;
        let Some(first) = entry.oldest() else {
            info!(repo = %repo, "Repository has no commits, skipping overview");
            return Ok(RepositoryOverview {
                commit_number: None,
                sha: None,
                overview: prompts::EMPTY_REPOSITORY_OVERVIEW.to_string(),
            });
        };
        let number = entry.number_of(&first.sha).ok_or_else(|| {
            LensError::Internal(format!(
                "First commit {} is missing from the number map",
                short_sha(&first.sha)
            ))
        })?;

        let diff = self.fetcher.fetch_diff(repo, &first.sha, creds).await?;
        let readme = self.source.fetch_readme(repo, creds).await?;
        let prompt = prompts::overview_prompt(number, &first.sha, &diff.text, readme.as_deref());

        info!(repo = %repo, number, sha = short_sha(&first.sha), "Generating repository overview");
        let answer = conversation::ask(self.backend.as_ref(), prompt).await?;
        let overview = match extract_section(&answer, prompts::OVERVIEW_HEADER) {
            Some(section) => section.to_string(),
            None => {
                warn!("Overview answer lacks the expected heading, using the full answer");
                answer.trim().to_string()
            }
        };
        Ok(RepositoryOverview {
            commit_number: Some(number),
            sha: Some(first.sha.clone()),
            overview,
        })
    }

    /// Answers a question about the selected commits.
    pub async fn chat(
        &self,
        repo: &RepoRef,
        creds: &Credentials,
        request: ChatRequest,
    ) -> Result<ChatResponse> {
        if request.commits.is_empty() {
            return Err(LensError::InvalidInput(
                "Select at least one commit to chat about".to_string(),
            ));
        }
        if request.question.trim().is_empty() {
            return Err(LensError::InvalidInput("The question is empty".to_string()));
        }

        let entry = self.ledger.ensure_numbered(repo, creds).await?;
        let commits = resolve_selection(&entry, &request.commits);
        if commits.is_empty() {
            return Err(LensError::NotFound(format!(
                "None of the selected commits exist in {repo}"
            )));
        }

        let block = self
            .budgeter
            .build_context(repo, creds, &commits, self.chat_policy)
            .await?;
        if block.is_partial() {
            info!(
                included = block.included.len(),
                excluded = block.excluded.len(),
                "Chat uses partial context"
            );
        }

        let context = prompts::chat_context(&block.included, &block.text);
        let exchange = advance(
            self.backend.as_ref(),
            &request.history,
            &request.question,
            &context,
        )
        .await?;

        Ok(ChatResponse {
            answer: exchange.answer,
            history: exchange.history,
            included: block.included,
            excluded: block.excluded,
        })
    }

    /// Reviews one commit with its nearest predecessors as context.
    pub async fn analyze(
        &self,
        repo: &RepoRef,
        creds: &Credentials,
        sha: &str,
    ) -> Result<CommitAnalysis> {
        let entry = self.ledger.ensure_numbered(repo, creds).await?;
        let (number, full_sha) = entry.resolve(sha.trim()).ok_or_else(|| {
            LensError::NotFound(format!("Commit {} not found in {repo}", short_sha(sha)))
        })?;

        let history: Vec<CommitRef> = entry
            .up_to(number)
            .map(|(n, commit)| CommitRef::new(n, commit.sha.clone()))
            .collect();
        let ctx = self
            .budgeter
            .build_target_context(repo, creds, &history, self.analysis_policy)
            .await?;

        let target = CommitRef::new(number, full_sha);
        let prompt =
            prompts::analysis_prompt(&target, &ctx.block.text, self.analysis_policy.max_commits);
        info!(
            repo = %repo,
            number,
            sha = short_sha(full_sha),
            context_commits = ctx.block.included.len(),
            "Generating commit analysis"
        );
        let analysis = conversation::ask(self.backend.as_ref(), prompt).await?;

        let sections = extract_sections(&analysis, prompts::ANALYSIS_SECTIONS);
        let overview = sections.get("snapshot").map(str::to_string);
        if overview.is_none() {
            warn!("Analysis answer lacks a codebase snapshot section");
        }

        Ok(CommitAnalysis {
            sha: target.sha,
            commit_number: number,
            diff: ctx.target.text,
            diff_truncated: ctx.target.truncated,
            analysis,
            overview,
            sections,
            included: ctx.block.included,
            excluded: ctx.block.excluded,
        })
    }
}

/// Maps selected SHAs to numbered commits, skipping unknown and repeated ones.
fn resolve_selection(entry: &LedgerEntry, selection: &[String]) -> Vec<CommitRef> {
    let mut seen = HashSet::new();
    selection
        .iter()
        .filter_map(|sha| match entry.resolve(sha.trim()) {
            Some((number, full)) => seen.insert(number).then(|| CommitRef::new(number, full)),
            None => {
                warn!(sha = %sha, "Skipping commit unknown to the ledger");
                None
            }
        })
        .collect()
}
