//! Repository commands: listing, overview and commit analysis.

use anyhow::{Context, Result};
use clap::Parser;

use super::{Environment, GlobalArgs};
use crate::github::types::{short_sha, NumberedCommit, RepoRef};
use crate::service::CommitAnalysis;

/// Lists repositories visible to the token.
#[derive(Parser)]
pub struct ReposCommand {}

impl ReposCommand {
    /// Executes the repos command.
    pub async fn execute(self, globals: &GlobalArgs) -> Result<()> {
        let env = Environment::load()?;
        let creds = env.credentials(globals)?;
        let repos = env.github()?.list_repos(&creds).await?;
        for repo in repos {
            let visibility = if repo.private { "private" } else { "public" };
            println!("{:<50} {visibility}", repo.full_name);
        }
        Ok(())
    }
}

/// Lists a repository's commits with their numbers.
#[derive(Parser)]
pub struct CommitsCommand {
    /// Repository in owner/name form.
    pub repo: RepoRef,

    /// Prints JSON instead of a table.
    #[arg(long)]
    pub json: bool,
}

impl CommitsCommand {
    /// Executes the commits command.
    pub async fn execute(self, globals: &GlobalArgs) -> Result<()> {
        let env = Environment::load()?;
        let creds = env.credentials(globals)?;
        let lens = env.lens(globals)?;
        let commits = lens.list_numbered_commits(&self.repo, &creds).await?;

        if self.json {
            println!("{}", serde_json::to_string_pretty(&commits)?);
        } else if commits.is_empty() {
            eprintln!("{} has no commits", self.repo);
        } else {
            for commit in &commits {
                println!("{}", format_commit_line(commit));
            }
        }
        Ok(())
    }
}

fn format_commit_line(commit: &NumberedCommit) -> String {
    let date = commit
        .date
        .map_or_else(|| "-".repeat(10), |d| d.format("%Y-%m-%d").to_string());
    format!(
        "{:>5}  {}  {date}  {:<16}  {}",
        commit.number,
        short_sha(&commit.sha),
        commit.author,
        commit.summary
    )
}

/// Summarizes a repository from its first commit.
#[derive(Parser)]
pub struct OverviewCommand {
    /// Repository in owner/name form.
    pub repo: RepoRef,
}

impl OverviewCommand {
    /// Executes the overview command.
    pub async fn execute(self, globals: &GlobalArgs) -> Result<()> {
        let env = Environment::load()?;
        let creds = env.credentials(globals)?;
        let lens = env.lens(globals)?;
        let overview = lens
            .overview(&self.repo, &creds)
            .await
            .with_context(|| format!("Failed to summarize {}", self.repo))?;
        if let (Some(number), Some(sha)) = (overview.commit_number, &overview.sha) {
            eprintln!("Based on commit {number} ({})\n", short_sha(sha));
        }
        println!("{}", overview.overview);
        Ok(())
    }
}

/// Reviews one commit in the context of its predecessors.
#[derive(Parser)]
pub struct AnalyzeCommand {
    /// Repository in owner/name form.
    pub repo: RepoRef,

    /// Commit SHA or unambiguous prefix.
    pub sha: String,

    /// Prints the full result as JSON.
    #[arg(long)]
    pub json: bool,
}

impl AnalyzeCommand {
    /// Executes the analyze command.
    pub async fn execute(self, globals: &GlobalArgs) -> Result<()> {
        let env = Environment::load()?;
        let creds = env.credentials(globals)?;
        let lens = env.lens(globals)?;
        let analysis = lens
            .analyze(&self.repo, &creds, &self.sha)
            .await
            .with_context(|| format!("Failed to analyze {} in {}", self.sha, self.repo))?;

        if self.json {
            println!("{}", serde_json::to_string_pretty(&analysis)?);
        } else {
            eprintln!("{}", context_summary(&analysis));
            println!("{}", analysis.analysis);
        }
        Ok(())
    }
}

fn context_summary(analysis: &CommitAnalysis) -> String {
    let numbers: Vec<String> = analysis
        .included
        .iter()
        .map(|c| c.number.to_string())
        .collect();
    let mut summary = format!(
        "Commit {} ({}), context: commits {}",
        analysis.commit_number,
        short_sha(&analysis.sha),
        numbers.join(", ")
    );
    if !analysis.excluded.is_empty() {
        summary.push_str(&format!(" ({} left out)", analysis.excluded.len()));
    }
    if analysis.diff_truncated {
        summary.push_str(", diff truncated");
    }
    summary.push('\n');
    summary
}
