//! CLI interface for commit-lens.

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

pub mod ai;
pub mod auth;
pub mod repo;

use crate::assistant::create_default_backend;
use crate::config::LensConfig;
use crate::github::{Credentials, GitHubClient};
use crate::service::CommitLens;
use crate::utils::preflight::check_github_token;
use crate::utils::settings::Settings;

/// commit-lens: talk to an AI assistant about a repository's commit history.
#[derive(Parser)]
#[command(name = "commit-lens")]
#[command(about = "Converse with an AI assistant about GitHub commit history", long_about = None)]
#[command(version)]
pub struct Cli {
    /// GitHub access token (overrides GITHUB_TOKEN).
    #[arg(long, global = true)]
    pub token: Option<String>,

    /// AI model to use (overrides COMMIT_LENS_MODEL).
    #[arg(long, global = true)]
    pub model: Option<String>,

    /// The command to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level commands.
#[derive(Subcommand)]
pub enum Commands {
    /// GitHub OAuth and account operations.
    Auth(auth::AuthCommand),
    /// Lists repositories visible to the token.
    Repos(repo::ReposCommand),
    /// Lists a repository's commits with their numbers.
    Commits(repo::CommitsCommand),
    /// Summarizes a repository from its first commit.
    Overview(repo::OverviewCommand),
    /// Reviews one commit in the context of its predecessors.
    Analyze(repo::AnalyzeCommand),
    /// Asks questions about selected commits.
    Chat(ai::ChatCommand),
}

impl Cli {
    /// Executes the CLI command.
    pub async fn execute(self) -> Result<()> {
        let globals = GlobalArgs {
            token: self.token,
            model: self.model,
        };
        match self.command {
            Commands::Auth(cmd) => cmd.execute(&globals).await,
            Commands::Repos(cmd) => cmd.execute(&globals).await,
            Commands::Commits(cmd) => cmd.execute(&globals).await,
            Commands::Overview(cmd) => cmd.execute(&globals).await,
            Commands::Analyze(cmd) => cmd.execute(&globals).await,
            Commands::Chat(cmd) => cmd.execute(&globals).await,
        }
    }
}

/// Options shared by every command.
pub struct GlobalArgs {
    /// `--token` value.
    pub token: Option<String>,
    /// `--model` value.
    pub model: Option<String>,
}

/// Loaded settings and configuration for one command run.
pub(crate) struct Environment {
    pub(crate) settings: Settings,
    pub(crate) config: LensConfig,
}

impl Environment {
    /// Loads settings and configuration.
    pub(crate) fn load() -> Result<Self> {
        let settings = Settings::load().context("Failed to load settings")?;
        let config = LensConfig::from_settings(&settings)?;
        Ok(Self { settings, config })
    }

    /// Resolves the GitHub token from the flag or environment.
    pub(crate) fn credentials(&self, globals: &GlobalArgs) -> Result<Credentials> {
        check_github_token(&self.settings, globals.token.as_deref())
    }

    /// Creates a GitHub client for the configured API.
    pub(crate) fn github(&self) -> Result<GitHubClient> {
        GitHubClient::new(&self.config.github_api_url).context("Failed to create GitHub client")
    }

    /// Wires the engine with the configured GitHub API and AI backend.
    pub(crate) fn lens(&self, globals: &GlobalArgs) -> Result<CommitLens> {
        let source = Arc::new(self.github()?);
        let backend = create_default_backend(&self.settings, globals.model.as_deref())?;
        Ok(CommitLens::new(source, Arc::from(backend), &self.config))
    }
}
