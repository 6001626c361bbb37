//! # commit-lens
//!
//! Converse with an AI assistant about the commit history of a GitHub
//! repository.
//!
//! Commits are numbered from the oldest (1) to the newest. Their diffs are
//! assembled into size-bounded context blocks and sent to a generation
//! backend (Gemini or Claude) for repository overviews, multi-turn chat
//! about selected commits, and reviews of a single commit against its
//! predecessors.
//!
//! ## Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use commit_lens::assistant::GeminiClient;
//! use commit_lens::config::LensConfig;
//! use commit_lens::github::{Credentials, GitHubClient, RepoRef};
//! use commit_lens::service::CommitLens;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let config = LensConfig::default();
//! let github = GitHubClient::new(&config.github_api_url)?;
//! let gemini = GeminiClient::new(
//!     "api-key".to_string(),
//!     None,
//!     "https://generativelanguage.googleapis.com",
//! )?;
//! let lens = CommitLens::new(Arc::new(github), Arc::new(gemini), &config);
//!
//! let repo: RepoRef = "octo/demo".parse()?;
//! let creds = Credentials::new("ghp_token");
//! for commit in lens.list_numbered_commits(&repo, &creds).await? {
//!     println!("{} {}", commit.number, commit.summary);
//! }
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]

pub mod assistant;
pub mod cli;
pub mod config;
pub mod error;
pub mod github;
pub mod service;
pub mod utils;

#[cfg(test)]
mod test_utils;

pub use crate::cli::Cli;
pub use crate::error::{LensError, Result};

/// The current version of commit-lens.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
