//! GitHub OAuth and account commands.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use super::{Environment, GlobalArgs};
use crate::config::LensConfig;
use crate::github::oauth::{authorize_url, exchange_code};

/// Authentication operations.
#[derive(Parser)]
pub struct AuthCommand {
    /// Auth subcommand to execute.
    #[command(subcommand)]
    pub command: AuthSubcommand,
}

/// Auth subcommands.
#[derive(Subcommand)]
pub enum AuthSubcommand {
    /// Prints the GitHub authorization URL.
    Url,
    /// Exchanges an OAuth code for an access token.
    Exchange {
        /// Code received on the redirect URI.
        #[arg(long)]
        code: String,
    },
    /// Shows the account owning the token.
    Whoami,
}

impl AuthCommand {
    /// Executes the auth command.
    pub async fn execute(self, globals: &GlobalArgs) -> Result<()> {
        let env = Environment::load()?;
        match self.command {
            AuthSubcommand::Url => {
                let app = LensConfig::oauth_app(&env.settings)?;
                let url = authorize_url(&app, &env.config.github_oauth_url)?;
                println!("{url}");
            }
            AuthSubcommand::Exchange { code } => {
                let app = LensConfig::oauth_app(&env.settings)?;
                let creds = exchange_code(&app, &env.config.github_oauth_url, &code)
                    .await
                    .context("OAuth code exchange failed")?;
                // The token goes to stdout so it can be captured into GITHUB_TOKEN.
                println!("{}", creds.token());
            }
            AuthSubcommand::Whoami => {
                let creds = env.credentials(globals)?;
                let user = env.github()?.current_user(&creds).await?;
                println!("{}", user.login);
                if let Some(url) = user.html_url {
                    println!("{url}");
                }
            }
        }
        Ok(())
    }
}
