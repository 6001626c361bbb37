//! GitHub OAuth web flow: authorize URL and code exchange.

use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use url::Url;

use super::client::{check_status, GITHUB_TIMEOUT};
use super::types::Credentials;
use crate::config::OAuthApp;
use crate::error::{LensError, Result};

/// Scopes requested during authorization.
pub const OAUTH_SCOPE: &str = "repo user";

#[derive(Serialize)]
struct TokenRequest<'a> {
    client_id: &'a str,
    client_secret: &'a str,
    code: &'a str,
    redirect_uri: &'a str,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: Option<String>,
    error: Option<String>,
    error_description: Option<String>,
}

fn oauth_endpoint(oauth_base: &str, segments: &[&str]) -> Result<Url> {
    let mut url = Url::parse(oauth_base).map_err(|e| {
        LensError::InvalidInput(format!("Invalid GitHub OAuth URL {oauth_base:?}: {e}"))
    })?;
    url.path_segments_mut()
        .map_err(|()| {
            LensError::InvalidInput(format!("GitHub OAuth URL cannot be used as a base: {oauth_base}"))
        })?
        .pop_if_empty()
        .extend(segments);
    Ok(url)
}

/// Builds the URL the user visits to authorize the app.
pub fn authorize_url(app: &OAuthApp, oauth_base: &str) -> Result<Url> {
    let mut url = oauth_endpoint(oauth_base, &["login", "oauth", "authorize"])?;
    url.query_pairs_mut()
        .append_pair("client_id", &app.client_id)
        .append_pair("redirect_uri", &app.redirect_uri)
        .append_pair("scope", OAUTH_SCOPE);
    Ok(url)
}

/// Exchanges an authorization code for an access token.
///
/// GitHub answers `200 OK` even for rejected codes, so a body without an
/// `access_token` is reported as [`LensError::Forbidden`].
pub async fn exchange_code(app: &OAuthApp, oauth_base: &str, code: &str) -> Result<Credentials> {
    let code = code.trim();
    if code.is_empty() {
        return Err(LensError::InvalidInput(
            "Authorization code is empty".to_string(),
        ));
    }
    let url = oauth_endpoint(oauth_base, &["login", "oauth", "access_token"])?;
    let http = Client::builder()
        .timeout(GITHUB_TIMEOUT)
        .user_agent(concat!("commit-lens/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(|e| LensError::Internal(format!("Failed to build HTTP client: {e}")))?;

    info!(client_id = %app.client_id, "Exchanging OAuth code for access token");
    let response = http
        .post(url)
        .header("Accept", "application/json")
        .json(&TokenRequest {
            client_id: &app.client_id,
            client_secret: &app.client_secret,
            code,
            redirect_uri: &app.redirect_uri,
        })
        .send()
        .await
        .map_err(|e| LensError::Transient(format!("Error connecting to GitHub OAuth: {e}")))?;
    let response = check_status(response, "OAuth token").await?;
    let body: TokenResponse = response.json().await?;

    match body.access_token.filter(|t| !t.is_empty()) {
        Some(token) => {
            let creds = Credentials::new(token);
            info!(token = %creds.redacted(), "Obtained GitHub access token");
            Ok(creds)
        }
        None => {
            let detail = body
                .error_description
                .or(body.error)
                .unwrap_or_else(|| "no access token in response".to_string());
            warn!(detail = %detail, "OAuth code exchange rejected");
            Err(LensError::Forbidden(format!(
                "Failed to get access token: {detail}"
            )))
        }
    }
}
