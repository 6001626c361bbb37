//! Anthropic Claude API client implementation.

use futures::future::BoxFuture;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tokio::sync::OnceCell;
use tracing::{debug, info};
use url::Url;

use super::backend::{
    build_http_client, check_error_response, log_generation, BackendMetadata, FinishReason,
    Generation, GenerationBackend, Role, Turn,
};
use super::model_config::{get_model_registry, select_model};
use crate::error::{LensError, Result};

/// Registry key of this provider.
pub(crate) const PROVIDER: &str = "claude";


const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Claude API request message.
#[derive(Serialize)]
struct Message<'a> {
    role: &'static str,
    content: &'a str,
}

/// Claude API request body.
#[derive(Serialize)]
struct ClaudeRequest<'a> {
    model: &'a str,
    max_tokens: usize,
    messages: Vec<Message<'a>>,
}

/// Claude API response content.
#[derive(Deserialize)]
struct Content {
    #[serde(rename = "type")]
    content_type: String,
    #[serde(default)]
    text: String,
}

/// Claude API response.
#[derive(Deserialize)]
struct ClaudeResponse {
    #[serde(default)]
    content: Vec<Content>,
    stop_reason: Option<String>,
}

#[derive(Deserialize)]
struct ModelList {
    #[serde(default)]
    data: Vec<ModelInfo>,
}

#[derive(Deserialize)]
struct ModelInfo {
    id: String,
}

/// Claude API client.
pub struct ClaudeClient {
    client: Client,
    api_key: String,
    api_base: Url,
    model: OnceCell<String>,
}

impl ClaudeClient {
    /// Creates a client; with `model` unset the model is discovered on first use.
    pub fn new(api_key: String, model: Option<String>, api_base: &str) -> Result<Self> {
        let api_base = Url::parse(api_base).map_err(|e| {
            LensError::InvalidInput(format!("Invalid Claude API URL {api_base:?}: {e}"))
        })?;
        Ok(Self {
            client: build_http_client()?,
            api_key,
            api_base,
            model: OnceCell::new_with(model),
        })
    }

    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.api_base.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    fn authorized(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        builder
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
    }

    /// Lists model identifiers available to the key.
    pub async fn list_models(&self) -> Result<Vec<String>> {
        let mut url = self.endpoint(&["v1", "models"]);
        url.query_pairs_mut().append_pair("limit", "1000");
        info!(url = %url, "Listing Claude models");
        let response = self
            .authorized(self.client.get(url))
            .send()
            .await
            .map_err(|e| LensError::Transient(format!("Error connecting to Claude API: {e}")))?;
        let response = check_error_response("Claude", response).await?;
        let list: ModelList = response.json().await?;
        debug!(count = list.data.len(), "Claude models available");
        Ok(list.data.into_iter().map(|m| m.id).collect())
    }

    /// Returns the configured model, discovering one on first call.
    pub async fn model(&self) -> Result<&str> {
        let model = self
            .model
            .get_or_try_init(|| async {
                let available = self.list_models().await?;
                let registry = get_model_registry();
                let selected = select_model(registry.preferred_models(PROVIDER), &available);
                if let Some(model) = selected.as_deref() {
                    registry.log_selection(PROVIDER, model);
                }
                selected.ok_or_else(|| {
                    LensError::Internal("No Claude models available".to_string())
                })
            })
            .await?;
        Ok(model.as_str())
    }

    async fn generate_turns(&self, turns: &[Turn]) -> Result<Generation> {
        let model = self.model().await?;
        let max_tokens = get_model_registry().get_max_output_tokens(PROVIDER, model);

        let request = ClaudeRequest {
            model,
            max_tokens,
            messages: turns
                .iter()
                .map(|turn| Message {
                    role: match turn.role {
                        Role::User => "user",
                        Role::Model => "assistant",
                    },
                    content: &turn.content,
                })
                .collect(),
        };

        let url = self.endpoint(&["v1", "messages"]);
        info!(url = %url, model = %model, max_tokens, "Sending request to Claude API");

        let response = self
            .authorized(self.client.post(url))
            .json(&request)
            .send()
            .await
            .map_err(|e| LensError::Transient(format!("Error connecting to Claude API: {e}")))?;
        let response = check_error_response("Claude", response).await?;
        let body: ClaudeResponse = response.json().await?;

        let generation = interpret_response(body);
        log_generation("Claude", &generation);
        Ok(generation)
    }
}

fn interpret_response(body: ClaudeResponse) -> Generation {
    let text: String = body
        .content
        .into_iter()
        .filter(|c| c.content_type == "text")
        .map(|c| c.text)
        .collect();
    let (finish, block_reason) = match body.stop_reason.as_deref() {
        Some("end_turn" | "stop_sequence") | None => (FinishReason::Complete, None),
        Some("max_tokens") => (FinishReason::Truncated, None),
        Some("refusal") => (FinishReason::Blocked, Some("refusal".to_string())),
        Some(other) => (FinishReason::Other(other.to_string()), None),
    };
    Generation {
        text,
        finish,
        block_reason,
    }
}

impl GenerationBackend for ClaudeClient {
    fn generate<'a>(&'a self, turns: &'a [Turn]) -> BoxFuture<'a, Result<Generation>> {
        Box::pin(self.generate_turns(turns))
    }

    fn metadata(&self) -> BoxFuture<'_, Result<BackendMetadata>> {
        Box::pin(async move {
            let model = self.model().await?;
            let registry = get_model_registry();
            Ok(BackendMetadata {
                provider: "Anthropic".to_string(),
                model: model.to_string(),
                max_context_length: registry.get_input_context(PROVIDER, model),
                max_response_length: registry.get_max_output_tokens(PROVIDER, model),
            })
        })
    }
}
