//! Google Gemini API client implementation.

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
pub(crate) const PROVIDER: &str = "gemini";


/// Generation method a model must support to be selectable.
const GENERATE_CONTENT: &str = "generateContent";

/// Finish reasons that mean the answer was withheld.
const BLOCKING_FINISH_REASONS: &[&str] = &[
    "SAFETY",
    "RECITATION",
    "BLOCKLIST",
    "PROHIBITED_CONTENT",
    "SPII",
];

#[derive(Serialize)]
struct Part {
    text: String,
}

#[derive(Serialize)]
struct Content {
    role: &'static str,
    parts: Vec<Part>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    max_output_tokens: usize,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest {
    contents: Vec<Content>,
    generation_config: GenerationConfig,
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    content: Option<CandidateContent>,
    finish_reason: Option<String>,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Deserialize)]
struct ResponsePart {
    #[serde(default)]
    text: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    block_reason: Option<String>,
}

#[derive(Deserialize)]
struct ModelList {
    #[serde(default)]
    models: Vec<ModelInfo>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ModelInfo {
    name: String,
    #[serde(default)]
    supported_generation_methods: Vec<String>,
}

/// Gemini API client.
pub struct GeminiClient {
    client: Client,
    api_key: String,
    api_base: Url,
    model: OnceCell<String>,
}

impl GeminiClient {
    /// Creates a client; with `model` unset the model is discovered on first use.
    pub fn new(api_key: String, model: Option<String>, api_base: &str) -> Result<Self> {
        let api_base = Url::parse(api_base).map_err(|e| {
            LensError::InvalidInput(format!("Invalid Gemini API URL {api_base:?}: {e}"))
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

    /// Lists models that support `generateContent`, without the `models/` prefix.
    pub async fn list_models(&self) -> Result<Vec<String>> {
        let mut url = self.endpoint(&["v1beta", "models"]);
        url.query_pairs_mut().append_pair("pageSize", "1000");
        info!(url = %url, "Listing Gemini models");

        let response = self
            .client
            .get(url)
            .header("x-goog-api-key", &self.api_key)
            .send()
            .await
            .map_err(|e| LensError::Transient(format!("Error connecting to Gemini API: {e}")))?;
        let response = check_error_response("Gemini", response).await?;
        let list: ModelList = response.json().await?;

        let models: Vec<String> = list
            .models
            .into_iter()
            .filter(|m| m.supported_generation_methods.iter().any(|g| g == GENERATE_CONTENT))
            .map(|m| {
                m.name
                    .strip_prefix("models/")
                    .map(str::to_string)
                    .unwrap_or(m.name)
            })
            .collect();
        debug!(count = models.len(), "Gemini models supporting generateContent");
        Ok(models)
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
                    LensError::Internal("No supported Gemini models found".to_string())
                })
            })
            .await?;
        Ok(model.as_str())
    }

    async fn generate_turns(&self, turns: &[Turn]) -> Result<Generation> {
        let model = self.model().await?;
        let max_output_tokens = get_model_registry().get_max_output_tokens(PROVIDER, model);

        let request = GenerateRequest {
            contents: turns
                .iter()
                .map(|turn| Content {
                    role: match turn.role {
                        Role::User => "user",
                        Role::Model => "model",
                    },
                    parts: vec![Part {
                        text: turn.content.clone(),
                    }],
                })
                .collect(),
            generation_config: GenerationConfig { max_output_tokens },
        };

        let url = self.endpoint(&["v1beta", "models", &format!("{model}:{GENERATE_CONTENT}")]);
        info!(
            url = %url,
            model = %model,
            turns = turns.len(),
            max_output_tokens,
            "Sending request to Gemini API"
        );

        let response = self
            .client
            .post(url)
            .header("x-goog-api-key", &self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| LensError::Transient(format!("Error connecting to Gemini API: {e}")))?;
        let response = check_error_response("Gemini", response).await?;
        let body: GenerateResponse = response.json().await?;

        let generation = interpret_response(body);
        log_generation("Gemini", &generation);
        Ok(generation)
    }
}

/// Classifies a Gemini response into a [`Generation`].
fn interpret_response(body: GenerateResponse) -> Generation {
    let prompt_block = body.prompt_feedback.and_then(|f| f.block_reason);
    let Some(candidate) = body.candidates.into_iter().next() else {
        return match prompt_block {
            Some(reason) => Generation {
                text: String::new(),
                finish: FinishReason::Blocked,
                block_reason: Some(reason),
            },
            None => Generation {
                text: String::new(),
                finish: FinishReason::Other("NO_CANDIDATES".to_string()),
                block_reason: None,
            },
        };
    };

    let text: String = candidate
        .content
        .map(|c| c.parts.into_iter().map(|p| p.text).collect())
        .unwrap_or_default();
    let reason = candidate.finish_reason.unwrap_or_else(|| "STOP".to_string());
    let (finish, block_reason) = match reason.as_str() {
        "STOP" => (FinishReason::Complete, prompt_block),
        "MAX_TOKENS" => (FinishReason::Truncated, prompt_block),
        r if BLOCKING_FINISH_REASONS.contains(&r) => (FinishReason::Blocked, Some(reason.clone())),
        _ => (FinishReason::Other(reason.clone()), prompt_block),
    };
    Generation {
        text,
        finish,
        block_reason,
    }
}

impl GenerationBackend for GeminiClient {
    fn generate<'a>(&'a self, turns: &'a [Turn]) -> BoxFuture<'a, Result<Generation>> {
        Box::pin(self.generate_turns(turns))
    }

    fn metadata(&self) -> BoxFuture<'_, Result<BackendMetadata>> {
        Box::pin(async move {
            let model = self.model().await?;
            let registry = get_model_registry();
            Ok(BackendMetadata {
                provider: "Gemini".to_string(),
                model: model.to_string(),
                max_context_length: registry.get_input_context(PROVIDER, model),
                max_response_length: registry.get_max_output_tokens(PROVIDER, model),
            })
        })
    }
}
