use anyhow::Result;
use commit_lens::assistant::{FinishReason, GeminiClient, GenerationBackend, Turn};
use commit_lens::error::LensError;
use serde_json::json;
use wiremock::matchers::{body_partial_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn mount_model_list(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/v1beta/models"))
        .and(query_param("pageSize", "1000"))
        .and(header("x-goog-api-key", "test-key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "models": [
                {"name": "models/embedding-001", "supportedGenerationMethods": ["embedContent"]},
                {"name": "models/gemini-1.0-pro", "supportedGenerationMethods": ["generateContent"]},
                {"name": "models/gemini-1.5-flash", "supportedGenerationMethods": ["generateContent", "countTokens"]}
            ]
        })))
        .expect(1)
        .mount(server)
        .await;
}

#[tokio::test]
async fn discovers_preferred_model_once() -> Result<()> {
    let server = MockServer::start().await;
    mount_model_list(&server).await;
    Mock::given(method("POST"))
        .and(path("/v1beta/models/gemini-1.5-flash:generateContent"))
        .and(header("x-goog-api-key", "test-key"))
        .and(body_partial_json(json!({
            "contents": [{"role": "user", "parts": [{"text": "hello"}]}],
            "generationConfig": {"maxOutputTokens": 8192}
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "candidates": [{
                "content": {"role": "model", "parts": [{"text": "Hi!"}]},
                "finishReason": "STOP"
            }]
        })))
        .expect(2)
        .mount(&server)
        .await;

    let client = GeminiClient::new("test-key".to_string(), None, &server.uri())?;
    let turns = [Turn::user("hello")];
    let first = client.generate(&turns).await?;
    let second = client.generate(&turns).await?;

    assert_eq!(first.finish, FinishReason::Complete);
    assert_eq!(first.into_text()?, "Hi!");
    assert_eq!(second.text, "Hi!");

    let metadata = client.metadata().await?;
    assert_eq!(metadata.model, "gemini-1.5-flash");
    assert_eq!(metadata.max_context_length, 1_048_576);
    Ok(())
}

#[tokio::test]
async fn prompt_block_surfaces_as_blocked() -> Result<()> {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1beta/models/gemini-1.5-pro:generateContent"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "promptFeedback": {"blockReason": "SAFETY"}
        })))
        .mount(&server)
        .await;

    let client = GeminiClient::new(
        "test-key".to_string(),
        Some("gemini-1.5-pro".to_string()),
        &server.uri(),
    )?;
    let generation = client.generate(&[Turn::user("hello")]).await?;
    let err = generation.into_text().unwrap_err();
    assert!(
        matches!(&err, LensError::GenerationBlocked { reason } if reason == "SAFETY"),
        "{err:?}"
    );
    Ok(())
}

#[tokio::test]
async fn rejected_key_is_forbidden() -> Result<()> {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1beta/models"))
        .respond_with(ResponseTemplate::new(403).set_body_json(json!({
            "error": {"code": 403, "message": "API key not valid", "status": "PERMISSION_DENIED"}
        })))
        .mount(&server)
        .await;

    let client = GeminiClient::new("bad-key".to_string(), None, &server.uri())?;
    let err = client.metadata().await.unwrap_err();
    assert!(matches!(err, LensError::Forbidden(_)), "{err:?}");
    Ok(())
}

#[tokio::test]
async fn no_generate_models_is_an_error() -> Result<()> {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1beta/models"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "models": [{"name": "models/embedding-001", "supportedGenerationMethods": ["embedContent"]}]
        })))
        .mount(&server)
        .await;

    let client = GeminiClient::new("test-key".to_string(), None, &server.uri())?;
    assert!(client.generate(&[Turn::user("hello")]).await.is_err());
    Ok(())
}
