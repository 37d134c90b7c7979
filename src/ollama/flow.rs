use tracing::{debug, info, warn};

use super::client::{GenerateFailure, GenerateOptions, OllamaClient};
use super::guide::start_hint;
use super::installer::{catalog_contains, install_model};
use crate::models::{normalize, GenerationRequest, GenerationResult, ProviderConfig, ProviderKind};
use crate::utils::ProviderError;

/// Where a single Ollama request currently is
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Step {
    CheckModelPresence,
    Pull,
    Generate,
}

/// Generate a response with Ollama, pulling the model on demand.
///
/// The Pull step runs at most once per request, so a request makes at most
/// one pull and two generate calls however the server responds. Every
/// generate call, the retry included, uses the configured token limit.
pub async fn generate(
    client: &OllamaClient,
    config: &ProviderConfig,
    request: &GenerationRequest,
) -> Result<GenerationResult, ProviderError> {
    let model = request
        .model_override
        .as_deref()
        .map(|name| normalize(name, ProviderKind::Ollama))
        .filter(|name| !name.is_empty())
        .unwrap_or_else(|| config.default_model.clone());

    if client.probe().await.is_none() {
        return Err(ProviderError::ProviderUnavailable {
            provider: ProviderKind::Ollama,
            message: start_hint(),
        });
    }

    let options = GenerateOptions {
        temperature: config.temperature,
        max_tokens: config.max_tokens,
    };
    let mut pulled = false;
    let mut step = Step::CheckModelPresence;

    loop {
        debug!("Ollama request for '{}' at step {:?}", model, step);
        step = match step {
            Step::CheckModelPresence => {
                let available = client.list_models().await;
                if catalog_contains(&available, &model) {
                    Step::Generate
                } else {
                    info!("Model {} not found, attempting to pull it...", model);
                    Step::Pull
                }
            },
            Step::Pull => {
                install_model(client, &model).await?;
                pulled = true;
                Step::Generate
            },
            Step::Generate => match client.generate_once(&model, request, options).await {
                Ok(reply) => {
                    return Ok(GenerationResult {
                        text: reply.text,
                        model_used: model,
                        pulled,
                        usage: reply.usage,
                    });
                },
                Err(GenerateFailure::ModelNotFound(message)) if !pulled => {
                    warn!("Ollama reports '{}' missing ({}); pulling and retrying once", model, message);
                    Step::Pull
                },
                Err(GenerateFailure::ModelNotFound(message)) => {
                    return Err(ProviderError::generation(ProviderKind::Ollama, message));
                },
                Err(GenerateFailure::Other(err)) => return Err(err),
            },
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ollama::cli::MockOllamaCli;
    use serde_json::json;
    use std::sync::Arc;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn ollama_config(url: &str) -> ProviderConfig {
        ProviderConfig::new(ProviderKind::Ollama, url, None, "codellama", 32768, 0.7)
    }

    async fn server_with_models(models: serde_json::Value) -> MockServer {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/tags"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "models": models })))
            .mount(&server)
            .await;
        server
    }

    fn not_found() -> ResponseTemplate {
        ResponseTemplate::new(404).set_body_json(json!({"error": "model 'codellama' not found, try pulling it first"}))
    }

    #[tokio::test]
    async fn test_unreachable_server_is_provider_unavailable() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let url = format!("http://127.0.0.1:{}", listener.local_addr().unwrap().port());
        drop(listener);

        let client = OllamaClient::new(&url, Arc::new(MockOllamaCli::new()));
        let err = generate(&client, &ollama_config(&url), &GenerationRequest::new("hi"))
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::ProviderUnavailable { .. }));
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn test_present_model_generates_without_pull() {
        let server = server_with_models(json!([{"name": "codellama:latest"}])).await;
        Mock::given(method("POST"))
            .and(path("/api/pull"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/api/generate"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"response": "fn main() {}"})))
            .expect(1)
            .mount(&server)
            .await;

        let client = OllamaClient::new(&server.uri(), Arc::new(MockOllamaCli::new()));
        let result = generate(&client, &ollama_config(&server.uri()), &GenerationRequest::new("write rust"))
            .await
            .unwrap();

        assert_eq!(result.text, "fn main() {}");
        assert_eq!(result.model_used, "codellama");
        assert!(!result.pulled);
    }

    #[tokio::test]
    async fn test_missing_model_is_pulled_before_generate() {
        let server = server_with_models(json!([{"name": "mistral"}])).await;
        Mock::given(method("POST"))
            .and(path("/api/pull"))
            .and(body_partial_json(json!({"name": "phi3"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": "success"})))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/api/generate"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"response": "hi"})))
            .expect(1)
            .mount(&server)
            .await;

        let client = OllamaClient::new(&server.uri(), Arc::new(MockOllamaCli::new()));
        let request = GenerationRequest::new("hello").with_model("phi3");
        let result = generate(&client, &ollama_config(&server.uri()), &request).await.unwrap();

        assert!(result.pulled);
        assert_eq!(result.model_used, "phi3");
    }

    #[tokio::test]
    async fn test_not_found_retries_exactly_once() {
        let server = server_with_models(json!([{"name": "codellama"}])).await;
        Mock::given(method("POST"))
            .and(path("/api/generate"))
            .respond_with(not_found())
            .expect(2)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/api/pull"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": "success"})))
            .expect(1)
            .mount(&server)
            .await;

        let mut cli = MockOllamaCli::new();
        cli.expect_pull_model().never();

        let client = OllamaClient::new(&server.uri(), Arc::new(cli));
        let err = generate(&client, &ollama_config(&server.uri()), &GenerationRequest::new("hi"))
            .await
            .unwrap_err();

        assert!(matches!(err, ProviderError::GenerationError { .. }));
        assert!(err.to_string().contains("not found"));
        // Call counts are verified when the mock server drops
    }

    #[tokio::test]
    async fn test_retry_uses_configured_token_limit() {
        let server = server_with_models(json!([{"name": "codellama"}])).await;
        Mock::given(method("POST"))
            .and(path("/api/generate"))
            .respond_with(not_found())
            .up_to_n_times(1)
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/api/pull"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": "success"})))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/api/generate"))
            .and(body_partial_json(json!({"options": {"num_predict": 32768}})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"response": "second time"})))
            .expect(1)
            .mount(&server)
            .await;

        let client = OllamaClient::new(&server.uri(), Arc::new(MockOllamaCli::new()));
        let result = generate(&client, &ollama_config(&server.uri()), &GenerationRequest::new("hi"))
            .await
            .unwrap();

        assert_eq!(result.text, "second time");
        assert!(result.pulled);
    }

    #[tokio::test]
    async fn test_failed_pull_is_terminal() {
        let server = server_with_models(json!([{"name": "codellama"}])).await;
        Mock::given(method("POST"))
            .and(path("/api/generate"))
            .respond_with(not_found())
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/api/pull"))
            .respond_with(ResponseTemplate::new(500))
            .expect(1)
            .mount(&server)
            .await;

        let mut cli = MockOllamaCli::new();
        cli.expect_pull_model()
            .times(1)
            .returning(|_| Err(ProviderError::Cli("exit status 1".to_string())));

        let client = OllamaClient::new(&server.uri(), Arc::new(cli));
        let err = generate(&client, &ollama_config(&server.uri()), &GenerationRequest::new("hi"))
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::ModelPullFailed { .. }));
    }

    #[tokio::test]
    async fn test_other_errors_are_not_retried() {
        let server = server_with_models(json!([{"name": "codellama"}])).await;
        Mock::given(method("POST"))
            .and(path("/api/generate"))
            .respond_with(ResponseTemplate::new(500).set_body_json(json!({"error": "out of memory"})))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/api/pull"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let client = OllamaClient::new(&server.uri(), Arc::new(MockOllamaCli::new()));
        let err = generate(&client, &ollama_config(&server.uri()), &GenerationRequest::new("hi"))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Ollama generation error: out of memory");
    }
}
