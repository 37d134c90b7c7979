use parking_lot::RwLock;
use regex::Regex;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::{Arc, OnceLock};
use std::time::Duration;
use tracing::{debug, info, warn};

use super::catalog::decode_tags;
use super::cli::OllamaCli;
use super::detector::{candidate_urls, probe as probe_candidates};
use crate::constants::{owned_list, CATALOG_TIMEOUT_MS, CONNECT_TIMEOUT_SECS, DEFAULT_OLLAMA_MODELS, PROBE_TIMEOUT_MS};
use crate::models::{GenerationRequest, ProviderKind, TokenUsage};
use crate::utils::{error_chain, or_else_try, ProviderError};

/// Client for interacting with a local Ollama instance.
///
/// Holds the "last known good" base URL: the configured URL until a probe
/// finds a different reachable candidate.
pub struct OllamaClient {
    http: Client,
    configured_url: String,
    active_url: RwLock<String>,
    cli: Arc<dyn OllamaCli>,
    probe_timeout: Duration,
    catalog_timeout: Duration,
}

/// Sampling options sent with every generate call
#[derive(Debug, Clone, Copy)]
pub struct GenerateOptions {
    pub temperature: f32,
    pub max_tokens: usize,
}

/// A successful `/api/generate` reply
#[derive(Debug, Clone)]
pub struct GenerateReply {
    pub text: String,
    pub usage: Option<TokenUsage>,
}

/// Why a generate call failed
#[derive(Debug)]
pub enum GenerateFailure {
    /// The server does not have the model; pulling may help
    ModelNotFound(String),
    Other(ProviderError),
}

#[derive(Debug, Deserialize)]
struct GenerateBody {
    #[serde(default)]
    response: Option<String>,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    prompt_eval_count: Option<usize>,
    #[serde(default)]
    eval_count: Option<usize>,
}

impl OllamaClient {
    pub fn new(configured_url: &str, cli: Arc<dyn OllamaCli>) -> Self {
        let http = Client::builder()
            .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
            .build()
            .unwrap_or_else(|_| Client::new());
        let configured_url = configured_url.trim_end_matches('/').to_string();

        Self {
            http,
            active_url: RwLock::new(configured_url.clone()),
            configured_url,
            cli,
            probe_timeout: Duration::from_millis(PROBE_TIMEOUT_MS),
            catalog_timeout: Duration::from_millis(CATALOG_TIMEOUT_MS),
        }
    }

    /// Override the probe and catalog timeouts
    pub fn with_timeouts(mut self, probe_timeout: Duration, catalog_timeout: Duration) -> Self {
        self.probe_timeout = probe_timeout;
        self.catalog_timeout = catalog_timeout;
        self
    }

    /// The base URL requests currently go to
    pub fn base_url(&self) -> String {
        self.active_url.read().clone()
    }

    /// Probe the candidate URLs and remember the first reachable one.
    pub async fn probe(&self) -> Option<String> {
        let candidates = candidate_urls(&self.configured_url);
        let found = probe_candidates(&self.http, &candidates, self.probe_timeout).await?;

        let mut active = self.active_url.write();
        if *active != found {
            info!("Updating Ollama API URL from {} to {}", *active, found);
            *active = found.clone();
        }
        Some(found)
    }

    /// Query `/api/tags`. Zero decoded models counts as a failure.
    pub async fn fetch_tags(&self) -> Result<Vec<String>, ProviderError> {
        let url = format!("{}/api/tags", self.base_url());
        debug!("Fetching available Ollama models from {}", url);

        let response = self
            .http
            .get(&url)
            .timeout(self.catalog_timeout)
            .send()
            .await
            .map_err(|e| ProviderError::CatalogUnavailable(error_chain(&e)))?;

        if !response.status().is_success() {
            return Err(ProviderError::CatalogUnavailable(format!(
                "Ollama API returned status {}",
                response.status()
            )));
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| ProviderError::CatalogUnavailable(format!("unparseable tag listing: {}", e)))?;

        match decode_tags(&body) {
            Some((shape, models)) if !models.is_empty() => {
                debug!("Found {} Ollama models in {}", models.len(), shape);
                Ok(models)
            },
            Some(_) => Err(ProviderError::CatalogUnavailable("tag listing is empty".to_string())),
            None => Err(ProviderError::CatalogUnavailable("unrecognized tag listing".to_string())),
        }
    }

    /// List installed models: HTTP first, then the CLI, then the static list.
    /// Never returns an empty list.
    pub async fn list_models(&self) -> Vec<String> {
        let cli_listing = async {
            match self.cli.list_models().await {
                Ok(models) if !models.is_empty() => Ok(models),
                Ok(_) => Err(ProviderError::CatalogUnavailable("CLI listed no models".to_string())),
                Err(err) => Err(err),
            }
        };

        match or_else_try("Ollama tag listing", self.fetch_tags(), cli_listing).await {
            Ok(models) => models,
            Err(err) => {
                warn!("Using default Ollama models list: {}", err);
                owned_list(DEFAULT_OLLAMA_MODELS)
            },
        }
    }

    /// Pull a model through the HTTP API
    pub async fn pull_via_api(&self, model: &str) -> Result<(), ProviderError> {
        let url = format!("{}/api/pull", self.base_url());
        info!("Pulling Ollama model '{}' via {}", model, url);

        let pull_error = |message: String| ProviderError::ModelPullFailed {
            model: model.to_string(),
            message,
        };

        let response = self
            .http
            .post(&url)
            .json(&json!({ "name": model, "model": model, "stream": false }))
            .send()
            .await
            .map_err(|e| pull_error(error_chain(&e)))?;

        let status = response.status();
        let text = response.text().await.map_err(|e| pull_error(e.to_string()))?;

        // Ollama can answer 200 with an error in the body, so check both
        let body_error = serde_json::from_str::<Value>(&text)
            .ok()
            .and_then(|v| v.get("error").and_then(Value::as_str).map(str::to_string));

        match (status.is_success(), body_error) {
            (true, None) => Ok(()),
            (_, Some(message)) => Err(pull_error(message)),
            (false, None) => Err(pull_error(format!("HTTP {}: {}", status, text.trim()))),
        }
    }

    /// Pull a model through the CLI
    pub async fn pull_via_cli(&self, model: &str) -> Result<(), ProviderError> {
        self.cli.pull_model(model).await
    }

    /// Issue a single non-streaming generate call
    pub async fn generate_once(
        &self,
        model: &str,
        request: &GenerationRequest,
        options: GenerateOptions,
    ) -> Result<GenerateReply, GenerateFailure> {
        let url = format!("{}/api/generate", self.base_url());
        let mut body = json!({
            "model": model,
            "prompt": request.prompt,
            "stream": false,
            "options": {
                "temperature": options.temperature,
                "num_predict": options.max_tokens,
            }
        });
        if let Some(image) = request.image_data.as_deref() {
            body["images"] = json!([strip_data_url(image)]);
        }

        let other = |message: String| GenerateFailure::Other(ProviderError::generation(ProviderKind::Ollama, message));

        let response = self
            .http
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| other(error_chain(&e)))?;

        let status = response.status();
        let text = response.text().await.map_err(|e| other(e.to_string()))?;

        let parsed: GenerateBody = match serde_json::from_str(&text) {
            Ok(parsed) => parsed,
            Err(_) => return Err(other(format!("HTTP {}: {}", status, text.trim()))),
        };

        if let Some(message) = parsed.error {
            return Err(if is_model_not_found(&message) {
                GenerateFailure::ModelNotFound(message)
            } else {
                other(message)
            });
        }
        if !status.is_success() {
            return Err(other(format!("HTTP {}", status)));
        }

        let usage = match (parsed.prompt_eval_count, parsed.eval_count) {
            (None, None) => None,
            (prompt, completion) => Some(TokenUsage::new(prompt.unwrap_or(0), completion.unwrap_or(0))),
        };

        Ok(GenerateReply {
            text: parsed.response.unwrap_or_default(),
            usage,
        })
    }
}

/// Whether an error message says the requested model is missing
pub fn is_model_not_found(message: &str) -> bool {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r"(?i)(model\b.*\bnot found|no models found)").ok())
        .as_ref()
        .is_some_and(|re| re.is_match(message))
}

/// Drop a `data:<mime>;base64,` prefix if present
pub fn strip_data_url(image: &str) -> &str {
    match image.split_once(',') {
        Some((prefix, payload)) if prefix.starts_with("data:") => payload,
        _ => image,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ollama::cli::MockOllamaCli;
    use pretty_assertions::assert_eq;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client_with(server: &MockServer, cli: MockOllamaCli) -> OllamaClient {
        OllamaClient::new(&server.uri(), Arc::new(cli))
            .with_timeouts(Duration::from_millis(500), Duration::from_millis(500))
    }

    #[test]
    fn test_model_not_found_pattern() {
        assert!(is_model_not_found("model 'llama9' not found, try pulling it first"));
        assert!(is_model_not_found("model \"x\" not found"));
        assert!(is_model_not_found("no models found"));
        assert!(is_model_not_found("Model Not Found"));
        assert!(!is_model_not_found("out of memory"));
        assert!(!is_model_not_found("file not found"));
    }

    #[test]
    fn test_strip_data_url() {
        assert_eq!(strip_data_url("data:image/png;base64,AAAA"), "AAAA");
        assert_eq!(strip_data_url("AAAA"), "AAAA");
    }

    #[tokio::test]
    async fn test_probe_updates_active_url() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/tags"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        // Configure with `localhost` so the reachable candidate is the 127.0.0.1 form
        let configured = server.uri().replace("127.0.0.1", "localhost");
        let client = OllamaClient::new(&configured, Arc::new(MockOllamaCli::new()));
        let found = client.probe().await;

        assert!(found.is_some());
        assert_eq!(client.base_url(), found.unwrap());
    }

    #[tokio::test]
    async fn test_list_models_from_api() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/tags"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "models": [{"name": "llama3.2:3b"}, {"name": "mistral"}]
            })))
            .mount(&server)
            .await;

        let mut cli = MockOllamaCli::new();
        cli.expect_list_models().never();

        let models = client_with(&server, cli).list_models().await;
        assert_eq!(models, vec!["llama3.2:3b".to_string(), "mistral".to_string()]);
    }

    #[tokio::test]
    async fn test_empty_listing_falls_back_to_cli() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/tags"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"models": []})))
            .mount(&server)
            .await;

        let mut cli = MockOllamaCli::new();
        cli.expect_list_models()
            .times(1)
            .returning(|| Ok(vec!["phi3:mini".to_string()]));

        let models = client_with(&server, cli).list_models().await;
        assert_eq!(models, vec!["phi3:mini".to_string()]);
    }

    #[tokio::test]
    async fn test_everything_failing_yields_defaults() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/tags"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let mut cli = MockOllamaCli::new();
        cli.expect_list_models()
            .times(1)
            .returning(|| Err(ProviderError::Cli("not installed".to_string())));

        let models = client_with(&server, cli).list_models().await;
        assert!(!models.is_empty());
        assert_eq!(models, owned_list(DEFAULT_OLLAMA_MODELS));
    }

    #[tokio::test]
    async fn test_catalog_timeout_falls_back() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/tags"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"models": [{"name": "slow"}]}))
                    .set_delay(Duration::from_secs(3)),
            )
            .mount(&server)
            .await;

        let mut cli = MockOllamaCli::new();
        cli.expect_list_models().returning(|| Ok(Vec::new()));

        let models = client_with(&server, cli).list_models().await;
        assert_eq!(models, owned_list(DEFAULT_OLLAMA_MODELS));
    }

    #[tokio::test]
    async fn test_pull_via_api_detects_body_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/pull"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"error": "pull model manifest: file does not exist"})))
            .mount(&server)
            .await;

        let err = client_with(&server, MockOllamaCli::new())
            .pull_via_api("foobarbaz")
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::ModelPullFailed { .. }));
        assert!(err.to_string().contains("manifest"));
    }

    #[tokio::test]
    async fn test_generate_once_sends_token_limit() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/generate"))
            .and(body_partial_json(json!({
                "model": "llama3",
                "stream": false,
                "options": {"num_predict": 32768}
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "response": "hello",
                "prompt_eval_count": 4,
                "eval_count": 6
            })))
            .expect(1)
            .mount(&server)
            .await;

        let reply = client_with(&server, MockOllamaCli::new())
            .generate_once(
                "llama3",
                &GenerationRequest::new("hi"),
                GenerateOptions { temperature: 0.7, max_tokens: 32768 },
            )
            .await
            .unwrap();

        assert_eq!(reply.text, "hello");
        assert_eq!(reply.usage, Some(TokenUsage::new(4, 6)));
    }

    #[tokio::test]
    async fn test_generate_once_classifies_not_found() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/generate"))
            .respond_with(ResponseTemplate::new(404).set_body_json(json!({
                "error": "model 'llama9' not found, try pulling it first"
            })))
            .mount(&server)
            .await;

        let result = client_with(&server, MockOllamaCli::new())
            .generate_once(
                "llama9",
                &GenerationRequest::new("hi"),
                GenerateOptions { temperature: 0.7, max_tokens: 16 },
            )
            .await;
        assert!(matches!(result, Err(GenerateFailure::ModelNotFound(_))));
    }
}
