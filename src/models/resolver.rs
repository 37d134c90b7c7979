use reqwest::Client;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

use super::gemini::GeminiProvider;
use super::local::OllamaProvider;
use super::normalize::normalize;
use super::openai::OpenAIProvider;
use super::traits::Provider;
use super::types::{
    GenerationRequest, GenerationResult, ModelCatalog, ProviderKind, PullOutcome, SystemInfo,
};
use crate::app::Config;
use crate::constants::{owned_list, CONNECT_TIMEOUT_SECS, DEFAULT_OLLAMA_MODELS};
use crate::ollama::{self, OllamaCli, OllamaClient, SystemOllamaCli};
use crate::utils::ProviderError;

/// Decides which backend and model serve a request.
///
/// Built once per process from `Config`. The only state that changes
/// afterwards is the Ollama client's last known good URL.
pub struct ProviderResolver {
    openai: OpenAIProvider,
    gemini: GeminiProvider,
    ollama: OllamaProvider,
    use_ollama: bool,
    default_provider: ProviderKind,
    default_model: String,
    temperature: f32,
}

impl ProviderResolver {
    /// Create a resolver that shells out to the real `ollama` binary
    pub fn new(config: &Config) -> Self {
        let cli = SystemOllamaCli::new(Duration::from_secs(config.ollama.pull_timeout_secs));
        Self::with_cli(config, Arc::new(cli))
    }

    /// Create a resolver with a custom Ollama CLI implementation
    pub fn with_cli(config: &Config, cli: Arc<dyn OllamaCli>) -> Self {
        // No overall timeout: generation waits on model inference
        let http = Client::builder()
            .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
            .build()
            .unwrap_or_else(|_| Client::new());

        let ollama_config = config.provider(ProviderKind::Ollama);
        let ollama_client = OllamaClient::new(&ollama_config.base_url, cli);

        Self {
            openai: OpenAIProvider::new(http.clone(), config.provider(ProviderKind::OpenAI)),
            gemini: GeminiProvider::new(http, config.provider(ProviderKind::Gemini)),
            ollama: OllamaProvider::new(ollama_client, ollama_config),
            use_ollama: config.use_ollama,
            default_provider: config.default_provider(),
            default_model: config.default_model().to_string(),
            temperature: config.temperature,
        }
    }

    /// Backend for a provider kind
    pub fn provider(&self, kind: ProviderKind) -> &dyn Provider {
        match kind {
            ProviderKind::OpenAI => &self.openai,
            ProviderKind::Gemini => &self.gemini,
            ProviderKind::Ollama => &self.ollama,
        }
    }

    /// Provider used when a request does not name one
    pub fn default_provider(&self) -> ProviderKind {
        self.default_provider
    }

    /// Configuration and availability snapshot
    pub async fn system_info(&self) -> SystemInfo {
        let client = self.ollama.client();
        let ollama_running = client.probe().await.is_some();
        let ollama_models = if ollama_running {
            client.list_models().await
        } else {
            Vec::new()
        };

        SystemInfo {
            openai_key_present: self.openai.config().api_key_present,
            gemini_key_present: self.gemini.config().api_key_present,
            ollama_running,
            ollama_url: client.base_url(),
            ollama_models,
            ollama_cli_installed: ollama::is_installed(),
            use_ollama: self.use_ollama,
            default_model: self.default_model.clone(),
            temperature: self.temperature,
        }
    }

    /// Catalogs of every provider. Cloud listings run alongside the Ollama probe.
    pub async fn list_models(&self) -> ModelCatalog {
        let (openai, gemini, ollama_url) = tokio::join!(
            self.openai.list_models(),
            self.gemini.list_models(),
            self.ollama.client().probe(),
        );

        let ollama = match ollama_url {
            Some(_) => self.ollama.list_models().await,
            None => {
                debug!("Ollama is not running; using default Ollama models list");
                owned_list(DEFAULT_OLLAMA_MODELS)
            },
        };

        info!(
            "Returning {} OpenAI models, {} Gemini models, and {} Ollama models",
            openai.len(),
            gemini.len(),
            ollama.len()
        );

        ModelCatalog {
            openai,
            gemini,
            ollama,
            default_model: self.default_model.clone(),
            use_ollama: self.use_ollama,
        }
    }

    /// Catalog of a single provider
    pub async fn list_provider_models(&self, kind: ProviderKind) -> Vec<String> {
        self.provider(kind).list_models().await
    }

    /// Forward a prompt to the given provider
    pub async fn generate(
        &self,
        kind: ProviderKind,
        request: &GenerationRequest,
    ) -> Result<GenerationResult, ProviderError> {
        info!("Dispatching prompt to {}", kind);
        self.provider(kind).generate(request).await
    }

    /// Make sure an Ollama model is installed, pulling it if needed
    pub async fn pull_model(&self, name: &str) -> Result<PullOutcome, ProviderError> {
        let model = normalize(name, ProviderKind::Ollama);
        let client = self.ollama.client();
        if client.probe().await.is_none() {
            debug!("Ollama API unreachable; pull will rely on the CLI");
        }
        ollama::ensure_model(client, &model).await
    }
}
