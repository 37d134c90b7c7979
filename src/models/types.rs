use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A distinct LLM backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    OpenAI,
    Gemini,
    Ollama,
}

impl ProviderKind {
    /// Whether the provider runs on the local machine
    pub fn is_local(&self) -> bool {
        matches!(self, ProviderKind::Ollama)
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ProviderKind::OpenAI => "OpenAI",
            ProviderKind::Gemini => "Google Gemini",
            ProviderKind::Ollama => "Ollama",
        };
        f.write_str(label)
    }
}

impl FromStr for ProviderKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "openai" => Ok(ProviderKind::OpenAI),
            "gemini" | "google" => Ok(ProviderKind::Gemini),
            "ollama" => Ok(ProviderKind::Ollama),
            other => Err(format!(
                "Unknown provider '{}'. Expected one of: openai, gemini, ollama",
                other
            )),
        }
    }
}

/// Per-backend settings, fixed for the lifetime of the process
#[derive(Debug, Clone, Serialize)]
pub struct ProviderConfig {
    pub kind: ProviderKind,
    pub base_url: String,
    /// Never serialized; only its presence is reported
    #[serde(skip)]
    pub api_key: Option<String>,
    pub api_key_present: bool,
    pub default_model: String,
    pub max_tokens: usize,
    pub temperature: f32,
}

impl ProviderConfig {
    pub fn new(
        kind: ProviderKind,
        base_url: impl Into<String>,
        api_key: Option<String>,
        default_model: impl Into<String>,
        max_tokens: usize,
        temperature: f32,
    ) -> Self {
        let api_key = api_key.filter(|k| !k.trim().is_empty());
        Self {
            kind,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key_present: api_key.is_some(),
            api_key,
            default_model: default_model.into(),
            max_tokens,
            temperature,
        }
    }
}

/// A single stateless prompt
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GenerationRequest {
    pub prompt: String,
    pub model_override: Option<String>,
    /// Base64 image, raw or as a `data:<mime>;base64,` URL
    pub image_data: Option<String>,
}

impl GenerationRequest {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            ..Default::default()
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model_override = Some(model.into());
        self
    }

    pub fn with_image(mut self, image_data: impl Into<String>) -> Self {
        self.image_data = Some(image_data.into());
        self
    }
}

/// Token usage statistics
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub prompt_tokens: usize,
    pub completion_tokens: usize,
    pub total_tokens: usize,
}

impl TokenUsage {
    pub fn new(prompt_tokens: usize, completion_tokens: usize) -> Self {
        Self {
            prompt_tokens,
            completion_tokens,
            total_tokens: prompt_tokens + completion_tokens,
        }
    }
}

/// Response from a provider
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationResult {
    pub text: String,
    pub model_used: String,
    /// True when the model had to be pulled before it answered
    pub pulled: bool,
    pub usage: Option<TokenUsage>,
}

/// Aggregated catalogs across all providers
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelCatalog {
    pub openai: Vec<String>,
    pub gemini: Vec<String>,
    pub ollama: Vec<String>,
    pub default_model: String,
    pub use_ollama: bool,
}

/// Snapshot of configuration and backend availability
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SystemInfo {
    pub openai_key_present: bool,
    pub gemini_key_present: bool,
    pub ollama_running: bool,
    pub ollama_url: String,
    pub ollama_models: Vec<String>,
    pub ollama_cli_installed: bool,
    pub use_ollama: bool,
    pub default_model: String,
    pub temperature: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PullStatus {
    AlreadyPresent,
    PulledViaApi,
    PulledViaCli,
}

/// Result of a successful pull request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PullOutcome {
    pub model: String,
    pub status: PullStatus,
    pub message: String,
}

impl PullOutcome {
    pub fn new(model: &str, status: PullStatus) -> Self {
        let message = match status {
            PullStatus::AlreadyPresent => format!("Model '{}' is already available.", model),
            PullStatus::PulledViaApi => format!("Successfully pulled model '{}'.", model),
            PullStatus::PulledViaCli => format!("Successfully pulled model '{}' via CLI.", model),
        };
        Self {
            model: model.to_string(),
            status,
            message,
        }
    }
}
