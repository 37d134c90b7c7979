use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};

use super::traits::Provider;
use super::types::{GenerationRequest, GenerationResult, ProviderConfig, ProviderKind, TokenUsage};
use super::wire::{read_json, split_image_data};
use crate::constants::{owned_list, DEFAULT_GEMINI_MODELS, GEMINI_TOP_K, GEMINI_TOP_P};
use crate::utils::ProviderError;

/// Google Gemini generateContent backend
pub struct GeminiProvider {
    http: Client,
    config: ProviderConfig,
}

impl GeminiProvider {
    pub fn new(http: Client, config: ProviderConfig) -> Self {
        Self { http, config }
    }
}

#[async_trait]
impl Provider for GeminiProvider {
    fn config(&self) -> &ProviderConfig {
        &self.config
    }

    async fn list_models(&self) -> Vec<String> {
        list_models(&self.config)
    }

    async fn generate(&self, request: &GenerationRequest) -> Result<GenerationResult, ProviderError> {
        generate(&self.http, &self.config, request).await
    }
}

/// Gemini has no model discovery endpoint worth using; the static list is
/// offered whenever a key is configured
pub fn list_models(config: &ProviderConfig) -> Vec<String> {
    if config.api_key_present {
        owned_list(DEFAULT_GEMINI_MODELS)
    } else {
        Vec::new()
    }
}

/// Send one generateContent request
pub async fn generate(
    http: &Client,
    config: &ProviderConfig,
    request: &GenerationRequest,
) -> Result<GenerationResult, ProviderError> {
    let api_key = config
        .api_key
        .as_deref()
        .ok_or(ProviderError::MissingCredential {
            provider: ProviderKind::Gemini,
        })?;

    let model = request
        .model_override
        .as_deref()
        .map(str::trim)
        .filter(|m| !m.is_empty())
        .unwrap_or(config.default_model.as_str())
        .to_string();

    let mut parts = vec![json!({ "text": request.prompt })];
    if let Some(image) = request.image_data.as_deref() {
        let (mime_type, data) = split_image_data(image);
        parts.push(json!({ "inlineData": { "data": data, "mimeType": mime_type } }));
    }

    let body = json!({
        "contents": [{ "parts": parts }],
        "generationConfig": {
            "temperature": config.temperature,
            "maxOutputTokens": config.max_tokens,
            "topP": GEMINI_TOP_P,
            "topK": GEMINI_TOP_K,
        }
    });

    let response = http
        .post(format!("{}/models/{}:generateContent", config.base_url, model))
        .query(&[("key", api_key)])
        .json(&body)
        .send()
        .await
        .map_err(|e| ProviderError::generation(ProviderKind::Gemini, e.to_string()))?;

    let data = read_json(ProviderKind::Gemini, response).await?;

    let text = data
        .pointer("/candidates/0/content/parts/0/text")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();

    let usage = data.get("usageMetadata").map(|u| {
        let count = |field: &str| u.get(field).and_then(Value::as_u64).unwrap_or(0) as usize;
        TokenUsage::new(count("promptTokenCount"), count("candidatesTokenCount"))
    });

    Ok(GenerationResult {
        text,
        model_used: model,
        pulled: false,
        usage,
    })
}
