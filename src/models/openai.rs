use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::{debug, info, warn};

use super::normalize::normalize;
use super::traits::Provider;
use super::types::{GenerationRequest, GenerationResult, ProviderConfig, ProviderKind, TokenUsage};
use super::wire::read_json;
use crate::constants::{owned_list, CATALOG_TIMEOUT_MS, DEFAULT_OPENAI_MODELS};
use crate::utils::ProviderError;

#[derive(Debug, Deserialize)]
struct ModelsResponse {
    data: Vec<ModelInfo>,
}

#[derive(Debug, Deserialize)]
struct ModelInfo {
    id: String,
}

#[derive(Debug, Deserialize)]
struct Usage {
    prompt_tokens: usize,
    completion_tokens: usize,
    total_tokens: usize,
}

/// OpenAI chat-completions backend
pub struct OpenAIProvider {
    http: Client,
    config: ProviderConfig,
}

impl OpenAIProvider {
    pub fn new(http: Client, config: ProviderConfig) -> Self {
        Self { http, config }
    }
}

#[async_trait]
impl Provider for OpenAIProvider {
    fn config(&self) -> &ProviderConfig {
        &self.config
    }

    async fn list_models(&self) -> Vec<String> {
        list_models(&self.http, &self.config).await
    }

    async fn generate(&self, request: &GenerationRequest) -> Result<GenerationResult, ProviderError> {
        generate(&self.http, &self.config, request).await
    }
}

/// Models able to take image content parts
fn supports_vision(model: &str) -> bool {
    model.contains("gpt-4o") || model.contains("gpt-4-vision")
}

/// List chat models, falling back to the static list on any failure
pub async fn list_models(http: &Client, config: &ProviderConfig) -> Vec<String> {
    let Some(api_key) = config.api_key.as_deref() else {
        debug!("OpenAI API key not available, using default models");
        return owned_list(DEFAULT_OPENAI_MODELS);
    };

    match fetch_models(http, config, api_key).await {
        Ok(models) if !models.is_empty() => {
            info!("Found {} OpenAI chat models", models.len());
            models
        },
        Ok(_) => owned_list(DEFAULT_OPENAI_MODELS),
        Err(err) => {
            warn!("{}; using default OpenAI models", err);
            owned_list(DEFAULT_OPENAI_MODELS)
        },
    }
}

async fn fetch_models(http: &Client, config: &ProviderConfig, api_key: &str) -> Result<Vec<String>, ProviderError> {
    let response = http
        .get(format!("{}/models", config.base_url))
        .bearer_auth(api_key)
        .timeout(Duration::from_millis(CATALOG_TIMEOUT_MS))
        .send()
        .await
        .map_err(|e| ProviderError::CatalogUnavailable(e.to_string()))?;

    if !response.status().is_success() {
        return Err(ProviderError::CatalogUnavailable(format!(
            "OpenAI model listing returned status {}",
            response.status()
        )));
    }

    let listing: ModelsResponse = response
        .json()
        .await
        .map_err(|e| ProviderError::CatalogUnavailable(e.to_string()))?;

    let mut models: Vec<String> = listing
        .data
        .into_iter()
        .map(|m| m.id)
        .filter(|id| id.contains("gpt"))
        .collect();
    models.sort();
    Ok(models)
}

/// Send one chat-completion request
pub async fn generate(
    http: &Client,
    config: &ProviderConfig,
    request: &GenerationRequest,
) -> Result<GenerationResult, ProviderError> {
    let api_key = config
        .api_key
        .as_deref()
        .ok_or(ProviderError::MissingCredential {
            provider: ProviderKind::OpenAI,
        })?;

    let model = normalize(
        request
            .model_override
            .as_deref()
            .map(str::trim)
            .filter(|m| !m.is_empty())
            .unwrap_or(config.default_model.as_str()),
        ProviderKind::OpenAI,
    );

    let content = match request.image_data.as_deref() {
        Some(image) if supports_vision(&model) => json!([
            { "type": "text", "text": request.prompt },
            { "type": "image_url", "image_url": { "url": image, "detail": "high" } }
        ]),
        Some(_) => {
            info!("Model {} does not support images. Sending text only.", model);
            json!(request.prompt)
        },
        None => json!(request.prompt),
    };

    let body = json!({
        "model": model,
        "messages": [{ "role": "user", "content": content }],
        "temperature": config.temperature,
        "max_tokens": config.max_tokens,
    });

    let response = http
        .post(format!("{}/chat/completions", config.base_url))
        .bearer_auth(api_key)
        .json(&body)
        .send()
        .await
        .map_err(|e| ProviderError::generation(ProviderKind::OpenAI, e.to_string()))?;

    let data = read_json(ProviderKind::OpenAI, response).await?;

    let text = data
        .pointer("/choices/0/message/content")
        .and_then(Value::as_str)
        .ok_or_else(|| ProviderError::generation(ProviderKind::OpenAI, "response has no message content"))?
        .to_string();

    let usage = data
        .get("usage")
        .cloned()
        .and_then(|u| serde_json::from_value::<Usage>(u).ok())
        .map(|u| TokenUsage {
            prompt_tokens: u.prompt_tokens,
            completion_tokens: u.completion_tokens,
            total_tokens: u.total_tokens,
        });

    Ok(GenerationResult {
        text,
        model_used: model,
        pulled: false,
        usage,
    })
}
