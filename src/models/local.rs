use async_trait::async_trait;

use super::traits::Provider;
use super::types::{GenerationRequest, GenerationResult, ProviderConfig};
use crate::ollama::{self, OllamaClient};
use crate::utils::ProviderError;

/// Local Ollama backend with on-demand model pulls
pub struct OllamaProvider {
    client: OllamaClient,
    config: ProviderConfig,
}

impl OllamaProvider {
    pub fn new(client: OllamaClient, config: ProviderConfig) -> Self {
        Self { client, config }
    }

    pub fn client(&self) -> &OllamaClient {
        &self.client
    }
}

#[async_trait]
impl Provider for OllamaProvider {
    fn config(&self) -> &ProviderConfig {
        &self.config
    }

    async fn list_models(&self) -> Vec<String> {
        self.client.list_models().await
    }

    async fn generate(&self, request: &GenerationRequest) -> Result<GenerationResult, ProviderError> {
        ollama::generate(&self.client, &self.config, request).await
    }
}
