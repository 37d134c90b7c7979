use async_trait::async_trait;

use super::types::{GenerationRequest, GenerationResult, ProviderConfig};
use crate::utils::ProviderError;

/// Core trait that all provider backends implement
#[async_trait]
pub trait Provider: Send + Sync {
    /// Static settings this provider was built with
    fn config(&self) -> &ProviderConfig;

    /// Current catalog; falls back to a static list instead of failing
    async fn list_models(&self) -> Vec<String>;

    /// Answer a single stateless prompt
    async fn generate(&self, request: &GenerationRequest) -> Result<GenerationResult, ProviderError>;
}
