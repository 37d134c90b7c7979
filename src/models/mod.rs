// Gateway module for models - follows the Train Station Pattern
// All external access must go through this gateway

// Private submodules - not directly accessible from outside
mod gemini;
mod local;
mod normalize;
mod openai;
mod resolver;
mod traits;
mod types;
mod wire;

// Public re-exports - the ONLY way to access model functionality
pub use gemini::GeminiProvider;
pub use local::OllamaProvider;
pub use normalize::normalize;
pub use openai::OpenAIProvider;
pub use resolver::ProviderResolver;
pub use traits::Provider;
pub use types::{
    GenerationRequest, GenerationResult, ModelCatalog, ProviderConfig, ProviderKind, PullOutcome,
    PullStatus, SystemInfo, TokenUsage,
};
