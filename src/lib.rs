pub mod app;
pub mod cli;
pub mod constants;
pub mod models;
pub mod ollama;
pub mod projects;
pub mod utils;

pub use app::{load_config, Config};
pub use models::{GenerationRequest, GenerationResult, Provider, ProviderKind, ProviderResolver};
pub use projects::ProjectStore;
pub use utils::{ProjectError, ProviderError};
