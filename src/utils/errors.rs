use thiserror::Error;

use crate::models::ProviderKind;

/// Errors raised while resolving a provider or generating a response
#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("{provider} API key not found")]
    MissingCredential { provider: ProviderKind },

    #[error("{provider} server is not running: {message}")]
    ProviderUnavailable {
        provider: ProviderKind,
        message: String,
    },

    #[error("Failed to pull model '{model}': {message}")]
    ModelPullFailed { model: String, message: String },

    #[error("{provider} generation error: {message}")]
    GenerationError {
        provider: ProviderKind,
        message: String,
    },

    /// Discovery failed. Always recovered by falling back to a static list.
    #[error("Model catalog unavailable: {0}")]
    CatalogUnavailable(String),

    #[error("Ollama CLI error: {0}")]
    Cli(String),
}

impl ProviderError {
    pub fn generation(provider: ProviderKind, message: impl Into<String>) -> Self {
        Self::GenerationError {
            provider,
            message: message.into(),
        }
    }

    /// Whether the caller may retry after fixing its environment
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::ProviderUnavailable { .. })
    }
}

/// Errors raised by the project store
#[derive(Error, Debug)]
pub enum ProjectError {
    #[error("Invalid project data: {0}")]
    InvalidProject(String),

    #[error("Project not found: {0}")]
    ProjectNotFound(String),

    #[error("File not found: {0}")]
    FileNotFound(String),

    #[error("Invalid path: {0}")]
    InvalidPath(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Git error: {0}")]
    Git(#[from] git2::Error),

    #[error("Metadata error: {0}")]
    Metadata(#[from] serde_json::Error),

    #[error("Archive error: {0}")]
    Archive(#[from] zip::result::ZipError),
}

/// Render an error together with its source chain
pub fn error_chain(err: &(dyn std::error::Error + 'static)) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}
