/// Ollama integration module - Gateway
mod catalog;
mod cli;
mod client;
mod detector;
mod flow;
mod guide;
mod installer;

pub use catalog::{decode_tags, parse_list_output};
pub use cli::{is_installed, OllamaCli, SystemOllamaCli};
#[cfg(test)]
pub use cli::MockOllamaCli;
pub use client::{is_model_not_found, GenerateFailure, GenerateOptions, GenerateReply, OllamaClient};
pub use detector::{candidate_urls, probe};
pub use flow::generate;
pub use guide::start_hint;
pub use installer::{catalog_contains, ensure_model, install_model};
