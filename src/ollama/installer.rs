use tracing::info;

use super::client::OllamaClient;
use crate::models::{PullOutcome, PullStatus};
use crate::utils::{or_else_try, ProviderError};

/// Whether a catalog has the model; an untagged name matches its `:latest` tag
pub fn catalog_contains(models: &[String], model: &str) -> bool {
    models.iter().any(|candidate| {
        candidate == model || (!model.contains(':') && candidate.strip_suffix(":latest") == Some(model))
    })
}

/// Download a model unconditionally: HTTP pull first, then the CLI
pub async fn install_model(client: &OllamaClient, model: &str) -> Result<PullStatus, ProviderError> {
    let via_api = async {
        client
            .pull_via_api(model)
            .await
            .map(|_| PullStatus::PulledViaApi)
    };
    let via_cli = async {
        client
            .pull_via_cli(model)
            .await
            .map(|_| PullStatus::PulledViaCli)
    };

    match or_else_try(&format!("Pulling '{}' via the Ollama API", model), via_api, via_cli).await {
        Ok(status) => {
            info!("Successfully pulled model '{}'", model);
            Ok(status)
        },
        Err(err) => Err(ProviderError::ModelPullFailed {
            model: model.to_string(),
            message: format!("both the API and the CLI failed (last error: {})", err),
        }),
    }
}

/// Ensure a model is available, pulling it when the catalog lacks it
pub async fn ensure_model(client: &OllamaClient, model: &str) -> Result<PullOutcome, ProviderError> {
    let available = client.list_models().await;
    if catalog_contains(&available, model) {
        info!("Model '{}' is already available.", model);
        return Ok(PullOutcome::new(model, PullStatus::AlreadyPresent));
    }

    info!("Model '{}' not found locally, pulling it...", model);
    let status = install_model(client, model).await?;
    Ok(PullOutcome::new(model, status))
}
