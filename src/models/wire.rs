use serde_json::Value;

use super::types::ProviderKind;
use crate::utils::ProviderError;

/// Extract the message of an `error` field, either `{"error": {"message": ..}}`
/// or `{"error": ".."}`
pub fn payload_error(body: &Value) -> Option<String> {
    let error = body.get("error")?;
    match error {
        Value::Null => None,
        Value::String(message) => Some(message.clone()),
        other => Some(
            other
                .get("message")
                .and_then(Value::as_str)
                .map(str::to_string)
                .unwrap_or_else(|| "Unknown error".to_string()),
        ),
    }
}

/// Read a provider response into JSON, mapping error payloads and
/// non-success statuses to `GenerationError`
pub async fn read_json(provider: ProviderKind, response: reqwest::Response) -> Result<Value, ProviderError> {
    let status = response.status();
    let text = response
        .text()
        .await
        .map_err(|e| ProviderError::generation(provider, e.to_string()))?;

    let body: Option<Value> = serde_json::from_str(&text).ok();
    if let Some(message) = body.as_ref().and_then(payload_error) {
        return Err(ProviderError::generation(provider, message));
    }
    if !status.is_success() {
        return Err(ProviderError::generation(provider, format!("HTTP {}: {}", status, text.trim())));
    }

    body.ok_or_else(|| ProviderError::generation(provider, "response was not valid JSON"))
}

/// Split an image into `(mime type, base64 payload)`.
///
/// Data URLs carry their own MIME type; bare base64 is assumed to be JPEG.
pub fn split_image_data(image: &str) -> (&str, &str) {
    if let Some(rest) = image.strip_prefix("data:") {
        if let Some((header, payload)) = rest.split_once(',') {
            let mime = header.split(';').next().filter(|m| !m.is_empty()).unwrap_or("image/jpeg");
            return (mime, payload);
        }
    }
    ("image/jpeg", image)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_payload_error_shapes() {
        assert_eq!(payload_error(&json!({"error": {"message": "bad key"}})), Some("bad key".to_string()));
        assert_eq!(payload_error(&json!({"error": "nope"})), Some("nope".to_string()));
        assert_eq!(payload_error(&json!({"error": null})), None);
        assert_eq!(payload_error(&json!({"choices": []})), None);
    }

    #[test]
    fn test_split_image_data() {
        assert_eq!(split_image_data("data:image/png;base64,AAA"), ("image/png", "AAA"));
        assert_eq!(split_image_data("AAA"), ("image/jpeg", "AAA"));
        assert_eq!(split_image_data("data:;base64,AAA"), ("image/jpeg", "AAA"));
    }
}
