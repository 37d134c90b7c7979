use super::types::ProviderKind;

/// Short OpenAI aliases and the canonical names they stand for
const OPENAI_ALIASES: &[(&str, &str)] = &[("o4", "gpt-4o"), ("o4-mini", "gpt-4o-mini")];

/// Translate a requested model name into the provider's canonical name.
///
/// Pure and idempotent: canonical names are never themselves aliases.
pub fn normalize(requested: &str, provider: ProviderKind) -> String {
    let requested = requested.trim();
    if provider == ProviderKind::OpenAI {
        if let Some((_, canonical)) = OPENAI_ALIASES.iter().find(|(alias, _)| *alias == requested) {
            return canonical.to_string();
        }
    }
    requested.to_string()
}
