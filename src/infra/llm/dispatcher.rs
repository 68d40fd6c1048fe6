use crate::domain::RunError;

use super::anthropic::AnthropicProvider;
use super::deepseek::DeepSeekProvider;
use super::gemini::GeminiProvider;
use super::openai::OpenAiProvider;
use super::provider::LlmProvider;

pub const CANONICAL_PROVIDERS: [&str; 4] = ["chatgpt", "claude", "deepseek", "gemini"];

/// Resolve a user-supplied provider name to its canonical form. Aliases keep
/// older run scripts working.
pub fn canonical_provider_name(name: &str) -> Option<&'static str> {
    match name.trim().to_ascii_lowercase().as_str() {
        "chatgpt" | "openai" | "gpt" => Some("chatgpt"),
        "claude" | "anthropic" => Some("claude"),
        "gemini" | "google" => Some("gemini"),
        "deepseek" => Some("deepseek"),
        _ => None,
    }
}

/// Build a fresh adapter for `name`. A new instance is constructed on every
/// call so credential or base-URL changes in the environment take effect
/// without restarting a batch driver.
pub fn create_provider(name: &str) -> Result<Box<dyn LlmProvider>, RunError> {
    let canonical = canonical_provider_name(name).ok_or_else(|| {
        RunError::config(format!(
            "unknown provider '{name}'; supported: {}",
            CANONICAL_PROVIDERS.join(", ")
        ))
    })?;
    match canonical {
        "chatgpt" => Ok(Box::new(OpenAiProvider::from_env()?)),
        "claude" => Ok(Box::new(AnthropicProvider::from_env()?)),
        "gemini" => Ok(Box::new(GeminiProvider::from_env()?)),
        "deepseek" => Ok(Box::new(DeepSeekProvider::from_env()?)),
        _ => unreachable!("canonical_provider_name only returns known names"),
    }
}

#[cfg(test)]
mod tests {
    use super::{CANONICAL_PROVIDERS, canonical_provider_name, create_provider};
    use crate::domain::RunError;

    #[test]
    fn canonical_names_resolve_to_themselves() {
        for name in CANONICAL_PROVIDERS {
            assert_eq!(canonical_provider_name(name), Some(name));
        }
    }

    #[test]
    fn aliases_resolve_to_canonical_names() {
        assert_eq!(canonical_provider_name("openai"), Some("chatgpt"));
        assert_eq!(canonical_provider_name("GPT"), Some("chatgpt"));
        assert_eq!(canonical_provider_name("Anthropic"), Some("claude"));
        assert_eq!(canonical_provider_name("google"), Some("gemini"));
        assert_eq!(canonical_provider_name(" deepseek "), Some("deepseek"));
    }

    #[test]
    fn unknown_provider_error_enumerates_supported_names() {
        let err = create_provider("watson").expect_err("unknown provider must fail");
        assert!(matches!(
            err,
            RunError::Config { message }
            if message == "unknown provider 'watson'; supported: chatgpt, claude, deepseek, gemini"
        ));
    }
}
