mod anthropic;
mod deepseek;
mod dispatcher;
mod env;
mod gemini;
mod openai;
mod provider;
mod response;

pub use anthropic::AnthropicProvider;
pub use deepseek::DeepSeekProvider;
pub use dispatcher::{CANONICAL_PROVIDERS, canonical_provider_name, create_provider};
pub use gemini::GeminiProvider;
pub use openai::OpenAiProvider;
pub use provider::LlmProvider;
