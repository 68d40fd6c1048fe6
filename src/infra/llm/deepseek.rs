use reqwest::blocking::Client;

use crate::domain::{PromptRequest, RunError};

use super::LlmProvider;
use super::env::{read_api_key, read_env_var, request_timeout};
use super::openai::{
    ChatCompletionsRequest, build_chat_payload, chat_completions_url, extract_chat_text,
    map_chat_http_error, map_transport_error,
};

const PROVIDER_ID: &str = "deepseek";
const DEFAULT_BASE_URL: &str = "https://api.deepseek.com";
const DEFAULT_MODEL: &str = "deepseek-chat";
const DEFAULT_MAX_TOKENS: u32 = 2048;
const ENV_API_KEY: &str = "DEEPSEEK_API_KEY";
const ENV_BASE_URL: &str = "THEORYBENCH_DEEPSEEK_BASE_URL";

/// DeepSeek exposes an OpenAI-compatible chat endpoint, so this adapter only
/// differs from the OpenAI one in credentials, base URL, and default model.
#[derive(Debug)]
pub struct DeepSeekProvider {
    api_key: String,
    api_base_url: String,
    model: String,
    client: Client,
}

impl DeepSeekProvider {
    pub fn from_env() -> Result<Self, RunError> {
        let api_key = read_api_key("DeepSeek", &[ENV_API_KEY])?;
        let api_base_url =
            read_env_var(ENV_BASE_URL)?.unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
        Self::with_config(api_key, api_base_url, None)
    }

    pub fn with_config(
        api_key: impl Into<String>,
        api_base_url: impl Into<String>,
        model: Option<String>,
    ) -> Result<Self, RunError> {
        let api_key = api_key.into();
        if api_key.trim().is_empty() {
            return Err(RunError::config("DeepSeek API key must not be empty"));
        }
        let api_base_url = api_base_url.into();
        if api_base_url.trim().is_empty() {
            return Err(RunError::config("DeepSeek API base URL must not be empty"));
        }
        let client = Client::builder()
            .timeout(request_timeout()?)
            .build()
            .map_err(|err| {
                RunError::internal(format!("failed to create DeepSeek HTTP client: {err}"))
            })?;
        Ok(Self {
            api_key,
            api_base_url,
            model: model.unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            client,
        })
    }

    fn build_request_payload(&self, request: &PromptRequest) -> ChatCompletionsRequest {
        build_chat_payload(&self.model, DEFAULT_MAX_TOKENS, request)
    }
}

impl LlmProvider for DeepSeekProvider {
    fn provider_id(&self) -> &str {
        PROVIDER_ID
    }

    fn query(&self, request: &PromptRequest) -> Result<String, RunError> {
        let payload = self.build_request_payload(request);
        let response = self
            .client
            .post(chat_completions_url(&self.api_base_url))
            .bearer_auth(&self.api_key)
            .header("content-type", "application/json")
            .json(&payload)
            .send()
            .map_err(|err| map_transport_error("DeepSeek", err))?;

        let status = response.status();
        let body = response
            .text()
            .map_err(|err| map_transport_error("DeepSeek", err))?;
        if !status.is_success() {
            return Err(map_chat_http_error("DeepSeek", status, &body));
        }
        extract_chat_text("DeepSeek", &body)
    }
}
