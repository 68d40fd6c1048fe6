use reqwest::StatusCode;
use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};

use crate::domain::{PromptRequest, RunError};

use super::LlmProvider;
use super::env::{read_api_key, read_env_var, request_timeout};
use super::response::{non_empty_trimmed, truncate_message};

const PROVIDER_ID: &str = "chatgpt";
const DEFAULT_BASE_URL: &str = "https://api.openai.com";
const DEFAULT_MODEL: &str = "gpt-4.1-nano-2025-04-14";
const DEFAULT_MAX_TOKENS: u32 = 2048;
const ENV_API_KEY: &str = "OPENAI_API_KEY";
const ENV_BASE_URL: &str = "THEORYBENCH_OPENAI_BASE_URL";

#[derive(Debug)]
pub struct OpenAiProvider {
    api_key: String,
    api_base_url: String,
    model: String,
    client: Client,
}

impl OpenAiProvider {
    pub fn from_env() -> Result<Self, RunError> {
        let api_key = read_api_key("OpenAI", &[ENV_API_KEY])?;
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
            return Err(RunError::config("OpenAI API key must not be empty"));
        }
        let api_base_url = api_base_url.into();
        if api_base_url.trim().is_empty() {
            return Err(RunError::config("OpenAI API base URL must not be empty"));
        }
        let client = Client::builder()
            .timeout(request_timeout()?)
            .build()
            .map_err(|err| {
                RunError::internal(format!("failed to create OpenAI HTTP client: {err}"))
            })?;
        Ok(Self {
            api_key,
            api_base_url,
            model: model.unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            client,
        })
    }

    fn endpoint_url(&self) -> String {
        chat_completions_url(&self.api_base_url)
    }

    fn build_request_payload(&self, request: &PromptRequest) -> ChatCompletionsRequest {
        build_chat_payload(&self.model, DEFAULT_MAX_TOKENS, request)
    }
}

impl LlmProvider for OpenAiProvider {
    fn provider_id(&self) -> &str {
        PROVIDER_ID
    }

    fn query(&self, request: &PromptRequest) -> Result<String, RunError> {
        let payload = self.build_request_payload(request);
        let response = self
            .client
            .post(self.endpoint_url())
            .bearer_auth(&self.api_key)
            .header("content-type", "application/json")
            .json(&payload)
            .send()
            .map_err(|err| map_transport_error("OpenAI", err))?;

        let status = response.status();
        let body = response
            .text()
            .map_err(|err| map_transport_error("OpenAI", err))?;
        if !status.is_success() {
            return Err(map_chat_http_error("OpenAI", status, &body));
        }
        extract_chat_text("OpenAI", &body)
    }
}

pub(crate) fn chat_completions_url(api_base_url: &str) -> String {
    format!("{}/v1/chat/completions", api_base_url.trim_end_matches('/'))
}

pub(crate) fn build_chat_payload(
    model: &str,
    default_max_tokens: u32,
    request: &PromptRequest,
) -> ChatCompletionsRequest {
    ChatCompletionsRequest {
        model: request
            .model_override
            .clone()
            .unwrap_or_else(|| model.to_string()),
        messages: vec![
            ChatMessage {
                role: "system".to_string(),
                content: request.system_text.clone(),
            },
            ChatMessage {
                role: "user".to_string(),
                content: request.user_text.clone(),
            },
        ],
        temperature: request.temperature,
        max_tokens: request.max_output_tokens.unwrap_or(default_max_tokens),
    }
}

pub(crate) fn extract_chat_text(display_name: &str, body: &str) -> Result<String, RunError> {
    let response: ChatCompletionsResponse = serde_json::from_str(body).map_err(|err| {
        RunError::invalid_response(format!("{display_name} response decode failed: {err}"))
    })?;
    let content = response
        .choices
        .first()
        .and_then(|choice| choice.message.content.as_deref())
        .ok_or_else(|| {
            RunError::invalid_response(format!(
                "{display_name} response did not include message content"
            ))
        })?;
    non_empty_trimmed(display_name, content)
}

pub(crate) fn map_chat_http_error(display_name: &str, status: StatusCode, body: &str) -> RunError {
    let detail = serde_json::from_str::<ChatErrorEnvelope>(body)
        .ok()
        .and_then(|envelope| envelope.error);
    let error_type = detail.as_ref().and_then(|d| d.error_type.as_deref());

    if matches!(error_type, Some("invalid_api_key" | "authentication_error"))
        || status == StatusCode::UNAUTHORIZED
        || status == StatusCode::FORBIDDEN
    {
        return RunError::Auth;
    }
    if matches!(error_type, Some("rate_limit_exceeded" | "insufficient_quota"))
        || status == StatusCode::TOO_MANY_REQUESTS
    {
        return RunError::RateLimited;
    }
    if status == StatusCode::REQUEST_TIMEOUT || status == StatusCode::GATEWAY_TIMEOUT {
        return RunError::Timeout;
    }

    let message = detail
        .map(|d| d.message)
        .unwrap_or_else(|| truncate_message(body));
    RunError::Transport {
        message: format!("{display_name} API returned HTTP {status}: {message}"),
    }
}

pub(crate) fn map_transport_error(display_name: &str, error: reqwest::Error) -> RunError {
    if error.is_timeout() {
        return RunError::Timeout;
    }
    RunError::Transport {
        message: format!("{display_name} transport error: {error}"),
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct ChatCompletionsRequest {
    pub(crate) model: String,
    pub(crate) messages: Vec<ChatMessage>,
    pub(crate) temperature: f32,
    pub(crate) max_tokens: u32,
}

#[derive(Debug, Serialize)]
pub(crate) struct ChatMessage {
    pub(crate) role: String,
    pub(crate) content: String,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionsResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ChatResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatErrorEnvelope {
    #[serde(default)]
    error: Option<ChatErrorDetail>,
}

#[derive(Debug, Deserialize)]
struct ChatErrorDetail {
    message: String,
    #[serde(rename = "type", default)]
    error_type: Option<String>,
}
