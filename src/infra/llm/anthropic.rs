use reqwest::StatusCode;
use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};

use crate::domain::{PromptRequest, RunError};

use super::LlmProvider;
use super::env::{read_api_key, read_env_var, request_timeout};
use super::response::{non_empty_trimmed, truncate_message};

const PROVIDER_ID: &str = "claude";
const API_VERSION: &str = "2023-06-01";
const DEFAULT_BASE_URL: &str = "https://api.anthropic.com";
const DEFAULT_MODEL: &str = "claude-3-haiku-20240307";
const DEFAULT_MAX_TOKENS: u32 = 1024;
const ENV_API_KEY: &str = "ANTHROPIC_API_KEY";
const ENV_BASE_URL: &str = "THEORYBENCH_ANTHROPIC_BASE_URL";

#[derive(Debug)]
pub struct AnthropicProvider {
    api_key: String,
    api_base_url: String,
    model: String,
    client: Client,
}

impl AnthropicProvider {
    pub fn from_env() -> Result<Self, RunError> {
        let api_key = read_api_key("Anthropic", &[ENV_API_KEY])?;
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
            return Err(RunError::config("Anthropic API key must not be empty"));
        }
        let api_base_url = api_base_url.into();
        if api_base_url.trim().is_empty() {
            return Err(RunError::config("Anthropic API base URL must not be empty"));
        }
        let client = Client::builder()
            .timeout(request_timeout()?)
            .build()
            .map_err(|err| {
                RunError::internal(format!("failed to create Anthropic HTTP client: {err}"))
            })?;
        Ok(Self {
            api_key,
            api_base_url,
            model: model.unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            client,
        })
    }

    fn endpoint_url(&self) -> String {
        format!("{}/v1/messages", self.api_base_url.trim_end_matches('/'))
    }

    fn build_request_payload(&self, request: &PromptRequest) -> MessagesRequest {
        MessagesRequest {
            model: request
                .model_override
                .clone()
                .unwrap_or_else(|| self.model.clone()),
            max_tokens: request.max_output_tokens.unwrap_or(DEFAULT_MAX_TOKENS),
            temperature: request.temperature,
            system: request.system_text.clone(),
            messages: vec![Message {
                role: "user".to_string(),
                content: request.user_text.clone(),
            }],
        }
    }

    fn map_success_response(&self, body: &str) -> Result<String, RunError> {
        let response: MessagesResponse = serde_json::from_str(body).map_err(|err| {
            RunError::invalid_response(format!("Anthropic response decode failed: {err}"))
        })?;
        let joined = response
            .content
            .iter()
            .filter_map(ContentBlock::as_text)
            .collect::<Vec<_>>()
            .join("");
        non_empty_trimmed("Anthropic", &joined)
    }
}

impl LlmProvider for AnthropicProvider {
    fn provider_id(&self) -> &str {
        PROVIDER_ID
    }

    fn query(&self, request: &PromptRequest) -> Result<String, RunError> {
        let payload = self.build_request_payload(request);
        let response = self
            .client
            .post(self.endpoint_url())
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", API_VERSION)
            .header("content-type", "application/json")
            .json(&payload)
            .send()
            .map_err(map_transport_error)?;

        let status = response.status();
        let body = response.text().map_err(map_transport_error)?;
        if !status.is_success() {
            return Err(map_http_error(status, &body));
        }
        self.map_success_response(&body)
    }
}

#[derive(Debug, Serialize)]
struct MessagesRequest {
    model: String,
    max_tokens: u32,
    temperature: f32,
    system: String,
    messages: Vec<Message>,
}

#[derive(Debug, Serialize)]
struct Message {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    #[serde(default)]
    content: Vec<ContentBlock>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentBlock {
    Text {
        text: String,
    },
    #[serde(other)]
    Other,
}

impl ContentBlock {
    fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text { text } => Some(text),
            Self::Other => None,
        }
    }
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    #[serde(default)]
    error: Option<ErrorDetail>,
}

#[derive(Debug, Deserialize)]
struct ErrorDetail {
    #[serde(rename = "type")]
    error_type: String,
    message: String,
}

fn map_http_error(status: StatusCode, body: &str) -> RunError {
    let detail = serde_json::from_str::<ErrorEnvelope>(body)
        .ok()
        .and_then(|envelope| envelope.error);
    let error_type = detail.as_ref().map(|d| d.error_type.as_str());

    if matches!(
        error_type,
        Some("authentication_error" | "invalid_api_key_error")
    ) || status == StatusCode::UNAUTHORIZED
        || status == StatusCode::FORBIDDEN
    {
        return RunError::Auth;
    }
    if matches!(error_type, Some("rate_limit_error")) || status == StatusCode::TOO_MANY_REQUESTS {
        return RunError::RateLimited;
    }
    if matches!(error_type, Some("timeout_error"))
        || status == StatusCode::REQUEST_TIMEOUT
        || status == StatusCode::GATEWAY_TIMEOUT
    {
        return RunError::Timeout;
    }

    let message = detail
        .map(|d| d.message)
        .unwrap_or_else(|| truncate_message(body));
    RunError::Transport {
        message: format!("Anthropic API returned HTTP {status}: {message}"),
    }
}

fn map_transport_error(error: reqwest::Error) -> RunError {
    if error.is_timeout() {
        return RunError::Timeout;
    }
    RunError::Transport {
        message: format!("Anthropic transport error: {error}"),
    }
}
