use reqwest::StatusCode;
use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};

use crate::domain::{PromptRequest, RunError};

use super::LlmProvider;
use super::env::{read_api_key, read_env_var, request_timeout};
use super::response::{non_empty_trimmed, truncate_message};

const PROVIDER_ID: &str = "gemini";
const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";
const DEFAULT_MODEL: &str = "gemini-2.5-flash-preview-04-17";
const ENV_API_KEY: &str = "GOOGLE_API_KEY";
const ENV_API_KEY_FALLBACK: &str = "GOOGLE_GENAI_API_KEY";
const ENV_BASE_URL: &str = "THEORYBENCH_GEMINI_BASE_URL";

/// The generateContent endpoint has no system role in this wire shape, so the
/// system text is folded into the user content with a blank line between.
#[derive(Debug)]
pub struct GeminiProvider {
    api_key: String,
    api_base_url: String,
    model: String,
    client: Client,
}

impl GeminiProvider {
    pub fn from_env() -> Result<Self, RunError> {
        let api_key = read_api_key("Gemini", &[ENV_API_KEY, ENV_API_KEY_FALLBACK])?;
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
            return Err(RunError::config("Gemini API key must not be empty"));
        }
        let api_base_url = api_base_url.into();
        if api_base_url.trim().is_empty() {
            return Err(RunError::config("Gemini API base URL must not be empty"));
        }
        let client = Client::builder()
            .timeout(request_timeout()?)
            .build()
            .map_err(|err| {
                RunError::internal(format!("failed to create Gemini HTTP client: {err}"))
            })?;
        Ok(Self {
            api_key,
            api_base_url,
            model: model.unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            client,
        })
    }

    fn model_id(&self, request: &PromptRequest) -> String {
        let model = request
            .model_override
            .clone()
            .unwrap_or_else(|| self.model.clone());
        // Accept fully qualified "models/<id>" overrides.
        model
            .strip_prefix("models/")
            .map(str::to_string)
            .unwrap_or(model)
    }

    fn endpoint_url(&self, request: &PromptRequest) -> String {
        format!(
            "{}/v1beta/models/{}:generateContent",
            self.api_base_url.trim_end_matches('/'),
            self.model_id(request)
        )
    }

    fn build_request_payload(&self, request: &PromptRequest) -> GenerateContentRequest {
        let merged = if request.system_text.is_empty() {
            request.user_text.clone()
        } else {
            format!("{}\n\n{}", request.system_text, request.user_text)
        };
        GenerateContentRequest {
            contents: vec![Content {
                parts: vec![Part { text: merged }],
            }],
            generation_config: GenerationConfig {
                temperature: request.temperature,
                max_output_tokens: request.max_output_tokens,
            },
        }
    }

    fn map_success_response(&self, body: &str) -> Result<String, RunError> {
        let response: GenerateContentResponse = serde_json::from_str(body).map_err(|err| {
            RunError::invalid_response(format!("Gemini response decode failed: {err}"))
        })?;
        let joined = response
            .candidates
            .first()
            .map(|candidate| {
                candidate
                    .content
                    .parts
                    .iter()
                    .map(|part| part.text.as_str())
                    .collect::<Vec<_>>()
                    .join("")
            })
            .unwrap_or_default();
        non_empty_trimmed("Gemini", &joined)
    }
}

impl LlmProvider for GeminiProvider {
    fn provider_id(&self) -> &str {
        PROVIDER_ID
    }

    fn query(&self, request: &PromptRequest) -> Result<String, RunError> {
        let payload = self.build_request_payload(request);
        let response = self
            .client
            .post(self.endpoint_url(request))
            .header("x-goog-api-key", &self.api_key)
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
struct GenerateContentRequest {
    contents: Vec<Content>,
    #[serde(rename = "generationConfig")]
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize, Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Part {
    #[serde(default)]
    text: String,
}

#[derive(Debug, Serialize)]
struct GenerationConfig {
    temperature: f32,
    #[serde(rename = "maxOutputTokens", skip_serializing_if = "Option::is_none")]
    max_output_tokens: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Content,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    #[serde(default)]
    error: Option<ErrorDetail>,
}

#[derive(Debug, Deserialize)]
struct ErrorDetail {
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

fn map_http_error(status: StatusCode, body: &str) -> RunError {
    let detail = serde_json::from_str::<ErrorEnvelope>(body)
        .ok()
        .and_then(|envelope| envelope.error);
    let api_status = detail.as_ref().and_then(|d| d.status.as_deref());

    if matches!(api_status, Some("UNAUTHENTICATED" | "PERMISSION_DENIED"))
        || status == StatusCode::UNAUTHORIZED
        || status == StatusCode::FORBIDDEN
    {
        return RunError::Auth;
    }
    if matches!(api_status, Some("RESOURCE_EXHAUSTED")) || status == StatusCode::TOO_MANY_REQUESTS {
        return RunError::RateLimited;
    }
    if matches!(api_status, Some("DEADLINE_EXCEEDED"))
        || status == StatusCode::REQUEST_TIMEOUT
        || status == StatusCode::GATEWAY_TIMEOUT
    {
        return RunError::Timeout;
    }

    let message = detail
        .and_then(|d| d.message)
        .unwrap_or_else(|| truncate_message(body));
    RunError::Transport {
        message: format!("Gemini API returned HTTP {status}: {message}"),
    }
}

fn map_transport_error(error: reqwest::Error) -> RunError {
    if error.is_timeout() {
        return RunError::Timeout;
    }
    RunError::Transport {
        message: format!("Gemini transport error: {error}"),
    }
}
