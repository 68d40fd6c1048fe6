use std::time::Duration;

use crate::domain::RunError;

pub(crate) const ENV_GLOBAL_TIMEOUT_SECS: &str = "THEORYBENCH_LLM_TIMEOUT_SECS";
pub(crate) const DEFAULT_TIMEOUT: Duration = Duration::from_secs(120);

const PLACEHOLDER_VALUES: &[&str] = &[
    "changeme",
    "change-me",
    "your-api-key",
    "your_api_key",
    "placeholder",
    "todo",
    "...",
];

pub(crate) fn read_env_var(name: &str) -> Result<Option<String>, RunError> {
    match std::env::var(name) {
        Ok(value) => Ok(Some(value)),
        Err(std::env::VarError::NotPresent) => Ok(None),
        Err(error) => Err(RunError::config(format!(
            "{name} could not be read: {error}"
        ))),
    }
}

/// Read a credential from `names` in order, rejecting placeholder values so a
/// templated `.env` copied verbatim fails at construction instead of at the
/// first HTTP 401.
pub(crate) fn read_api_key(provider: &str, names: &[&str]) -> Result<String, RunError> {
    for name in names {
        if let Some(value) = read_env_var(name)? {
            if is_placeholder(&value) {
                return Err(RunError::config(format!(
                    "{name} holds a placeholder value, set a real {provider} API key"
                )));
            }
            return Ok(value);
        }
    }
    Err(RunError::config(format!(
        "{provider} API key is missing (set {})",
        names.join(" or ")
    )))
}

pub(crate) fn is_placeholder(value: &str) -> bool {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return true;
    }
    if trimmed.starts_with('<') && trimmed.ends_with('>') {
        return true;
    }
    let lowered = trimmed.to_ascii_lowercase();
    PLACEHOLDER_VALUES.contains(&lowered.as_str())
}

pub(crate) fn parse_timeout_seconds(name: &str, value: &str) -> Result<Duration, RunError> {
    let parsed = value
        .trim()
        .parse::<u64>()
        .map_err(|_| RunError::config(format!("{name} must be a positive integer in seconds")))?;
    if parsed == 0 {
        return Err(RunError::config(format!(
            "{name} must be greater than 0 seconds"
        )));
    }
    Ok(Duration::from_secs(parsed))
}

pub(crate) fn read_timeout_from_env(name: &str) -> Result<Option<Duration>, RunError> {
    let Some(value) = read_env_var(name)? else {
        return Ok(None);
    };
    Ok(Some(parse_timeout_seconds(name, &value)?))
}

/// Shared request timeout for every adapter, overridable through
/// `THEORYBENCH_LLM_TIMEOUT_SECS`.
pub(crate) fn request_timeout() -> Result<Duration, RunError> {
    Ok(read_timeout_from_env(ENV_GLOBAL_TIMEOUT_SECS)?.unwrap_or(DEFAULT_TIMEOUT))
}
