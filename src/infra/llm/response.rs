use crate::domain::RunError;

const MAX_ERROR_MESSAGE_LEN: usize = 256;

/// Cap an HTTP error body so surfaced errors stay readable in logs.
pub(crate) fn truncate_message(body: &str) -> String {
    let trimmed = body.trim();
    if trimmed.len() <= MAX_ERROR_MESSAGE_LEN {
        return trimmed.to_string();
    }
    let mut cut = MAX_ERROR_MESSAGE_LEN;
    while !trimmed.is_char_boundary(cut) {
        cut -= 1;
    }
    format!("{}…", &trimmed[..cut])
}

/// Trim the completion text, rejecting responses with no usable content.
pub(crate) fn non_empty_trimmed(provider: &str, text: &str) -> Result<String, RunError> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(RunError::invalid_response(format!(
            "{provider} returned an empty completion"
        )));
    }
    Ok(trimmed.to_string())
}
