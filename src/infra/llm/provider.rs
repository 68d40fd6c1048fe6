use crate::domain::{PromptRequest, RunError};

/// Blocking seam between the run pipeline and a hosted model API.
///
/// `provider_id` is the canonical lowercase name used for dispatch and for
/// the per-provider output directory. `query` sends one assembled request
/// and returns the trimmed response text.
pub trait LlmProvider: Send + Sync + std::fmt::Debug {
    fn provider_id(&self) -> &str;

    fn query(&self, request: &PromptRequest) -> Result<String, RunError>;
}
