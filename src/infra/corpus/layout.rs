use std::path::{Path, PathBuf};

use crate::domain::Notation;

pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a helpful music theory assistant.";

/// Root directories of one experiment corpus. All lookups go through this so
/// tests can point the whole pipeline at a temporary tree.
#[derive(Debug, Clone)]
pub struct CorpusLayout {
    pub encoded_dir: PathBuf,
    pub prompts_dir: PathBuf,
    pub guides_dir: PathBuf,
    pub outputs_dir: PathBuf,
    pub system_prompt_fallback: String,
}

impl CorpusLayout {
    pub fn new(data_dir: &Path, outputs_dir: &Path) -> Self {
        let prompts_dir = data_dir.join("prompts");
        Self {
            encoded_dir: data_dir.join("encoded"),
            guides_dir: prompts_dir.join("guides"),
            prompts_dir,
            outputs_dir: outputs_dir.to_path_buf(),
            system_prompt_fallback: DEFAULT_SYSTEM_PROMPT.to_string(),
        }
    }

    pub fn with_system_prompt_fallback(mut self, fallback: impl Into<String>) -> Self {
        self.system_prompt_fallback = fallback.into();
        self
    }

    pub fn base_dir(&self) -> PathBuf {
        self.prompts_dir.join("base")
    }

    /// Per-question prompt directory in the legacy layout.
    pub fn questions_dir(&self, context: bool, notation: Notation) -> PathBuf {
        let context_dir = if context { "context" } else { "no_context" };
        self.prompts_dir
            .join("questions")
            .join(context_dir)
            .join(notation.name())
    }
}
