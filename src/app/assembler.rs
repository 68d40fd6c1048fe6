use std::collections::HashMap;

use crate::domain::{PromptRequest, RunError};
use crate::infra::corpus::Guide;

pub const SECTION_FORMAT_PROMPT: &str = "format_prompt";
pub const SECTION_ENCODED_DATA: &str = "encoded_data";
pub const SECTION_GUIDES: &str = "guides";
pub const SECTION_QUESTION_PROMPT: &str = "question_prompt";

/// Order used by the legacy per-question datasets: format intro, encoded
/// source, guides, then the question.
pub const LEGACY_ORDERING: [&str; 4] = [
    SECTION_FORMAT_PROMPT,
    SECTION_ENCODED_DATA,
    SECTION_GUIDES,
    SECTION_QUESTION_PROMPT,
];

/// Order used by consolidated datasets, where the shared task statement
/// leads and the encoded source closes the prompt.
pub const CONSOLIDATED_ORDERING: [&str; 4] = [
    SECTION_QUESTION_PROMPT,
    SECTION_GUIDES,
    SECTION_FORMAT_PROMPT,
    SECTION_ENCODED_DATA,
];

/// Assembles one user prompt from resolved corpus components.
///
/// Sections are addressed by name so datasets can reorder or title them
/// without code changes. Empty sections are dropped, unknown names are
/// skipped, and the surviving sections are joined with blank lines, which
/// keeps assembly deterministic for identical inputs.
pub struct PromptAssembler {
    system_prompt: String,
    format_prompt: String,
    encoded_data: String,
    guides: Vec<Guide>,
    question_prompt: String,
    ordering: Vec<String>,
    section_headers: HashMap<String, String>,
}

impl PromptAssembler {
    pub fn new(
        system_prompt: impl Into<String>,
        format_prompt: impl Into<String>,
        encoded_data: impl Into<String>,
        guides: Vec<Guide>,
        question_prompt: impl Into<String>,
    ) -> Self {
        Self {
            system_prompt: system_prompt.into(),
            format_prompt: format_prompt.into(),
            encoded_data: encoded_data.into(),
            guides,
            question_prompt: question_prompt.into(),
            ordering: LEGACY_ORDERING.iter().map(|s| s.to_string()).collect(),
            section_headers: HashMap::new(),
        }
    }

    pub fn with_ordering(mut self, ordering: &[&str]) -> Self {
        self.ordering = ordering.iter().map(|s| s.to_string()).collect();
        self
    }

    pub fn with_section_headers(mut self, headers: &[(&str, &str)]) -> Self {
        self.section_headers = headers
            .iter()
            .map(|(name, title)| (name.to_string(), title.to_string()))
            .collect();
        self
    }

    pub fn build_user_prompt(&self) -> String {
        let mut sections = Vec::new();
        for name in &self.ordering {
            let content = match name.as_str() {
                SECTION_FORMAT_PROMPT => self.format_prompt.trim().to_string(),
                SECTION_ENCODED_DATA => self.encoded_data.trim().to_string(),
                SECTION_GUIDES => self
                    .guides
                    .iter()
                    .map(|guide| guide.text.trim())
                    .filter(|text| !text.is_empty())
                    .collect::<Vec<_>>()
                    .join("\n\n"),
                SECTION_QUESTION_PROMPT => self.question_prompt.trim().to_string(),
                _ => continue,
            };
            if content.is_empty() {
                continue;
            }
            match self.section_headers.get(name) {
                Some(title) => sections.push(format!("{title}\n{content}")),
                None => sections.push(content),
            }
        }
        sections.join("\n\n")
    }

    pub fn build(
        &self,
        temperature: f32,
        model_override: Option<String>,
        max_output_tokens: Option<u32>,
    ) -> Result<PromptRequest, RunError> {
        Ok(
            PromptRequest::new(self.system_prompt.trim(), self.build_user_prompt(), temperature)?
                .with_model_override(model_override)
                .with_max_output_tokens(max_output_tokens),
        )
    }
}
