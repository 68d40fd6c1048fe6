use std::path::{Path, PathBuf};

use chrono::Utc;
use serde_json::json;
use tracing::{info, warn};

use crate::app::assembler::{CONSOLIDATED_ORDERING, PromptAssembler};
use crate::domain::{Notation, PromptRequest, RunError};
use crate::infra::corpus::{
    CorpusLayout, Guide, QuestionSource, bundle_path, load_base_prompt, load_encoded, load_guides,
    load_question, load_system_prompt, output_path, write_atomic,
};
use crate::infra::llm::LlmProvider;

const MAX_INLINE_COMPONENT_CHARS: usize = 200_000;

/// Parameters for one prompt run against one provider.
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub file_id: String,
    pub notation: Notation,
    pub context: bool,
    pub dataset: String,
    pub exam_date: Option<String>,
    pub temperature: f32,
    pub model_override: Option<String>,
    pub max_output_tokens: Option<u32>,
    pub save: bool,
}

#[derive(Debug)]
pub struct RunOutcome {
    pub response: String,
    pub output_path: Option<PathBuf>,
}

struct ResolvedPrompt {
    system_prompt: String,
    format_prompt: String,
    encoded_data: String,
    encoded_path: PathBuf,
    guides: Vec<Guide>,
    question_prompt: String,
    question_path: PathBuf,
    question_source: QuestionSource,
}

/// Resolves corpus inputs, assembles the prompt, queries one provider, and
/// optionally persists the response together with a metadata bundle.
pub struct PromptRunner<'a> {
    layout: &'a CorpusLayout,
    config: RunConfig,
}

impl<'a> PromptRunner<'a> {
    pub fn new(layout: &'a CorpusLayout, config: RunConfig) -> Self {
        Self { layout, config }
    }

    /// Response path for this run, keyed by the provider's canonical name.
    pub fn output_path(&self, provider_label: &str) -> PathBuf {
        output_path(
            &self.layout.outputs_dir,
            provider_label,
            &self.config.dataset,
            &self.config.file_id,
            self.config.notation,
            self.config.context,
        )
    }

    pub fn run(&self, provider: &dyn LlmProvider) -> Result<RunOutcome, RunError> {
        let resolved = self.resolve()?;
        let request = self.build_request(&resolved)?;
        info!(
            file_id = %self.config.file_id,
            notation = %self.config.notation,
            dataset = %self.config.dataset,
            context = self.config.context,
            provider = provider.provider_id(),
            temperature = self.config.temperature,
            "running prompt"
        );
        let response = provider.query(&request)?;
        info!(file_id = %self.config.file_id, chars = response.len(), "received response");

        // Write failures must not discard the retrieved response.
        let output_path = if self.config.save {
            match self.persist(provider.provider_id(), &resolved, &request, &response) {
                Ok(path) => Some(path),
                Err(err) => {
                    warn!(error = %err, "failed to save response");
                    None
                }
            }
        } else {
            None
        };
        Ok(RunOutcome {
            response,
            output_path,
        })
    }

    fn resolve(&self) -> Result<ResolvedPrompt, RunError> {
        let system_prompt = load_system_prompt(self.layout)?;
        let format_prompt = load_base_prompt(self.layout, self.config.notation)?;
        let (encoded_data, encoded_path) = load_encoded(
            self.layout,
            &self.config.file_id,
            self.config.notation,
            self.config.exam_date.as_deref(),
        )?;
        let (question_prompt, question_path, question_source) = load_question(
            self.layout,
            &self.config.file_id,
            self.config.notation,
            self.config.context,
        )?;
        let guides = load_guides(self.layout, self.config.context)?;
        Ok(ResolvedPrompt {
            system_prompt,
            format_prompt,
            encoded_data,
            encoded_path,
            guides,
            question_prompt,
            question_path,
            question_source,
        })
    }

    fn build_request(&self, resolved: &ResolvedPrompt) -> Result<PromptRequest, RunError> {
        let mut assembler = PromptAssembler::new(
            resolved.system_prompt.clone(),
            resolved.format_prompt.clone(),
            resolved.encoded_data.clone(),
            resolved.guides.clone(),
            resolved.question_prompt.clone(),
        );
        if resolved.question_source == QuestionSource::Consolidated {
            let upper = self.config.notation.name().to_uppercase();
            let format_header = format!("Output Format ({upper})");
            let encoded_header = format!("Encoded {upper} Source");
            assembler = assembler
                .with_ordering(&CONSOLIDATED_ORDERING)
                .with_section_headers(&[
                    ("question_prompt", "Task & Examples"),
                    ("guides", "Guides"),
                    ("format_prompt", format_header.as_str()),
                    ("encoded_data", encoded_header.as_str()),
                ]);
        }
        assembler.build(
            self.config.temperature,
            self.config.model_override.clone(),
            self.config.max_output_tokens,
        )
    }

    fn persist(
        &self,
        provider_label: &str,
        resolved: &ResolvedPrompt,
        request: &PromptRequest,
        response: &str,
    ) -> Result<PathBuf, RunError> {
        let path = self.output_path(provider_label);
        write_atomic(&path, response)?;
        info!(path = %path.display(), "saved response");
        if let Err(err) = self.write_input_bundle(&path, provider_label, resolved, request) {
            // Metadata persistence must never fail the run itself.
            warn!(error = %err, "failed to write input bundle");
        }
        Ok(path)
    }

    fn write_input_bundle(
        &self,
        response_path: &Path,
        provider_label: &str,
        resolved: &ResolvedPrompt,
        request: &PromptRequest,
    ) -> Result<(), RunError> {
        let guide_texts: Vec<&str> = resolved.guides.iter().map(|g| g.text.as_str()).collect();
        let bundle = json!({
            "timestamp": Utc::now().to_rfc3339(),
            "file_id": self.config.file_id,
            "notation": self.config.notation.name(),
            "dataset": self.config.dataset,
            "context": self.config.context,
            "exam_date": self.config.exam_date,
            "temperature": self.config.temperature,
            "max_output_tokens": self.config.max_output_tokens,
            "provider": provider_label,
            "model_override": request.model_override,
            "save_to": response_path.display().to_string(),
            "sources": {
                "encoded": resolved.encoded_path.display().to_string(),
                "question": resolved.question_path.display().to_string(),
                "guides": resolved.guides.iter().map(|g| g.name.as_str()).collect::<Vec<_>>(),
            },
            "components": {
                "system_prompt": inline_component(&resolved.system_prompt),
                "format_prompt": inline_component(&resolved.format_prompt),
                "encoded_data": inline_component(&resolved.encoded_data),
                "guides": guide_texts.iter().map(|t| inline_component(t)).collect::<Vec<_>>(),
                "question_prompt": inline_component(&resolved.question_prompt),
                "user_prompt_compiled": inline_component(&request.user_text),
            },
            "lengths": {
                "system_prompt": resolved.system_prompt.chars().count(),
                "format_prompt": resolved.format_prompt.chars().count(),
                "encoded_data": resolved.encoded_data.chars().count(),
                "guides": guide_texts.iter().map(|t| t.chars().count()).sum::<usize>(),
                "question_prompt": resolved.question_prompt.chars().count(),
                "user_prompt_compiled": request.user_text.chars().count(),
            },
        });
        let serialized = serde_json::to_string_pretty(&bundle)
            .map_err(|err| RunError::internal(format!("failed to serialize input bundle: {err}")))?;
        let path = bundle_path(response_path);
        write_atomic(&path, &serialized)?;
        info!(path = %path.display(), "saved input bundle");
        Ok(())
    }
}

/// Inline a prompt component into the bundle, replacing oversized values with
/// a length marker so bundles stay reviewable.
fn inline_component(text: &str) -> serde_json::Value {
    let chars = text.chars().count();
    if chars > MAX_INLINE_COMPONENT_CHARS {
        json!(format!("<omitted length={chars}>"))
    } else {
        json!(text)
    }
}
