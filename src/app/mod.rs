mod assembler;
mod batch;
mod runner;

pub use assembler::{
    CONSOLIDATED_ORDERING, LEGACY_ORDERING, PromptAssembler, SECTION_ENCODED_DATA,
    SECTION_FORMAT_PROMPT, SECTION_GUIDES, SECTION_QUESTION_PROMPT,
};
pub use batch::{BatchConfig, BatchReport, BatchRunner, BatchTask, ProviderFactory, TaskFailure};
pub use runner::{PromptRunner, RunConfig, RunOutcome};
