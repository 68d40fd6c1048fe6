mod layout;
mod output;
mod resolver;

pub use layout::{CorpusLayout, DEFAULT_SYSTEM_PROMPT};
pub use output::{bundle_path, output_path, write_atomic};
pub use resolver::{
    Guide, QuestionSource, find_encoded_file, find_question_file, list_file_ids, list_guide_names,
    list_notations, load_base_prompt, load_encoded, load_guides, load_question,
    load_system_prompt, load_text_file,
};
