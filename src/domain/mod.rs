mod errors;
mod prompt_contract;

pub use errors::{RunError, RunErrorCategory};
pub use prompt_contract::{Notation, PromptRequest};
