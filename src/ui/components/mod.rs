mod input;
mod key_result;
mod prompt;
mod search_input;

pub use key_result::KeyResult;
pub use prompt::{Prompt, PromptEvent};
pub use search_input::{SearchEvent, SearchInput};
