//! Context engine module - Turns profiles and stored history into prompts

pub mod context_formatter;
pub mod prompt_builder;

pub use context_formatter::{format_chat_history, format_summaries};
pub use prompt_builder::{build_prompt, PromptParts};
