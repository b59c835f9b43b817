//! Request workflows - chat turns, history and profile management

pub mod chat;
pub mod error;
pub mod history;
pub mod outcome;
pub mod profile;
pub mod summary;

#[cfg(test)]
pub(crate) mod test_support;

pub use chat::{run_chat, ChatReply};
pub use error::{Phase, WorkflowError, WorkflowResult};
pub use history::{clear_history, get_history, ClearedHistory};
pub use outcome::{Outcome, SecondaryFailure};
pub use profile::{delete_profile, get_profile, update_profile, ProfileUpdate, ProfileWrite};
pub use summary::SummarySource;
