pub mod api;
pub mod config;
pub mod context_engine;
pub mod inference;
pub mod memory_db;
pub mod metrics;
pub mod rate_limit;
pub mod server;
pub mod shared_state;
pub mod telemetry;
pub mod utils;
pub mod workflows;

// Public API exports
pub use config::Config;
pub use server::{build_router, run_server};
pub use shared_state::{AppState, ServiceContext};
pub use workflows::{
    clear_history, delete_profile, get_history, get_profile, run_chat, update_profile, ChatReply, ClearedHistory,
    Outcome, ProfileUpdate, WorkflowError,
};
