//! Storage seams used by the workflows.
//!
//! The SQLite stores implement these; tests swap in doubles to observe
//! failure handling.

use async_trait::async_trait;

use crate::memory_db::schema::{ConversationMessage, ConversationSummary, HistoryEntry, UserProfile};

/// Append-only per-user message log keyed by `(user_id, timestamp)`
#[async_trait]
pub trait ConversationRepository: Send + Sync {
    /// Unconditional insert of one row
    async fn put_message(&self, message: &ConversationMessage) -> anyhow::Result<()>;

    /// At most `limit` rows, most recent first
    async fn recent_messages(&self, user_id: i64, limit: usize) -> anyhow::Result<Vec<ConversationMessage>>;

    /// Every row for the user, oldest first
    async fn all_messages(&self, user_id: i64) -> anyhow::Result<Vec<ConversationMessage>>;

    /// Delete one row by its exact key; absent rows are not an error
    async fn delete_message(&self, user_id: i64, timestamp: &str) -> anyhow::Result<()>;

    /// Connectivity check
    async fn ping(&self) -> anyhow::Result<()>;
}

/// One profile document per user
#[async_trait]
pub trait ProfileRepository: Send + Sync {
    async fn get_profile(&self, user_id: i64) -> anyhow::Result<Option<UserProfile>>;

    /// Whole-record replace
    async fn put_profile(&self, profile: &UserProfile) -> anyhow::Result<()>;

    /// Returns false when nothing was stored for the user
    async fn delete_profile(&self, user_id: i64) -> anyhow::Result<bool>;

    /// Append to `history` and bump `updated_at`, creating a sparse record if absent
    async fn append_history(&self, user_id: i64, entry: &HistoryEntry, updated_at: &str) -> anyhow::Result<()>;

    /// Append to `summaries` and bump `updated_at`, creating a sparse record if absent
    async fn append_summary(
        &self,
        user_id: i64,
        summary: &ConversationSummary,
        updated_at: &str,
    ) -> anyhow::Result<()>;
}
