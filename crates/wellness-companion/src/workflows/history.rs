//! Conversation history listing and the summarize-then-clear workflow

use chrono::Utc;
use tracing::{debug, error, info};

use crate::memory_db::{format_instant, ConversationMessage, ConversationSummary, DateRange};
use crate::shared_state::ServiceContext;
use crate::workflows::error::{Phase, WorkflowError, WorkflowResult};
use crate::workflows::outcome::{record_secondary_failure, Outcome};
use crate::workflows::summary::{summarize, SummarySource};

pub const DEFAULT_HISTORY_LIMIT: usize = 50;
pub const MAX_HISTORY_LIMIT: usize = 100;

pub const STEP_PERSIST_SUMMARY: &str = "persist_summary";

#[derive(Debug, Clone, PartialEq)]
pub struct ClearedHistory {
    pub deleted_count: usize,
    pub summary: ConversationSummary,
    pub source: SummarySource,
}

/// Most recent rows first
pub async fn get_history(
    ctx: &ServiceContext,
    user_id: i64,
    limit: usize,
) -> WorkflowResult<Vec<ConversationMessage>> {
    if !(1..=MAX_HISTORY_LIMIT).contains(&limit) {
        return Err(WorkflowError::validation(format!(
            "limit must be between 1 and {}",
            MAX_HISTORY_LIMIT
        )));
    }

    ctx.conversations.recent_messages(user_id, limit).await.map_err(|e| {
        error!("History read failed for user {}: {:#}", user_id, e);
        WorkflowError::dependency(Phase::HistoryRead, &e)
    })
}

pub async fn clear_history(ctx: &ServiceContext, user_id: i64) -> WorkflowResult<Outcome<ClearedHistory>> {
    let mut rows = ctx
        .conversations
        .all_messages(user_id)
        .await
        .map_err(|e| clear_failed(user_id, &e))?;

    if rows.is_empty() {
        return Err(WorkflowError::NotFound(format!(
            "No conversation history found for user_id: {}",
            user_id
        )));
    }
    rows.sort_by(|a, b| a.timestamp.cmp(&b.timestamp));

    debug!("Summarizing {} messages for user {}", rows.len(), user_id);
    let (draft, source) = summarize(ctx.inference.as_ref(), &rows).await;

    let created_at = format_instant(&Utc::now());
    let summary = ConversationSummary {
        summary: draft.summary,
        key_topics: draft.key_topics,
        sentiment: draft.sentiment,
        insights: draft.insights,
        message_count: rows.len(),
        created_at: created_at.clone(),
        date_range: DateRange {
            start: rows.first().map(|m| m.timestamp.clone()),
            end: rows.last().map(|m| m.timestamp.clone()),
        },
    };

    let mut warnings = Vec::new();
    if let Err(e) = ctx.profiles.append_summary(user_id, &summary, &created_at).await {
        warnings.push(record_secondary_failure(STEP_PERSIST_SUMMARY, user_id, &e));
    }

    let mut deleted_count = 0;
    for row in &rows {
        ctx.conversations
            .delete_message(user_id, &row.timestamp)
            .await
            .map_err(|e| clear_failed(user_id, &e))?;
        deleted_count += 1;
    }

    info!(
        "Cleared {} messages for user {} (summary {:?})",
        deleted_count, user_id, source
    );
    Ok(Outcome::with_warnings(
        ClearedHistory { deleted_count, summary, source },
        warnings,
    ))
}

fn clear_failed(user_id: i64, err: &anyhow::Error) -> WorkflowError {
    error!("History clear failed for user {}: {:#}", user_id, err);
    WorkflowError::dependency(Phase::HistoryClear, err)
}
