//! Chat and conversation history endpoints

use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::api::{ApiError, ApiResult};
use crate::memory_db::ConversationMessage;
use crate::shared_state::AppState;
use crate::workflows::{self, history::DEFAULT_HISTORY_LIMIT};

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct ChatResponse {
    pub reply: String,
    pub timestamp: String,
}

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    pub limit: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct HistoryResponse {
    pub user_id: i64,
    pub items: Vec<ConversationMessage>,
    pub total_count: usize,
}

#[derive(Debug, Serialize)]
pub struct SummaryView {
    pub summary: String,
    pub key_topics: Vec<String>,
    pub sentiment: String,
    pub message_count: usize,
    pub created_at: String,
}

#[derive(Debug, Serialize)]
pub struct DeleteHistoryResponse {
    pub status: String,
    pub message: String,
    pub user_id: i64,
    pub deleted_count: usize,
    pub summary: SummaryView,
}

pub async fn chat(
    State(state): State<AppState>,
    Path(user_id): Path<i64>,
    Json(request): Json<ChatRequest>,
) -> ApiResult<ChatResponse> {
    info!("Chat request for user {}", user_id);
    let outcome = workflows::run_chat(&state.ctx, user_id, &request.message).await?;
    let reply = outcome.into_value();
    Ok(Json(ChatResponse {
        reply: reply.reply,
        timestamp: reply.timestamp,
    }))
}

pub async fn get_history(
    State(state): State<AppState>,
    Path(user_id): Path<i64>,
    Query(query): Query<HistoryQuery>,
) -> ApiResult<HistoryResponse> {
    let limit = query.limit.unwrap_or(DEFAULT_HISTORY_LIMIT as i64);
    let limit = usize::try_from(limit)
        .map_err(|_| ApiError::bad_request("limit must be between 1 and 100"))?;

    let items = workflows::get_history(&state.ctx, user_id, limit).await?;
    Ok(Json(HistoryResponse {
        user_id,
        total_count: items.len(),
        items,
    }))
}

pub async fn clear_history(
    State(state): State<AppState>,
    Path(user_id): Path<i64>,
) -> ApiResult<DeleteHistoryResponse> {
    info!("Clearing history for user {}", user_id);
    let outcome = workflows::clear_history(&state.ctx, user_id).await?;
    let summary_saved = outcome.is_clean();
    let cleared = outcome.into_value();

    let message = if summary_saved {
        format!("Cleared {} messages and saved conversation summary", cleared.deleted_count)
    } else {
        format!("Cleared {} messages; conversation summary could not be saved", cleared.deleted_count)
    };

    Ok(Json(DeleteHistoryResponse {
        status: "success".to_string(),
        message,
        user_id,
        deleted_count: cleared.deleted_count,
        summary: SummaryView {
            summary: cleared.summary.summary,
            key_topics: cleared.summary.key_topics,
            sentiment: cleared.summary.sentiment,
            message_count: cleared.summary.message_count,
            created_at: cleared.summary.created_at,
        },
    }))
}
