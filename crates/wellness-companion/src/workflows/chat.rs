//! One chat turn: prompt, infer, persist both sides, update the keyword trail

use chrono::{DateTime, Duration, SubsecRound, Utc};
use serde::Serialize;
use tracing::{debug, error, info};

use crate::context_engine::build_prompt;
use crate::inference::CompletionRequest;
use crate::memory_db::{format_instant, ConversationMessage, HistoryEntry, Role, UserProfile};
use crate::shared_state::ServiceContext;
use crate::utils::{extract_keywords, TextUtils};
use crate::workflows::error::{Phase, WorkflowError, WorkflowResult};
use crate::workflows::outcome::{record_secondary_failure, Outcome};

pub const MAX_MESSAGE_CHARS: usize = 5000;
/// Rows of prior conversation loaded as prompt context
pub const RECENT_CONTEXT_ROWS: usize = 20;
pub const SNIPPET_CHARS: usize = 100;

pub const STEP_UPDATE_PROFILE_HISTORY: &str = "update_profile_history";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChatReply {
    pub reply: String,
    /// Assistant instant, RFC3339 with microseconds
    pub timestamp: String,
    #[serde(skip)]
    pub assistant_key: String,
    #[serde(skip)]
    pub user_key: String,
}

pub fn validate_chat_input(user_id: i64, message: &str) -> WorkflowResult<()> {
    if user_id <= 0 {
        return Err(WorkflowError::validation("user_id must be a positive integer"));
    }
    if message.trim().is_empty() || TextUtils::char_len(message) > MAX_MESSAGE_CHARS {
        return Err(WorkflowError::validation(
            "Invalid message: must be between 1 and 5000 characters",
        ));
    }
    Ok(())
}

/// Stored keys carry microseconds, so instants are compared at that precision.
fn now_micros() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(6)
}

fn strictly_after(previous: DateTime<Utc>) -> DateTime<Utc> {
    let now = now_micros();
    if now > previous {
        now
    } else {
        previous + Duration::microseconds(1)
    }
}

pub async fn run_chat(ctx: &ServiceContext, user_id: i64, message: &str) -> WorkflowResult<Outcome<ChatReply>> {
    validate_chat_input(user_id, message)?;

    debug!("Loading profile for user {}", user_id);
    let profile = ctx
        .profiles
        .get_profile(user_id)
        .await
        .map_err(|e| chat_processing_failed(user_id, &e))?
        .unwrap_or_else(|| UserProfile::with_defaults(user_id));

    debug!("Loading recent history for user {}", user_id);
    let mut recent = ctx
        .conversations
        .recent_messages(user_id, RECENT_CONTEXT_ROWS)
        .await
        .map_err(|e| chat_processing_failed(user_id, &e))?;
    recent.sort_by(|a, b| a.timestamp.cmp(&b.timestamp));

    let prompt = build_prompt(message, &profile, &recent);
    let reply = ctx
        .inference
        .complete(CompletionRequest::chat(prompt.system_prompt, prompt.user_message))
        .await
        .map_err(|e| {
            error!("Inference failed for user {}: {:#}", user_id, e);
            WorkflowError::dependency(Phase::Inference, &e)
        })?;

    let keywords: Vec<String> = extract_keywords(message).into_iter().collect();

    let user_instant = now_micros();
    let user_row = ConversationMessage::new(user_id, &user_instant, Role::User, message, keywords.clone());
    ctx.conversations
        .put_message(&user_row)
        .await
        .map_err(|e| chat_processing_failed(user_id, &e))?;

    let assistant_instant = strictly_after(user_instant);
    let assistant_row = ConversationMessage::new(user_id, &assistant_instant, Role::Assistant, reply.as_str(), Vec::new());
    ctx.conversations
        .put_message(&assistant_row)
        .await
        .map_err(|e| chat_processing_failed(user_id, &e))?;

    let assistant_timestamp = format_instant(&assistant_instant);
    let mut warnings = Vec::new();
    if !keywords.is_empty() {
        let entry = HistoryEntry {
            timestamp: format_instant(&user_instant),
            keywords,
            snippet: TextUtils::snippet(message, SNIPPET_CHARS).into_owned(),
        };
        if let Err(e) = ctx.profiles.append_history(user_id, &entry, &assistant_timestamp).await {
            warnings.push(record_secondary_failure(STEP_UPDATE_PROFILE_HISTORY, user_id, &e));
        }
    }

    info!("Chat turn completed for user {} ({} warnings)", user_id, warnings.len());
    Ok(Outcome::with_warnings(
        ChatReply {
            reply,
            timestamp: assistant_timestamp,
            assistant_key: assistant_row.timestamp,
            user_key: user_row.timestamp,
        },
        warnings,
    ))
}

fn chat_processing_failed(user_id: i64, err: &anyhow::Error) -> WorkflowError {
    error!("Chat processing failed for user {}: {:#}", user_id, err);
    WorkflowError::dependency(Phase::ChatProcessing, err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflows::test_support::*;

    #[tokio::test]
    async fn test_chat_persists_two_rows_and_returns_assistant_instant() {
        let harness = Harness::new(StubInference::replying("Try box breathing."));

        let outcome = run_chat(&harness.ctx, 1, "I feel stressed").await.unwrap();
        assert!(outcome.is_clean());
        let reply = outcome.value;
        assert_eq!(reply.reply, "Try box breathing.");

        let rows = harness.db_conversations.query_all(1).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].role, Role::User);
        assert_eq!(rows[0].content, "I feel stressed");
        assert_eq!(rows[0].keywords, vec!["stress".to_string()]);
        assert_eq!(rows[1].role, Role::Assistant);
        assert!(rows[1].keywords.is_empty());
        assert_eq!(rows[1].timestamp, reply.assistant_key);
        assert_eq!(rows[0].timestamp, reply.user_key);
        assert!(reply.assistant_key.starts_with(&format!("{}#assistant#", reply.timestamp)));
        assert!(reply.user_key < reply.assistant_key);
    }

    #[tokio::test]
    async fn test_keywords_append_profile_history() {
        let harness = Harness::new(StubInference::replying("ok"));
        let message = "Work stress is ruining my sleep and I feel anxiety ".repeat(3);

        let reply = run_chat(&harness.ctx, 2, &message).await.unwrap().value;

        let profile = harness.db_profiles.load(2).unwrap().unwrap();
        assert_eq!(profile.history.len(), 1);
        let entry = &profile.history[0];
        assert_eq!(entry.keywords, vec!["anxiety".to_string(), "sleep".to_string(), "stress".to_string()]);
        assert_eq!(entry.snippet.chars().count(), 100);
        assert!(reply.user_key.starts_with(&entry.timestamp));
        assert_eq!(profile.updated_at.as_deref(), Some(reply.timestamp.as_str()));
    }

    #[tokio::test]
    async fn test_no_keywords_leaves_profile_untouched() {
        let harness = Harness::new(StubInference::replying("ok"));
        run_chat(&harness.ctx, 3, "Hello there").await.unwrap();
        assert!(harness.db_profiles.load(3).unwrap().is_none());
    }

    #[tokio::test]
    async fn test_validation_failures_make_no_writes() {
        let harness = Harness::new(StubInference::replying("ok"));
        let too_long = "a".repeat(MAX_MESSAGE_CHARS + 1);

        for (user_id, message) in [(0, "hi"), (-5, "hi"), (1, "   "), (1, ""), (1, too_long.as_str())] {
            let err = run_chat(&harness.ctx, user_id, message).await.unwrap_err();
            assert!(matches!(err, WorkflowError::Validation(_)));
        }
        assert_eq!(harness.inference.calls(), 0);
        assert_eq!(harness.db_conversations.message_count(1).unwrap(), 0);
    }

    #[tokio::test]
    async fn test_message_at_limit_is_accepted() {
        let harness = Harness::new(StubInference::replying("ok"));
        let at_limit = "é".repeat(MAX_MESSAGE_CHARS);
        assert!(run_chat(&harness.ctx, 1, &at_limit).await.is_ok());
    }

    #[tokio::test]
    async fn test_inference_failure_persists_nothing() {
        let harness = Harness::new(StubInference::failing());
        let err = run_chat(&harness.ctx, 1, "I feel tired").await.unwrap_err();
        match err {
            WorkflowError::Dependency { phase, message } => {
                assert_eq!(phase, Phase::Inference);
                assert!(message.contains("stub inference unavailable"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(harness.db_conversations.message_count(1).unwrap(), 0);
    }

    #[tokio::test]
    async fn test_profile_history_failure_is_a_warning() {
        let harness = Harness::with_failing_profile_appends(StubInference::replying("ok"));

        let outcome = run_chat(&harness.ctx, 4, "so much stress").await.unwrap();
        assert_eq!(outcome.value.reply, "ok");
        assert_eq!(outcome.warnings.len(), 1);
        assert_eq!(outcome.warnings[0].step, STEP_UPDATE_PROFILE_HISTORY);
        assert_eq!(harness.db_conversations.message_count(4).unwrap(), 2);
    }

    #[tokio::test]
    async fn test_prompt_includes_prior_turns() {
        let harness = Harness::new(StubInference::replying("first reply"));
        run_chat(&harness.ctx, 5, "I am worried about exams").await.unwrap();
        run_chat(&harness.ctx, 5, "and now?").await.unwrap();

        let last = harness.inference.last_request().unwrap();
        assert_eq!(last.user_message, "and now?");
        assert!(last
            .system_prompt
            .contains("User: I am worried about exams\nAssistant: first reply"));
    }

    #[test]
    fn test_strictly_after_moves_forward() {
        let future = Utc::now() + Duration::seconds(5);
        let future = future.trunc_subsecs(6);
        assert_eq!(strictly_after(future), future + Duration::microseconds(1));
    }
}
