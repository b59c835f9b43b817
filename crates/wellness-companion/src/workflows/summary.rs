//! Summarization of a conversation before it is cleared

use serde::Deserialize;
use tracing::{debug, warn};

use crate::inference::{CompletionRequest, InferenceGateway};
use crate::memory_db::ConversationMessage;
use crate::utils::{extract_keywords_from_messages, TextUtils};

pub const MAX_KEY_TOPICS: usize = 5;

pub const SUMMARY_SYSTEM_PROMPT: &str =
    "You are a helpful assistant that creates concise summaries of wellness conversations in JSON format.";

pub const FALLBACK_SUMMARY: &str = "Conversation covered wellness and personal growth topics";

/// Where the summary text came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SummarySource {
    Generated,
    Fallback,
}

/// Model-facing part of a summary, before bookkeeping fields are attached
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SummaryDraft {
    #[serde(default = "default_summary_text")]
    pub summary: String,
    #[serde(default)]
    pub key_topics: Vec<String>,
    #[serde(default = "default_sentiment")]
    pub sentiment: String,
    #[serde(default)]
    pub insights: String,
}

fn default_summary_text() -> String {
    "Previous conversation".to_string()
}

fn default_sentiment() -> String {
    "neutral".to_string()
}

/// `"<Role>: <content>"` per row, in the order given
pub fn render_transcript(messages: &[ConversationMessage]) -> String {
    messages
        .iter()
        .map(|m| format!("{}: {}", m.role.label(), m.content))
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn summary_prompt(transcript: &str) -> String {
    format!(
        "Analyze the following conversation and create a concise summary.

Conversation:
{transcript}

Provide a summary in the following JSON format:
{{
  \"summary\": \"A brief 2-3 sentence summary of the entire conversation\",
  \"key_topics\": [\"topic1\", \"topic2\", \"topic3\"],
  \"sentiment\": \"positive/neutral/concerned\",
  \"insights\": \"Key insights about the user's wellness journey\"
}}

Focus on:
- Main wellness concerns discussed
- Progress or patterns noticed
- User's emotional state
- Important context for future conversations

Respond ONLY with valid JSON, no additional text."
    )
}

/// Parse model output, tolerating a surrounding markdown fence
pub fn parse_summary(raw: &str) -> anyhow::Result<SummaryDraft> {
    let body = TextUtils::strip_code_fence(raw);
    let mut draft: SummaryDraft = serde_json::from_str(&body)?;
    draft.key_topics.truncate(MAX_KEY_TOPICS);
    Ok(draft)
}

pub fn fallback_summary(messages: &[ConversationMessage]) -> SummaryDraft {
    SummaryDraft {
        summary: FALLBACK_SUMMARY.to_string(),
        key_topics: extract_keywords_from_messages(messages, MAX_KEY_TOPICS),
        sentiment: default_sentiment(),
        insights: format!("Generated from {} messages", messages.len()),
    }
}

/// Ask the model for a summary; any failure degrades to the local fallback.
pub async fn summarize(
    inference: &dyn InferenceGateway,
    messages: &[ConversationMessage],
) -> (SummaryDraft, SummarySource) {
    let request = CompletionRequest::summary(SUMMARY_SYSTEM_PROMPT, summary_prompt(&render_transcript(messages)));

    let raw = match inference.complete(request).await {
        Ok(raw) => raw,
        Err(e) => {
            warn!("Summary generation failed, using fallback: {:#}", e);
            return (fallback_summary(messages), SummarySource::Fallback);
        }
    };

    match parse_summary(&raw) {
        Ok(draft) => {
            debug!("Parsed generated summary with {} topics", draft.key_topics.len());
            (draft, SummarySource::Generated)
        }
        Err(e) => {
            warn!("Summary output was not valid JSON, using fallback: {}", e);
            (fallback_summary(messages), SummarySource::Fallback)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory_db::Role;
    use crate::workflows::test_support::StubInference;
    use chrono::{TimeZone, Utc};

    fn rows() -> Vec<ConversationMessage> {
        let at = Utc.with_ymd_and_hms(2024, 6, 1, 10, 0, 0).unwrap();
        vec![
            ConversationMessage::new(1, &at, Role::User, "I have insomnia and stress", Vec::new()),
            ConversationMessage::new(1, &at, Role::Assistant, "Let's try meditation", Vec::new()),
        ]
    }

    #[test]
    fn test_parse_fenced_json_with_defaults() {
        let raw = "```json\n{\"summary\": \"Talked about sleep\", \"key_topics\": [\"a\",\"b\",\"c\",\"d\",\"e\",\"f\"]}\n```";
        let draft = parse_summary(raw).unwrap();
        assert_eq!(draft.summary, "Talked about sleep");
        assert_eq!(draft.key_topics.len(), 5);
        assert_eq!(draft.sentiment, "neutral");
        assert_eq!(draft.insights, "");
    }

    #[test]
    fn test_parse_bare_fence_and_missing_summary() {
        let draft = parse_summary("```\n{\"sentiment\": \"positive\"}\n```").unwrap();
        assert_eq!(draft.summary, "Previous conversation");
        assert_eq!(draft.sentiment, "positive");
    }

    #[test]
    fn test_parse_unclosed_json_fence() {
        let draft = parse_summary("```json\n{\"summary\": \"ok\"}").unwrap();
        assert_eq!(draft.summary, "ok");
        assert_eq!(draft.sentiment, "neutral");
    }

    #[test]
    fn test_parse_rejects_prose() {
        assert!(parse_summary("Here is your summary: it went well").is_err());
    }

    #[test]
    fn test_transcript_rendering() {
        assert_eq!(
            render_transcript(&rows()),
            "User: I have insomnia and stress\nAssistant: Let's try meditation"
        );
        assert!(summary_prompt("User: hi").contains("Conversation:\nUser: hi\n"));
    }

    #[tokio::test]
    async fn test_generated_summary_uses_summary_sampling() {
        let stub = StubInference::replying(r#"{"summary": "Sleep trouble", "key_topics": ["sleep"], "sentiment": "concerned", "insights": "Needs rest"}"#);
        let (draft, source) = summarize(&stub, &rows()).await;
        assert_eq!(source, SummarySource::Generated);
        assert_eq!(draft.summary, "Sleep trouble");
        assert_eq!(draft.sentiment, "concerned");

        let request = stub.last_request().unwrap();
        assert_eq!(request.system_prompt, SUMMARY_SYSTEM_PROMPT);
        assert_eq!(request.params, crate::inference::SamplingParams::SUMMARY);
    }

    #[tokio::test]
    async fn test_unparseable_reply_falls_back() {
        let stub = StubInference::replying("not json at all");
        let (draft, source) = summarize(&stub, &rows()).await;
        assert_eq!(source, SummarySource::Fallback);
        assert_eq!(draft.summary, FALLBACK_SUMMARY);
        assert_eq!(draft.key_topics, vec!["insomnia", "meditation", "stress"]);
        assert_eq!(draft.insights, "Generated from 2 messages");
    }
}
