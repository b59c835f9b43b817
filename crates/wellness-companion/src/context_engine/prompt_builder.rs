//! Assembles the system prompt for a chat turn

use serde_json::Value;

use crate::context_engine::context_formatter::{format_chat_history, format_summaries, DEFAULT_HISTORY_LIMIT};
use crate::memory_db::{ConversationMessage, UserProfile};

pub const NOT_SPECIFIED: &str = "Not specified";

/// System prompt plus the untouched user message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptParts {
    pub system_prompt: String,
    pub user_message: String,
}

/// Build the prompt for one turn. `recent` may arrive in any order.
pub fn build_prompt(user_message: &str, profile: &UserProfile, recent: &[ConversationMessage]) -> PromptParts {
    let age = profile
        .age
        .map(|age| age.to_string())
        .unwrap_or_else(|| NOT_SPECIFIED.to_string());
    let background = if profile.background.trim().is_empty() {
        NOT_SPECIFIED
    } else {
        profile.background.as_str()
    };

    let mut ordered = recent.to_vec();
    ordered.sort_by(|a, b| a.timestamp.cmp(&b.timestamp));

    let system_prompt = render_system_prompt(
        &age,
        background,
        &preference_summary(profile),
        &format_summaries(&profile.summaries),
        &format_chat_history(&ordered, DEFAULT_HISTORY_LIMIT),
    );

    PromptParts {
        system_prompt,
        user_message: user_message.to_string(),
    }
}

/// Comma-joined keys whose values are truthy
pub fn preference_summary(profile: &UserProfile) -> String {
    let enabled: Vec<&str> = profile
        .preferences
        .iter()
        .filter(|(_, value)| is_truthy(value))
        .map(|(key, _)| key.as_str())
        .collect();

    if enabled.is_empty() {
        NOT_SPECIFIED.to_string()
    } else {
        enabled.join(", ")
    }
}

/// JSON truthiness: false, null, zero, and empty strings/arrays/objects are falsy
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map(|f| f != 0.0).unwrap_or(true),
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}

fn render_system_prompt(age: &str, background: &str, preferences: &str, summaries: &str, chat_history: &str) -> String {
    format!(
        "You are an AI wellness companion focused on mental wellness and cognitive enhancement. 

Your core responsibilities:
1. Provide supportive, warm, and professional responses
2. Stay strictly within wellness and cognitive enhancement domains
3. Consider the user's profile and conversation history for personalized responses
4. For off-topic questions, gently redirect to wellness topics
5. NEVER provide medical diagnosis or treatment advice - always suggest consulting healthcare professionals

User Profile:
- Age: {age}
- Background: {background}
- Preferences: {preferences}

Past Conversation Summaries:
{summaries}

Recent Conversation Context:
{chat_history}

Guidelines:
- Use empathetic and encouraging language
- Suggest evidence-based wellness practices
- Encourage healthy habits and self-care
- Recognize when professional help may be needed
- Keep responses concise but meaningful (2-4 paragraphs)

Remember: You're a supportive companion, not a medical professional."
    )
}
