//! Renders stored history and summaries into prompt sections

use crate::memory_db::{ConversationMessage, ConversationSummary};

pub const NO_HISTORY: &str = "No previous conversation.";
pub const NO_SUMMARIES: &str = "No previous conversation summaries.";

/// Number of chat lines rendered into the prompt
pub const DEFAULT_HISTORY_LIMIT: usize = 10;
/// Number of most recent summaries rendered into the prompt
pub const SUMMARY_WINDOW: usize = 3;

/// Chronologically sort `items`, keep the last `limit`, and render each as
/// `"<Role>: <content>"` on its own line.
pub fn format_chat_history(items: &[ConversationMessage], limit: usize) -> String {
    if items.is_empty() {
        return NO_HISTORY.to_string();
    }

    let mut sorted: Vec<&ConversationMessage> = items.iter().collect();
    sorted.sort_by(|a, b| a.timestamp.cmp(&b.timestamp));
    let skip = sorted.len().saturating_sub(limit);

    sorted[skip..]
        .iter()
        .map(|item| format!("{}: {}", item.role.label(), item.content))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Numbered block of the last three summaries
pub fn format_summaries(summaries: &[ConversationSummary]) -> String {
    if summaries.is_empty() {
        return NO_SUMMARIES.to_string();
    }

    let skip = summaries.len().saturating_sub(SUMMARY_WINDOW);
    let mut lines = Vec::with_capacity(SUMMARY_WINDOW * 5);
    for (idx, summary) in summaries[skip..].iter().enumerate() {
        lines.push(format!("Summary {}:", idx + 1));
        lines.push(format!("- {}", or_na(&summary.summary)));
        lines.push(format!("- Topics: {}", summary.key_topics.join(", ")));
        lines.push(format!("- Sentiment: {}", or_na(&summary.sentiment)));
        lines.push(String::new());
    }
    lines.join("\n")
}

fn or_na(value: &str) -> &str {
    if value.is_empty() {
        "N/A"
    } else {
        value
    }
}
