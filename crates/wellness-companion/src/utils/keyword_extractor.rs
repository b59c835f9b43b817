//! Wellness keyword extraction over a fixed vocabulary

use std::collections::BTreeSet;

use lazy_static::lazy_static;

use crate::memory_db::ConversationMessage;

lazy_static! {
    /// Terms tracked in profile history and used for fallback summary topics.
    pub static ref WELLNESS_KEYWORDS: Vec<&'static str> = vec![
        "stress", "anxiety", "worried", "nervous", "tired", "exhausted",
        "sleep", "insomnia", "pain", "headache", "energy", "fatigue",
        "focus", "concentration", "memory", "mood", "depression", "sad",
        "exercise", "workout", "diet", "nutrition", "meditation", "mindfulness",
        "breathing", "relaxation", "burnout", "overwhelmed", "tension",
        "happy", "grateful", "motivated", "calm", "peaceful", "confident",
    ];
}

/// Extract the vocabulary terms contained in `text`.
///
/// Matching is case-insensitive substring containment, not word-boundary
/// aware: "unhappy" yields "happy".
pub fn extract_keywords(text: &str) -> BTreeSet<String> {
    let text_lower = text.to_lowercase();
    WELLNESS_KEYWORDS
        .iter()
        .filter(|keyword| text_lower.contains(*keyword))
        .map(|keyword| keyword.to_string())
        .collect()
}

/// Union of the keywords found across every message, capped at `limit`.
pub fn extract_keywords_from_messages(messages: &[ConversationMessage], limit: usize) -> Vec<String> {
    let mut all_keywords = BTreeSet::new();
    for message in messages {
        all_keywords.extend(extract_keywords(&message.content));
    }

    all_keywords.into_iter().take(limit).collect()
}

/// Check if a term belongs to the vocabulary
pub fn is_wellness_keyword(term: &str) -> bool {
    WELLNESS_KEYWORDS.iter().any(|keyword| *keyword == term)
}
