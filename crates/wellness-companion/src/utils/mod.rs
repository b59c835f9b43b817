//! Utilities module - Text helpers and wellness keyword extraction

pub mod keyword_extractor;
pub mod text_utils;

// Re-export commonly used utilities
pub use keyword_extractor::{extract_keywords, extract_keywords_from_messages, WELLNESS_KEYWORDS};
pub use text_utils::TextUtils;
