//! Text processing helpers shared by the workflows

use std::borrow::Cow;

use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    static ref JSON_FENCE_REGEX: Regex =
        Regex::new(r"(?s)```json\s*(.*?)\s*(?:```|$)").expect("valid json fence regex");
    static ref ANY_FENCE_REGEX: Regex =
        Regex::new(r"(?s)```\s*(.*?)\s*(?:```|$)").expect("valid fence regex");
}

pub struct TextUtils;

impl TextUtils {
    /// First `max_chars` characters of `text`, cut on a char boundary
    pub fn snippet(text: &str, max_chars: usize) -> Cow<'_, str> {
        match text.char_indices().nth(max_chars) {
            Some((byte_pos, _)) => Cow::Borrowed(&text[..byte_pos]),
            None => Cow::Borrowed(text),
        }
    }

    /// Length in characters, the unit message limits are expressed in
    pub fn char_len(text: &str) -> usize {
        text.chars().count()
    }

    /// Strip a surrounding markdown code fence from model output.
    ///
    /// A ```json fence wins over a bare ``` fence. An unclosed fence runs to
    /// the end of the text; text without a fence is returned trimmed.
    pub fn strip_code_fence(text: &str) -> Cow<'_, str> {
        let trimmed = text.trim();
        if let Some(inner) = JSON_FENCE_REGEX.captures(trimmed).and_then(|c| c.get(1)) {
            return Cow::Borrowed(inner.as_str());
        }
        if let Some(inner) = ANY_FENCE_REGEX.captures(trimmed).and_then(|c| c.get(1)) {
            return Cow::Borrowed(inner.as_str());
        }
        Cow::Borrowed(trimmed)
    }
}
