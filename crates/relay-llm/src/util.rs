//! Small helpers shared by the router and vendor adapters

use std::time::Duration;

/// Keys up to this many characters are fully hidden
const MIN_KEY_CHARS_FOR_PARTIAL_DISPLAY: usize = 8;

/// Characters shown at each end of a masked key
const KEY_MASK_VISIBLE_CHARS: usize = 4;

/// Mask an API key for logs and `Debug` output
///
/// ```
/// use relay_llm::util::mask_api_key;
/// assert_eq!(mask_api_key("sk-1234567890abcdef"), "sk-1...cdef");
/// assert_eq!(mask_api_key("short"), "****");
/// ```
#[must_use]
pub fn mask_api_key(key: &str) -> String {
    let chars: Vec<char> = key.chars().collect();
    if chars.len() <= MIN_KEY_CHARS_FOR_PARTIAL_DISPLAY {
        return "****".to_string();
    }
    let head: String = chars[..KEY_MASK_VISIBLE_CHARS].iter().collect();
    let tail: String = chars[chars.len() - KEY_MASK_VISIBLE_CHARS..].iter().collect();
    format!("{head}...{tail}")
}

/// Cut `text` to at most `max_chars` characters, marking the cut
#[must_use]
pub fn truncate_chars(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((end, _)) => format!("{}...(truncated)", &text[..end]),
        None => text.to_string(),
    }
}

/// Whole milliseconds in `duration`, saturating at `u64::MAX`
#[must_use]
pub fn duration_millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}
