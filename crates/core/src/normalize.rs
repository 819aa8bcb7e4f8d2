// crates/core/src/normalize.rs
//! Reduces verbose upstream error text to a short message fit for display.
//!
//! Rules are tried in order and the first match wins:
//! 1. quota exhaustion: keep the provider's "You exceeded your current quota" sentence
//! 2. rate limiting: fixed message
//! 3. `AI generation failed:` prefix: keep only the first sentence of the cause
//! 4. anything longer than [`MAX_MESSAGE_LEN`] is truncated with an ellipsis

/// Upper bound (in characters) for generic messages.
pub const MAX_MESSAGE_LEN: usize = 200;

const ELLIPSIS: &str = "...";

const QUOTA_MARKERS: &[&str] = &[
    "exceeded your current quota",
    "quota exceeded",
    "insufficient_quota",
    "resource_exhausted",
];
const QUOTA_SENTENCE: &str = "you exceeded your current quota";
const QUOTA_FALLBACK: &str =
    "The AI service quota has been exceeded. Please check your plan and billing details.";

const RATE_LIMIT_MARKERS: &[&str] = &["rate limit", "too many requests"];
const RATE_LIMIT_MESSAGE: &str =
    "The AI service is receiving too many requests. Please wait a moment and try again.";

const GENERATION_PREFIX: &str = "AI generation failed:";

/// Normalize an upstream error string. Total: never panics, always returns.
pub fn normalize_error(raw: &str) -> String {
    let lower = raw.to_ascii_lowercase();

    if QUOTA_MARKERS.iter().any(|m| lower.contains(m)) {
        return match quota_sentence(raw, &lower) {
            Some(sentence) => truncate(sentence),
            None => QUOTA_FALLBACK.to_string(),
        };
    }

    if RATE_LIMIT_MARKERS.iter().any(|m| lower.contains(m)) {
        return RATE_LIMIT_MESSAGE.to_string();
    }

    if let Some(idx) = raw.find(GENERATION_PREFIX) {
        let cause = raw[idx + GENERATION_PREFIX.len()..].trim();
        let sentence = first_sentence(cause);
        if !sentence.is_empty() && sentence.chars().count() < MAX_MESSAGE_LEN {
            return format!("{GENERATION_PREFIX} {sentence}");
        }
    }

    truncate(raw)
}

/// The "You exceeded your current quota ..." sentence through its first
/// period. `lower` must be `raw.to_ascii_lowercase()` so byte offsets line up.
fn quota_sentence<'a>(raw: &'a str, lower: &str) -> Option<&'a str> {
    let start = lower.find(QUOTA_SENTENCE)?;
    let end = raw[start..].find('.')?;
    Some(&raw[start..=start + end])
}

/// Text up to the first `.`, `!` or `?` that is followed by whitespace.
fn first_sentence(text: &str) -> &str {
    let mut chars = text.char_indices().peekable();
    while let Some((idx, c)) = chars.next() {
        if matches!(c, '.' | '!' | '?') {
            if let Some((_, next)) = chars.peek() {
                if next.is_whitespace() {
                    return text[..idx].trim_end();
                }
            }
        }
    }
    text
}

fn truncate(text: &str) -> String {
    if text.chars().count() <= MAX_MESSAGE_LEN {
        return text.to_string();
    }
    let keep = MAX_MESSAGE_LEN - ELLIPSIS.len();
    let mut out: String = text.chars().take(keep).collect();
    out.push_str(ELLIPSIS);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_quota_sentence_extracted() {
        let raw = "[GoogleGenerativeAI Error]: Error fetching from https://api: [429] \
                   you exceeded your current quota for plan X. Please migrate to a paid tier. \
                   For more information visit the docs.";
        let msg = normalize_error(raw);
        assert_eq!(msg, "you exceeded your current quota for plan X.");
        assert!(msg.ends_with('.'));
    }

    #[test]
    fn test_quota_sentence_preserves_original_case() {
        let raw = "429: You exceeded your current quota, please check your plan. Retry later.";
        assert_eq!(
            normalize_error(raw),
            "You exceeded your current quota, please check your plan."
        );
    }

    #[test]
    fn test_quota_marker_without_sentence_uses_fallback() {
        assert_eq!(normalize_error("RESOURCE_EXHAUSTED: Quota exceeded"), QUOTA_FALLBACK);
        // Sentence present but never terminated.
        assert_eq!(
            normalize_error("You exceeded your current quota for plan X"),
            QUOTA_FALLBACK
        );
    }

    #[test]
    fn test_rate_limit() {
        assert_eq!(normalize_error("429 Too Many Requests"), RATE_LIMIT_MESSAGE);
        assert_eq!(
            normalize_error("Upstream rate limit reached for model"),
            RATE_LIMIT_MESSAGE
        );
    }

    #[test]
    fn test_quota_wins_over_rate_limit() {
        let raw = "Too Many Requests: You exceeded your current quota. Slow down.";
        assert_eq!(normalize_error(raw), "You exceeded your current quota.");
    }

    #[test]
    fn test_generation_failure_first_sentence() {
        let raw = "Error: AI generation failed: The model returned invalid JSON. Raw output: {\"q\": ...";
        assert_eq!(
            normalize_error(raw),
            "AI generation failed: The model returned invalid JSON"
        );
    }

    #[test]
    fn test_generation_failure_question_and_bang() {
        assert_eq!(
            normalize_error("AI generation failed: Empty document! Nothing to quiz on."),
            "AI generation failed: Empty document"
        );
        assert_eq!(
            normalize_error("AI generation failed: no content"),
            "AI generation failed: no content"
        );
    }

    #[test]
    fn test_generation_failure_long_sentence_falls_through() {
        let cause = "x".repeat(250);
        let raw = format!("AI generation failed: {cause}");
        let msg = normalize_error(&raw);
        assert_eq!(msg.chars().count(), MAX_MESSAGE_LEN);
        assert!(msg.starts_with("AI generation failed: xxx"));
        assert!(msg.ends_with("..."));
    }

    #[test]
    fn test_long_text_truncated_to_limit() {
        let raw: String = "abcdefghij".repeat(30);
        assert_eq!(raw.len(), 300);
        let msg = normalize_error(&raw);
        assert_eq!(msg.chars().count(), 200);
        assert!(msg.ends_with("..."));
        assert_eq!(&msg[..197], &raw[..197]);
    }

    #[test]
    fn test_truncation_is_char_safe() {
        let raw = "é".repeat(300);
        let msg = normalize_error(&raw);
        assert_eq!(msg.chars().count(), 200);
    }

    #[test]
    fn test_short_text_unchanged() {
        assert_eq!(normalize_error("Document too short"), "Document too short");
        assert_eq!(normalize_error(""), "");
    }
}
