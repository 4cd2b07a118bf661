//! Replies used when every backend has failed.

/// Message returned when no backend produced an answer.
pub const TERMINAL_MESSAGE: &str =
    "Sorry, I couldn't get an answer right now. Please try again in a moment.";

/// Canned answers for a few predictable messages, matched on the normalized text.
const CANNED: &[(&[&str], &str)] = &[
    (
        &["hi", "hello", "hey", "good morning", "good evening"],
        "Hello! I'm having trouble reaching my language models right now, but I'm here. Try asking again shortly.",
    ),
    (
        &["thanks", "thank you", "thx"],
        "You're welcome!",
    ),
    (
        &["who are you", "what are you"],
        "I'm an AI relay bot that forwards your messages to language models.",
    ),
];

/// Deterministic fallback answers, independent of any backend.
#[derive(Debug, Clone, Copy, Default)]
pub struct FallbackReplies;

impl FallbackReplies {
    /// Reply for the user's `message`, matched as a whole.
    ///
    /// Always returns a non-empty message.
    pub fn reply_for(&self, message: &str) -> &'static str {
        let normalized = normalize(message);

        CANNED
            .iter()
            .find(|(triggers, _)| triggers.contains(&normalized.as_str()))
            .map(|(_, reply)| *reply)
            .unwrap_or(TERMINAL_MESSAGE)
    }
}

/// Lowercase, drop punctuation, collapse whitespace.
fn normalize(text: &str) -> String {
    text.to_lowercase()
        .chars()
        .filter(|c| c.is_alphanumeric() || c.is_whitespace())
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_prompt_gets_terminal_message() {
        let replies = FallbackReplies;
        assert_eq!(replies.reply_for("explain quantum tunnelling"), TERMINAL_MESSAGE);
        assert_eq!(replies.reply_for(""), TERMINAL_MESSAGE);
    }

    #[test]
    fn test_canned_reply_ignores_case_and_punctuation() {
        let replies = FallbackReplies;
        assert_eq!(replies.reply_for("Thank you!"), "You're welcome!");
        assert_eq!(replies.reply_for("  HELLO  "), replies.reply_for("hello"));
    }

    #[test]
    fn test_multi_line_message_is_matched_whole() {
        let replies = FallbackReplies;
        assert_eq!(replies.reply_for("explain rust\nthanks"), TERMINAL_MESSAGE);
        assert_eq!(replies.reply_for("thank\nyou"), "You're welcome!");
    }

    #[test]
    fn test_never_empty() {
        let replies = FallbackReplies;
        for prompt in ["", "\n", "hi", "???"] {
            assert!(!replies.reply_for(prompt).is_empty());
        }
    }

    #[test]
    fn test_normalize() {
        assert_eq!(normalize("  Who   are YOU?? "), "who are you");
    }
}
