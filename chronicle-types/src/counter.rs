//! Heuristic token estimation used when the host supplies no tokenizer.

use crate::traits::TokenEstimator;
use crate::types::{Content, Message, Transcript};

/// Estimates token counts from text using a configurable chars-per-token ratio.
///
/// This is a heuristic: real tokenization varies per model. The default
/// ratio of 4.0 chars/token approximates GPT-family and Claude models.
///
/// # Example
///
/// ```
/// use chronicle_types::TokenCounter;
///
/// let counter = TokenCounter::new();
/// let estimate = counter.estimate_text("Hello, world!");
/// assert!(estimate > 0);
/// ```
#[derive(Debug, Clone, Copy)]
pub struct TokenCounter {
    chars_per_token: f32,
}

impl Default for TokenCounter {
    fn default() -> Self {
        Self::new()
    }
}

impl TokenCounter {
    /// Fixed cost per message for role markers and framing.
    pub const MESSAGE_OVERHEAD: usize = 4;

    /// Creates a new `TokenCounter` with the default ratio of 4.0 chars/token.
    #[must_use]
    pub fn new() -> Self {
        Self { chars_per_token: 4.0 }
    }

    /// Creates a new `TokenCounter` with a custom chars-per-token ratio.
    ///
    /// Ratios that are not positive fall back to the default.
    #[must_use]
    pub fn with_ratio(chars_per_token: f32) -> Self {
        if chars_per_token > 0.0 {
            Self { chars_per_token }
        } else {
            Self::new()
        }
    }

    /// Estimates the number of tokens in a text string.
    #[must_use]
    pub fn estimate_text(&self, text: &str) -> usize {
        (text.len() as f32 / self.chars_per_token).ceil() as usize
    }

    /// Estimates one message: framing overhead plus its content.
    #[must_use]
    pub fn estimate_message(&self, message: &Message) -> usize {
        Self::MESSAGE_OVERHEAD + self.estimate_content(message.content())
    }

    /// Estimates every message in a transcript.
    #[must_use]
    pub fn estimate_transcript(&self, transcript: &Transcript) -> usize {
        transcript.iter().map(|m| self.estimate_message(m)).sum()
    }

    fn estimate_content(&self, content: &Content) -> usize {
        match content {
            Content::Text(text) | Content::Compaction(text) => self.estimate_text(text),
            Content::ToolCall { name, arguments } => {
                self.estimate_text(name) + self.estimate_text(&arguments.to_string())
            }
            Content::ToolResult { .. } | Content::Structured(_) => {
                self.estimate_text(&content.render())
            }
        }
    }
}

impl TokenEstimator for TokenCounter {
    fn estimate(&self, message: &Message) -> usize {
        self.estimate_message(message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_rounds_up() {
        let counter = TokenCounter::new();
        assert_eq!(counter.estimate_text(""), 0);
        assert_eq!(counter.estimate_text("abc"), 1);
        assert_eq!(counter.estimate_text("abcde"), 2);
    }

    #[test]
    fn message_includes_overhead() {
        let counter = TokenCounter::new();
        let msg = Message::user("m1", "a".repeat(400));
        assert_eq!(counter.estimate_message(&msg), 104);
    }

    #[test]
    fn invalid_ratio_falls_back() {
        let counter = TokenCounter::with_ratio(0.0);
        assert_eq!(counter.estimate_text("abcd"), 1);
    }
}
