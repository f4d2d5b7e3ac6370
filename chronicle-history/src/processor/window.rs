use chronicle_types::{ConfigError, Transcript};

use crate::config::WindowConfig;
use crate::processor::{StepOutput, StepStats};
use crate::turn::segment;

/// Keeps the preamble plus the most recent `keep_last_n` complete turns.
///
/// Cuts only at turn boundaries, so a tool-call and its result are kept or
/// dropped together. Applying the same window twice gives the same result as
/// applying it once.
///
/// # Example
///
/// ```
/// use chronicle_history::{WindowConfig, WindowProcessor};
/// use chronicle_types::{Message, Transcript};
///
/// let window = WindowProcessor::new(WindowConfig::new(1)).unwrap();
/// let out = window.process(&Transcript::new(vec![
///     Message::user("m1", "first"),
///     Message::assistant("m2", "one"),
///     Message::user("m3", "second"),
///     Message::assistant("m4", "two"),
/// ]));
/// assert_eq!(out.transcript.len(), 2);
/// assert_eq!(out.stats.dropped, 2);
/// ```
#[derive(Debug, Clone)]
pub struct WindowProcessor {
    config: WindowConfig,
}

impl WindowProcessor {
    /// Create a window, rejecting `keep_last_n == 0`.
    pub fn new(config: WindowConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self { config })
    }

    /// The window's configuration.
    #[must_use]
    pub fn config(&self) -> &WindowConfig {
        &self.config
    }

    /// Apply the window.
    #[must_use]
    pub fn process(&self, transcript: &Transcript) -> StepOutput {
        let messages = transcript.messages();
        let seg = segment(messages, self.config.turn_rule);
        let Some(tail) = seg.tail_start(self.config.keep_last_n) else {
            return StepOutput::unchanged(transcript);
        };

        let dropped = tail - seg.preamble.end;
        tracing::debug!(
            keep_last_n = self.config.keep_last_n,
            turns = seg.turn_count(),
            dropped,
            "window applied"
        );

        let kept = messages[seg.preamble.clone()].iter().chain(&messages[tail..]).cloned();
        StepOutput::changed(kept.collect(), StepStats { dropped, ..StepStats::default() })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chronicle_types::Message;

    #[test]
    fn preamble_survives_any_window() {
        let window = WindowProcessor::new(WindowConfig::new(1)).unwrap();
        let input = Transcript::new(vec![
            Message::system("s", "rules"),
            Message::user("m1", "a"),
            Message::user("m2", "b"),
        ]);
        let out = window.process(&input);
        let ids: Vec<&str> = out.transcript.ids().into_iter().map(|id| id.as_str()).collect();
        assert_eq!(ids, ["s", "m2"]);
    }

    #[test]
    fn short_transcript_is_returned_as_is() {
        let window = WindowProcessor::new(WindowConfig::new(5)).unwrap();
        let input = Transcript::new(vec![Message::user("m1", "a")]);
        let out = window.process(&input);
        assert!(out.transcript.same_messages(&input));
        assert_eq!(out.stats, StepStats::default());
    }

    #[test]
    fn zero_window_is_rejected() {
        assert!(WindowProcessor::new(WindowConfig::new(0)).is_err());
    }
}
