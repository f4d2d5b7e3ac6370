use std::sync::Arc;

use chronicle_types::{ConfigError, Message, Role, Transcript};

use crate::config::SystemPromptConfig;
use crate::processor::{StepOutput, StepStats};

/// Replaces whatever system instructions the host sent with one fixed prompt.
///
/// Every [`Role::System`] message except compaction summaries is removed and
/// a single prompt message is placed first, stamped with the first message's
/// timestamp. A transcript that already has exactly that shape is returned
/// as is; an empty transcript passes through untouched.
#[derive(Debug, Clone)]
pub struct SystemPromptPatcher {
    config: SystemPromptConfig,
}

impl SystemPromptPatcher {
    /// Create a patcher, rejecting a blank prompt.
    pub fn new(config: SystemPromptConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self { config })
    }

    /// The prompt this patcher installs.
    #[must_use]
    pub fn prompt(&self) -> &str {
        &self.config.prompt
    }

    fn is_host_prompt(message: &Message) -> bool {
        message.role() == Role::System && !message.is_compaction()
    }

    fn is_patched(&self, message: &Message) -> bool {
        message.id().as_str() == self.config.message_id
            && message.role() == Role::System
            && message.text() == Some(self.config.prompt.as_str())
            && !message.is_compaction()
    }

    /// Apply the patch.
    #[must_use]
    pub fn process(&self, transcript: &Transcript) -> StepOutput {
        let Some(first) = transcript.messages().first() else {
            return StepOutput::unchanged(transcript);
        };

        let removed = transcript.iter().filter(|m| Self::is_host_prompt(m)).count();
        if removed == 1 && self.is_patched(first) {
            return StepOutput::unchanged(transcript);
        }

        let prompt = Message::system(self.config.message_id.as_str(), self.config.prompt.as_str())
            .at(first.timestamp());
        let patched = std::iter::once(Arc::new(prompt))
            .chain(transcript.iter().filter(|m| !Self::is_host_prompt(m)).cloned())
            .collect();

        tracing::debug!(removed, "system prompt patched");
        StepOutput::changed(patched, StepStats { dropped: removed, ..StepStats::default() })
    }
}
