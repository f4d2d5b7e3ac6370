//! Error types for all chronicle crates.

use std::fmt;
use std::time::Duration;

use crate::id::{MessageId, ToolCallId};
use crate::types::{Role, Transcript};

fn join<T: fmt::Display>(items: &[T]) -> String {
    items.iter().map(ToString::to_string).collect::<Vec<_>>().join(", ")
}

/// A single message whose role, content and linkage do not fit together.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InvalidMessageError {
    /// A tool-result message without the id of the call it answers.
    #[error("message {id}: tool-result messages require a tool_call_id")]
    MissingToolCallId {
        /// The offending message.
        id: MessageId,
    },
    /// Only assistant tool-calls and tool-results carry a `tool_call_id`.
    #[error("message {id}: {role} messages cannot carry a tool_call_id")]
    UnexpectedToolCallId {
        /// The offending message.
        id: MessageId,
        /// Its role.
        role: Role,
    },
    /// Content variant not allowed for the role.
    #[error("message {id}: {content} content is not allowed on a {role} message")]
    ContentRoleMismatch {
        /// The offending message.
        id: MessageId,
        /// Its role.
        role: Role,
        /// The content variant tag.
        content: &'static str,
    },
}

/// Why a transcript was rejected.
#[non_exhaustive]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvalidReason {
    /// The transcript has no messages and empty transcripts are not allowed.
    Empty,
    /// Two messages share an id.
    DuplicateMessageId,
    /// A message is stamped earlier than the message before it.
    OutOfOrder,
    /// A processor changed the relative order of surviving messages.
    Reordered,
    /// Two tool-calls share a `tool_call_id`.
    DuplicateToolCall,
    /// A tool-result appears before the call it answers.
    ResultBeforeCall,
    /// A tool-result references a call that is not in the transcript.
    OrphanedToolResult,
    /// A tool-call has more than one result.
    DuplicateToolResult,
    /// A tool-call has no result.
    UnansweredToolCall,
}

impl InvalidReason {
    /// Whether the reason concerns tool-call/result pairing.
    #[must_use]
    pub fn is_pairing(&self) -> bool {
        matches!(
            self,
            Self::DuplicateToolCall
                | Self::ResultBeforeCall
                | Self::OrphanedToolResult
                | Self::DuplicateToolResult
                | Self::UnansweredToolCall
        )
    }
}

impl fmt::Display for InvalidReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Empty => "transcript is empty",
            Self::DuplicateMessageId => "duplicate message id",
            Self::OutOfOrder => "timestamps go backwards",
            Self::Reordered => "surviving messages were reordered",
            Self::DuplicateToolCall => "duplicate tool-call id",
            Self::ResultBeforeCall => "tool-result precedes its tool-call",
            Self::OrphanedToolResult => "orphaned tool-result",
            Self::DuplicateToolResult => "tool-call answered more than once",
            Self::UnansweredToolCall => "tool-call without a result",
        })
    }
}

/// The validator rejected a transcript.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("transcript invalid: {reason} (messages: {})", join(.offending_ids))]
pub struct TranscriptInvalidError {
    /// What went wrong.
    pub reason: InvalidReason,
    /// Messages involved, in transcript order.
    pub offending_ids: Vec<MessageId>,
}

impl TranscriptInvalidError {
    /// Create an error for `reason` naming `offending_ids`.
    #[must_use]
    pub fn new(reason: InvalidReason, offending_ids: Vec<MessageId>) -> Self {
        Self { reason, offending_ids }
    }
}

/// A processor removed one half of a tool-call/result pair.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error(
    "{processor} broke tool-call pairing for [{}] (messages: {})",
    join(.tool_call_ids),
    join(.offending_ids)
)]
pub struct PairingViolationError {
    /// Name of the processor whose output broke the pairing.
    pub processor: String,
    /// Tool calls whose pair was split.
    pub tool_call_ids: Vec<ToolCallId>,
    /// Surviving halves of the split pairs.
    pub offending_ids: Vec<MessageId>,
}

/// The injected summarizer could not produce a summary.
#[derive(Debug, thiserror::Error)]
pub enum SummarizationError {
    /// The summarizer returned an error.
    #[error("summarizer failed: {0}")]
    Summarizer(#[source] Box<dyn std::error::Error + Send + Sync>),
    /// The summarizer answered with blank content.
    #[error("summarizer returned empty content")]
    EmptySummary,
    /// The summarizer did not answer within the time it was given.
    #[error("summarizer timed out after {0:?}")]
    Timeout(Duration),
    /// The host cancelled the run while the summarizer was working.
    #[error("summarization cancelled")]
    Cancelled,
}

impl SummarizationError {
    /// Wrap a plain failure description.
    #[must_use]
    pub fn failed(reason: impl Into<String>) -> Self {
        let reason: String = reason.into();
        Self::Summarizer(reason.into())
    }
}

/// Why a single processor step could not produce a usable transcript.
#[derive(Debug, thiserror::Error)]
pub enum StepError {
    /// The step's output failed validation.
    #[error(transparent)]
    Invalid(#[from] TranscriptInvalidError),
    /// The step split a tool-call/result pair.
    #[error(transparent)]
    Pairing(#[from] PairingViolationError),
    /// The step's summarizer failed or timed out.
    #[error(transparent)]
    Summarization(#[from] SummarizationError),
    /// The step tried to build an ill-formed message.
    #[error(transparent)]
    Message(#[from] InvalidMessageError),
}

/// A pipeline run failed.
///
/// Step failures carry the last transcript that passed validation so the
/// host always has something it can submit.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// The transcript handed to the pipeline was already invalid.
    #[error("input transcript rejected: {0}")]
    InvalidInput(#[source] TranscriptInvalidError),
    /// A step failed; nothing after it ran.
    #[error("pipeline step {step_index} ({processor}) failed: {cause}")]
    Step {
        /// Zero-based index of the failing step.
        step_index: usize,
        /// Name of the failing processor.
        processor: String,
        /// What went wrong.
        #[source]
        cause: StepError,
        /// The input to the failing step.
        last_valid: Transcript,
    },
}

impl PipelineError {
    /// Index of the failing step, if a step failed.
    #[must_use]
    pub fn step_index(&self) -> Option<usize> {
        match self {
            Self::InvalidInput(_) => None,
            Self::Step { step_index, .. } => Some(*step_index),
        }
    }

    /// The last transcript that passed validation.
    #[must_use]
    pub fn last_valid(&self) -> Option<&Transcript> {
        match self {
            Self::InvalidInput(_) => None,
            Self::Step { last_valid, .. } => Some(last_valid),
        }
    }

    /// Take the last transcript that passed validation.
    #[must_use]
    pub fn into_last_valid(self) -> Option<Transcript> {
        match self {
            Self::InvalidInput(_) => None,
            Self::Step { last_valid, .. } => Some(last_valid),
        }
    }
}

/// A processor or pipeline configuration was rejected at construction.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// A count or budget that must be positive was zero.
    #[error("{field} must be greater than zero")]
    Zero {
        /// The offending field.
        field: &'static str,
    },
    /// A ratio outside `(0, 1]`.
    #[error("{field} must be within (0, 1], got {value}")]
    OutOfRange {
        /// The offending field.
        field: &'static str,
        /// The rejected value.
        value: f64,
    },
    /// A required text field was blank.
    #[error("{field} must not be empty")]
    Empty {
        /// The offending field.
        field: &'static str,
    },
    /// A redaction pattern failed to compile.
    #[error("invalid redaction pattern `{pattern}`: {source}")]
    InvalidPattern {
        /// The pattern as written.
        pattern: String,
        /// The compiler error.
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
    /// A summarization step was configured without a summarizer.
    #[error("summarization requires a summarizer")]
    MissingSummarizer,
    /// Wraps an error with the index of the step it belongs to.
    #[error("step {step}: {source}")]
    Step {
        /// Zero-based step index.
        step: usize,
        /// The underlying error.
        #[source]
        source: Box<ConfigError>,
    },
}

impl ConfigError {
    /// Attach a step index.
    #[must_use]
    pub fn at_step(self, step: usize) -> Self {
        Self::Step { step, source: Box::new(self) }
    }
}
