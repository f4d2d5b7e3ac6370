//! Transcript-level invariants: ordering and tool-call/result pairing.
//!
//! Checks run in this order and the first failing group is reported with
//! every offending message it found:
//!
//! 1. emptiness (unless allowed)
//! 2. ordering: unique message ids, timestamps never go backwards
//! 3. pairing: each tool-result answers exactly one earlier tool-call, and
//!    each tool-call has its result (unless pending calls are allowed)

use std::collections::{HashMap, HashSet};

use chronicle_types::{
    InvalidReason, MessageId, PairingViolationError, StepError, ToolCallId, Transcript,
    TranscriptInvalidError,
};
use serde::{Deserialize, Serialize};

/// Knobs for the [`Validator`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidatorConfig {
    /// Accept transcripts with no messages.
    pub allow_empty: bool,
    /// Accept tool-calls whose result has not arrived yet.
    pub allow_pending_tool_calls: bool,
}

/// Checks transcripts before and after every processor.
#[derive(Debug, Clone, Copy, Default)]
pub struct Validator {
    config: ValidatorConfig,
}

/// Validate `transcript` with the default (strict) configuration.
pub fn validate(transcript: &Transcript) -> Result<(), TranscriptInvalidError> {
    Validator::default().validate(transcript)
}

impl Validator {
    /// Creates a validator with the given configuration.
    #[must_use]
    pub fn new(config: ValidatorConfig) -> Self {
        Self { config }
    }

    /// The configuration in effect.
    #[must_use]
    pub fn config(&self) -> &ValidatorConfig {
        &self.config
    }

    /// Check every transcript invariant.
    pub fn validate(&self, transcript: &Transcript) -> Result<(), TranscriptInvalidError> {
        if transcript.is_empty() && !self.config.allow_empty {
            return Err(TranscriptInvalidError::new(InvalidReason::Empty, Vec::new()));
        }
        check_ordering(transcript)?;
        self.check_pairing(transcript)
    }

    /// Check the output of one processor step against its input.
    ///
    /// On top of [`validate`](Self::validate) this catches partial removal of
    /// a tool-call/result pair and any reordering of the messages that
    /// survived the step.
    pub fn check_step(
        &self,
        processor: &str,
        input: &Transcript,
        output: &Transcript,
    ) -> Result<(), StepError> {
        if let Some(violation) = split_pairs(processor, input, output) {
            return Err(violation.into());
        }
        check_relative_order(input, output)?;

        self.validate(output).map_err(|err| {
            if err.reason.is_pairing() {
                let tool_call_ids = output
                    .iter()
                    .filter(|m| err.offending_ids.contains(m.id()))
                    .filter_map(|m| m.tool_call_id().cloned())
                    .collect();
                StepError::Pairing(PairingViolationError {
                    processor: processor.to_string(),
                    tool_call_ids,
                    offending_ids: err.offending_ids,
                })
            } else {
                StepError::Invalid(err)
            }
        })
    }

    fn check_pairing(&self, transcript: &Transcript) -> Result<(), TranscriptInvalidError> {
        let call_ids: HashSet<&ToolCallId> = transcript
            .iter()
            .filter(|m| m.is_tool_call())
            .filter_map(|m| m.tool_call_id())
            .collect();

        let mut calls: HashMap<&ToolCallId, &MessageId> = HashMap::new();
        let mut answered: HashSet<&ToolCallId> = HashSet::new();
        let mut duplicate_calls = Vec::new();
        let mut before_call = Vec::new();
        let mut orphaned = Vec::new();
        let mut duplicate_results = Vec::new();

        for message in transcript {
            let Some(call_id) = message.tool_call_id() else {
                continue;
            };
            if message.is_tool_call() {
                if let Some(first) = calls.get(call_id) {
                    duplicate_calls.push((*first).clone());
                    duplicate_calls.push(message.id().clone());
                } else {
                    calls.insert(call_id, message.id());
                }
            } else if !calls.contains_key(call_id) {
                if call_ids.contains(call_id) {
                    before_call.push(message.id().clone());
                } else {
                    orphaned.push(message.id().clone());
                }
            } else if !answered.insert(call_id) {
                duplicate_results.push(message.id().clone());
            }
        }

        let unanswered: Vec<MessageId> = if self.config.allow_pending_tool_calls {
            Vec::new()
        } else {
            transcript
                .iter()
                .filter(|m| m.is_tool_call())
                .filter(|m| m.tool_call_id().is_some_and(|id| !answered.contains(id)))
                .map(|m| m.id().clone())
                .collect()
        };

        [
            (InvalidReason::DuplicateToolCall, duplicate_calls),
            (InvalidReason::ResultBeforeCall, before_call),
            (InvalidReason::OrphanedToolResult, orphaned),
            (InvalidReason::DuplicateToolResult, duplicate_results),
            (InvalidReason::UnansweredToolCall, unanswered),
        ]
        .into_iter()
        .find(|(_, ids)| !ids.is_empty())
        .map_or(Ok(()), |(reason, ids)| Err(TranscriptInvalidError::new(reason, ids)))
    }
}

fn check_ordering(transcript: &Transcript) -> Result<(), TranscriptInvalidError> {
    let mut seen = HashSet::new();
    let duplicates: Vec<MessageId> = transcript
        .iter()
        .filter(|m| !seen.insert(m.id()))
        .map(|m| m.id().clone())
        .collect();
    if !duplicates.is_empty() {
        return Err(TranscriptInvalidError::new(InvalidReason::DuplicateMessageId, duplicates));
    }

    let backwards: Vec<MessageId> = transcript
        .messages()
        .windows(2)
        .filter(|pair| pair[1].timestamp() < pair[0].timestamp())
        .map(|pair| pair[1].id().clone())
        .collect();
    if !backwards.is_empty() {
        return Err(TranscriptInvalidError::new(InvalidReason::OutOfOrder, backwards));
    }
    Ok(())
}

/// Pairs that were complete in `input` but have exactly one half in `output`.
fn split_pairs(
    processor: &str,
    input: &Transcript,
    output: &Transcript,
) -> Option<PairingViolationError> {
    let mut calls: HashMap<&ToolCallId, &MessageId> = HashMap::new();
    let mut results: HashMap<&ToolCallId, &MessageId> = HashMap::new();
    for message in input {
        if let Some(call_id) = message.tool_call_id() {
            if message.is_tool_call() {
                calls.entry(call_id).or_insert(message.id());
            } else {
                results.entry(call_id).or_insert(message.id());
            }
        }
    }

    let surviving: HashSet<&MessageId> = output.iter().map(|m| m.id()).collect();
    let mut tool_call_ids = Vec::new();
    let mut offending_ids = Vec::new();
    for message in input {
        if !message.is_tool_call() {
            continue;
        }
        let Some(call_id) = message.tool_call_id() else {
            continue;
        };
        let Some(result_id) = results.get(call_id) else {
            continue;
        };
        if calls.get(call_id) != Some(&message.id()) {
            continue;
        }
        match (surviving.contains(message.id()), surviving.contains(*result_id)) {
            (true, false) => offending_ids.push(message.id().clone()),
            (false, true) => offending_ids.push((*result_id).clone()),
            _ => continue,
        }
        tool_call_ids.push(call_id.clone());
    }

    (!tool_call_ids.is_empty()).then(|| PairingViolationError {
        processor: processor.to_string(),
        tool_call_ids,
        offending_ids,
    })
}

/// Messages carried over from `input` must keep their relative order.
fn check_relative_order(
    input: &Transcript,
    output: &Transcript,
) -> Result<(), TranscriptInvalidError> {
    let positions: HashMap<&MessageId, usize> =
        input.iter().enumerate().map(|(index, m)| (m.id(), index)).collect();

    let mut last = None;
    let mut moved = Vec::new();
    for message in output {
        let Some(&position) = positions.get(message.id()) else {
            continue;
        };
        if last.is_some_and(|previous| position < previous) {
            moved.push(message.id().clone());
        }
        last = Some(last.map_or(position, |previous: usize| previous.max(position)));
    }

    if moved.is_empty() {
        Ok(())
    } else {
        Err(TranscriptInvalidError::new(InvalidReason::Reordered, moved))
    }
}
