//! Turn segmentation.
//!
//! Windowing, budgeting and summarization only ever cut a transcript at a
//! turn boundary. The grouping rule:
//!
//! - Leading [`Role::System`] messages form the *preamble*. It is not a turn
//!   and trimming processors never remove it.
//! - The first message after the preamble opens the first turn, whatever
//!   its role.
//! - A [`Role::User`] message opens a new turn ([`TurnRule`] decides whether
//!   consecutive user messages share one).
//! - No turn opens while a tool-call is still waiting for its result, so a
//!   call and its result always land in the same turn.

use std::collections::HashSet;
use std::ops::Range;
use std::sync::Arc;

use chronicle_types::{Message, Role};
use serde::{Deserialize, Serialize};

/// How user messages map onto turns.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TurnRule {
    /// Every user message opens a new turn.
    #[default]
    EachUserMessage,
    /// A run of consecutive user messages opens a single turn.
    MergeConsecutiveUsers,
}

/// Index ranges of the preamble and of each turn, oldest first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segmentation {
    /// Leading system messages.
    pub preamble: Range<usize>,
    /// Contiguous turns covering everything after the preamble.
    pub turns: Vec<Range<usize>>,
}

impl Segmentation {
    /// Number of turns.
    #[must_use]
    pub fn turn_count(&self) -> usize {
        self.turns.len()
    }

    /// Index at which the most recent `n` turns begin, or `None` when there
    /// are no more than `n` turns.
    #[must_use]
    pub fn tail_start(&self, n: usize) -> Option<usize> {
        let count = self.turns.len();
        if count <= n {
            return None;
        }
        Some(match n {
            0 => self.turns[count - 1].end,
            _ => self.turns[count - n].start,
        })
    }

    /// Number of messages in the oldest `n` turns.
    #[must_use]
    pub fn messages_in_oldest(&self, n: usize) -> usize {
        self.turns.iter().take(n).map(|turn| turn.len()).sum()
    }
}

/// Split `messages` into a preamble and turns.
///
/// # Example
///
/// ```
/// use chronicle_history::{segment, TurnRule};
/// use chronicle_types::{Message, Transcript};
///
/// let transcript = Transcript::new(vec![
///     Message::system("s", "be brief"),
///     Message::user("m1", "hi"),
///     Message::assistant("m2", "hello"),
///     Message::user("m3", "bye"),
/// ]);
/// let seg = segment(transcript.messages(), TurnRule::EachUserMessage);
/// assert_eq!(seg.preamble, 0..1);
/// assert_eq!(seg.turns, vec![1..3, 3..4]);
/// ```
#[must_use]
pub fn segment(messages: &[Arc<Message>], rule: TurnRule) -> Segmentation {
    let preamble_end = messages.iter().take_while(|m| m.role() == Role::System).count();
    let mut turns = Vec::new();
    let mut open_calls = HashSet::new();
    let mut start = preamble_end;

    for (index, message) in messages.iter().enumerate().skip(preamble_end) {
        if index > start && message.role() == Role::User && open_calls.is_empty() {
            let merges =
                rule == TurnRule::MergeConsecutiveUsers && messages[index - 1].role() == Role::User;
            if !merges {
                turns.push(start..index);
                start = index;
            }
        }

        if let Some(call_id) = message.tool_call_id() {
            if message.is_tool_call() {
                open_calls.insert(call_id);
            } else {
                open_calls.remove(call_id);
            }
        }
    }

    if start < messages.len() {
        turns.push(start..messages.len());
    }

    Segmentation { preamble: 0..preamble_end, turns }
}
