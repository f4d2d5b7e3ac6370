//! Core transcript types: roles, content, messages, and transcripts.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::InvalidMessageError;
use crate::id::{MessageId, ToolCallId};
use crate::traits::TokenEstimator;

/// The role of a transcript participant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// A human user.
    User,
    /// The model. Carries a `tool_call_id` when it requests a tool.
    Assistant,
    /// The result of a tool invocation.
    Tool,
    /// Instructions or synthetic context supplied outside the conversation.
    System,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::User => "user",
            Self::Assistant => "assistant",
            Self::Tool => "tool",
            Self::System => "system",
        })
    }
}

/// The payload of a message.
///
/// Structured payloads are opaque: processors look at the variant tag, never
/// at the shape of a tool's arguments or output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Content {
    /// Plain text.
    Text(String),
    /// A tool invocation requested by the assistant.
    ToolCall {
        /// Name of the tool to invoke.
        name: String,
        /// JSON arguments, passed through untouched.
        arguments: serde_json::Value,
    },
    /// Output of a tool invocation.
    ToolResult {
        /// Tool output, passed through untouched.
        output: serde_json::Value,
        /// Whether the tool reported an error.
        is_error: bool,
    },
    /// Any other host-defined payload.
    Structured(serde_json::Value),
    /// A summary standing in for earlier messages that were compacted away.
    Compaction(String),
}

impl Content {
    /// Short tag naming the variant, used in errors and logs.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Text(_) => "text",
            Self::ToolCall { .. } => "tool_call",
            Self::ToolResult { .. } => "tool_result",
            Self::Structured(_) => "structured",
            Self::Compaction(_) => "compaction",
        }
    }

    /// Borrow the text of `Text` and `Compaction` content.
    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(text) | Self::Compaction(text) => Some(text),
            _ => None,
        }
    }

    /// Flatten the content to a single string for estimation or summarization.
    #[must_use]
    pub fn render(&self) -> String {
        match self {
            Self::Text(text) | Self::Compaction(text) => text.clone(),
            Self::ToolCall { name, arguments } => format!("{name}({arguments})"),
            Self::ToolResult { output, .. } | Self::Structured(output) => match output {
                serde_json::Value::String(s) => s.clone(),
                other => other.to_string(),
            },
        }
    }

    /// Whether the content carries nothing but whitespace.
    #[must_use]
    pub fn is_blank(&self) -> bool {
        match self {
            Self::Text(text) | Self::Compaction(text) => text.trim().is_empty(),
            Self::ToolResult { output, .. } | Self::Structured(output) => match output {
                serde_json::Value::Null => true,
                serde_json::Value::String(s) => s.trim().is_empty(),
                _ => false,
            },
            Self::ToolCall { .. } => false,
        }
    }
}

/// Token usage the model reported for the response that produced a message.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    /// Tokens consumed by the request.
    pub input_tokens: usize,
    /// Tokens generated in the response.
    pub output_tokens: usize,
}

impl TokenUsage {
    /// Input plus output tokens.
    #[must_use]
    pub fn total(&self) -> usize {
        self.input_tokens.saturating_add(self.output_tokens)
    }

    /// Add `delta` into this running total.
    pub fn accumulate(&mut self, delta: &TokenUsage) {
        self.input_tokens = self.input_tokens.saturating_add(delta.input_tokens);
        self.output_tokens = self.output_tokens.saturating_add(delta.output_tokens);
    }
}

/// One transcript entry.
///
/// Messages are immutable values: every field is private and every
/// "modification" returns a new `Message`. Equality and hashing use the
/// [`MessageId`] only.
///
/// A *tool-call* is an assistant message with a `tool_call_id`; a
/// *tool-result* is a [`Role::Tool`] message, which always has one.
///
/// # Example
///
/// ```
/// use chronicle_types::{Message, Role};
///
/// let call = Message::tool_call("m2", "call-1", "search", serde_json::json!({"q": "rust"}));
/// let result = Message::tool_result("m3", "call-1", "3 hits");
/// assert!(call.is_tool_call());
/// assert_eq!(result.role(), Role::Tool);
/// assert_eq!(call.tool_call_id(), result.tool_call_id());
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "MessageRepr")]
pub struct Message {
    id: MessageId,
    role: Role,
    content: Content,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    tool_call_id: Option<ToolCallId>,
    timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    usage: Option<TokenUsage>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    token_estimate: Option<usize>,
}

#[derive(Deserialize)]
struct MessageRepr {
    id: MessageId,
    role: Role,
    content: Content,
    #[serde(default)]
    tool_call_id: Option<ToolCallId>,
    timestamp: DateTime<Utc>,
    #[serde(default)]
    usage: Option<TokenUsage>,
    #[serde(default)]
    token_estimate: Option<usize>,
}

impl TryFrom<MessageRepr> for Message {
    type Error = InvalidMessageError;

    fn try_from(repr: MessageRepr) -> Result<Self, Self::Error> {
        Message::builder(repr.id, repr.role, repr.content)
            .maybe_tool_call_id(repr.tool_call_id)
            .timestamp(repr.timestamp)
            .maybe_usage(repr.usage)
            .maybe_token_estimate(repr.token_estimate)
            .build()
    }
}

impl Message {
    /// Start building a message. [`MessageBuilder::build`] checks the
    /// role/linkage rules.
    #[must_use]
    pub fn builder(id: impl Into<MessageId>, role: Role, content: Content) -> MessageBuilder {
        MessageBuilder {
            id: id.into(),
            role,
            content,
            tool_call_id: None,
            timestamp: None,
            usage: None,
            token_estimate: None,
        }
    }

    /// Build a message in one call, failing with [`InvalidMessageError`] when
    /// the role, content and `tool_call_id` do not fit together.
    pub fn new(
        id: impl Into<MessageId>,
        role: Role,
        content: Content,
        tool_call_id: Option<ToolCallId>,
        timestamp: DateTime<Utc>,
    ) -> Result<Self, InvalidMessageError> {
        Self::builder(id, role, content)
            .maybe_tool_call_id(tool_call_id)
            .timestamp(timestamp)
            .build()
    }

    fn assemble(
        id: MessageId,
        role: Role,
        content: Content,
        tool_call_id: Option<ToolCallId>,
    ) -> Self {
        Self {
            id,
            role,
            content,
            tool_call_id,
            timestamp: Utc::now(),
            usage: None,
            token_estimate: None,
        }
    }

    /// A user message with a single text payload, stamped now.
    #[must_use]
    pub fn user(id: impl Into<MessageId>, text: impl Into<String>) -> Self {
        Self::assemble(id.into(), Role::User, Content::Text(text.into()), None)
    }

    /// An assistant text reply, stamped now.
    #[must_use]
    pub fn assistant(id: impl Into<MessageId>, text: impl Into<String>) -> Self {
        Self::assemble(id.into(), Role::Assistant, Content::Text(text.into()), None)
    }

    /// A system message with a single text payload, stamped now.
    #[must_use]
    pub fn system(id: impl Into<MessageId>, text: impl Into<String>) -> Self {
        Self::assemble(id.into(), Role::System, Content::Text(text.into()), None)
    }

    /// An assistant tool-call, stamped now.
    #[must_use]
    pub fn tool_call(
        id: impl Into<MessageId>,
        call_id: impl Into<ToolCallId>,
        name: impl Into<String>,
        arguments: serde_json::Value,
    ) -> Self {
        Self::assemble(
            id.into(),
            Role::Assistant,
            Content::ToolCall { name: name.into(), arguments },
            Some(call_id.into()),
        )
    }

    /// A successful tool-result carrying `output`, stamped now.
    #[must_use]
    pub fn tool_result(
        id: impl Into<MessageId>,
        call_id: impl Into<ToolCallId>,
        output: impl Into<serde_json::Value>,
    ) -> Self {
        Self::assemble(
            id.into(),
            Role::Tool,
            Content::ToolResult { output: output.into(), is_error: false },
            Some(call_id.into()),
        )
    }

    /// A system message holding a compaction summary.
    #[must_use]
    pub fn compaction(
        id: impl Into<MessageId>,
        summary: impl Into<String>,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self::assemble(id.into(), Role::System, Content::Compaction(summary.into()), None)
            .at(timestamp)
    }

    /// Return this message stamped with `timestamp`.
    #[must_use]
    pub fn at(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }

    /// Return this message carrying the usage the model reported for it.
    #[must_use]
    pub fn with_usage(mut self, usage: TokenUsage) -> Self {
        self.usage = Some(usage);
        self
    }

    /// Return this message with a host-supplied token estimate, which takes
    /// precedence over any estimator.
    #[must_use]
    pub fn with_token_estimate(mut self, tokens: usize) -> Self {
        self.token_estimate = Some(tokens);
        self
    }

    /// A new message with the same id, role, linkage, timestamp, usage and
    /// host-supplied token estimate but different content.
    pub fn with_content(&self, content: Content) -> Result<Self, InvalidMessageError> {
        Self::builder(self.id.clone(), self.role, content)
            .maybe_tool_call_id(self.tool_call_id.clone())
            .timestamp(self.timestamp)
            .maybe_usage(self.usage)
            .maybe_token_estimate(self.token_estimate)
            .build()
    }

    /// Stable identifier.
    #[must_use]
    pub fn id(&self) -> &MessageId {
        &self.id
    }

    /// Author role.
    #[must_use]
    pub fn role(&self) -> Role {
        self.role
    }

    /// Payload.
    #[must_use]
    pub fn content(&self) -> &Content {
        &self.content
    }

    /// Linkage between a tool-call and its result.
    #[must_use]
    pub fn tool_call_id(&self) -> Option<&ToolCallId> {
        self.tool_call_id.as_ref()
    }

    /// Ordering key.
    #[must_use]
    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    /// Usage reported by the model, if any.
    #[must_use]
    pub fn usage(&self) -> Option<TokenUsage> {
        self.usage
    }

    /// Text of `Text` and `Compaction` content.
    #[must_use]
    pub fn text(&self) -> Option<&str> {
        self.content.as_text()
    }

    /// Whether this is an assistant message requesting a tool.
    #[must_use]
    pub fn is_tool_call(&self) -> bool {
        self.role == Role::Assistant && self.tool_call_id.is_some()
    }

    /// Whether this is a tool-result message.
    #[must_use]
    pub fn is_tool_result(&self) -> bool {
        self.role == Role::Tool
    }

    /// Whether this message is a compaction summary.
    #[must_use]
    pub fn is_compaction(&self) -> bool {
        matches!(self.content, Content::Compaction(_))
    }

    /// Host-supplied token estimate, if any.
    #[must_use]
    pub fn token_estimate(&self) -> Option<usize> {
        self.token_estimate
    }

    /// Token cost of this message: the host-supplied estimate when present,
    /// otherwise whatever `estimator` says. Nothing is cached on the message.
    pub fn tokens(&self, estimator: &dyn TokenEstimator) -> usize {
        self.token_estimate.unwrap_or_else(|| estimator.estimate(self))
    }
}

impl PartialEq for Message {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Message {}

impl Hash for Message {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

/// Builder for [`Message`] values whose shape is only known at runtime.
#[derive(Debug, Clone)]
pub struct MessageBuilder {
    id: MessageId,
    role: Role,
    content: Content,
    tool_call_id: Option<ToolCallId>,
    timestamp: Option<DateTime<Utc>>,
    usage: Option<TokenUsage>,
    token_estimate: Option<usize>,
}

impl MessageBuilder {
    /// Link the message to a tool call.
    #[must_use]
    pub fn tool_call_id(self, id: impl Into<ToolCallId>) -> Self {
        self.maybe_tool_call_id(Some(id.into()))
    }

    /// Set or clear the tool-call linkage.
    #[must_use]
    pub fn maybe_tool_call_id(mut self, id: Option<ToolCallId>) -> Self {
        self.tool_call_id = id;
        self
    }

    /// Ordering key. Defaults to the time of [`build`](Self::build).
    #[must_use]
    pub fn timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    /// Usage reported by the model.
    #[must_use]
    pub fn usage(self, usage: TokenUsage) -> Self {
        self.maybe_usage(Some(usage))
    }

    #[must_use]
    fn maybe_usage(mut self, usage: Option<TokenUsage>) -> Self {
        self.usage = usage;
        self
    }

    /// Host-supplied token estimate.
    #[must_use]
    pub fn token_estimate(self, tokens: usize) -> Self {
        self.maybe_token_estimate(Some(tokens))
    }

    #[must_use]
    fn maybe_token_estimate(mut self, tokens: Option<usize>) -> Self {
        self.token_estimate = tokens;
        self
    }

    /// Check the role/linkage rules and produce the message.
    pub fn build(self) -> Result<Message, InvalidMessageError> {
        let Self { id, role, content, tool_call_id, timestamp, usage, token_estimate } = self;

        match (role, tool_call_id.is_some()) {
            (Role::Tool, false) => return Err(InvalidMessageError::MissingToolCallId { id }),
            (Role::User | Role::System, true) => {
                return Err(InvalidMessageError::UnexpectedToolCallId { id, role });
            }
            _ => {}
        }

        let content_fits = match &content {
            Content::ToolCall { .. } => role == Role::Assistant && tool_call_id.is_some(),
            Content::ToolResult { .. } => role == Role::Tool,
            Content::Compaction(_) => role == Role::System,
            Content::Text(_) | Content::Structured(_) => true,
        };
        if !content_fits {
            return Err(InvalidMessageError::ContentRoleMismatch { id, role, content: content.kind() });
        }

        Ok(Message {
            id,
            role,
            content,
            tool_call_id,
            timestamp: timestamp.unwrap_or_else(Utc::now),
            usage,
            token_estimate,
        })
    }
}

/// An ordered sequence of messages; position is conversational order.
///
/// Messages are shared behind [`Arc`], so processors build new transcripts
/// that point at the same unmodified messages instead of copying them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Transcript {
    messages: Vec<Arc<Message>>,
}

impl Transcript {
    /// Wrap owned messages.
    #[must_use]
    pub fn new(messages: Vec<Message>) -> Self {
        messages.into_iter().collect()
    }

    /// Wrap messages that are already shared.
    #[must_use]
    pub fn from_shared(messages: Vec<Arc<Message>>) -> Self {
        Self { messages }
    }

    /// An empty transcript.
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// The messages in conversational order.
    #[must_use]
    pub fn messages(&self) -> &[Arc<Message>] {
        &self.messages
    }

    /// Number of messages.
    #[must_use]
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    /// Whether there are no messages.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Iterate over the messages.
    pub fn iter(&self) -> std::slice::Iter<'_, Arc<Message>> {
        self.messages.iter()
    }

    /// The most recent message.
    #[must_use]
    pub fn last(&self) -> Option<&Arc<Message>> {
        self.messages.last()
    }

    /// Message ids in order.
    #[must_use]
    pub fn ids(&self) -> Vec<&MessageId> {
        self.messages.iter().map(|m| m.id()).collect()
    }

    /// Position of the message with `id`.
    #[must_use]
    pub fn position(&self, id: &MessageId) -> Option<usize> {
        self.messages.iter().position(|m| m.id() == id)
    }

    /// Sum of per-message token estimates.
    pub fn total_tokens(&self, estimator: &dyn TokenEstimator) -> usize {
        self.messages.iter().map(|m| m.tokens(estimator)).sum()
    }

    /// Whether both transcripts hold the very same message values in the
    /// same order (pointer identity, not id equality).
    #[must_use]
    pub fn same_messages(&self, other: &Transcript) -> bool {
        self.messages.len() == other.messages.len()
            && self.messages.iter().zip(&other.messages).all(|(a, b)| Arc::ptr_eq(a, b))
    }

    /// Unwrap into the shared messages.
    #[must_use]
    pub fn into_shared(self) -> Vec<Arc<Message>> {
        self.messages
    }
}

impl FromIterator<Message> for Transcript {
    fn from_iter<I: IntoIterator<Item = Message>>(iter: I) -> Self {
        Self { messages: iter.into_iter().map(Arc::new).collect() }
    }
}

impl FromIterator<Arc<Message>> for Transcript {
    fn from_iter<I: IntoIterator<Item = Arc<Message>>>(iter: I) -> Self {
        Self { messages: iter.into_iter().collect() }
    }
}

impl From<Vec<Message>> for Transcript {
    fn from(messages: Vec<Message>) -> Self {
        Self::new(messages)
    }
}

impl<'a> IntoIterator for &'a Transcript {
    type Item = &'a Arc<Message>;
    type IntoIter = std::slice::Iter<'a, Arc<Message>>;

    fn into_iter(self) -> Self::IntoIter {
        self.messages.iter()
    }
}
