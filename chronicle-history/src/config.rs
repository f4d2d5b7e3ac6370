//! Configuration for processors and pipelines.
//!
//! Every struct here is plain data: `serde`-deserializable, with `Default`
//! values, so a host can load a pipeline from JSON or TOML. Injected
//! callbacks (token estimator, summarizer) are not configuration; they are
//! passed as [`Collaborators`](crate::Collaborators).
//!
//! ```
//! use chronicle_history::{PipelineConfig, ProcessorConfig};
//!
//! let config: PipelineConfig = serde_json::from_str(r#"{
//!     "steps": [
//!         { "kind": "redaction", "patterns": ["\\b\\d{3}-\\d{2}-\\d{4}\\b"] },
//!         { "kind": "window", "keep_last_n": 6 },
//!         { "kind": "token_budget", "max_tokens": 8000 }
//!     ]
//! }"#).unwrap();
//! assert_eq!(config.steps.len(), 3);
//! assert!(matches!(config.steps[1], ProcessorConfig::Window(ref w) if w.keep_last_n == 6));
//! ```

use chronicle_types::{ConfigError, DurationMs, Role};
use serde::{Deserialize, Serialize};

use crate::turn::TurnRule;
use crate::validator::ValidatorConfig;

/// A whole pipeline: validation rules plus ordered steps.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Rules applied to the input and after every step.
    pub validation: ValidatorConfig,
    /// Steps, applied in order.
    pub steps: Vec<ProcessorConfig>,
}

/// Configuration of one pipeline step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ProcessorConfig {
    /// Keep the most recent complete turns.
    Window(WindowConfig),
    /// Drop oldest turns until the transcript fits a token budget.
    TokenBudget(TokenBudgetConfig),
    /// Mask matching spans in message content.
    Redaction(RedactionConfig),
    /// Replace old turns with a summary.
    Summarization(SummarizationConfig),
    /// Replace host system messages with one fixed prompt.
    SystemPrompt(SystemPromptConfig),
}

impl ProcessorConfig {
    /// Reject values that cannot produce a usable processor.
    pub fn validate(&self) -> Result<(), ConfigError> {
        match self {
            Self::Window(config) => config.validate(),
            Self::TokenBudget(config) => config.validate(),
            Self::Redaction(config) => config.validate(),
            Self::Summarization(config) => config.validate(),
            Self::SystemPrompt(config) => config.validate(),
        }
    }
}

/// Settings for [`WindowProcessor`](crate::WindowProcessor).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WindowConfig {
    /// Number of most recent complete turns to keep.
    pub keep_last_n: usize,
    /// How turns are grouped.
    pub turn_rule: TurnRule,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self { keep_last_n: 10, turn_rule: TurnRule::default() }
    }
}

impl WindowConfig {
    /// Window over the last `keep_last_n` turns.
    #[must_use]
    pub fn new(keep_last_n: usize) -> Self {
        Self { keep_last_n, ..Self::default() }
    }

    /// Reject a zero-turn window.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.keep_last_n == 0 {
            return Err(ConfigError::Zero { field: "keep_last_n" });
        }
        Ok(())
    }
}

/// Settings for [`TokenBudgetProcessor`](crate::TokenBudgetProcessor).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TokenBudgetConfig {
    /// Upper bound on the estimated token total.
    pub max_tokens: usize,
    /// How turns are grouped.
    pub turn_rule: TurnRule,
}

impl Default for TokenBudgetConfig {
    fn default() -> Self {
        Self { max_tokens: 100_000, turn_rule: TurnRule::default() }
    }
}

impl TokenBudgetConfig {
    /// Budget of `max_tokens`.
    #[must_use]
    pub fn new(max_tokens: usize) -> Self {
        Self { max_tokens, ..Self::default() }
    }

    /// Reject a zero budget.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_tokens == 0 {
            return Err(ConfigError::Zero { field: "max_tokens" });
        }
        Ok(())
    }
}

/// Settings for [`RedactionProcessor`](crate::RedactionProcessor).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RedactionConfig {
    /// Regular expressions whose matches are masked.
    pub patterns: Vec<String>,
    /// Also mask AWS access keys, Vault tokens and GitHub tokens.
    pub builtin_secrets: bool,
    /// Replacement text for every match.
    pub placeholder: String,
    /// Also walk string leaves inside JSON tool arguments, tool output and
    /// structured payloads. Plain string payloads are always scanned.
    pub include_structured: bool,
    /// Only redact messages with these roles. Empty means every role.
    pub roles: Vec<Role>,
}

impl Default for RedactionConfig {
    fn default() -> Self {
        Self {
            patterns: Vec::new(),
            builtin_secrets: true,
            placeholder: "[REDACTED]".to_string(),
            include_structured: false,
            roles: Vec::new(),
        }
    }
}

impl RedactionConfig {
    /// Redact `patterns` in addition to the built-in secret formats.
    #[must_use]
    pub fn with_patterns<I, S>(patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self { patterns: patterns.into_iter().map(Into::into).collect(), ..Self::default() }
    }

    /// Reject configurations that match nothing. Patterns are compiled (and
    /// checked) when the processor is built.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.patterns.is_empty() && !self.builtin_secrets {
            return Err(ConfigError::Empty { field: "patterns" });
        }
        Ok(())
    }
}

/// Which messages a summarization step folds into its summary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SummarySpan {
    /// At least the oldest `count` messages, rounded up to the end of the
    /// turn holding the last of them.
    OldestMessages {
        /// Minimum number of messages to summarize.
        count: usize,
    },
    /// Everything except the most recent `turns` turns.
    KeepRecentTurns {
        /// Number of recent turns kept verbatim.
        turns: usize,
    },
}

impl Default for SummarySpan {
    fn default() -> Self {
        Self::KeepRecentTurns { turns: 3 }
    }
}

/// When a summarization step is worth running.
///
/// Compaction runs once current consumption reaches `threshold` of the
/// context window, or when the reserved output would no longer fit.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompactionTrigger {
    /// Size of the model's context window in tokens.
    pub context_window: usize,
    /// Fraction of the window that triggers compaction.
    pub threshold: f64,
    /// Tokens reserved for the model's reply.
    pub reserved_output_tokens: usize,
}

impl Default for CompactionTrigger {
    fn default() -> Self {
        Self { context_window: 200_000, threshold: 0.5, reserved_output_tokens: 0 }
    }
}

impl CompactionTrigger {
    /// Whether `consumed` tokens call for compaction.
    #[must_use]
    pub fn fires(&self, consumed: usize) -> bool {
        let threshold = self.threshold * self.context_window as f64;
        consumed as f64 >= threshold
            || consumed.saturating_add(self.reserved_output_tokens) >= self.context_window
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.context_window == 0 {
            return Err(ConfigError::Zero { field: "context_window" });
        }
        if !(self.threshold > 0.0 && self.threshold <= 1.0) {
            return Err(ConfigError::OutOfRange { field: "threshold", value: self.threshold });
        }
        Ok(())
    }
}

/// Settings for [`SummarizationProcessor`](crate::SummarizationProcessor).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SummarizationConfig {
    /// Which messages to summarize.
    pub span: SummarySpan,
    /// Smallest span worth a summarizer call. Smaller spans are widened to
    /// everything but the most recent turn, then skipped.
    pub min_messages: usize,
    /// Only summarize when this trigger fires. `None` always summarizes.
    pub trigger: Option<CompactionTrigger>,
    /// Time allowed for the summarizer call.
    pub timeout: Option<DurationMs>,
    /// How turns are grouped.
    pub turn_rule: TurnRule,
}

impl Default for SummarizationConfig {
    fn default() -> Self {
        Self {
            span: SummarySpan::default(),
            min_messages: 3,
            trigger: None,
            timeout: Some(DurationMs::from_secs(60)),
            turn_rule: TurnRule::default(),
        }
    }
}

impl SummarizationConfig {
    /// Summarize `span`, with defaults for everything else.
    #[must_use]
    pub fn new(span: SummarySpan) -> Self {
        Self { span, ..Self::default() }
    }

    /// Reject spans that would summarize nothing or the current turn.
    pub fn validate(&self) -> Result<(), ConfigError> {
        match self.span {
            SummarySpan::OldestMessages { count: 0 } => {
                return Err(ConfigError::Zero { field: "span.count" });
            }
            SummarySpan::KeepRecentTurns { turns: 0 } => {
                return Err(ConfigError::Zero { field: "span.turns" });
            }
            _ => {}
        }
        if self.timeout.is_some_and(DurationMs::is_zero) {
            return Err(ConfigError::Zero { field: "timeout" });
        }
        self.trigger.as_ref().map_or(Ok(()), CompactionTrigger::validate)
    }
}

/// Settings for [`SystemPromptPatcher`](crate::SystemPromptPatcher).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SystemPromptConfig {
    /// The prompt that replaces every host system message.
    pub prompt: String,
    /// Id given to the inserted prompt message.
    pub message_id: String,
}

impl Default for SystemPromptConfig {
    fn default() -> Self {
        Self { prompt: String::new(), message_id: "system-prompt".to_string() }
    }
}

impl SystemPromptConfig {
    /// Patch in `prompt`.
    #[must_use]
    pub fn new(prompt: impl Into<String>) -> Self {
        Self { prompt: prompt.into(), ..Self::default() }
    }

    /// Reject a blank prompt or id.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.prompt.trim().is_empty() {
            return Err(ConfigError::Empty { field: "prompt" });
        }
        if self.message_id.is_empty() {
            return Err(ConfigError::Empty { field: "message_id" });
        }
        Ok(())
    }
}
