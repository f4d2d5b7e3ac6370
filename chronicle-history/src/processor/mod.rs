//! The processor family.
//!
//! Processors form a closed set registered through [`ProcessorConfig`]. Each
//! variant is a struct holding its validated, immutable configuration. The
//! [`Processor`] enum dispatches over them so a pipeline can hold a uniform
//! list of steps.

mod budget;
mod redaction;
mod summarization;
mod system_prompt;
mod window;

use std::sync::Arc;

use chronicle_types::{
    ConfigError, StepError, Summarizer, TokenCounter, TokenEstimator, TokenUsage, Transcript,
};

pub use budget::TokenBudgetProcessor;
pub use redaction::RedactionProcessor;
pub use summarization::SummarizationProcessor;
pub use system_prompt::SystemPromptPatcher;
pub use window::WindowProcessor;

use crate::config::ProcessorConfig;
use crate::context::RunContext;

/// Host-supplied callbacks shared by every step of a pipeline.
#[derive(Clone)]
pub struct Collaborators {
    /// Per-message token estimator.
    pub estimator: Arc<dyn TokenEstimator>,
    /// Summarizer for summarization steps.
    pub summarizer: Option<Arc<dyn Summarizer>>,
}

impl Collaborators {
    /// Collaborators using `estimator` and no summarizer.
    #[must_use]
    pub fn new(estimator: Arc<dyn TokenEstimator>) -> Self {
        Self { estimator, summarizer: None }
    }

    /// Add a summarizer.
    #[must_use]
    pub fn with_summarizer(mut self, summarizer: Arc<dyn Summarizer>) -> Self {
        self.summarizer = Some(summarizer);
        self
    }
}

impl Default for Collaborators {
    fn default() -> Self {
        Self::new(Arc::new(TokenCounter::new()))
    }
}

impl std::fmt::Debug for Collaborators {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Collaborators")
            .field("summarizer", &self.summarizer.is_some())
            .finish_non_exhaustive()
    }
}

/// Message counts and summarizer spend a step reports for observability.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StepStats {
    /// Messages removed outright.
    pub dropped: usize,
    /// Earlier summaries folded into a new one.
    pub merged: usize,
    /// Messages replaced by a summary.
    pub summarized: usize,
    /// Messages whose content was redacted.
    pub redacted_messages: usize,
    /// Individual spans replaced by the placeholder.
    pub redacted_spans: usize,
    /// Tokens the summarizer reported spending on its own calls.
    pub summarizer_usage: TokenUsage,
}

impl StepStats {
    /// Add `other` into `self`.
    pub fn absorb(&mut self, other: &StepStats) {
        self.dropped += other.dropped;
        self.merged += other.merged;
        self.summarized += other.summarized;
        self.redacted_messages += other.redacted_messages;
        self.redacted_spans += other.redacted_spans;
        self.summarizer_usage.accumulate(&other.summarizer_usage);
    }
}

/// What a single processor produced.
#[derive(Debug, Clone)]
pub struct StepOutput {
    /// The transformed transcript.
    pub transcript: Transcript,
    /// Counts for this step.
    pub stats: StepStats,
    /// The most recent turn alone is over budget and was kept anyway.
    pub truncation_incomplete: bool,
    /// Why the step decided not to act, if it did not.
    pub skipped: Option<String>,
}

impl StepOutput {
    /// Output that changed messages according to `stats`.
    #[must_use]
    pub fn changed(transcript: Transcript, stats: StepStats) -> Self {
        Self { transcript, stats, truncation_incomplete: false, skipped: None }
    }

    /// Output that hands `transcript` back untouched.
    #[must_use]
    pub fn unchanged(transcript: &Transcript) -> Self {
        Self::changed(transcript.clone(), StepStats::default())
    }

    /// Output for a step that chose not to act.
    #[must_use]
    pub fn skipped(transcript: &Transcript, reason: impl Into<String>) -> Self {
        Self { skipped: Some(reason.into()), ..Self::unchanged(transcript) }
    }
}

/// One configured pipeline step.
#[derive(Debug, Clone)]
pub enum Processor {
    /// See [`WindowProcessor`].
    Window(WindowProcessor),
    /// See [`TokenBudgetProcessor`].
    TokenBudget(TokenBudgetProcessor),
    /// See [`RedactionProcessor`].
    Redaction(RedactionProcessor),
    /// See [`SummarizationProcessor`].
    Summarization(SummarizationProcessor),
    /// See [`SystemPromptPatcher`].
    SystemPrompt(SystemPromptPatcher),
}

impl Processor {
    /// Build the processor `config` describes, wiring in `collaborators`.
    pub fn from_config(
        config: &ProcessorConfig,
        collaborators: &Collaborators,
    ) -> Result<Self, ConfigError> {
        Ok(match config {
            ProcessorConfig::Window(config) => Self::Window(WindowProcessor::new(*config)?),
            ProcessorConfig::TokenBudget(config) => Self::TokenBudget(TokenBudgetProcessor::new(
                *config,
                Arc::clone(&collaborators.estimator),
            )?),
            ProcessorConfig::Redaction(config) => {
                Self::Redaction(RedactionProcessor::new(config.clone())?)
            }
            ProcessorConfig::Summarization(config) => {
                let summarizer =
                    collaborators.summarizer.clone().ok_or(ConfigError::MissingSummarizer)?;
                Self::Summarization(SummarizationProcessor::new(
                    *config,
                    summarizer,
                    Arc::clone(&collaborators.estimator),
                )?)
            }
            ProcessorConfig::SystemPrompt(config) => {
                Self::SystemPrompt(SystemPromptPatcher::new(config.clone())?)
            }
        })
    }

    /// Short name used in logs, reports and errors.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Window(_) => "window",
            Self::TokenBudget(_) => "token_budget",
            Self::Redaction(_) => "redaction",
            Self::Summarization(_) => "summarization",
            Self::SystemPrompt(_) => "system_prompt",
        }
    }

    /// Apply the step to `transcript`.
    ///
    /// Only summarization awaits anything; it observes `ctx` for
    /// cancellation and deadline.
    pub async fn apply(
        &self,
        transcript: &Transcript,
        ctx: &RunContext,
    ) -> Result<StepOutput, StepError> {
        match self {
            Self::Window(p) => Ok(p.process(transcript)),
            Self::TokenBudget(p) => Ok(p.process(transcript)),
            Self::Redaction(p) => Ok(p.process(transcript)?),
            Self::Summarization(p) => Ok(p.process(transcript, ctx).await?),
            Self::SystemPrompt(p) => Ok(p.process(transcript)),
        }
    }
}

impl From<WindowProcessor> for Processor {
    fn from(p: WindowProcessor) -> Self {
        Self::Window(p)
    }
}

impl From<TokenBudgetProcessor> for Processor {
    fn from(p: TokenBudgetProcessor) -> Self {
        Self::TokenBudget(p)
    }
}

impl From<RedactionProcessor> for Processor {
    fn from(p: RedactionProcessor) -> Self {
        Self::Redaction(p)
    }
}

impl From<SummarizationProcessor> for Processor {
    fn from(p: SummarizationProcessor) -> Self {
        Self::Summarization(p)
    }
}

impl From<SystemPromptPatcher> for Processor {
    fn from(p: SystemPromptPatcher) -> Self {
        Self::SystemPrompt(p)
    }
}
