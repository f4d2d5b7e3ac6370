use std::ops::Range;
use std::sync::Arc;

use chronicle_types::{
    ConfigError, Message, Role, SummarizationError, Summarizer, TokenEstimator, TokenUsage,
    Transcript,
};
use tokio::time::Instant;

use crate::config::{SummarizationConfig, SummarySpan};
use crate::context::RunContext;
use crate::processor::{StepOutput, StepStats};
use crate::turn::{Segmentation, segment};

/// Replaces the oldest turns with one synthetic summary message.
///
/// The span to summarize always ends on a turn boundary and never includes
/// the most recent turn. Earlier summaries sitting in the preamble are handed
/// to the summarizer along with the span and folded into the new summary, so
/// summaries do not pile up.
///
/// The summary is a [`Role::System`] message with
/// [`Content::Compaction`](chronicle_types::Content::Compaction) content and
/// no `tool_call_id`. It takes the position and timestamp of the earliest
/// message it replaces, and its id is `summary:<id of the last summarized
/// message>`.
///
/// The summarizer call is bounded by the configured timeout and by the run's
/// deadline and cancellation. Any failure surfaces as a
/// [`SummarizationError`]; nothing is removed in that case.
#[derive(Clone)]
pub struct SummarizationProcessor {
    config: SummarizationConfig,
    summarizer: Arc<dyn Summarizer>,
    estimator: Arc<dyn TokenEstimator>,
}

impl std::fmt::Debug for SummarizationProcessor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SummarizationProcessor")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

/// The messages a run will replace.
struct Plan {
    /// Earlier summaries in the preamble.
    folded: Vec<usize>,
    /// The turns being summarized.
    span: Range<usize>,
}

impl SummarizationProcessor {
    /// Create a summarization step.
    pub fn new(
        config: SummarizationConfig,
        summarizer: Arc<dyn Summarizer>,
        estimator: Arc<dyn TokenEstimator>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self { config, summarizer, estimator })
    }

    /// The step's configuration.
    #[must_use]
    pub fn config(&self) -> &SummarizationConfig {
        &self.config
    }

    /// Summarize the oldest turns of `transcript`.
    pub async fn process(
        &self,
        transcript: &Transcript,
        ctx: &RunContext,
    ) -> Result<StepOutput, SummarizationError> {
        if let Some(trigger) = &self.config.trigger {
            let consumed = self.consumption(transcript);
            if !trigger.fires(consumed) {
                tracing::debug!(consumed, "below compaction threshold");
                return Ok(StepOutput::skipped(transcript, "below compaction threshold"));
            }
        }

        let messages = transcript.messages();
        let seg = segment(messages, self.config.turn_rule);
        let Some(plan) = self.plan(messages, &seg) else {
            return Ok(StepOutput::skipped(transcript, "not enough history to summarize"));
        };

        let input: Vec<Arc<Message>> = plan
            .folded
            .iter()
            .map(|&index| Arc::clone(&messages[index]))
            .chain(messages[plan.span.clone()].iter().cloned())
            .collect();
        let (text, usage) = self.summarize(&input, ctx).await?;

        let earliest = plan.folded.first().copied().unwrap_or(plan.span.start);
        let last_summarized = &messages[plan.span.end - 1];
        let summary = Message::compaction(
            format!("summary:{}", last_summarized.id()),
            text,
            messages[earliest].timestamp(),
        );

        let mut out = Vec::with_capacity(messages.len() - input.len() + 1);
        for (index, message) in messages.iter().enumerate() {
            if index == earliest {
                out.push(Arc::new(summary.clone()));
            }
            if !plan.span.contains(&index) && !plan.folded.contains(&index) {
                out.push(Arc::clone(message));
            }
        }

        let stats = StepStats {
            summarized: plan.span.len(),
            merged: plan.folded.len(),
            summarizer_usage: usage,
            ..StepStats::default()
        };
        tracing::info!(
            summarized = stats.summarized,
            merged = stats.merged,
            summarizer_tokens = usage.total(),
            summary_id = %summary.id(),
            "compacted history"
        );
        Ok(StepOutput::changed(Transcript::from_shared(out), stats))
    }

    /// Tokens the conversation currently consumes: the latest non-zero usage
    /// the model reported, or the estimated total when no usage is known.
    /// Assistant messages without usage (tool-call turns) are walked past.
    fn consumption(&self, transcript: &Transcript) -> usize {
        transcript
            .iter()
            .rev()
            .filter(|m| m.role() == Role::Assistant)
            .find_map(|m| m.usage().filter(|usage| usage.total() > 0))
            .map_or_else(
                || transcript.total_tokens(self.estimator.as_ref()),
                |usage| usage.total(),
            )
    }

    fn plan(&self, messages: &[Arc<Message>], seg: &Segmentation) -> Option<Plan> {
        let last_turn = seg.turns.last()?;
        let start = seg.preamble.end;
        let limit = last_turn.start;
        let min_messages = self.config.min_messages.max(1);

        let end = match self.config.span {
            SummarySpan::KeepRecentTurns { turns } => seg.tail_start(turns).unwrap_or(start),
            SummarySpan::OldestMessages { count } => {
                let target = start + count.saturating_sub(1);
                seg.turns
                    .iter()
                    .find(|turn| turn.contains(&target))
                    .map_or(limit, |turn| turn.end)
                    .min(limit)
            }
        };

        let span = if end - start >= min_messages {
            start..end
        } else if limit - start >= min_messages {
            tracing::debug!(selected = end - start, min_messages, "widening summary span");
            start..limit
        } else {
            return None;
        };

        let folded =
            seg.preamble.clone().filter(|&index| messages[index].is_compaction()).collect();
        Some(Plan { folded, span })
    }

    async fn summarize(
        &self,
        input: &[Arc<Message>],
        ctx: &RunContext,
    ) -> Result<(String, TokenUsage), SummarizationError> {
        let deadline = ctx.deadline_within(self.config.timeout.map(|t| t.to_std()));
        let call = self.summarizer.summarize(input);

        let result = tokio::select! {
            biased;
            () = ctx.cancellation().cancelled() => Err(SummarizationError::Cancelled),
            result = async {
                match deadline {
                    Some(deadline) => {
                        let budget = deadline.saturating_duration_since(Instant::now());
                        tokio::time::timeout_at(deadline, call)
                            .await
                            .unwrap_or(Err(SummarizationError::Timeout(budget)))
                    }
                    None => call.await,
                }
            } => result,
        };

        let message = result?;
        if message.content().is_blank() {
            return Err(SummarizationError::EmptySummary);
        }
        let text = message.text().map_or_else(|| message.content().render(), str::to_owned);
        Ok((text, message.usage().unwrap_or_default()))
    }
}
