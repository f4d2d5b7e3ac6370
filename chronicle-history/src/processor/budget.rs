use std::sync::Arc;

use chronicle_types::{ConfigError, TokenEstimator, Transcript};

use crate::config::TokenBudgetConfig;
use crate::processor::{StepOutput, StepStats};
use crate::turn::segment;

/// Drops the oldest whole turns until the estimated total fits `max_tokens`.
///
/// The preamble counts toward the total but is never dropped, and neither is
/// the most recent turn. When what remains is still over budget the output is
/// flagged `truncation_incomplete` instead of failing.
#[derive(Clone)]
pub struct TokenBudgetProcessor {
    config: TokenBudgetConfig,
    estimator: Arc<dyn TokenEstimator>,
}

impl std::fmt::Debug for TokenBudgetProcessor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenBudgetProcessor")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl TokenBudgetProcessor {
    /// Create a budget processor, rejecting `max_tokens == 0`.
    pub fn new(
        config: TokenBudgetConfig,
        estimator: Arc<dyn TokenEstimator>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self { config, estimator })
    }

    /// The budget's configuration.
    #[must_use]
    pub fn config(&self) -> &TokenBudgetConfig {
        &self.config
    }

    /// Apply the budget.
    #[must_use]
    pub fn process(&self, transcript: &Transcript) -> StepOutput {
        let messages = transcript.messages();
        let estimator = self.estimator.as_ref();
        let seg = segment(messages, self.config.turn_rule);

        let cost = |range: &std::ops::Range<usize>| -> usize {
            messages[range.clone()].iter().map(|m| m.tokens(estimator)).sum()
        };
        // Estimated once per run; messages keep no estimator state.
        let turn_costs: Vec<usize> = seg.turns.iter().map(cost).collect();
        let mut total = cost(&seg.preamble) + turn_costs.iter().sum::<usize>();
        let max_tokens = self.config.max_tokens;

        let mut dropped_turns = 0;
        while total > max_tokens && turn_costs.len() - dropped_turns > 1 {
            total -= turn_costs[dropped_turns];
            dropped_turns += 1;
        }

        let truncation_incomplete = total > max_tokens;
        if truncation_incomplete {
            tracing::warn!(total, max_tokens, "most recent turn alone exceeds the token budget");
        }

        if dropped_turns == 0 {
            return StepOutput { truncation_incomplete, ..StepOutput::unchanged(transcript) };
        }

        let dropped = seg.messages_in_oldest(dropped_turns);
        let tail = seg.turns[dropped_turns].start;
        tracing::debug!(dropped_turns, dropped, total, max_tokens, "token budget applied");

        let kept = messages[seg.preamble.clone()].iter().chain(&messages[tail..]).cloned();
        StepOutput {
            truncation_incomplete,
            ..StepOutput::changed(kept.collect(), StepStats { dropped, ..StepStats::default() })
        }
    }
}
