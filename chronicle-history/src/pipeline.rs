//! The pipeline runner.
//!
//! A [`Pipeline`] applies its steps in order and validates the transcript
//! before the first step and after every step. It never hands back a
//! transcript that failed validation: when a step produces one, the run stops
//! and the error carries the input to that step.
//!
//! A summarizer failure is the one step failure that does not stop the run.
//! The step passes its input through unchanged and the failure is recorded in
//! the step's [`StepReport`].

use std::sync::Arc;

use chronicle_types::{
    ConfigError, PipelineError, StepError, Summarizer, TokenEstimator, Transcript,
};

use crate::config::{PipelineConfig, ProcessorConfig};
use crate::context::RunContext;
use crate::processor::{Collaborators, Processor, StepStats};
use crate::validator::{Validator, ValidatorConfig};

/// How a single step ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepOutcome {
    /// The step changed the transcript.
    Applied,
    /// The step ran and had nothing to change.
    Unchanged,
    /// The step decided not to act.
    Skipped(String),
    /// The step's summarizer failed; the transcript passed through.
    Failed(String),
}

/// Diagnostics for one step of a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepReport {
    /// Zero-based step index.
    pub index: usize,
    /// Processor name.
    pub processor: &'static str,
    /// How the step ended.
    pub outcome: StepOutcome,
    /// Counts for this step.
    pub stats: StepStats,
    /// Messages going in.
    pub input_len: usize,
    /// Messages coming out.
    pub output_len: usize,
}

/// The outcome of a successful run.
#[derive(Debug, Clone)]
pub struct ProcessingResult {
    /// The transcript to submit to the model.
    pub transcript: Transcript,
    /// Counts summed over all steps.
    pub stats: StepStats,
    /// A budget step had to keep a turn that alone exceeds its budget.
    pub truncation_incomplete: bool,
    /// One report per step, in order.
    pub steps: Vec<StepReport>,
}

impl ProcessingResult {
    /// Steps whose summarizer failed.
    pub fn failures(&self) -> impl Iterator<Item = &StepReport> {
        self.steps.iter().filter(|step| matches!(step.outcome, StepOutcome::Failed(_)))
    }

    /// Take the processed transcript.
    #[must_use]
    pub fn into_transcript(self) -> Transcript {
        self.transcript
    }
}

/// An ordered list of validated processor steps.
///
/// # Example
///
/// ```
/// use chronicle_history::{Pipeline, ProcessorConfig, WindowConfig};
/// use chronicle_types::{Message, Transcript};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let pipeline = Pipeline::builder()
///     .step(ProcessorConfig::Window(WindowConfig::new(1)))
///     .build()
///     .unwrap();
/// let result = pipeline
///     .run(&Transcript::new(vec![Message::user("m1", "old"), Message::user("m2", "new")]))
///     .await
///     .unwrap();
/// assert_eq!(result.transcript.len(), 1);
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct Pipeline {
    steps: Vec<Processor>,
    validator: Validator,
}

impl Pipeline {
    /// Start building a pipeline.
    #[must_use]
    pub fn builder() -> PipelineBuilder {
        PipelineBuilder::default()
    }

    /// Wrap already constructed processors.
    #[must_use]
    pub fn new(steps: Vec<Processor>, validation: ValidatorConfig) -> Self {
        Self { steps, validator: Validator::new(validation) }
    }

    /// Build every step `config` lists. Errors name the offending step.
    pub fn from_config(
        config: &PipelineConfig,
        collaborators: &Collaborators,
    ) -> Result<Self, ConfigError> {
        let steps = config
            .steps
            .iter()
            .enumerate()
            .map(|(index, step)| {
                Processor::from_config(step, collaborators).map_err(|err| err.at_step(index))
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self::new(steps, config.validation))
    }

    /// The steps, in order.
    #[must_use]
    pub fn steps(&self) -> &[Processor] {
        &self.steps
    }

    /// The validator applied between steps.
    #[must_use]
    pub fn validator(&self) -> &Validator {
        &self.validator
    }

    /// Run every step with no cancellation or deadline.
    pub async fn run(&self, transcript: &Transcript) -> Result<ProcessingResult, PipelineError> {
        self.run_with(transcript, &RunContext::new()).await
    }

    /// Run every step, passing `ctx` to steps that await collaborators.
    pub async fn run_with(
        &self,
        transcript: &Transcript,
        ctx: &RunContext,
    ) -> Result<ProcessingResult, PipelineError> {
        self.validator.validate(transcript).map_err(PipelineError::InvalidInput)?;

        let mut current = transcript.clone();
        let mut stats = StepStats::default();
        let mut truncation_incomplete = false;
        let mut reports = Vec::with_capacity(self.steps.len());

        for (index, step) in self.steps.iter().enumerate() {
            let processor = step.name();
            let input_len = current.len();

            let output = match step.apply(&current, ctx).await {
                Ok(output) => output,
                Err(StepError::Summarization(err)) => {
                    tracing::warn!(
                        step = index,
                        processor,
                        error = %err,
                        "summarizer failed, passing transcript through"
                    );
                    reports.push(StepReport {
                        index,
                        processor,
                        outcome: StepOutcome::Failed(err.to_string()),
                        stats: StepStats::default(),
                        input_len,
                        output_len: input_len,
                    });
                    continue;
                }
                Err(cause) => return Err(step_failed(index, processor, cause, current)),
            };

            if let Err(cause) = self.validator.check_step(processor, &current, &output.transcript) {
                tracing::warn!(
                    step = index,
                    processor,
                    error = %cause,
                    "step produced an invalid transcript"
                );
                return Err(step_failed(index, processor, cause, current));
            }

            let outcome = match output.skipped {
                Some(reason) => StepOutcome::Skipped(reason),
                None if output.transcript.same_messages(&current) => StepOutcome::Unchanged,
                None => StepOutcome::Applied,
            };
            tracing::debug!(
                step = index,
                processor,
                ?outcome,
                input_len,
                output_len = output.transcript.len(),
                "step finished"
            );

            stats.absorb(&output.stats);
            truncation_incomplete |= output.truncation_incomplete;
            reports.push(StepReport {
                index,
                processor,
                outcome,
                stats: output.stats,
                input_len,
                output_len: output.transcript.len(),
            });
            current = output.transcript;
        }

        tracing::info!(
            steps = reports.len(),
            input_len = transcript.len(),
            output_len = current.len(),
            dropped = stats.dropped,
            summarized = stats.summarized,
            summarizer_tokens = stats.summarizer_usage.total(),
            "pipeline finished"
        );
        Ok(ProcessingResult { transcript: current, stats, truncation_incomplete, steps: reports })
    }
}

fn step_failed(
    step_index: usize,
    processor: &str,
    cause: StepError,
    last_valid: Transcript,
) -> PipelineError {
    PipelineError::Step { step_index, processor: processor.to_string(), cause, last_valid }
}

enum PendingStep {
    Config(ProcessorConfig),
    Built(Processor),
}

/// Registers steps and collaborators, then validates everything at once.
///
/// Collaborators apply to every configured step regardless of the order in
/// which builder methods are called.
#[derive(Default)]
pub struct PipelineBuilder {
    steps: Vec<PendingStep>,
    collaborators: Collaborators,
    validation: ValidatorConfig,
}

impl PipelineBuilder {
    /// Append a step described by configuration.
    #[must_use]
    pub fn step(mut self, config: ProcessorConfig) -> Self {
        self.steps.push(PendingStep::Config(config));
        self
    }

    /// Append an already constructed processor.
    #[must_use]
    pub fn processor(mut self, processor: impl Into<Processor>) -> Self {
        self.steps.push(PendingStep::Built(processor.into()));
        self
    }

    /// Token estimator for budget and summarization steps. Defaults to
    /// [`TokenCounter`](chronicle_types::TokenCounter).
    #[must_use]
    pub fn estimator(mut self, estimator: Arc<dyn TokenEstimator>) -> Self {
        self.collaborators.estimator = estimator;
        self
    }

    /// Summarizer for summarization steps.
    #[must_use]
    pub fn summarizer(mut self, summarizer: Arc<dyn Summarizer>) -> Self {
        self.collaborators.summarizer = Some(summarizer);
        self
    }

    /// Validation rules.
    #[must_use]
    pub fn validation(mut self, validation: ValidatorConfig) -> Self {
        self.validation = validation;
        self
    }

    /// Build the pipeline, rejecting the first invalid step.
    pub fn build(self) -> Result<Pipeline, ConfigError> {
        let collaborators = self.collaborators;
        let steps = self
            .steps
            .into_iter()
            .enumerate()
            .map(|(index, step)| match step {
                PendingStep::Config(config) => Processor::from_config(&config, &collaborators)
                    .map_err(|err| err.at_step(index)),
                PendingStep::Built(processor) => Ok(processor),
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Pipeline::new(steps, self.validation))
    }
}
