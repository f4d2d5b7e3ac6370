#![doc = include_str!("../README.md")]

pub mod config;
pub mod context;
pub mod pipeline;
pub mod processor;
pub mod turn;
pub mod validator;

pub use config::{
    CompactionTrigger, PipelineConfig, ProcessorConfig, RedactionConfig, SummarizationConfig,
    SummarySpan, SystemPromptConfig, TokenBudgetConfig, WindowConfig,
};
pub use context::RunContext;
pub use pipeline::{Pipeline, PipelineBuilder, ProcessingResult, StepOutcome, StepReport};
pub use processor::{
    Collaborators, Processor, RedactionProcessor, StepOutput, StepStats, SummarizationProcessor,
    SystemPromptPatcher, TokenBudgetProcessor, WindowProcessor,
};
pub use turn::{Segmentation, TurnRule, segment};
pub use validator::{Validator, ValidatorConfig, validate};
