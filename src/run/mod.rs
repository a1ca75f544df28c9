//! Training and inference orchestration
//!
//! The orchestrator consumes the resolved `main` block and drives the run
//! state machine over the trainer, runners, datasets and evaluators wired by
//! the configuration. See [`orchestrator`] for phase and failure semantics.

pub mod orchestrator;
pub mod runner;
pub mod trainer;

pub use orchestrator::{
    EvaluationWarning, ExperimentArgs, Orchestrator, RunSummary, StopHandle, ValidationMetric,
    ValidationRecord, DEFAULT_RANDOM_SEED,
};
pub use runner::{CopyRunner, Runner};
pub use trainer::{StepMetrics, Trainer};
