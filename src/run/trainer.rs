//! Trainer collaborator interface

use crate::data::Batch;
use crate::error::BoxError;
use crate::exec::SessionPool;
use rand::RngCore;

/// Step-local metrics reported by a trainer.
#[derive(Debug, Clone)]
pub struct StepMetrics {
    pub loss: f64,
    /// Additional named scalars, in reporting order.
    pub extras: Vec<(String, f64)>,
}

impl StepMetrics {
    pub fn new(loss: f64) -> Self {
        Self {
            loss,
            extras: Vec::new(),
        }
    }

    pub fn with_extra(mut self, name: impl Into<String>, value: f64) -> Self {
        self.extras.push((name.into(), value));
        self
    }
}

/// A training collaborator: consumes one aligned batch per step via the
/// session pool and reports its step-local metrics.
///
/// The orchestrator hands every step the run's seeded random source; a
/// trainer must draw all of its stochasticity from it so that runs with the
/// same seed are reproducible. A step failure is fatal for the whole run.
pub trait Trainer: Send + Sync {
    fn train_step(
        &self,
        pool: &mut dyn SessionPool,
        batch: &Batch<'_>,
        rng: &mut dyn RngCore,
    ) -> Result<StepMetrics, BoxError>;
}
