//! Runner (inference) collaborator interface

use crate::component::Component;
use crate::data::{Batch, Sentence};
use crate::error::BoxError;
use crate::exec::SessionPool;
use std::any::Any;

/// An inference collaborator: given a batch, produces exactly one output
/// record per input record, order-preserving, under its output series name.
/// Runners only read model state; they are invoked during validation.
pub trait Runner: Send + Sync {
    fn output_series(&self) -> &str;

    fn run_batch(
        &self,
        pool: &mut dyn SessionPool,
        batch: &Batch<'_>,
    ) -> Result<Vec<Sentence>, BoxError>;
}

/// Baseline runner that copies an input series verbatim.
///
/// Useful as a sanity floor for evaluation wiring: any trained model should
/// beat a runner that just echoes its input.
pub struct CopyRunner {
    input_series: String,
    output_series: String,
}

impl CopyRunner {
    pub fn new(input_series: impl Into<String>, output_series: impl Into<String>) -> Self {
        Self {
            input_series: input_series.into(),
            output_series: output_series.into(),
        }
    }
}

impl Runner for CopyRunner {
    fn output_series(&self) -> &str {
        &self.output_series
    }

    fn run_batch(
        &self,
        pool: &mut dyn SessionPool,
        batch: &Batch<'_>,
    ) -> Result<Vec<Sentence>, BoxError> {
        let input = self.input_series.clone();
        let payload = pool.run(
            &mut |b: &Batch<'_>| {
                let records = b.series(&input).ok_or_else(|| -> BoxError {
                    format!("batch has no series {input:?}").into()
                })?;
                Ok(Box::new(records.to_vec()) as Box<dyn Any + Send>)
            },
            batch,
        )?;
        payload
            .downcast::<Vec<Sentence>>()
            .map(|records| *records)
            .map_err(|_| "session returned an unexpected payload".into())
    }
}

impl Component for CopyRunner {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_runner(&self) -> Option<&dyn Runner> {
        Some(self)
    }
}
