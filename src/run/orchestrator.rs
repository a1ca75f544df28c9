//! Run orchestration
//!
//! Owns the resolved `main` block's collaborators and drives the run state
//! machine:
//!
//! ```text
//! INIT -> SEEDED -> EPOCH_LOOP { BATCH_STEP -> LOG? -> VALIDATE? } -> FINISHED
//! ```
//!
//! Inference-only experiments (no trainer wired) run the reduced machine
//! `INIT -> VALIDATE-once -> FINISHED`.
//!
//! Periodic convention: the global step counter starts at 0 and is
//! incremented before each batch runs, so the first batch is step 1, and a
//! period fires when `step % period == 0`. With `logging_period=10` and
//! `validation_period=60`, a 120-step run logs at steps 10..=120 and
//! validates at steps 60 and 120.
//!
//! A batch-step failure is fatal: metrics are keyed by step index, and a
//! silent skip or retry would desynchronize them. Evaluation failures are
//! recorded as warnings and never abort the run. Cancellation via
//! [`StopHandle`] is honored only at phase boundaries, so collaborator state
//! is never observed half-updated.

use crate::component::Component;
use crate::config::{Bindings, ObjectTable};
use crate::data::{Dataset, Sentence};
use crate::error::{Error, Result};
use crate::eval::Evaluator;
use crate::exec::{LocalSessionManager, SessionManager, SessionPool};
use crate::logging;
use crate::run::runner::Runner;
use crate::run::trainer::{StepMetrics, Trainer};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::Serialize;
use std::fs;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Seed applied when an experiment declares none.
pub const DEFAULT_RANDOM_SEED: u64 = 2_574_600;

/// Marker file that identifies an initialized experiment directory.
const EXPERIMENT_MARKER: &str = "experiment.ini";

/// Summary artifact written next to the marker on FINISHED.
const SUMMARY_FILE: &str = "experiment.json";

/// Fields of `main` recognized by the orchestrator; anything else is
/// reported as unused.
const KNOWN_FIELDS: &[&str] = &[
    "name",
    "output",
    "runners",
    "trainer",
    "train_dataset",
    "val_dataset",
    "test_datasets",
    "evaluation",
    "tf_manager",
    "epochs",
    "batch_size",
    "runners_batch_size",
    "logging_period",
    "validation_period",
    "random_seed",
    "overwrite_output_dir",
];

/// Cooperative cancellation flag, checked at phase boundaries only.
#[derive(Clone, Debug, Default)]
pub struct StopHandle {
    flag: Arc<AtomicBool>,
}

impl StopHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn request_stop(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_stop_requested(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

/// One computed metric of a validation pass.
#[derive(Debug, Clone, Serialize)]
pub struct ValidationMetric {
    pub series: String,
    pub metric: String,
    pub value: f64,
}

/// Non-fatal failure recorded during a validation pass.
#[derive(Debug, Clone, Serialize)]
pub struct EvaluationWarning {
    pub series: Option<String>,
    pub message: String,
}

/// Result of one validation pass over a dataset.
#[derive(Debug, Clone, Serialize)]
pub struct ValidationRecord {
    pub step: usize,
    pub epoch: usize,
    pub dataset: String,
    pub metrics: Vec<ValidationMetric>,
    pub warnings: Vec<EvaluationWarning>,
}

/// Final run summary, also serialized to `experiment.json` in the output
/// directory.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub name: String,
    pub epochs_completed: usize,
    pub total_steps: usize,
    pub validations: usize,
    pub last_validation: Option<ValidationRecord>,
    pub test_evaluations: Vec<ValidationRecord>,
    pub stopped_early: bool,
}

/// The resolved fields of `main`, extracted and role-checked.
pub struct ExperimentArgs {
    pub name: String,
    pub output: PathBuf,
    pub runners: Vec<Arc<dyn Component>>,
    pub trainer: Option<Arc<dyn Component>>,
    pub train_dataset: Option<Arc<dyn Component>>,
    pub val_dataset: Arc<dyn Component>,
    pub test_datasets: Vec<Arc<dyn Component>>,
    pub evaluation: Vec<(String, Arc<dyn Component>)>,
    pub session_manager: Option<Arc<dyn Component>>,
    pub epochs: usize,
    pub batch_size: usize,
    pub runners_batch_size: usize,
    pub logging_period: usize,
    pub validation_period: usize,
    pub random_seed: u64,
    pub overwrite_output_dir: bool,
}

fn binding(message: impl Into<String>) -> Error {
    Error::binding("main", message)
}

impl ExperimentArgs {
    /// Extract and validate the orchestrator's arguments from the resolved
    /// `main` field table.
    pub fn from_bindings(bindings: &Bindings) -> Result<Self> {
        for (key, _) in bindings.iter() {
            if !KNOWN_FIELDS.contains(&key) {
                logging::warn(&format!("unused field main.{key}"));
            }
        }

        let name = bindings.str_field("name")?.to_string();
        let output = PathBuf::from(bindings.str_field("output")?);

        let trainer = bindings.object_opt("trainer")?;
        if let Some(comp) = &trainer {
            if comp.as_trainer().is_none() {
                return Err(binding("main.trainer does not resolve to a trainer"));
            }
        }

        let train_dataset = bindings.object_opt("train_dataset")?;
        if let Some(comp) = &train_dataset {
            if comp.as_dataset().is_none() {
                return Err(binding("main.train_dataset does not resolve to a dataset"));
            }
        }
        if trainer.is_some() != train_dataset.is_some() {
            return Err(binding(
                "trainer and train_dataset must be configured together",
            ));
        }
        let training_mode = trainer.is_some();

        let val_dataset = bindings.object_field("val_dataset")?;
        if val_dataset.as_dataset().is_none() {
            return Err(binding("main.val_dataset does not resolve to a dataset"));
        }

        let mut runners = Vec::new();
        for (i, item) in bindings.list_field("runners")?.iter().enumerate() {
            let comp = item
                .as_object()
                .cloned()
                .ok_or_else(|| binding(format!("main.runners[{i}] must be a reference")))?;
            if comp.as_runner().is_none() {
                return Err(binding(format!(
                    "main.runners[{i}] does not resolve to a runner"
                )));
            }
            runners.push(comp);
        }
        if runners.is_empty() {
            return Err(binding("main.runners must not be empty"));
        }

        let mut test_datasets = Vec::new();
        for (i, item) in bindings.list_or_empty("test_datasets")?.iter().enumerate() {
            let comp = item.as_object().cloned().ok_or_else(|| {
                binding(format!("main.test_datasets[{i}] must be a reference"))
            })?;
            if comp.as_dataset().is_none() {
                return Err(binding(format!(
                    "main.test_datasets[{i}] does not resolve to a dataset"
                )));
            }
            test_datasets.push(comp);
        }

        let mut evaluation = Vec::new();
        for (i, item) in bindings.list_or_empty("evaluation")?.iter().enumerate() {
            let pair = item.as_tuple().ok_or_else(|| {
                binding(format!(
                    "main.evaluation[{i}] must be a (series, evaluator) tuple"
                ))
            })?;
            let [series, evaluator] = pair else {
                return Err(binding(format!(
                    "main.evaluation[{i}] must have exactly two elements"
                )));
            };
            let series = series.as_str().ok_or_else(|| {
                binding(format!("main.evaluation[{i}] series must be a string"))
            })?;
            let comp = evaluator.as_object().cloned().ok_or_else(|| {
                binding(format!("main.evaluation[{i}] evaluator must be a reference"))
            })?;
            if comp.as_evaluator().is_none() {
                return Err(binding(format!(
                    "main.evaluation[{i}] does not resolve to an evaluator"
                )));
            }
            evaluation.push((series.to_string(), comp));
        }

        let session_manager = bindings.object_opt("tf_manager")?;
        if let Some(comp) = &session_manager {
            if comp.as_session_manager().is_none() {
                return Err(binding(
                    "main.tf_manager does not resolve to a session manager",
                ));
            }
        }

        let batch_size = bindings.usize_opt("batch_size")?;
        if batch_size == Some(0) {
            return Err(binding("main.batch_size must be positive"));
        }
        let (epochs, batch_size) = if training_mode {
            let epochs = bindings.usize_field("epochs")?;
            let batch_size =
                batch_size.ok_or_else(|| binding("missing required field main.batch_size"))?;
            (epochs, batch_size)
        } else {
            (0, batch_size.unwrap_or(0))
        };

        let runners_batch_size = match bindings.usize_opt("runners_batch_size")? {
            Some(0) => return Err(binding("main.runners_batch_size must be positive")),
            Some(n) => n,
            None if batch_size > 0 => batch_size,
            None => {
                return Err(binding(
                    "main.runners_batch_size is required when batch_size is not set",
                ))
            }
        };

        let logging_period = bindings.usize_opt("logging_period")?.unwrap_or(20);
        let validation_period = bindings.usize_opt("validation_period")?.unwrap_or(500);
        if logging_period == 0 || validation_period == 0 {
            return Err(binding("logging and validation periods must be positive"));
        }

        let seed = bindings.i64_or("random_seed", DEFAULT_RANDOM_SEED as i64)?;
        let random_seed = u64::try_from(seed)
            .map_err(|_| binding("main.random_seed must be non-negative"))?;

        let overwrite_output_dir = bindings.bool_or("overwrite_output_dir", false)?;

        Ok(Self {
            name,
            output,
            runners,
            trainer,
            train_dataset,
            val_dataset,
            test_datasets,
            evaluation,
            session_manager,
            epochs,
            batch_size,
            runners_batch_size,
            logging_period,
            validation_period,
            random_seed,
            overwrite_output_dir,
        })
    }
}

/// Returns whether a periodic trigger fires at this step.
///
/// Steps are counted from 1; the trigger fires on exact multiples, so the
/// boundary step of a run (e.g. step 120 with period 60) is included.
pub(crate) fn period_due(step: usize, period: usize) -> bool {
    step > 0 && step % period == 0
}

pub struct Orchestrator {
    args: ExperimentArgs,
    config_text: Option<String>,
    stop: StopHandle,
}

impl Orchestrator {
    pub fn new(args: ExperimentArgs) -> Self {
        Self {
            args,
            config_text: None,
            stop: StopHandle::new(),
        }
    }

    /// Build an orchestrator from a fully resolved object table.
    pub fn from_objects(table: &ObjectTable) -> Result<Self> {
        let main = table.get("main").ok_or(Error::MissingMain)?;
        let fields = main
            .as_field_table()
            .ok_or_else(|| binding("main must be a plain section without a class"))?;
        Ok(Self::new(ExperimentArgs::from_bindings(fields.bindings())?))
    }

    /// Attach the source configuration text, copied into the output
    /// directory on initialization.
    pub fn with_config_text(mut self, text: impl Into<String>) -> Self {
        self.config_text = Some(text.into());
        self
    }

    pub fn args(&self) -> &ExperimentArgs {
        &self.args
    }

    /// Handle for requesting a stop between phases.
    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    /// INIT phase: validate and prepare the output directory.
    ///
    /// A directory that already holds an experiment marker is rejected unless
    /// overwriting is enabled; the directory contents are never deleted.
    pub fn initialize_output(&self) -> Result<()> {
        let output = &self.args.output;
        if output.is_dir() && output.join(EXPERIMENT_MARKER).exists() {
            if self.args.overwrite_output_dir {
                logging::log(&format!(
                    "Output directory {} exists, overwriting enabled, proceeding",
                    output.display()
                ));
            } else {
                return Err(Error::OutputExists(output.clone()));
            }
        }
        if !output.is_dir() {
            fs::create_dir_all(output)?;
        }
        match &self.config_text {
            Some(text) => fs::write(output.join(EXPERIMENT_MARKER), text)?,
            None => fs::write(
                output.join(EXPERIMENT_MARKER),
                format!("; experiment {:?} (assembled in process)\n", self.args.name),
            )?,
        }
        Ok(())
    }

    /// Drive the full run state machine to FINISHED.
    pub fn run(&self) -> Result<RunSummary> {
        self.initialize_output()?;

        // All stochasticity downstream draws from this one seeded source.
        let mut rng = StdRng::seed_from_u64(self.args.random_seed);
        let mut pool = self.create_pool()?;
        let val_dataset = self.dataset_of(&self.args.val_dataset, "main.val_dataset")?;

        let mut summary = RunSummary {
            name: self.args.name.clone(),
            epochs_completed: 0,
            total_steps: 0,
            validations: 0,
            last_validation: None,
            test_evaluations: Vec::new(),
            stopped_early: false,
        };

        logging::log(&format!("Experiment {:?} starting", self.args.name));

        match (&self.args.trainer, &self.args.train_dataset) {
            (Some(trainer_comp), Some(train_comp)) => {
                let trainer = trainer_comp
                    .as_trainer()
                    .ok_or_else(|| binding("main.trainer does not resolve to a trainer"))?;
                let train_dataset = self.dataset_of(train_comp, "main.train_dataset")?;

                let mut step = 0usize;
                'epochs: for epoch in 0..self.args.epochs {
                    logging::log(&format!(
                        "Epoch {}/{} starts",
                        epoch + 1,
                        self.args.epochs
                    ));
                    for batch in train_dataset.batches(self.args.batch_size) {
                        if self.stop.is_stop_requested() {
                            summary.stopped_early = true;
                            break 'epochs;
                        }
                        step += 1;
                        let metrics = trainer
                            .train_step(pool.as_mut(), &batch, &mut rng)
                            .map_err(|err| Error::BatchStep {
                                step,
                                message: err.to_string(),
                            })?;

                        if period_due(step, self.args.logging_period) {
                            logging::log(&format!(
                                "Epoch {}, Step {}: {}",
                                epoch + 1,
                                step,
                                format_metrics(&metrics)
                            ));
                        }
                        if period_due(step, self.args.validation_period) {
                            let record =
                                self.validate(pool.as_mut(), val_dataset, step, epoch);
                            summary.validations += 1;
                            summary.last_validation = Some(record);
                        }
                    }
                    summary.epochs_completed = epoch + 1;
                }
                summary.total_steps = step;
            }
            _ => {
                // Inference-only reduced machine: one validation pass.
                let record = self.validate(pool.as_mut(), val_dataset, 0, 0);
                summary.validations = 1;
                summary.last_validation = Some(record);
            }
        }

        if !summary.stopped_early {
            for comp in &self.args.test_datasets {
                let dataset = self.dataset_of(comp, "main.test_datasets")?;
                let record = self.validate(
                    pool.as_mut(),
                    dataset,
                    summary.total_steps,
                    summary.epochs_completed,
                );
                summary.test_evaluations.push(record);
            }
        }

        self.write_summary(&summary)?;
        self.log_finish(&summary);
        Ok(summary)
    }

    fn create_pool(&self) -> Result<Box<dyn SessionPool>> {
        let default_manager;
        let manager: &dyn SessionManager = match &self.args.session_manager {
            Some(comp) => comp.as_session_manager().ok_or_else(|| {
                binding("main.tf_manager does not resolve to a session manager")
            })?,
            None => {
                default_manager = LocalSessionManager::default();
                &default_manager
            }
        };
        manager
            .create_sessions(manager.num_sessions(), manager.num_threads())
            .map_err(|err| binding(format!("cannot create execution sessions: {err}")))
    }

    fn dataset_of<'a>(&self, comp: &'a Arc<dyn Component>, path: &str) -> Result<&'a Dataset> {
        comp.as_dataset()
            .ok_or_else(|| binding(format!("{path} does not resolve to a dataset")))
    }

    /// VALIDATE phase: run every runner over the dataset, then score each
    /// configured (series, evaluator) pair. Never mutates trainer state and
    /// never fails; everything that goes wrong becomes a warning.
    fn validate(
        &self,
        pool: &mut dyn SessionPool,
        dataset: &Dataset,
        step: usize,
        epoch: usize,
    ) -> ValidationRecord {
        let mut warnings: Vec<EvaluationWarning> = Vec::new();
        let mut produced: Vec<(String, Vec<Sentence>)> = Vec::new();

        for comp in &self.args.runners {
            let Some(runner) = comp.as_runner() else {
                continue;
            };
            match self.run_runner(runner, pool, dataset) {
                Ok(outputs) => produced.push((runner.output_series().to_string(), outputs)),
                Err(message) => warnings.push(EvaluationWarning {
                    series: Some(runner.output_series().to_string()),
                    message,
                }),
            }
        }

        let mut metrics = Vec::new();
        for (series, comp) in &self.args.evaluation {
            let Some(evaluator) = comp.as_evaluator() else {
                continue;
            };
            let Some(gold) = dataset.series(series) else {
                warnings.push(EvaluationWarning {
                    series: Some(series.clone()),
                    message: format!("dataset {:?} has no series {series:?}", dataset.name()),
                });
                continue;
            };
            let Some((_, predicted)) = produced.iter().find(|(name, _)| name == series) else {
                warnings.push(EvaluationWarning {
                    series: Some(series.clone()),
                    message: format!("no runner produced series {series:?}"),
                });
                continue;
            };
            match evaluator.compute(gold, predicted) {
                Ok(value) => metrics.push(ValidationMetric {
                    series: series.clone(),
                    metric: evaluator.name().to_string(),
                    value,
                }),
                Err(err) => warnings.push(EvaluationWarning {
                    series: Some(series.clone()),
                    message: err.to_string(),
                }),
            }
        }

        let rendered: Vec<String> = metrics
            .iter()
            .map(|m| format!("{}[{}]={:.4}", m.metric, m.series, m.value))
            .collect();
        logging::log(&format!(
            "Validation on {:?} (step {step}, epoch {}): {}",
            dataset.name(),
            epoch + 1,
            if rendered.is_empty() {
                "no metrics".to_string()
            } else {
                rendered.join("    ")
            }
        ));
        for warning in &warnings {
            logging::warn(&warning.message);
        }

        ValidationRecord {
            step,
            epoch,
            dataset: dataset.name().to_string(),
            metrics,
            warnings,
        }
    }

    /// Run one runner over a full dataset at the runners' batch size,
    /// checking the one-output-per-input contract.
    fn run_runner(
        &self,
        runner: &dyn Runner,
        pool: &mut dyn SessionPool,
        dataset: &Dataset,
    ) -> std::result::Result<Vec<Sentence>, String> {
        let mut outputs = Vec::with_capacity(dataset.len());
        for batch in dataset.batches(self.args.runners_batch_size) {
            let records = runner
                .run_batch(pool, &batch)
                .map_err(|err| err.to_string())?;
            if records.len() != batch.len() {
                return Err(format!(
                    "runner for {:?} produced {} outputs for {} inputs",
                    runner.output_series(),
                    records.len(),
                    batch.len()
                ));
            }
            outputs.extend(records);
        }
        Ok(outputs)
    }

    fn write_summary(&self, summary: &RunSummary) -> Result<()> {
        let rendered = serde_json::to_string_pretty(summary)
            .map_err(|err| Error::binding("main", format!("cannot serialize summary: {err}")))?;
        fs::write(self.args.output.join(SUMMARY_FILE), rendered)?;
        Ok(())
    }

    fn log_finish(&self, summary: &RunSummary) {
        let tail = match &summary.last_validation {
            Some(record) if !record.metrics.is_empty() => {
                let rendered: Vec<String> = record
                    .metrics
                    .iter()
                    .map(|m| format!("{}[{}]={:.4}", m.metric, m.series, m.value))
                    .collect();
                format!("; last validation (step {}): {}", record.step, rendered.join("    "))
            }
            _ => String::new(),
        };
        logging::log(&format!(
            "Experiment {:?} finished after {} steps in {} epochs{tail}",
            summary.name, summary.total_steps, summary.epochs_completed
        ));
    }
}

fn format_metrics(metrics: &StepMetrics) -> String {
    let mut line = format!("loss={:.4}", metrics.loss);
    for (name, value) in &metrics.extras {
        line.push_str(&format!("    {name}={value:.4}"));
    }
    line
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{tokenize_lines, Batch, Dataset};
    use crate::error::BoxError;
    use crate::eval::{EvalError, ExactMatch, TokenAccuracy};
    use crate::run::runner::CopyRunner;
    use rand::RngCore;
    use std::sync::Mutex;
    use tempfile::TempDir;

    struct MockTrainer {
        // (step start index, batch length, loss) per step
        steps: Mutex<Vec<(usize, usize, f64)>>,
    }

    impl MockTrainer {
        fn new() -> Self {
            Self {
                steps: Mutex::new(Vec::new()),
            }
        }

        fn losses(&self) -> Vec<f64> {
            self.steps.lock().unwrap().iter().map(|s| s.2).collect()
        }
    }

    impl Trainer for MockTrainer {
        fn train_step(
            &self,
            _pool: &mut dyn SessionPool,
            batch: &Batch<'_>,
            rng: &mut dyn RngCore,
        ) -> std::result::Result<StepMetrics, BoxError> {
            let loss = f64::from(rng.next_u32() % 1000) / 1000.0;
            self.steps
                .lock()
                .unwrap()
                .push((batch.start(), batch.len(), loss));
            Ok(StepMetrics::new(loss))
        }
    }

    impl Component for MockTrainer {
        fn as_any(&self) -> &dyn std::any::Any {
            self
        }

        fn as_trainer(&self) -> Option<&dyn Trainer> {
            Some(self)
        }
    }

    struct FailingTrainer {
        fail_at: usize,
        calls: Mutex<usize>,
    }

    impl Trainer for FailingTrainer {
        fn train_step(
            &self,
            _pool: &mut dyn SessionPool,
            _batch: &Batch<'_>,
            _rng: &mut dyn RngCore,
        ) -> std::result::Result<StepMetrics, BoxError> {
            let mut calls = self.calls.lock().unwrap();
            *calls += 1;
            if *calls == self.fail_at {
                return Err("gradient exploded".into());
            }
            Ok(StepMetrics::new(1.0))
        }
    }

    impl Component for FailingTrainer {
        fn as_any(&self) -> &dyn std::any::Any {
            self
        }

        fn as_trainer(&self) -> Option<&dyn Trainer> {
            Some(self)
        }
    }

    struct BrokenEvaluator;

    impl Evaluator for BrokenEvaluator {
        fn name(&self) -> &str {
            "Broken"
        }

        fn compute(
            &self,
            _gold: &[Sentence],
            _predicted: &[Sentence],
        ) -> std::result::Result<f64, EvalError> {
            Err(EvalError::Empty)
        }
    }

    impl Component for BrokenEvaluator {
        fn as_any(&self) -> &dyn std::any::Any {
            self
        }

        fn as_evaluator(&self) -> Option<&dyn Evaluator> {
            Some(self)
        }
    }

    fn parallel_dataset(name: &str, records: usize) -> Arc<Dataset> {
        let lines: Vec<String> = (0..records).map(|i| format!("tok{i} tok{i}b")).collect();
        Arc::new(
            Dataset::new(
                name,
                vec![
                    ("source".to_string(), tokenize_lines(&lines)),
                    ("target".to_string(), tokenize_lines(&lines)),
                ],
            )
            .unwrap(),
        )
    }

    struct Fixture {
        // Held so the temporary output directory outlives the run.
        _out: TempDir,
        trainer: Arc<MockTrainer>,
    }

    fn args(records: usize, epochs: usize) -> (ExperimentArgs, Fixture) {
        let out = TempDir::new().unwrap();
        let trainer = Arc::new(MockTrainer::new());
        let args = ExperimentArgs {
            name: "test".to_string(),
            output: out.path().join("exp"),
            runners: vec![Arc::new(CopyRunner::new("source", "target"))],
            trainer: Some(trainer.clone()),
            train_dataset: Some(parallel_dataset("train", records)),
            val_dataset: parallel_dataset("val", 4),
            test_datasets: vec![],
            evaluation: vec![("target".to_string(), Arc::new(ExactMatch))],
            session_manager: None,
            epochs,
            batch_size: 1,
            runners_batch_size: 2,
            logging_period: 10,
            validation_period: 60,
            random_seed: 7,
            overwrite_output_dir: false,
        };
        (args, Fixture { _out: out, trainer })
    }

    #[test]
    fn period_fires_on_exact_multiples_only() {
        let due: Vec<usize> = (1..=120).filter(|s| period_due(*s, 10)).collect();
        assert_eq!(due, (1..=12).map(|i| i * 10).collect::<Vec<_>>());
        assert!(!period_due(1, 10));
        assert!(!period_due(9, 10));
        assert!(period_due(10, 10));
        assert!(!period_due(11, 10));
        assert!(!period_due(0, 10));
    }

    #[test]
    fn validates_on_period_boundaries_inclusive() {
        // 60 records, batch_size 1, 2 epochs: 120 steps, validation at 60 and 120.
        let (args, _fx) = args(60, 2);
        let summary = Orchestrator::new(args).run().unwrap();
        assert_eq!(summary.total_steps, 120);
        assert_eq!(summary.validations, 2);
        assert_eq!(summary.last_validation.as_ref().unwrap().step, 120);
        assert_eq!(summary.epochs_completed, 2);
        assert!(!summary.stopped_early);
    }

    #[test]
    fn copy_runner_scores_perfectly_on_identical_series() {
        let (args, _fx) = args(60, 1);
        let summary = Orchestrator::new(args).run().unwrap();
        let record = summary.last_validation.unwrap();
        assert_eq!(record.metrics.len(), 1);
        assert_eq!(record.metrics[0].metric, "ExactMatch");
        assert!((record.metrics[0].value - 1.0).abs() < 1e-9);
        assert!(record.warnings.is_empty());
    }

    #[test]
    fn same_seed_reproduces_step_metrics() {
        let (args_a, fx_a) = args(30, 1);
        let (args_b, fx_b) = args(30, 1);
        Orchestrator::new(args_a).run().unwrap();
        Orchestrator::new(args_b).run().unwrap();
        let losses_a = fx_a.trainer.losses();
        let losses_b = fx_b.trainer.losses();
        assert_eq!(losses_a.len(), 30);
        assert_eq!(losses_a, losses_b);
    }

    #[test]
    fn different_seed_changes_step_metrics() {
        let (args_a, fx_a) = args(30, 1);
        let (mut args_b, fx_b) = args(30, 1);
        args_b.random_seed = 8;
        Orchestrator::new(args_a).run().unwrap();
        Orchestrator::new(args_b).run().unwrap();
        assert_ne!(fx_a.trainer.losses(), fx_b.trainer.losses());
    }

    #[test]
    fn batch_order_preserves_dataset_order() {
        let (mut args, fx) = args(10, 1);
        args.batch_size = 4;
        let summary = Orchestrator::new(args).run().unwrap();
        assert_eq!(summary.total_steps, 3);
        let steps = fx.trainer.steps.lock().unwrap().clone();
        assert_eq!(
            steps.iter().map(|s| (s.0, s.1)).collect::<Vec<_>>(),
            vec![(0, 4), (4, 4), (8, 2)]
        );
    }

    #[test]
    fn batch_step_failure_is_fatal() {
        let (mut args, _fx) = args(10, 1);
        args.trainer = Some(Arc::new(FailingTrainer {
            fail_at: 3,
            calls: Mutex::new(0),
        }));
        let err = Orchestrator::new(args).run().unwrap_err();
        assert!(matches!(err, Error::BatchStep { step: 3, .. }));
        assert!(err.to_string().contains("gradient exploded"));
    }

    #[test]
    fn evaluation_failure_is_a_warning_not_an_abort() {
        let (mut args, _fx) = args(60, 1);
        args.evaluation = vec![
            ("target".to_string(), Arc::new(BrokenEvaluator)),
            ("missing_series".to_string(), Arc::new(TokenAccuracy)),
        ];
        let summary = Orchestrator::new(args).run().unwrap();
        let record = summary.last_validation.unwrap();
        assert!(record.metrics.is_empty());
        assert_eq!(record.warnings.len(), 2);
    }

    #[test]
    fn output_directory_with_marker_is_rejected() {
        let (args, _fx) = args(10, 1);
        fs::create_dir_all(&args.output).unwrap();
        fs::write(args.output.join(EXPERIMENT_MARKER), "; old\n").unwrap();
        let err = Orchestrator::new(args).run().unwrap_err();
        assert!(matches!(err, Error::OutputExists(_)));
    }

    #[test]
    fn overwrite_flag_allows_existing_output() {
        let (mut args, _fx) = args(10, 1);
        fs::create_dir_all(&args.output).unwrap();
        fs::write(args.output.join(EXPERIMENT_MARKER), "; old\n").unwrap();
        args.overwrite_output_dir = true;
        assert!(Orchestrator::new(args).run().is_ok());
    }

    #[test]
    fn summary_artifact_is_written() {
        let (args, fx) = args(10, 1);
        let output = args.output.clone();
        Orchestrator::new(args)
            .with_config_text("[main]\n")
            .run()
            .unwrap();
        assert_eq!(
            fs::read_to_string(output.join(EXPERIMENT_MARKER)).unwrap(),
            "[main]\n"
        );
        let summary: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(output.join(SUMMARY_FILE)).unwrap()).unwrap();
        assert_eq!(summary["name"], "test");
        assert_eq!(summary["total_steps"], 10);
        drop(fx);
    }

    #[test]
    fn inference_only_runs_reduced_machine() {
        let (mut args, _fx) = args(10, 1);
        args.trainer = None;
        args.train_dataset = None;
        let summary = Orchestrator::new(args).run().unwrap();
        assert_eq!(summary.total_steps, 0);
        assert_eq!(summary.epochs_completed, 0);
        assert_eq!(summary.validations, 1);
        let record = summary.last_validation.unwrap();
        assert_eq!(record.metrics.len(), 1);
    }

    #[test]
    fn stop_handle_halts_at_phase_boundary() {
        let (args, fx) = args(50, 4);
        let orchestrator = Orchestrator::new(args);
        orchestrator.stop_handle().request_stop();
        let summary = orchestrator.run().unwrap();
        assert!(summary.stopped_early);
        assert_eq!(summary.total_steps, 0);
        assert!(fx.trainer.losses().is_empty());
    }

    #[test]
    fn test_datasets_are_evaluated_at_finish() {
        let (mut args, _fx) = args(10, 1);
        args.test_datasets = vec![parallel_dataset("test_a", 3), parallel_dataset("test_b", 5)];
        let summary = Orchestrator::new(args).run().unwrap();
        assert_eq!(summary.test_evaluations.len(), 2);
        assert_eq!(summary.test_evaluations[0].dataset, "test_a");
        assert_eq!(summary.test_evaluations[1].dataset, "test_b");
    }

    #[test]
    fn zero_epochs_trains_nothing_but_finishes() {
        let (args, fx) = args(10, 0);
        let summary = Orchestrator::new(args).run().unwrap();
        assert_eq!(summary.total_steps, 0);
        assert_eq!(summary.epochs_completed, 0);
        assert!(fx.trainer.losses().is_empty());
    }
}
