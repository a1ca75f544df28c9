//! End-to-end configuration pipeline tests: text -> registry -> graph ->
//! resolution -> orchestrator.

use crate::builtin::builtin_registry;
use crate::component::Component;
use crate::config::{self, assemble, Bindings, Constructor, ParamKind, ParamSpec};
use crate::data::Batch;
use crate::error::{BoxError, Error};
use crate::exec::SessionPool;
use crate::run::{Orchestrator, StepMetrics, Trainer};
use rand::RngCore;
use std::sync::Arc;
use tempfile::TempDir;

/// Trainer whose loss decays with the number of steps taken; enough to
/// exercise the loop without any model math.
struct DecayTrainer {
    scale: f64,
    steps: std::sync::Mutex<usize>,
}

impl Trainer for DecayTrainer {
    fn train_step(
        &self,
        _pool: &mut dyn SessionPool,
        _batch: &Batch<'_>,
        _rng: &mut dyn RngCore,
    ) -> Result<StepMetrics, BoxError> {
        let mut steps = self.steps.lock().unwrap();
        *steps += 1;
        Ok(StepMetrics::new(self.scale / *steps as f64))
    }
}

impl Component for DecayTrainer {
    fn as_any(&self) -> &dyn std::any::Any {
        self
    }

    fn as_trainer(&self) -> Option<&dyn Trainer> {
        Some(self)
    }
}

struct DecayTrainerCtor;

impl Constructor for DecayTrainerCtor {
    fn params(&self) -> &'static [ParamSpec] {
        const PARAMS: &[ParamSpec] = &[ParamSpec::optional("scale", ParamKind::Float)];
        PARAMS
    }

    fn construct(&self, args: &Bindings) -> Result<Arc<dyn Component>, BoxError> {
        Ok(Arc::new(DecayTrainer {
            scale: args.f64_or("scale", 1.0)?,
            steps: std::sync::Mutex::new(0),
        }))
    }
}

fn registry_with_trainer() -> crate::config::ConstructorRegistry {
    let mut registry = builtin_registry();
    registry.register("trainers.decay", Arc::new(DecayTrainerCtor));
    registry
}

fn training_config(output: &std::path::Path) -> String {
    format!(
        r#"; end-to-end training experiment
[main]
name="e2e"
output="{output}"
runners=[<runner>]
trainer=<trainer>
train_dataset=<train_data>
val_dataset=<val_data>
evaluation=[("target", <exact>), ("target", <token_acc>)]
epochs=2
batch_size=2
logging_period=2
validation_period=4
random_seed=11

[trainer]
class=trainers.decay
scale=4.0

[runner]
class=runners.copy
input_series="source"
output_series="target"

[train_data]
class=data.inline
source=["a b", "c d", "e f", "g h"]
target=["a b", "c d", "e f", "g h"]

[val_data]
class=data.inline
source=["x y", "z w"]
target=["x y", "z w"]

[exact]
class=eval.exact_match

[token_acc]
class=eval.token_accuracy
"#,
        output = output.display()
    )
}

#[test]
fn full_training_pipeline_from_text() {
    let dir = TempDir::new().unwrap();
    let out = dir.path().join("exp");
    let text = training_config(&out);

    let registry = config::load_str(&text).unwrap();
    let objects = assemble(&registry, &registry_with_trainer()).unwrap();
    let summary = Orchestrator::from_objects(&objects)
        .unwrap()
        .with_config_text(text.as_str())
        .run()
        .unwrap();

    // 4 records, batch_size 2, 2 epochs: 4 steps, one validation at step 4.
    assert_eq!(summary.total_steps, 4);
    assert_eq!(summary.epochs_completed, 2);
    assert_eq!(summary.validations, 1);
    let record = summary.last_validation.unwrap();
    assert_eq!(record.step, 4);
    assert_eq!(record.metrics.len(), 2);
    assert!(record.metrics.iter().all(|m| (m.value - 1.0).abs() < 1e-9));
    assert!(out.join("experiment.ini").exists());
    assert!(out.join("experiment.json").exists());
}

#[test]
fn inference_only_pipeline_from_text() {
    let dir = TempDir::new().unwrap();
    let text = format!(
        r#"[main]
name="infer"
output="{output}"
runners=[<runner>]
val_dataset=<val_data>
runners_batch_size=2
evaluation=[("target", <exact>)]

[runner]
class=runners.copy
input_series="source"
output_series="target"

[val_data]
class=data.inline
source=["a b", "c d", "e f"]
target=["a b", "c d", "e f"]

[exact]
class=eval.exact_match
"#,
        output = dir.path().join("infer").display()
    );

    let registry = config::load_str(&text).unwrap();
    let objects = assemble(&registry, &registry_with_trainer()).unwrap();
    let summary = Orchestrator::from_objects(&objects).unwrap().run().unwrap();

    assert_eq!(summary.total_steps, 0);
    assert_eq!(summary.validations, 1);
    assert_eq!(summary.last_validation.unwrap().metrics.len(), 1);
}

#[test]
fn missing_trainer_reference_names_field() {
    let text = r#"[main]
name="x"
output="out/x"
runners=[<runner>]
trainer=<trainer>

[runner]
class=runners.copy
input_series="source"
output_series="target"
"#;
    let registry = config::load_str(text).unwrap();
    let err = assemble(&registry, &registry_with_trainer()).err().unwrap();
    assert_eq!(err.to_string(), "unknown reference <trainer> at main.trainer");
}

#[test]
fn duplicate_sections_fail_at_parse() {
    let text = "[decoder]\nx=1\n[decoder]\ny=2\n";
    assert!(matches!(
        config::load_str(text).unwrap_err(),
        Error::DuplicateName(name) if name == "decoder"
    ));
}

#[test]
fn missing_main_fails_at_assembly() {
    let registry = config::load_str("[encoder]\nclass=eval.exact_match\n").unwrap();
    assert!(matches!(
        assemble(&registry, &registry_with_trainer()).err().unwrap(),
        Error::MissingMain
    ));
}

#[test]
fn unreachable_block_with_unknown_class_is_tolerated() {
    // The spare block names a class nobody registered; it is parsed but never
    // built because nothing reachable from main references it.
    let dir = TempDir::new().unwrap();
    let text = format!(
        r#"[main]
name="tolerant"
output="{output}"
runners=[<runner>]
val_dataset=<val_data>
runners_batch_size=1

[runner]
class=runners.copy
input_series="source"
output_series="target"

[val_data]
class=data.inline
source=["a"]

[spare_vocabulary]
class=vocabularies.from_file
path="missing.vocab"
"#,
        output = dir.path().join("tolerant").display()
    );

    let registry = config::load_str(&text).unwrap();
    let objects = assemble(&registry, &registry_with_trainer()).unwrap();
    assert!(objects.get("spare_vocabulary").is_none());
    assert!(objects.get("runner").is_some());
}

#[test]
fn forward_references_resolve_through_full_pipeline() {
    // main references blocks declared after it; runner references a dataset
    // declared last.
    let dir = TempDir::new().unwrap();
    let text = format!(
        r#"[main]
name="forward"
output="{output}"
runners=[<runner>]
val_dataset=<val_data>
runners_batch_size=1

[runner]
class=runners.copy
input_series="source"
output_series="target"

[val_data]
class=data.inline
source=["a"]
"#,
        output = dir.path().join("forward").display()
    );
    let registry = config::load_str(&text).unwrap();
    let objects = assemble(&registry, &registry_with_trainer()).unwrap();
    assert_eq!(objects.len(), 3);
}

#[test]
fn override_changes_resolved_value() {
    let dir = TempDir::new().unwrap();
    let out = dir.path().join("override");
    let text = training_config(&out);
    let mut registry = config::load_str(&text).unwrap();
    config::apply_overrides(&mut registry, &["main.epochs=1".to_string()]).unwrap();

    let objects = assemble(&registry, &registry_with_trainer()).unwrap();
    let orchestrator = Orchestrator::from_objects(&objects).unwrap();
    assert_eq!(orchestrator.args().epochs, 1);
}

#[test]
fn binding_error_reports_unexpected_field() {
    let text = r#"[main]
name="x"
output="out/x"
runners=[<runner>]
val_dataset=<val_data>
runners_batch_size=1

[runner]
class=runners.copy
input_series="source"
output_series="target"
beam_width=5

[val_data]
class=data.inline
source=["a"]
"#;
    let registry = config::load_str(text).unwrap();
    let err = assemble(&registry, &registry_with_trainer()).err().unwrap();
    assert!(err.to_string().contains("unexpected fields: beam_width"));
}
