//! The object-graph currency
//!
//! Every constructed configuration block is stored in the object table as an
//! `Arc<dyn Component>`. The engine itself only needs a handful of views onto
//! those objects (trainer, runner, dataset, evaluator, session manager, plain
//! field table); everything else stays opaque and can be recovered by the
//! embedding application through [`Component::as_any`].

use std::any::Any;

use crate::config::binder::FieldTable;
use crate::data::Dataset;
use crate::eval::Evaluator;
use crate::exec::SessionManager;
use crate::run::{Runner, Trainer};

/// A resolved configuration object.
///
/// All accessor methods default to `None`; a collaborator overrides the one
/// matching the role it plays in the experiment. A single object may play
/// several roles.
pub trait Component: Send + Sync + 'static {
    /// Escape hatch for application-defined collaborator types.
    fn as_any(&self) -> &dyn Any;

    fn as_trainer(&self) -> Option<&dyn Trainer> {
        None
    }

    fn as_runner(&self) -> Option<&dyn Runner> {
        None
    }

    fn as_dataset(&self) -> Option<&Dataset> {
        None
    }

    fn as_evaluator(&self) -> Option<&dyn Evaluator> {
        None
    }

    fn as_session_manager(&self) -> Option<&dyn SessionManager> {
        None
    }

    fn as_field_table(&self) -> Option<&FieldTable> {
        None
    }
}
