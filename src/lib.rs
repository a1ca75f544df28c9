//! # Armar: Declarative Experiment Assembly & Training Orchestration
//!
//! Armar turns a declarative description of a training pipeline (named,
//! cross-referencing configuration blocks for datasets, model components,
//! runners and evaluators) into a live object graph, then drives a
//! train/validate/evaluate loop over it.
//!
//! ## Architecture
//!
//! - **config**: parser, block registry, reference graph, resolver, binder
//! - **component**: the object-graph currency (`Arc<dyn Component>`)
//! - **data**: datasets of parallel aligned series and batch slicing
//! - **exec**: execution session manager interface + local fallback
//! - **eval**: metrics over output series
//! - **run**: trainer/runner interfaces and the run orchestrator
//! - **builtin**: constructors for the collaborators shipped with the crate
//!
//! ## Example
//!
//! ```
//! use armar::builtin::builtin_registry;
//! use armar::config;
//!
//! let text = r#"
//! [main]
//! name="smoke"
//! output="out/smoke"
//! runners=[<runner>]
//! val_dataset=<val_data>
//! runners_batch_size=2
//!
//! [runner]
//! class=runners.copy
//! input_series="source"
//! output_series="hypothesis"
//!
//! [val_data]
//! class=data.inline
//! source=["a b", "c d"]
//! "#;
//!
//! let registry = config::load_str(text).unwrap();
//! let objects = config::assemble(&registry, &builtin_registry()).unwrap();
//! assert!(objects.get("runner").is_some());
//! ```

pub mod builtin;
pub mod component;
pub mod config;
pub mod data;
pub mod eval;
pub mod exec;
pub mod logging;
pub mod run;

pub mod error;

// Re-export commonly used types
pub use component::Component;
pub use error::{BoxError, Error, Result};
