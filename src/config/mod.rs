//! Declarative experiment configuration
//!
//! An experiment is a set of named, cross-referencing blocks:
//!
//! ```ini
//! ; a tiny translation experiment
//! [main]
//! name="demo"
//! output="out/demo"
//! runners=[<runner>]
//! trainer=<trainer>
//! train_dataset=<train_data>
//! val_dataset=<val_data>
//! epochs=10
//! batch_size=16
//!
//! [runner]
//! class=runners.copy
//! input_series="source"
//! output_series="target"
//! ```
//!
//! Blocks may reference each other in any textual order. Loading happens in
//! phases: parse (pure text transform), registry (name table), graph
//! (reference edges), resolution (topological construction from `main`).

pub mod binder;
pub mod cli;
pub mod graph;
pub mod parser;
pub mod registry;
pub mod resolver;
mod value;

#[cfg(test)]
mod tests;

#[cfg(test)]
mod property_tests;

pub use binder::{
    bind_and_call, bind_fields, Bindings, BoundValue, Constructor, ConstructorRegistry,
    FieldTable, ParamKind, ParamSpec,
};
pub use cli::{Cli, Command, InfoArgs, InfoFormat, TrainArgs, ValidateArgs};
pub use graph::DependencyGraph;
pub use parser::{parse, parse_value_str, Declaration};
pub use registry::{BlockRegistry, MAIN_SECTION};
pub use resolver::{resolution_order, resolve, ObjectTable};
pub use value::Value;

use crate::error::{Error, Result};
use std::path::Path;

/// Parse configuration text into a registry.
pub fn load_str(text: &str) -> Result<BlockRegistry> {
    BlockRegistry::from_declarations(parse(text)?)
}

/// Read and parse a configuration file.
pub fn load_file(path: &Path) -> Result<BlockRegistry> {
    let text = std::fs::read_to_string(path)?;
    load_str(&text)
}

/// Full assembly: build the reference graph and instantiate everything
/// reachable from `main`.
pub fn assemble(
    registry: &BlockRegistry,
    constructors: &ConstructorRegistry,
) -> Result<ObjectTable> {
    let graph = DependencyGraph::build(registry)?;
    resolve(registry, &graph, constructors)
}

/// Apply `section.option=value` overrides to a loaded registry.
pub fn apply_overrides(registry: &mut BlockRegistry, overrides: &[String]) -> Result<()> {
    for setting in overrides {
        let (target, value_text) = setting.split_once('=').ok_or_else(|| Error::Syntax {
            line: 0,
            message: format!("override must be section.option=value, got {setting:?}"),
        })?;
        let (section, option) = target.split_once('.').ok_or_else(|| Error::Syntax {
            line: 0,
            message: format!("override must name section.option, got {target:?}"),
        })?;
        let value = parse_value_str(value_text).map_err(|message| Error::Syntax {
            line: 0,
            message,
        })?;
        registry.set_field(section.trim(), option.trim(), value)?;
    }
    Ok(())
}
