//! Reference graph builder
//!
//! Scans every declaration's fields (recursively through lists and tuples)
//! for references and produces the "depends on" edge list used to order
//! construction. The graph is discarded after resolution.

use super::parser::Declaration;
use super::registry::BlockRegistry;
use super::value::Value;
use crate::error::{Error, Result};
use std::collections::BTreeMap;

#[derive(Debug, Default)]
pub struct DependencyGraph {
    edges: BTreeMap<String, Vec<String>>,
}

impl DependencyGraph {
    /// Walk all declarations and collect reference edges. Fails on the first
    /// reference whose target is not declared, naming the field path.
    pub fn build(registry: &BlockRegistry) -> Result<Self> {
        let mut edges = BTreeMap::new();
        for decl in registry.iter() {
            edges.insert(decl.name.clone(), declaration_deps(decl, registry)?);
        }
        Ok(Self { edges })
    }

    /// Dependencies of a declaration, deduplicated, in field order.
    pub fn deps(&self, name: &str) -> &[String] {
        self.edges.get(name).map(Vec::as_slice).unwrap_or(&[])
    }
}

fn declaration_deps(decl: &Declaration, registry: &BlockRegistry) -> Result<Vec<String>> {
    let mut deps = Vec::new();
    for (field, value) in &decl.fields {
        collect(value, &format!("{}.{}", decl.name, field), registry, &mut deps)?;
    }
    Ok(deps)
}

fn collect(
    value: &Value,
    path: &str,
    registry: &BlockRegistry,
    deps: &mut Vec<String>,
) -> Result<()> {
    match value {
        Value::Reference(target) => {
            if !registry.contains(target) {
                return Err(Error::UnknownReference {
                    target: target.clone(),
                    path: path.to_string(),
                });
            }
            if !deps.iter().any(|d| d == target) {
                deps.push(target.clone());
            }
            Ok(())
        }
        Value::List(items) | Value::Tuple(items) => {
            for (i, item) in items.iter().enumerate() {
                collect(item, &format!("{path}[{i}]"), registry, deps)?;
            }
            Ok(())
        }
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::parser::parse;

    fn graph(text: &str) -> Result<DependencyGraph> {
        let registry = BlockRegistry::from_declarations(parse(text).unwrap())?;
        DependencyGraph::build(&registry)
    }

    #[test]
    fn collects_edges_through_lists_and_tuples() {
        let g = graph(
            "[main]\nrunners=[<runner>]\nevaluation=[(\"target\", <runner>)]\n[runner]\nsize=1\n",
        )
        .unwrap();
        assert_eq!(g.deps("main"), ["runner"]);
        assert!(g.deps("runner").is_empty());
    }

    #[test]
    fn forward_references_are_legal() {
        let g = graph("[main]\ntrainer=<trainer>\n[trainer]\nx=1\n").unwrap();
        assert_eq!(g.deps("main"), ["trainer"]);
    }

    #[test]
    fn unknown_reference_names_nested_path() {
        let err = graph("[trainer]\ndecoders=[<missing>]\n").unwrap_err();
        assert_eq!(
            err.to_string(),
            "unknown reference <missing> at trainer.decoders[0]"
        );
    }

    #[test]
    fn unknown_reference_in_main_field() {
        let err = graph("[main]\ntrainer=<trainer>\n").unwrap_err();
        assert_eq!(err.to_string(), "unknown reference <trainer> at main.trainer");
    }
}
