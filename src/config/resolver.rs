//! Graph resolver and lazy instantiator
//!
//! Evaluates the dependency graph starting from `main`, visiting dependencies
//! before dependents. Resolution runs in two passes:
//!
//! 1. an ordering pass: explicit work-stack depth-first traversal with
//!    three-color marks (unvisited / in-progress / done) that yields a
//!    post-order construction schedule and detects cycles *before any
//!    constructor runs*;
//! 2. a construction pass: each scheduled declaration is bound and built
//!    exactly once, with the result memoized in the object table.
//!
//! Only declarations transitively reachable from `main` are scheduled;
//! unreferenced blocks are parsed but never built. The explicit stack keeps
//! cycle detection a testable state transition and bounds stack usage for
//! arbitrarily deep graphs.

use super::binder::{bind_and_call, bind_fields, ConstructorRegistry, FieldTable};
use super::graph::DependencyGraph;
use super::registry::{BlockRegistry, MAIN_SECTION};
use crate::component::Component;
use crate::error::{Error, Result};
use std::collections::BTreeMap;
use std::collections::HashMap;
use std::sync::Arc;

/// Resolved objects keyed by declaration name. Read-only once resolution
/// completes; no component other than the resolver writes to it.
#[derive(Default)]
pub struct ObjectTable {
    objects: BTreeMap<String, Arc<dyn Component>>,
}

impl ObjectTable {
    pub fn get(&self, name: &str) -> Option<&Arc<dyn Component>> {
        self.objects.get(name)
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.objects.keys().map(String::as_str)
    }

    fn insert(&mut self, name: &str, object: Arc<dyn Component>) {
        self.objects.insert(name.to_string(), object);
    }
}

#[derive(Clone, Copy, PartialEq)]
enum Mark {
    InProgress,
    Done,
}

enum Task<'a> {
    Enter(&'a str),
    Finish(&'a str),
}

/// Post-order construction schedule for everything reachable from `main`.
///
/// Fails with [`Error::CyclicDependency`] naming the cycle path when a
/// reference chain closes on itself (self-reference included).
pub fn resolution_order(registry: &BlockRegistry, graph: &DependencyGraph) -> Result<Vec<String>> {
    registry.require_main()?;

    let mut marks: HashMap<&str, Mark> = HashMap::new();
    let mut trail: Vec<&str> = Vec::new();
    let mut order: Vec<String> = Vec::new();
    let mut stack: Vec<Task> = vec![Task::Enter(MAIN_SECTION)];

    while let Some(task) = stack.pop() {
        match task {
            Task::Enter(name) => match marks.get(name) {
                Some(Mark::Done) => {}
                Some(Mark::InProgress) => {
                    let from = trail.iter().position(|n| *n == name).unwrap_or(0);
                    let mut cycle: Vec<String> =
                        trail[from..].iter().map(|n| n.to_string()).collect();
                    cycle.push(name.to_string());
                    return Err(Error::CyclicDependency(cycle));
                }
                None => {
                    marks.insert(name, Mark::InProgress);
                    trail.push(name);
                    stack.push(Task::Finish(name));
                    for dep in graph.deps(name).iter().rev() {
                        stack.push(Task::Enter(dep));
                    }
                }
            },
            Task::Finish(name) => {
                marks.insert(name, Mark::Done);
                trail.pop();
                order.push(name.to_string());
            }
        }
    }

    Ok(order)
}

/// Instantiate every declaration reachable from `main`, dependencies first.
///
/// Each declaration is constructed at most once; references bind to the single
/// memoized object. Declarations without a class path become [`FieldTable`]s.
pub fn resolve(
    registry: &BlockRegistry,
    graph: &DependencyGraph,
    constructors: &ConstructorRegistry,
) -> Result<ObjectTable> {
    let order = resolution_order(registry, graph)?;

    let mut table = ObjectTable::default();
    for name in &order {
        let decl = registry.get(name, "resolver")?;
        let bindings = bind_fields(decl, &table)?;
        let object: Arc<dyn Component> = match &decl.class_path {
            Some(class_path) => bind_and_call(constructors, class_path, bindings)?,
            None => Arc::new(FieldTable::new(bindings)),
        };
        table.insert(name, object);
    }

    Ok(table)
}
