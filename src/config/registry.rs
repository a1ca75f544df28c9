//! Block registry
//!
//! Holds parsed declarations keyed by name, preserving textual order. The
//! registry is immutable during graph building and resolution; the only
//! mutation after loading is CLI `--set` overrides, applied before the graph
//! pass.

use super::parser::Declaration;
use super::value::Value;
use crate::error::{Error, Result};

/// Reserved name of the experiment entry-point section.
pub const MAIN_SECTION: &str = "main";

#[derive(Debug, Default, Clone)]
pub struct BlockRegistry {
    declarations: Vec<Declaration>,
}

impl BlockRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a registry from parsed declarations, rejecting duplicates.
    pub fn from_declarations(declarations: Vec<Declaration>) -> Result<Self> {
        let mut registry = Self::new();
        for decl in declarations {
            registry.register(decl)?;
        }
        Ok(registry)
    }

    pub fn register(&mut self, decl: Declaration) -> Result<()> {
        if self.contains(&decl.name) {
            return Err(Error::DuplicateName(decl.name));
        }
        self.declarations.push(decl);
        Ok(())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.declarations.iter().any(|d| d.name == name)
    }

    /// Look up a declaration; `path` names the referencing field for
    /// diagnostics (e.g. `main.trainer`).
    pub fn get(&self, name: &str, path: &str) -> Result<&Declaration> {
        self.declarations
            .iter()
            .find(|d| d.name == name)
            .ok_or_else(|| Error::UnknownReference {
                target: name.to_string(),
                path: path.to_string(),
            })
    }

    /// The mandatory `main` declaration.
    pub fn require_main(&self) -> Result<&Declaration> {
        self.declarations
            .iter()
            .find(|d| d.name == MAIN_SECTION)
            .ok_or(Error::MissingMain)
    }

    /// Declarations in textual order.
    pub fn iter(&self) -> impl Iterator<Item = &Declaration> {
        self.declarations.iter()
    }

    pub fn len(&self) -> usize {
        self.declarations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.declarations.is_empty()
    }

    /// Override or add a single field, used by CLI `--set section.option=value`.
    pub fn set_field(&mut self, section: &str, key: &str, value: Value) -> Result<()> {
        let decl = self
            .declarations
            .iter_mut()
            .find(|d| d.name == section)
            .ok_or_else(|| Error::UnknownReference {
                target: section.to_string(),
                path: "--set".to_string(),
            })?;
        if let Some(slot) = decl.fields.iter_mut().find(|(k, _)| k == key) {
            slot.1 = value;
        } else {
            decl.fields.push((key.to_string(), value));
        }
        Ok(())
    }
}
