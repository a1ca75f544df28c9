//! Error types for Armar

use std::path::PathBuf;
use thiserror::Error;

/// Boxed error type used at collaborator boundaries (trainers, runners,
/// session pools, constructors). Collaborator failures are wrapped into the
/// crate [`Error`] taxonomy by the engine.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("line {line}: {message}")]
    Syntax { line: usize, message: String },

    #[error("duplicate section [{0}]")]
    DuplicateName(String),

    #[error("unknown reference <{target}> at {path}")]
    UnknownReference { target: String, path: String },

    #[error("configuration has no [main] section")]
    MissingMain,

    #[error("cyclic dependency: {}", .0.join(" -> "))]
    CyclicDependency(Vec<String>),

    #[error("cannot bind [{section}]: {message}")]
    Binding { section: String, message: String },

    #[error("constructing [{section}] ({class_path}) failed: {message}")]
    Constructor {
        section: String,
        class_path: String,
        message: String,
    },

    #[error("output directory {} already contains an experiment; enable overwrite_output_dir or pass --overwrite", .0.display())]
    OutputExists(PathBuf),

    #[error("batch step {step} failed: {message}")]
    BatchStep { step: usize, message: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Shorthand for binding failures, which always carry the section name.
    pub fn binding(section: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Binding {
            section: section.into(),
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cycle_message_joins_path() {
        let err =
            Error::CyclicDependency(vec!["a".to_string(), "b".to_string(), "a".to_string()]);
        assert_eq!(err.to_string(), "cyclic dependency: a -> b -> a");
    }

    #[test]
    fn unknown_reference_names_field_path() {
        let err = Error::UnknownReference {
            target: "trainer".to_string(),
            path: "main.trainer".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "unknown reference <trainer> at main.trainer"
        );
    }
}
