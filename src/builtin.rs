//! Built-in constructor registry
//!
//! Constructors for the collaborators shipped with the crate. An embedding
//! application starts from [`builtin_registry`] and registers its own model
//! components (encoders, decoders, trainers) on top.
//!
//! | class path | component |
//! |---|---|
//! | `data.inline` | in-memory dataset; every free-form field is a series |
//! | `exec.local` | serial in-process session manager |
//! | `eval.exact_match` | sentence-level exact match |
//! | `eval.token_accuracy` | position-wise token accuracy |
//! | `runners.copy` | echoes an input series under a new name |

use crate::component::Component;
use crate::config::{Bindings, Constructor, ConstructorRegistry, ParamKind, ParamSpec};
use crate::data::{Dataset, Sentence};
use crate::error::BoxError;
use crate::eval::{ExactMatch, TokenAccuracy};
use crate::exec::LocalSessionManager;
use crate::run::CopyRunner;
use std::sync::Arc;

/// Registry with all built-in constructors.
pub fn builtin_registry() -> ConstructorRegistry {
    let mut registry = ConstructorRegistry::new();
    registry.register("data.inline", Arc::new(InlineDatasetCtor));
    registry.register("exec.local", Arc::new(LocalSessionManagerCtor));
    registry.register("eval.exact_match", Arc::new(ExactMatchCtor));
    registry.register("eval.token_accuracy", Arc::new(TokenAccuracyCtor));
    registry.register("runners.copy", Arc::new(CopyRunnerCtor));
    registry
}

/// `data.inline`: dataset declared directly in the configuration.
///
/// Every field other than `name` is a series given as a list of strings; each
/// string is whitespace-tokenized into one sentence.
struct InlineDatasetCtor;

impl Constructor for InlineDatasetCtor {
    fn params(&self) -> &'static [ParamSpec] {
        const PARAMS: &[ParamSpec] = &[ParamSpec::optional("name", ParamKind::Str)];
        PARAMS
    }

    fn allow_extra(&self) -> bool {
        true
    }

    fn construct(&self, args: &Bindings) -> Result<Arc<dyn Component>, BoxError> {
        let name = match args.get("name") {
            Some(value) => value
                .as_str()
                .ok_or("name must be a string")?
                .to_string(),
            None => args.section().to_string(),
        };

        let mut series = Vec::new();
        for (key, value) in args.iter() {
            if key == "name" {
                continue;
            }
            let items = value
                .as_list()
                .ok_or_else(|| format!("series {key:?} must be a list of strings"))?;
            let mut records: Vec<Sentence> = Vec::with_capacity(items.len());
            for item in items {
                let line = item
                    .as_str()
                    .ok_or_else(|| format!("series {key:?} must contain only strings"))?;
                records.push(line.split_whitespace().map(str::to_string).collect());
            }
            series.push((key.to_string(), records));
        }

        Ok(Arc::new(Dataset::new(name, series)?))
    }
}

/// `exec.local`: serial in-process sessions.
struct LocalSessionManagerCtor;

impl Constructor for LocalSessionManagerCtor {
    fn params(&self) -> &'static [ParamSpec] {
        const PARAMS: &[ParamSpec] = &[
            ParamSpec::optional("num_sessions", ParamKind::Int),
            ParamSpec::optional("num_threads", ParamKind::Int),
        ];
        PARAMS
    }

    fn construct(&self, args: &Bindings) -> Result<Arc<dyn Component>, BoxError> {
        let num_sessions = args.usize_opt("num_sessions")?.unwrap_or(1);
        let num_threads = args.usize_opt("num_threads")?.unwrap_or(1);
        if num_sessions == 0 {
            return Err("num_sessions must be positive".into());
        }
        Ok(Arc::new(LocalSessionManager::new(num_sessions, num_threads)))
    }
}

struct ExactMatchCtor;

impl Constructor for ExactMatchCtor {
    fn params(&self) -> &'static [ParamSpec] {
        &[]
    }

    fn construct(&self, _args: &Bindings) -> Result<Arc<dyn Component>, BoxError> {
        Ok(Arc::new(ExactMatch))
    }
}

struct TokenAccuracyCtor;

impl Constructor for TokenAccuracyCtor {
    fn params(&self) -> &'static [ParamSpec] {
        &[]
    }

    fn construct(&self, _args: &Bindings) -> Result<Arc<dyn Component>, BoxError> {
        Ok(Arc::new(TokenAccuracy))
    }
}

struct CopyRunnerCtor;

impl Constructor for CopyRunnerCtor {
    fn params(&self) -> &'static [ParamSpec] {
        const PARAMS: &[ParamSpec] = &[
            ParamSpec::required("input_series", ParamKind::Str),
            ParamSpec::required("output_series", ParamKind::Str),
        ];
        PARAMS
    }

    fn construct(&self, args: &Bindings) -> Result<Arc<dyn Component>, BoxError> {
        Ok(Arc::new(CopyRunner::new(
            args.str_field("input_series")?,
            args.str_field("output_series")?,
        )))
    }
}
