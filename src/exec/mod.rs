//! Execution sessions
//!
//! The orchestrator never talks to a compute backend directly; it obtains a
//! [`SessionPool`] from a [`SessionManager`] and submits one step at a time.
//! A pool exposes `num_sessions` independent sessions, each allowed
//! `num_threads` of internal parallelism; the only ordering guarantee is that
//! a single step's outputs are consistent with its inputs.
//!
//! [`LocalSessionManager`] is the in-process fallback used when an experiment
//! wires no manager of its own.

use crate::component::Component;
use crate::data::Batch;
use crate::error::BoxError;
use std::any::Any;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("invalid session count: {0}")]
    InvalidSessionCount(usize),

    #[error("session backend failed: {0}")]
    Backend(String),
}

/// A step submitted to a session: consumes a batch, produces an opaque
/// payload the submitting collaborator knows how to downcast.
pub type StepFn<'a> = &'a mut dyn FnMut(&Batch<'_>) -> Result<Box<dyn Any + Send>, BoxError>;

pub trait SessionPool: Send {
    /// Execute one step against one session slot.
    fn run(&mut self, step: StepFn<'_>, batch: &Batch<'_>) -> Result<Box<dyn Any + Send>, BoxError>;

    fn num_sessions(&self) -> usize;
}

pub trait SessionManager: Send + Sync {
    fn num_sessions(&self) -> usize;

    fn num_threads(&self) -> usize;

    fn create_sessions(
        &self,
        num_sessions: usize,
        num_threads: usize,
    ) -> Result<Box<dyn SessionPool>, SessionError>;
}

/// Serial in-process session manager.
pub struct LocalSessionManager {
    num_sessions: usize,
    num_threads: usize,
}

impl LocalSessionManager {
    pub fn new(num_sessions: usize, num_threads: usize) -> Self {
        Self {
            num_sessions,
            num_threads,
        }
    }
}

impl Default for LocalSessionManager {
    fn default() -> Self {
        Self::new(1, 1)
    }
}

impl SessionManager for LocalSessionManager {
    fn num_sessions(&self) -> usize {
        self.num_sessions
    }

    fn num_threads(&self) -> usize {
        self.num_threads
    }

    fn create_sessions(
        &self,
        num_sessions: usize,
        num_threads: usize,
    ) -> Result<Box<dyn SessionPool>, SessionError> {
        if num_sessions == 0 {
            return Err(SessionError::InvalidSessionCount(num_sessions));
        }
        let _ = num_threads;
        Ok(Box::new(LocalSessionPool { num_sessions }))
    }
}

impl Component for LocalSessionManager {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_session_manager(&self) -> Option<&dyn SessionManager> {
        Some(self)
    }
}

struct LocalSessionPool {
    num_sessions: usize,
}

impl SessionPool for LocalSessionPool {
    fn run(&mut self, step: StepFn<'_>, batch: &Batch<'_>) -> Result<Box<dyn Any + Send>, BoxError> {
        step(batch)
    }

    fn num_sessions(&self) -> usize {
        self.num_sessions
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{tokenize_lines, Dataset};

    #[test]
    fn local_pool_runs_steps_in_process() {
        let manager = LocalSessionManager::default();
        let mut pool = manager.create_sessions(1, 1).unwrap();
        let data = Dataset::new(
            "d",
            vec![("source".to_string(), tokenize_lines(["a b", "c"]))],
        )
        .unwrap();
        let batch = data.batches(2).next().unwrap();

        let result = pool
            .run(
                &mut |b: &Batch<'_>| Ok(Box::new(b.len()) as Box<dyn Any + Send>),
                &batch,
            )
            .unwrap();
        assert_eq!(*result.downcast::<usize>().unwrap(), 2);
    }

    #[test]
    fn zero_sessions_is_rejected() {
        let manager = LocalSessionManager::new(0, 1);
        assert!(matches!(
            manager.create_sessions(0, 1).err().unwrap(),
            SessionError::InvalidSessionCount(0)
        ));
    }
}
