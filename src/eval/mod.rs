//! Evaluation metrics over output series
//!
//! An evaluator compares a runner's predicted series against the gold series
//! of the validation dataset. Evaluator failures never abort a run; the
//! orchestrator downgrades them to per-pair warnings.

use crate::component::Component;
use crate::data::Sentence;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EvalError {
    #[error("nothing to evaluate")]
    Empty,

    #[error("length mismatch: {gold} gold vs {predicted} predicted records")]
    LengthMismatch { gold: usize, predicted: usize },
}

/// Metric over aligned gold/predicted series.
pub trait Evaluator: Send + Sync {
    fn name(&self) -> &str;

    fn compute(&self, gold: &[Sentence], predicted: &[Sentence]) -> Result<f64, EvalError>;

    /// Whether higher values are better.
    fn higher_is_better(&self) -> bool {
        true
    }
}

fn check_aligned(gold: &[Sentence], predicted: &[Sentence]) -> Result<(), EvalError> {
    if gold.is_empty() || predicted.is_empty() {
        return Err(EvalError::Empty);
    }
    if gold.len() != predicted.len() {
        return Err(EvalError::LengthMismatch {
            gold: gold.len(),
            predicted: predicted.len(),
        });
    }
    Ok(())
}

/// Fraction of predicted sentences exactly equal to the gold sentence.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExactMatch;

impl Evaluator for ExactMatch {
    fn name(&self) -> &str {
        "ExactMatch"
    }

    fn compute(&self, gold: &[Sentence], predicted: &[Sentence]) -> Result<f64, EvalError> {
        check_aligned(gold, predicted)?;
        let correct = gold
            .iter()
            .zip(predicted.iter())
            .filter(|(g, p)| g == p)
            .count();
        Ok(correct as f64 / gold.len() as f64)
    }
}

/// Position-wise token accuracy against the gold sentences.
///
/// Tokens past the end of the shorter sentence count as wrong, so overly
/// short and overly long outputs are both penalized.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokenAccuracy;

impl Evaluator for TokenAccuracy {
    fn name(&self) -> &str {
        "TokenAccuracy"
    }

    fn compute(&self, gold: &[Sentence], predicted: &[Sentence]) -> Result<f64, EvalError> {
        check_aligned(gold, predicted)?;
        let mut correct = 0usize;
        let mut total = 0usize;
        for (g, p) in gold.iter().zip(predicted.iter()) {
            total += g.len().max(p.len());
            correct += g.iter().zip(p.iter()).filter(|(a, b)| a == b).count();
        }
        if total == 0 {
            return Err(EvalError::Empty);
        }
        Ok(correct as f64 / total as f64)
    }
}

impl Component for ExactMatch {
    fn as_any(&self) -> &dyn std::any::Any {
        self
    }

    fn as_evaluator(&self) -> Option<&dyn Evaluator> {
        Some(self)
    }
}

impl Component for TokenAccuracy {
    fn as_any(&self) -> &dyn std::any::Any {
        self
    }

    fn as_evaluator(&self) -> Option<&dyn Evaluator> {
        Some(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::tokenize_lines;
    use approx::assert_relative_eq;

    #[test]
    fn exact_match_counts_whole_sentences() {
        let gold = tokenize_lines(["a b", "c d", "e f", "g h"]);
        let predicted = tokenize_lines(["a b", "c x", "e f", "g h"]);
        let score = ExactMatch.compute(&gold, &predicted).unwrap();
        assert_relative_eq!(score, 0.75);
    }

    #[test]
    fn token_accuracy_penalizes_length_mismatch() {
        let gold = tokenize_lines(["a b c"]);
        let predicted = tokenize_lines(["a b"]);
        // 2 correct of max(3, 2) positions
        let score = TokenAccuracy.compute(&gold, &predicted).unwrap();
        assert_relative_eq!(score, 2.0 / 3.0);
    }

    #[test]
    fn empty_output_cannot_be_scored() {
        let gold = tokenize_lines(["a"]);
        assert!(matches!(
            ExactMatch.compute(&gold, &[]).unwrap_err(),
            EvalError::Empty
        ));
        assert!(matches!(
            TokenAccuracy.compute(&[], &[]).unwrap_err(),
            EvalError::Empty
        ));
    }

    #[test]
    fn misaligned_series_cannot_be_scored() {
        let gold = tokenize_lines(["a", "b"]);
        let predicted = tokenize_lines(["a"]);
        assert!(matches!(
            ExactMatch.compute(&gold, &predicted).unwrap_err(),
            EvalError::LengthMismatch { gold: 2, predicted: 1 }
        ));
    }
}
