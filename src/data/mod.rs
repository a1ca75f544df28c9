//! Datasets of parallel aligned series
//!
//! A dataset holds one or more named series (e.g. `source` and `target`) of
//! equal length. Batching slices all series with the same contiguous record
//! range, so pairwise alignment across series is preserved by construction.
//! Batch construction is synchronous and happens on the control thread.

use crate::component::Component;
use thiserror::Error;

/// One record of a series: a tokenized sentence.
pub type Sentence = Vec<String>;

#[derive(Debug, Error)]
pub enum DataError {
    #[error("series {name:?} has {got} records, expected {expected}")]
    LengthMismatch {
        name: String,
        expected: usize,
        got: usize,
    },

    #[error("duplicate series {0:?}")]
    DuplicateSeries(String),

    #[error("dataset has no series")]
    NoSeries,
}

/// An in-memory dataset of named parallel series.
pub struct Dataset {
    name: String,
    series: Vec<(String, Vec<Sentence>)>,
    len: usize,
}

impl Dataset {
    /// Build a dataset, checking that all series are aligned.
    pub fn new(
        name: impl Into<String>,
        series: Vec<(String, Vec<Sentence>)>,
    ) -> Result<Self, DataError> {
        let first = series.first().ok_or(DataError::NoSeries)?;
        let len = first.1.len();
        for (i, (series_name, records)) in series.iter().enumerate() {
            if series[..i].iter().any(|(other, _)| other == series_name) {
                return Err(DataError::DuplicateSeries(series_name.clone()));
            }
            if records.len() != len {
                return Err(DataError::LengthMismatch {
                    name: series_name.clone(),
                    expected: len,
                    got: records.len(),
                });
            }
        }
        Ok(Self {
            name: name.into(),
            series,
            len,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Number of aligned records.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn series_names(&self) -> impl Iterator<Item = &str> {
        self.series.iter().map(|(name, _)| name.as_str())
    }

    pub fn series(&self, name: &str) -> Option<&[Sentence]> {
        self.series
            .iter()
            .find(|(series_name, _)| series_name == name)
            .map(|(_, records)| records.as_slice())
    }

    /// Contiguous batches of up to `batch_size` records; the final batch may
    /// be short. Restartable: each call yields a fresh pass over the data.
    pub fn batches(&self, batch_size: usize) -> Batches<'_> {
        assert!(batch_size > 0, "batch_size must be positive");
        Batches {
            dataset: self,
            batch_size,
            pos: 0,
        }
    }
}

impl Component for Dataset {
    fn as_any(&self) -> &dyn std::any::Any {
        self
    }

    fn as_dataset(&self) -> Option<&Dataset> {
        Some(self)
    }
}

/// A contiguous slice across all series of a dataset.
pub struct Batch<'a> {
    start: usize,
    series: Vec<(&'a str, &'a [Sentence])>,
}

impl<'a> Batch<'a> {
    /// Records in this batch.
    pub fn len(&self) -> usize {
        self.series.first().map(|(_, s)| s.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Index of the first record within the dataset.
    pub fn start(&self) -> usize {
        self.start
    }

    pub fn series(&self, name: &str) -> Option<&'a [Sentence]> {
        self.series
            .iter()
            .find(|(series_name, _)| *series_name == name)
            .map(|(_, records)| *records)
    }

    pub fn series_names(&self) -> impl Iterator<Item = &str> {
        self.series.iter().map(|(name, _)| *name)
    }
}

pub struct Batches<'a> {
    dataset: &'a Dataset,
    batch_size: usize,
    pos: usize,
}

impl<'a> Iterator for Batches<'a> {
    type Item = Batch<'a>;

    fn next(&mut self) -> Option<Batch<'a>> {
        if self.pos >= self.dataset.len {
            return None;
        }
        let end = (self.pos + self.batch_size).min(self.dataset.len);
        let batch = Batch {
            start: self.pos,
            series: self
                .dataset
                .series
                .iter()
                .map(|(name, records)| (name.as_str(), &records[self.pos..end]))
                .collect(),
        };
        self.pos = end;
        Some(batch)
    }
}

/// Split whitespace-delimited text lines into sentences.
pub fn tokenize_lines<I, S>(lines: I) -> Vec<Sentence>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    lines
        .into_iter()
        .map(|line| {
            line.as_ref()
                .split_whitespace()
                .map(str::to_string)
                .collect()
        })
        .collect()
}
