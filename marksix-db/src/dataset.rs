use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::DrawRecord;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SelectionError {
    #[error("数据为空，请先更新数据")]
    Empty,
    #[error("选择范围 {oldest}-{newest} 超出数据范围 1-{len}")]
    OutOfRange {
        oldest: usize,
        newest: usize,
        len: usize,
    },
    #[error("起始行 {oldest} 晚于结束行 {newest}")]
    Inverted { oldest: usize, newest: usize },
}

/// Order in which a source page lists its draws.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SourceOrder {
    #[default]
    NewestFirst,
    OldestFirst,
}

impl SourceOrder {
    pub fn to_chronological(self, mut records: Vec<DrawRecord>) -> Vec<DrawRecord> {
        if self == SourceOrder::NewestFirst {
            records.reverse();
        }
        records
    }
}

/// Contiguous window of rows, 1-based and counted from the oldest draw.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Selection {
    pub oldest: usize,
    pub newest: usize,
}

impl Selection {
    pub fn new(oldest: usize, newest: usize) -> Self {
        Self { oldest, newest }
    }

    pub fn full(len: usize) -> Self {
        Self {
            oldest: 1,
            newest: len,
        }
    }

    /// Fills missing bounds with the dataset edges.
    pub fn resolve(oldest: Option<usize>, newest: Option<usize>, len: usize) -> Self {
        Self {
            oldest: oldest.unwrap_or(1),
            newest: newest.unwrap_or(len),
        }
    }

    pub fn len(&self) -> usize {
        (self.newest + 1).saturating_sub(self.oldest)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MergeSummary {
    pub added: usize,
    pub replaced: usize,
}

/// Draws ordered oldest to newest, unique by period.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Dataset {
    records: Vec<DrawRecord>,
}

impl Dataset {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a dataset from chronologically ordered records. A repeated
    /// period keeps its first position and its last content.
    pub fn from_records(records: Vec<DrawRecord>) -> Self {
        let mut dataset = Self::new();
        dataset.merge(records);
        dataset
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn records(&self) -> &[DrawRecord] {
        &self.records
    }

    pub fn into_records(self) -> Vec<DrawRecord> {
        self.records
    }

    pub fn latest(&self) -> Option<&DrawRecord> {
        self.records.last()
    }

    pub fn position(&self, period: &str) -> Option<usize> {
        self.records.iter().position(|r| r.period == period)
    }

    /// Appends new periods at the newest end and overwrites known periods in place.
    pub fn merge<I>(&mut self, batch: I) -> MergeSummary
    where
        I: IntoIterator<Item = DrawRecord>,
    {
        let mut index: HashMap<String, usize> = self
            .records
            .iter()
            .enumerate()
            .map(|(i, r)| (r.period.clone(), i))
            .collect();

        let mut summary = MergeSummary::default();
        for record in batch {
            match index.get(&record.period) {
                Some(&i) => {
                    self.records[i] = record;
                    summary.replaced += 1;
                }
                None => {
                    index.insert(record.period.clone(), self.records.len());
                    self.records.push(record);
                    summary.added += 1;
                }
            }
        }
        summary
    }

    pub fn select(&self, selection: Selection) -> Result<&[DrawRecord], SelectionError> {
        let len = self.records.len();
        if len == 0 {
            return Err(SelectionError::Empty);
        }
        let Selection { oldest, newest } = selection;
        if oldest == 0 || newest == 0 || oldest > len || newest > len {
            return Err(SelectionError::OutOfRange {
                oldest,
                newest,
                len,
            });
        }
        if oldest > newest {
            return Err(SelectionError::Inverted { oldest, newest });
        }
        Ok(&self.records[oldest - 1..newest])
    }
}
