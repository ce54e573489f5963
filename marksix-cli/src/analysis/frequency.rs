use std::collections::BTreeMap;

use marksix_db::models::{DrawRecord, Zodiac};
use serde::Serialize;

use crate::analysis::{PairCount, TOP_PAIRS, ZodiacCounts, count_numbers, top_pairs};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FrequencyReport {
    pub draws: usize,
    /// Only numbers seen in the window, ascending.
    pub number_counts: BTreeMap<u8, u32>,
    pub zodiac_counts: ZodiacCounts,
    pub top_number_pairs: Vec<PairCount<u8>>,
    /// Taken from the raw seven labels, so a pair of the same animal can appear.
    pub top_zodiac_pairs: Vec<PairCount<Zodiac>>,
}

/// Counts over all seven positions of every record in the slice.
pub fn analyze(records: &[DrawRecord]) -> FrequencyReport {
    FrequencyReport {
        draws: records.len(),
        number_counts: count_numbers(records.iter().flat_map(|r| r.numbers)),
        zodiac_counts: ZodiacCounts::from_zodiacs(records.iter().flat_map(|r| r.zodiacs)),
        top_number_pairs: top_pairs(records.iter().map(|r| r.numbers.as_slice()), TOP_PAIRS),
        top_zodiac_pairs: top_pairs(records.iter().map(|r| r.zodiacs.as_slice()), TOP_PAIRS),
    }
}
