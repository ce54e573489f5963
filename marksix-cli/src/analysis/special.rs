use std::collections::BTreeMap;

use marksix_db::models::DrawRecord;
use serde::Serialize;

use crate::analysis::{ZodiacCounts, count_numbers};

/// Counts restricted to the special (7th) ball. No pair analysis.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SpecialReport {
    pub draws: usize,
    pub number_counts: BTreeMap<u8, u32>,
    pub zodiac_counts: ZodiacCounts,
}

pub fn analyze_special(records: &[DrawRecord]) -> SpecialReport {
    SpecialReport {
        draws: records.len(),
        number_counts: count_numbers(records.iter().map(|r| r.special_number())),
        zodiac_counts: ZodiacCounts::from_zodiacs(records.iter().map(|r| r.special_zodiac())),
    }
}
