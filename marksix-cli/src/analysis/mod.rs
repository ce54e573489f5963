pub mod frequency;
pub mod special;
pub mod wager;

use std::collections::{BTreeMap, HashMap};
use std::hash::Hash;

use marksix_db::dataset::{Dataset, Selection, SelectionError};
use marksix_db::models::Zodiac;
use serde::{Serialize, Serializer};
use thiserror::Error;

use crate::analysis::frequency::{FrequencyReport, analyze};
use crate::analysis::special::{SpecialReport, analyze_special};
use crate::analysis::wager::{GuessSpec, SimulationReport, simulate};

/// How many pairs the "most frequent combination" tables keep.
pub const TOP_PAIRS: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum AnalysisMode {
    /// 普通分析
    #[default]
    Plain,
    /// 特码分析
    Special,
    /// 组合猜码分析
    #[value(alias = "combo-wager")]
    Wager,
}

/// Everything one analysis run needs; built by the front end, consumed once.
#[derive(Debug, Clone)]
pub struct AnalysisRequest {
    pub selection: Selection,
    pub mode: AnalysisMode,
    pub guesses: Vec<GuessSpec>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "mode", content = "report", rename_all = "kebab-case")]
pub enum AnalysisOutput {
    Plain(FrequencyReport),
    Special(SpecialReport),
    Wager(SimulationReport),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AnalysisError {
    #[error(transparent)]
    Selection(#[from] SelectionError),
    #[error("组合猜码分析需要至少一个猜码 (--guess)")]
    NoGuesses,
}

pub fn run_analysis(dataset: &Dataset, request: &AnalysisRequest) -> Result<AnalysisOutput, AnalysisError> {
    let records = dataset.select(request.selection)?;
    let output = match request.mode {
        AnalysisMode::Plain => AnalysisOutput::Plain(analyze(records)),
        AnalysisMode::Special => AnalysisOutput::Special(analyze_special(records)),
        AnalysisMode::Wager => {
            if request.guesses.is_empty() {
                return Err(AnalysisError::NoGuesses);
            }
            AnalysisOutput::Wager(simulate(records, &request.guesses))
        }
    };
    Ok(output)
}

/// Zodiac occurrence counts on the fixed [`Zodiac::ORDER`] axis.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ZodiacCounts {
    counts: [u32; 12],
}

impl ZodiacCounts {
    pub fn from_zodiacs<I>(zodiacs: I) -> Self
    where
        I: IntoIterator<Item = Zodiac>,
    {
        let mut counts = [0u32; 12];
        for z in zodiacs {
            counts[z.index()] += 1;
        }
        Self { counts }
    }

    pub fn get(&self, zodiac: Zodiac) -> u32 {
        self.counts[zodiac.index()]
    }

    pub fn iter(&self) -> impl Iterator<Item = (Zodiac, u32)> + '_ {
        Zodiac::ORDER.iter().map(|&z| (z, self.counts[z.index()]))
    }

    pub fn len(&self) -> usize {
        self.counts.len()
    }

    pub fn total(&self) -> u32 {
        self.counts.iter().sum()
    }

    pub fn max(&self) -> u32 {
        self.counts.iter().copied().max().unwrap_or(0)
    }
}

impl Serialize for ZodiacCounts {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_map(self.iter().map(|(z, count)| (z.label(), count)))
    }
}

pub fn count_numbers<I>(numbers: I) -> BTreeMap<u8, u32>
where
    I: IntoIterator<Item = u8>,
{
    let mut counts = BTreeMap::new();
    for n in numbers {
        *counts.entry(n).or_insert(0) += 1;
    }
    counts
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PairCount<T> {
    pub pair: (T, T),
    pub count: u32,
}

/// Counts every unordered 2-combination of positions within each row and
/// keeps the `limit` most frequent. Ties resolve on the pair, ascending.
pub fn top_pairs<'a, T, I>(rows: I, limit: usize) -> Vec<PairCount<T>>
where
    T: Copy + Ord + Hash + 'a,
    I: IntoIterator<Item = &'a [T]>,
{
    let mut counts: HashMap<(T, T), u32> = HashMap::new();
    for row in rows {
        for i in 0..row.len() {
            for j in (i + 1)..row.len() {
                let (a, b) = (row[i], row[j]);
                let key = if a <= b { (a, b) } else { (b, a) };
                *counts.entry(key).or_insert(0) += 1;
            }
        }
    }

    let mut pairs: Vec<PairCount<T>> = counts
        .into_iter()
        .map(|(pair, count)| PairCount { pair, count })
        .collect();
    pairs.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.pair.cmp(&b.pair)));
    pairs.truncate(limit);
    pairs
}

#[cfg(test)]
pub(crate) fn make_record(period: &str, numbers: [u8; 7], zodiacs: [Zodiac; 7]) -> marksix_db::models::DrawRecord {
    marksix_db::models::DrawRecord::new(period, numbers, zodiacs).unwrap()
}
