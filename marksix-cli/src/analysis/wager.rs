use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use marksix_db::models::{DrawRecord, RecordError, Zodiac};
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, warn};

pub const DEFAULT_BET_AMOUNT: u64 = 10;
pub const DEFAULT_ODDS: u64 = 10;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GuessError {
    #[error("未知猜码类型 : '{0}'")]
    UnknownKind(String),
    #[error("{kind} : 没有选择号码")]
    NoNumbers { kind: GuessKind },
    #[error("{kind} : 没有选择生肖组合")]
    NoGroups { kind: GuessKind },
    #[error("{kind} : 组合 {group} 为空")]
    EmptyGroup { kind: GuessKind, group: usize },
    #[error("{kind} 不是{expected}类型")]
    WrongFamily { kind: GuessKind, expected: &'static str },
    #[error("{field} 必须是大于 0 的整数 : '{value}'")]
    InvalidAmount { field: &'static str, value: String },
    #[error("猜码格式应为 类型:选择[:下注金额[:赔率]] : '{0}'")]
    Syntax(String),
    #[error(transparent)]
    Zodiac(#[from] RecordError),
}

/// The eight bet types of the game's combination play.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum GuessKind {
    #[serde(rename = "5不中")]
    Miss5,
    #[serde(rename = "8不中")]
    Miss8,
    #[serde(rename = "10不中")]
    Miss10,
    #[serde(rename = "中一肖")]
    Zodiac1,
    #[serde(rename = "中二肖")]
    Zodiac2,
    #[serde(rename = "中三肖")]
    Zodiac3,
    #[serde(rename = "中四肖")]
    Zodiac4,
    #[serde(rename = "中五肖")]
    Zodiac5,
}

impl GuessKind {
    pub const ALL: [GuessKind; 8] = [
        GuessKind::Miss5,
        GuessKind::Miss8,
        GuessKind::Miss10,
        GuessKind::Zodiac1,
        GuessKind::Zodiac2,
        GuessKind::Zodiac3,
        GuessKind::Zodiac4,
        GuessKind::Zodiac5,
    ];

    pub fn label(self) -> &'static str {
        match self {
            GuessKind::Miss5 => "5不中",
            GuessKind::Miss8 => "8不中",
            GuessKind::Miss10 => "10不中",
            GuessKind::Zodiac1 => "中一肖",
            GuessKind::Zodiac2 => "中二肖",
            GuessKind::Zodiac3 => "中三肖",
            GuessKind::Zodiac4 => "中四肖",
            GuessKind::Zodiac5 => "中五肖",
        }
    }

    pub fn alias(self) -> &'static str {
        match self {
            GuessKind::Miss5 => "miss5",
            GuessKind::Miss8 => "miss8",
            GuessKind::Miss10 => "miss10",
            GuessKind::Zodiac1 => "zodiac1",
            GuessKind::Zodiac2 => "zodiac2",
            GuessKind::Zodiac3 => "zodiac3",
            GuessKind::Zodiac4 => "zodiac4",
            GuessKind::Zodiac5 => "zodiac5",
        }
    }

    pub fn is_exclusion(self) -> bool {
        self.exclusion_size().is_some()
    }

    /// Usual size of the number set for an exclusion bet. Informational only:
    /// every exclusion variant wins on the same predicate.
    pub fn exclusion_size(self) -> Option<usize> {
        match self {
            GuessKind::Miss5 => Some(5),
            GuessKind::Miss8 => Some(8),
            GuessKind::Miss10 => Some(10),
            _ => None,
        }
    }

    /// Minimum number of distinct chosen zodiacs that must appear in a draw.
    pub fn required_matches(self) -> Option<usize> {
        match self {
            GuessKind::Zodiac1 => Some(1),
            GuessKind::Zodiac2 => Some(2),
            GuessKind::Zodiac3 => Some(3),
            GuessKind::Zodiac4 => Some(4),
            GuessKind::Zodiac5 => Some(5),
            _ => None,
        }
    }
}

impl fmt::Display for GuessKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for GuessKind {
    type Err = GuessError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        GuessKind::ALL
            .into_iter()
            .find(|k| k.label() == s || k.alias().eq_ignore_ascii_case(s))
            .ok_or_else(|| GuessError::UnknownKind(s.to_string()))
    }
}

/// Amount placed on every draw of the window, and the payout multiplier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Stake {
    pub bet_amount: u64,
    pub odds: u64,
}

impl Stake {
    pub fn new(bet_amount: u64, odds: u64) -> Result<Self, GuessError> {
        if bet_amount == 0 {
            return Err(GuessError::InvalidAmount {
                field: "下注金额",
                value: bet_amount.to_string(),
            });
        }
        if odds == 0 {
            return Err(GuessError::InvalidAmount {
                field: "赔率",
                value: odds.to_string(),
            });
        }
        Ok(Self { bet_amount, odds })
    }
}

impl Default for Stake {
    fn default() -> Self {
        Self {
            bet_amount: DEFAULT_BET_AMOUNT,
            odds: DEFAULT_ODDS,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Picks {
    /// Values outside 1..=49 are kept; they never appear in a draw.
    Numbers(BTreeSet<u32>),
    /// Each group is backtested as its own bet.
    ZodiacGroups(Vec<BTreeSet<Zodiac>>),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GuessSpec {
    pub kind: GuessKind,
    pub picks: Picks,
    pub stake: Stake,
}

impl GuessSpec {
    pub fn exclusion<I>(kind: GuessKind, numbers: I, stake: Stake) -> Result<Self, GuessError>
    where
        I: IntoIterator<Item = u32>,
    {
        if !kind.is_exclusion() {
            return Err(GuessError::WrongFamily {
                kind,
                expected: "不中",
            });
        }
        let numbers: BTreeSet<u32> = numbers.into_iter().collect();
        if numbers.is_empty() {
            return Err(GuessError::NoNumbers { kind });
        }
        Ok(Self {
            kind,
            picks: Picks::Numbers(numbers),
            stake,
        })
    }

    pub fn zodiac_match<G, I>(kind: GuessKind, groups: G, stake: Stake) -> Result<Self, GuessError>
    where
        G: IntoIterator<Item = I>,
        I: IntoIterator<Item = Zodiac>,
    {
        if kind.required_matches().is_none() {
            return Err(GuessError::WrongFamily {
                kind,
                expected: "中肖",
            });
        }
        let groups: Vec<BTreeSet<Zodiac>> = groups
            .into_iter()
            .map(|g| g.into_iter().collect())
            .collect();
        if groups.is_empty() {
            return Err(GuessError::NoGroups { kind });
        }
        if let Some(i) = groups.iter().position(|g| g.is_empty()) {
            return Err(GuessError::EmptyGroup { kind, group: i + 1 });
        }
        Ok(Self {
            kind,
            picks: Picks::ZodiacGroups(groups),
            stake,
        })
    }
}

impl FromStr for GuessSpec {
    type Err = GuessError;

    /// `KIND:PICKS[:BET[:ODDS]]`, e.g. `5不中:1,2,3,4,5:10:10` or `中二肖:鼠牛;虎兔`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.split([':', '：']).map(str::trim).collect();
        if parts.len() < 2 || parts.len() > 4 {
            return Err(GuessError::Syntax(s.to_string()));
        }
        let kind: GuessKind = parts[0].parse()?;
        let bet_amount = parse_amount(parts.get(2).copied(), "下注金额", DEFAULT_BET_AMOUNT)?;
        let odds = parse_amount(parts.get(3).copied(), "赔率", DEFAULT_ODDS)?;
        let stake = Stake::new(bet_amount, odds)?;

        if kind.is_exclusion() {
            // Tokens that are not digit strings are dropped.
            let numbers = parts[1]
                .split(|c: char| c == ',' || c == '，' || c.is_whitespace())
                .filter(|tok| !tok.is_empty() && tok.chars().all(|c| c.is_ascii_digit()))
                .filter_map(|tok| tok.parse::<u32>().ok());
            GuessSpec::exclusion(kind, numbers, stake)
        } else {
            let groups = parts[1]
                .split([';', '；', '|'])
                .map(parse_zodiac_group)
                .collect::<Result<Vec<_>, _>>()?;
            GuessSpec::zodiac_match(kind, groups, stake)
        }
    }
}

fn parse_amount(raw: Option<&str>, field: &'static str, default: u64) -> Result<u64, GuessError> {
    match raw {
        None | Some("") => Ok(default),
        Some(v) => v.parse::<u64>().map_err(|_| GuessError::InvalidAmount {
            field,
            value: v.to_string(),
        }),
    }
}

fn parse_zodiac_group(raw: &str) -> Result<Vec<Zodiac>, GuessError> {
    raw.chars()
        .filter(|c| *c != ',' && *c != '，' && !c.is_whitespace())
        .map(|c| c.to_string().parse::<Zodiac>().map_err(GuessError::from))
        .collect()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DrawResult {
    pub period: String,
    /// Chosen numbers (exclusion) or distinct chosen zodiacs (zodiac match) found in the draw.
    pub matched: usize,
    pub won: bool,
}

/// Backtest of one bet: a whole exclusion guess, or one zodiac group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WagerOutcome {
    pub kind: GuessKind,
    /// 1-based zodiac group index.
    pub group: Option<usize>,
    pub picks: Vec<String>,
    pub stake: Stake,
    pub draws: usize,
    pub wins: usize,
    pub total_bet: u64,
    pub total_win: u64,
    pub results: Vec<DrawResult>,
}

impl WagerOutcome {
    pub fn net(&self) -> i64 {
        net_amount(self.total_win, self.total_bet)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SimulationReport {
    pub draws: usize,
    pub outcomes: Vec<WagerOutcome>,
    pub total_bet: u64,
    pub total_win: u64,
    pub net_profit: i64,
}

/// Replays every guess against every record of the slice. Pure: the same
/// inputs always give the same report.
pub fn simulate(records: &[DrawRecord], guesses: &[GuessSpec]) -> SimulationReport {
    let mut outcomes = Vec::new();

    for guess in guesses {
        match &guess.picks {
            Picks::Numbers(numbers) => {
                if let Some(size) = guess.kind.exclusion_size() {
                    if numbers.len() != size {
                        warn!(kind = %guess.kind, chosen = numbers.len(), usual = size, "exclusion set size differs from bet type");
                    }
                }
                let picks = numbers.iter().map(|n| n.to_string()).collect();
                outcomes.push(backtest(records, guess, None, picks, |r| {
                    let hits = numbers
                        .iter()
                        .filter(|&&n| r.numbers.iter().any(|&d| u32::from(d) == n))
                        .count();
                    (hits, hits == 0)
                }));
            }
            Picks::ZodiacGroups(groups) => {
                let required = guess.kind.required_matches().unwrap_or(usize::MAX);
                for (i, group) in groups.iter().enumerate() {
                    let picks = group.iter().map(|z| z.label().to_string()).collect();
                    outcomes.push(backtest(records, guess, Some(i + 1), picks, |r| {
                        let hits = group.iter().filter(|&&z| r.zodiacs.contains(&z)).count();
                        (hits, hits >= required)
                    }));
                }
            }
        }
    }

    let total_bet = outcomes.iter().map(|o| o.total_bet).fold(0u64, u64::saturating_add);
    let total_win = outcomes.iter().map(|o| o.total_win).fold(0u64, u64::saturating_add);
    let net_profit = clamp_i64(
        outcomes
            .iter()
            .map(|o| i128::from(o.total_win) - i128::from(o.total_bet))
            .sum(),
    );

    debug!(draws = records.len(), bets = outcomes.len(), net_profit, "simulation done");

    SimulationReport {
        draws: records.len(),
        outcomes,
        total_bet,
        total_win,
        net_profit,
    }
}

/// `win - bet`, clamped to the `i64` range so the sign is always right.
fn net_amount(win: u64, bet: u64) -> i64 {
    clamp_i64(i128::from(win) - i128::from(bet))
}

fn clamp_i64(value: i128) -> i64 {
    value.clamp(i128::from(i64::MIN), i128::from(i64::MAX)) as i64
}

fn backtest<F>(
    records: &[DrawRecord],
    guess: &GuessSpec,
    group: Option<usize>,
    picks: Vec<String>,
    evaluate: F,
) -> WagerOutcome
where
    F: Fn(&DrawRecord) -> (usize, bool),
{
    let results: Vec<DrawResult> = records
        .iter()
        .map(|r| {
            let (matched, won) = evaluate(r);
            DrawResult {
                period: r.period.clone(),
                matched,
                won,
            }
        })
        .collect();

    let wins = results.iter().filter(|r| r.won).count();
    let Stake { bet_amount, odds } = guess.stake;

    WagerOutcome {
        kind: guess.kind,
        group,
        picks,
        stake: guess.stake,
        draws: records.len(),
        wins,
        total_bet: bet_amount.saturating_mul(records.len() as u64),
        total_win: (wins as u64).saturating_mul(bet_amount).saturating_mul(odds),
        results,
    }
}
