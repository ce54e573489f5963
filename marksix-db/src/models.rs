use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Balls drawn per period; the last one is the special ball.
pub const BALLS_PER_DRAW: usize = 7;
/// Zero-based index of the special ball.
pub const SPECIAL_POSITION: usize = BALLS_PER_DRAW - 1;
pub const MIN_NUMBER: u8 = 1;
pub const MAX_NUMBER: u8 = 49;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RecordError {
    #[error("期数为空")]
    EmptyPeriod,
    #[error("号码 {0} 超出范围 (1-49)")]
    NumberOutOfRange(u8),
    #[error("号码重复 : {0}")]
    DuplicateNumber(u8),
    #[error("未知生肖 : '{0}'")]
    UnknownZodiac(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Zodiac {
    #[serde(rename = "鼠")]
    Rat,
    #[serde(rename = "牛")]
    Ox,
    #[serde(rename = "虎")]
    Tiger,
    #[serde(rename = "兔")]
    Rabbit,
    #[serde(rename = "龙")]
    Dragon,
    #[serde(rename = "蛇")]
    Snake,
    #[serde(rename = "马")]
    Horse,
    #[serde(rename = "羊")]
    Goat,
    #[serde(rename = "猴")]
    Monkey,
    #[serde(rename = "鸡")]
    Rooster,
    #[serde(rename = "狗")]
    Dog,
    #[serde(rename = "猪")]
    Pig,
}

impl Zodiac {
    /// Canonical cyclical order. Every zodiac count is reported on this axis.
    pub const ORDER: [Zodiac; 12] = [
        Zodiac::Rat,
        Zodiac::Ox,
        Zodiac::Tiger,
        Zodiac::Rabbit,
        Zodiac::Dragon,
        Zodiac::Snake,
        Zodiac::Horse,
        Zodiac::Goat,
        Zodiac::Monkey,
        Zodiac::Rooster,
        Zodiac::Dog,
        Zodiac::Pig,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Zodiac::Rat => "鼠",
            Zodiac::Ox => "牛",
            Zodiac::Tiger => "虎",
            Zodiac::Rabbit => "兔",
            Zodiac::Dragon => "龙",
            Zodiac::Snake => "蛇",
            Zodiac::Horse => "马",
            Zodiac::Goat => "羊",
            Zodiac::Monkey => "猴",
            Zodiac::Rooster => "鸡",
            Zodiac::Dog => "狗",
            Zodiac::Pig => "猪",
        }
    }

    /// Position in [`Zodiac::ORDER`].
    pub fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for Zodiac {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Zodiac {
    type Err = RecordError;

    /// Accepts the simplified labels and the traditional forms some pages use.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let zodiac = match s.trim() {
            "鼠" => Zodiac::Rat,
            "牛" => Zodiac::Ox,
            "虎" => Zodiac::Tiger,
            "兔" => Zodiac::Rabbit,
            "龙" | "龍" => Zodiac::Dragon,
            "蛇" => Zodiac::Snake,
            "马" | "馬" => Zodiac::Horse,
            "羊" => Zodiac::Goat,
            "猴" => Zodiac::Monkey,
            "鸡" | "雞" => Zodiac::Rooster,
            "狗" => Zodiac::Dog,
            "猪" | "豬" => Zodiac::Pig,
            other => return Err(RecordError::UnknownZodiac(other.to_string())),
        };
        Ok(zodiac)
    }
}

/// One draw: seven balls in draw order, each with its zodiac mapping.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DrawRecord {
    pub period: String,
    pub numbers: [u8; BALLS_PER_DRAW],
    pub zodiacs: [Zodiac; BALLS_PER_DRAW],
}

impl DrawRecord {
    pub fn new(
        period: impl Into<String>,
        numbers: [u8; BALLS_PER_DRAW],
        zodiacs: [Zodiac; BALLS_PER_DRAW],
    ) -> Result<Self, RecordError> {
        let period = period.into().trim().to_string();
        if period.is_empty() {
            return Err(RecordError::EmptyPeriod);
        }
        validate_numbers(&numbers)?;
        Ok(Self {
            period,
            numbers,
            zodiacs,
        })
    }

    pub fn special_number(&self) -> u8 {
        self.numbers[SPECIAL_POSITION]
    }

    pub fn special_zodiac(&self) -> Zodiac {
        self.zodiacs[SPECIAL_POSITION]
    }
}

pub fn validate_numbers(numbers: &[u8; BALLS_PER_DRAW]) -> Result<(), RecordError> {
    for &n in numbers {
        if !(MIN_NUMBER..=MAX_NUMBER).contains(&n) {
            return Err(RecordError::NumberOutOfRange(n));
        }
    }
    for i in 0..numbers.len() {
        for j in (i + 1)..numbers.len() {
            if numbers[i] == numbers[j] {
                return Err(RecordError::DuplicateNumber(numbers[i]));
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const Z: [Zodiac; 7] = [
        Zodiac::Rat,
        Zodiac::Ox,
        Zodiac::Tiger,
        Zodiac::Rat,
        Zodiac::Ox,
        Zodiac::Tiger,
        Zodiac::Pig,
    ];

    #[test]
    fn test_new_record_ok() {
        let r = DrawRecord::new(" 2024001 ", [1, 2, 3, 4, 5, 6, 49], Z).unwrap();
        assert_eq!(r.period, "2024001");
        assert_eq!(r.special_number(), 49);
        assert_eq!(r.special_zodiac(), Zodiac::Pig);
    }

    #[test]
    fn test_new_record_rejects_bad_numbers() {
        assert_eq!(
            DrawRecord::new("1", [0, 2, 3, 4, 5, 6, 7], Z),
            Err(RecordError::NumberOutOfRange(0))
        );
        assert_eq!(
            DrawRecord::new("1", [1, 2, 3, 4, 5, 6, 50], Z),
            Err(RecordError::NumberOutOfRange(50))
        );
        assert_eq!(
            DrawRecord::new("1", [1, 2, 3, 4, 5, 6, 1], Z),
            Err(RecordError::DuplicateNumber(1))
        );
    }

    #[test]
    fn test_new_record_rejects_empty_period() {
        assert_eq!(
            DrawRecord::new("  ", [1, 2, 3, 4, 5, 6, 7], Z),
            Err(RecordError::EmptyPeriod)
        );
    }

    #[test]
    fn test_zodiac_order_is_canonical() {
        assert_eq!(Zodiac::ORDER.len(), 12);
        for (i, z) in Zodiac::ORDER.iter().enumerate() {
            assert_eq!(z.index(), i);
        }
        let labels: String = Zodiac::ORDER.iter().map(|z| z.label()).collect();
        assert_eq!(labels, "鼠牛虎兔龙蛇马羊猴鸡狗猪");
    }

    #[test]
    fn test_zodiac_parse() {
        for z in Zodiac::ORDER {
            assert_eq!(z.label().parse::<Zodiac>().unwrap(), z);
        }
        assert_eq!(" 龍 ".parse::<Zodiac>().unwrap(), Zodiac::Dragon);
        assert_eq!("豬".parse::<Zodiac>().unwrap(), Zodiac::Pig);
        assert!(matches!("猫".parse::<Zodiac>(), Err(RecordError::UnknownZodiac(_))));
    }

    #[test]
    fn test_zodiac_serde_uses_label() {
        let json = serde_json::to_string(&Zodiac::Rooster).unwrap();
        assert_eq!(json, "\"鸡\"");
        let back: Zodiac = serde_json::from_str(&json).unwrap();
        assert_eq!(back, Zodiac::Rooster);
    }
}
