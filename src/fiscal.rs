// src/fiscal.rs
//! Fiscal periods and their expansion into calendar display years.

use std::fmt;
use std::str::FromStr;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::utils::error::ExtractError;

static PERIOD_TOKEN_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*(\d{2}|\d{4})\s*[-/–]\s*(\d{2}|\d{4})\s*$").expect("valid period token regex")
});

/// A reporting period spanning parts of two calendar years, e.g. 2019-2020.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FiscalPeriod {
    pub start_year: i32,
    pub end_year: i32,
}

impl FiscalPeriod {
    pub fn new(start_year: i32, end_year: i32) -> Result<Self, ExtractError> {
        if end_year <= start_year {
            return Err(ExtractError::InvalidPeriod(format!(
                "{}-{} does not end after it starts",
                start_year, end_year
            )));
        }
        Ok(Self { start_year, end_year })
    }

    /// Period starting in `year` and ending in the next calendar year.
    pub fn starting(year: i32) -> Self {
        Self {
            start_year: year,
            end_year: year + 1,
        }
    }

    /// The two calendar years this period is surfaced under.
    pub fn display_years(&self) -> [i32; 2] {
        [self.start_year, self.end_year]
    }

    /// Canonical "YYYY-YYYY" token.
    pub fn token(&self) -> String {
        format!("{}-{}", self.start_year, self.end_year)
    }
}

impl fmt::Display for FiscalPeriod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.start_year, self.end_year)
    }
}

impl FromStr for FiscalPeriod {
    type Err = ExtractError;

    fn from_str(token: &str) -> Result<Self, Self::Err> {
        let caps = PERIOD_TOKEN_RE
            .captures(token)
            .ok_or_else(|| ExtractError::InvalidPeriod(token.to_string()))?;

        let start = widen_year(&caps[1], None)
            .ok_or_else(|| ExtractError::InvalidPeriod(token.to_string()))?;
        let end = widen_year(&caps[2], Some(start))
            .ok_or_else(|| ExtractError::InvalidPeriod(token.to_string()))?;

        FiscalPeriod::new(start, end)
    }
}

/// Two-digit years are 20xx; a two-digit end year inherits the start's century.
fn widen_year(digits: &str, start: Option<i32>) -> Option<i32> {
    let value: i32 = digits.parse().ok()?;
    if digits.len() == 4 {
        return Some(value);
    }
    let century = start.map(|s| s - s.rem_euclid(100)).unwrap_or(2000);
    let mut year = century + value;
    if let Some(s) = start {
        if year < s {
            year += 100; // "2099-00"
        }
    }
    Some(year)
}

impl Serialize for FiscalPeriod {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.token())
    }
}

impl<'de> Deserialize<'de> for FiscalPeriod {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let token = String::deserialize(deserializer)?;
        token.parse().map_err(serde::de::Error::custom)
    }
}

/// Expands a fiscal-period token into its (start, end) calendar years.
pub fn expand(token: &str) -> Result<(i32, i32), ExtractError> {
    let period: FiscalPeriod = token.parse()?;
    Ok((period.start_year, period.end_year))
}
