//! Common types used throughout the pipeline
//!
//! This module contains shared type definitions, type aliases,
//! and utility types used across multiple modules.

use crate::error::{Error, Result};
use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

// ============================================================================
// Type Aliases
// ============================================================================

/// JSON value type (re-exported from serde_json)
pub type JsonValue = serde_json::Value;

/// JSON object type
pub type JsonObject = serde_json::Map<String, JsonValue>;

/// A normalized record: exactly the fields declared by its resource schema
pub type Row = JsonObject;

// ============================================================================
// Source
// ============================================================================

/// Upstream API a resource is extracted from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Source {
    /// PokeAPI (`https://pokeapi.co/api/v2`)
    Pokemon,
    /// Chess.com published-data API (`https://api.chess.com/pub`)
    Chess,
}

impl Source {
    /// Public base URL of the source API
    pub fn default_base_url(self) -> &'static str {
        match self {
            Self::Pokemon => "https://pokeapi.co/api/v2",
            Self::Chess => "https://api.chess.com/pub",
        }
    }

    /// Dataset name used when every selected resource comes from this source
    pub fn default_dataset(self) -> &'static str {
        match self {
            Self::Pokemon => "pokemon_data",
            Self::Chess => "chess_data",
        }
    }

    /// Lowercase name
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pokemon => "pokemon",
            Self::Chess => "chess",
        }
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Write Disposition
// ============================================================================

/// How a sink applies rows of a resource
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WriteDisposition {
    /// Append every row (resources without a natural key)
    Append,
    /// Upsert on the resource's uniqueness key
    Merge,
}

// ============================================================================
// Backoff Type
// ============================================================================

/// Type of backoff for retries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackoffType {
    /// Constant delay between retries
    Constant,
    /// Linear increase in delay
    Linear,
    /// Exponential increase in delay
    #[default]
    Exponential,
}

// ============================================================================
// Year/Month
// ============================================================================

/// A calendar month, the unit of date-windowed iteration
///
/// Displays and serializes as `YYYY/MM`, the form the Chess.com archive
/// endpoints use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct YearMonth {
    year: i32,
    month: u32,
}

impl YearMonth {
    /// Create a year/month, validating the month number
    pub fn new(year: i32, month: u32) -> Result<Self> {
        if !(1..=12).contains(&month) {
            return Err(Error::config(format!(
                "Invalid month {month} (expected 1-12)"
            )));
        }
        if !(1900..=9999).contains(&year) {
            return Err(Error::config(format!("Invalid year {year}")));
        }
        Ok(Self { year, month })
    }

    /// Month containing the given date
    pub fn from_date(date: NaiveDate) -> Self {
        Self {
            year: date.year(),
            month: date.month(),
        }
    }

    /// Year component
    pub fn year(self) -> i32 {
        self.year
    }

    /// Month component (1-12)
    pub fn month(self) -> u32 {
        self.month
    }

    /// The following month
    #[must_use]
    pub fn succ(self) -> Self {
        if self.month == 12 {
            Self {
                year: self.year + 1,
                month: 1,
            }
        } else {
            Self {
                year: self.year,
                month: self.month + 1,
            }
        }
    }

    /// The month `n` months earlier
    #[must_use]
    pub fn minus_months(self, n: u32) -> Self {
        let total = self.year * 12 + (self.month as i32 - 1) - n as i32;
        Self {
            year: total.div_euclid(12),
            month: total.rem_euclid(12) as u32 + 1,
        }
    }

    /// All months from `self` to `end`, inclusive and ascending
    pub fn through(self, end: Self) -> Vec<Self> {
        let mut months = Vec::new();
        let mut current = self;
        while current <= end {
            months.push(current);
            current = current.succ();
        }
        months
    }

    /// Zero-padded month, as used in archive URLs
    pub fn month_padded(self) -> String {
        format!("{:02}", self.month)
    }
}

impl fmt::Display for YearMonth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}/{:02}", self.year, self.month)
    }
}

impl FromStr for YearMonth {
    type Err = Error;

    /// Accepts `YYYY/MM` and `YYYY-MM`
    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        let (year, month) = s
            .split_once('/')
            .or_else(|| s.split_once('-'))
            .ok_or_else(|| Error::config(format!("Invalid year/month '{s}' (expected YYYY/MM)")))?;

        if year.len() != 4 || month.is_empty() || month.len() > 2 {
            return Err(Error::config(format!(
                "Invalid year/month '{s}' (expected YYYY/MM)"
            )));
        }

        let year: i32 = year
            .parse()
            .map_err(|_| Error::config(format!("Invalid year in '{s}'")))?;
        let month: u32 = month
            .parse()
            .map_err(|_| Error::config(format!("Invalid month in '{s}'")))?;

        Self::new(year, month)
    }
}

impl Serialize for YearMonth {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for YearMonth {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_source_defaults() {
        assert_eq!(
            Source::Pokemon.default_base_url(),
            "https://pokeapi.co/api/v2"
        );
        assert_eq!(Source::Chess.default_dataset(), "chess_data");
        assert_eq!(Source::Chess.to_string(), "chess");
    }

    #[test]
    fn test_year_month_parse() {
        let ym: YearMonth = "2024/01".parse().unwrap();
        assert_eq!(ym.year(), 2024);
        assert_eq!(ym.month(), 1);

        let ym: YearMonth = "2023-11".parse().unwrap();
        assert_eq!(ym.to_string(), "2023/11");

        assert!("2024/13".parse::<YearMonth>().is_err());
        assert!("2024/0".parse::<YearMonth>().is_err());
        assert!("24/01".parse::<YearMonth>().is_err());
        assert!("2024".parse::<YearMonth>().is_err());
        assert!("abcd/01".parse::<YearMonth>().is_err());
    }

    #[test]
    fn test_year_month_succ_wraps_year() {
        let dec: YearMonth = "2023/12".parse().unwrap();
        assert_eq!(dec.succ().to_string(), "2024/01");
    }

    #[test]
    fn test_year_month_minus_months() {
        let feb: YearMonth = "2024/02".parse().unwrap();
        assert_eq!(feb.minus_months(2).to_string(), "2023/12");
        assert_eq!(feb.minus_months(0), feb);
        assert_eq!(feb.minus_months(14).to_string(), "2022/12");
    }

    #[test]
    fn test_year_month_through() {
        let start: YearMonth = "2023/11".parse().unwrap();
        let end: YearMonth = "2024/02".parse().unwrap();
        let months: Vec<String> = start.through(end).iter().map(ToString::to_string).collect();
        assert_eq!(months, vec!["2023/11", "2023/12", "2024/01", "2024/02"]);

        assert!(end.through(start).is_empty());
    }

    #[test]
    fn test_year_month_serde() {
        let ym: YearMonth = "2024/03".parse().unwrap();
        let json = serde_json::to_string(&ym).unwrap();
        assert_eq!(json, "\"2024/03\"");
        let back: YearMonth = serde_json::from_str(&json).unwrap();
        assert_eq!(back, ym);
    }

    #[test]
    fn test_year_month_ordering() {
        let a: YearMonth = "2023/12".parse().unwrap();
        let b: YearMonth = "2024/01".parse().unwrap();
        assert!(a < b);
    }
}
