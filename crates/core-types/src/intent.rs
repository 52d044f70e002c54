//! Structured query intent shared by the extractor and the orchestrator.

use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Wire format for every calendar date crossing a boundary (`dd/mm/yyyy`).
pub const TR_DATE_FORMAT: &str = "%d/%m/%Y";

/// Currency hint substituted when nothing usable was extracted.
pub const DEFAULT_CURRENCY_HINT: &str = "default";

/// Days covered by the fallback window, ending today.
pub const FALLBACK_WINDOW_DAYS: i64 = 3;

pub fn format_tr_date(date: NaiveDate) -> String {
    date.format(TR_DATE_FORMAT).to_string()
}

pub fn parse_tr_date(raw: &str) -> Result<NaiveDate, IntentError> {
    NaiveDate::parse_from_str(raw.trim(), TR_DATE_FORMAT)
        .map_err(|_| IntentError::InvalidDate(raw.to_string()))
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum IntentError {
    #[error("unknown query mode: {0}")]
    UnknownMode(String),

    #[error("invalid dd/mm/yyyy date: {0}")]
    InvalidDate(String),
}

/// Which query branches of the portal a run executes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QueryMode {
    /// All currencies for one date.
    All,
    /// One currency for a date range.
    Single,
    /// Both branches, `All` first.
    Both,
}

impl QueryMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            QueryMode::All => "all",
            QueryMode::Single => "single",
            QueryMode::Both => "both",
        }
    }

    pub fn runs_all_branch(&self) -> bool {
        matches!(self, QueryMode::All | QueryMode::Both)
    }

    pub fn runs_single_branch(&self) -> bool {
        matches!(self, QueryMode::Single | QueryMode::Both)
    }
}

impl fmt::Display for QueryMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for QueryMode {
    type Err = IntentError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "all" => Ok(QueryMode::All),
            "single" => Ok(QueryMode::Single),
            "both" => Ok(QueryMode::Both),
            other => Err(IntentError::UnknownMode(other.to_string())),
        }
    }
}

impl Serialize for QueryMode {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for QueryMode {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// `{mode, start_date, end_date, currency}` as understood by the orchestrator.
///
/// `start_date <= end_date` always holds: constructors and deserialization
/// swap a reversed range instead of rejecting it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "IntentWire")]
pub struct QueryIntent {
    pub mode: QueryMode,
    #[serde(with = "tr_date")]
    pub start_date: NaiveDate,
    #[serde(with = "tr_date")]
    pub end_date: NaiveDate,
    #[serde(rename = "currency")]
    pub currency_hint: String,
}

impl QueryIntent {
    pub fn new(
        mode: QueryMode,
        start_date: NaiveDate,
        end_date: NaiveDate,
        currency_hint: impl Into<String>,
    ) -> Self {
        let (start_date, end_date) = if start_date <= end_date {
            (start_date, end_date)
        } else {
            (end_date, start_date)
        };
        let currency_hint = currency_hint.into();
        let currency_hint = if currency_hint.trim().is_empty() {
            DEFAULT_CURRENCY_HINT.to_string()
        } else {
            currency_hint.trim().to_string()
        };
        Self {
            mode,
            start_date,
            end_date,
            currency_hint,
        }
    }

    /// Deterministic default used whenever extraction fails.
    pub fn fallback(today: NaiveDate) -> Self {
        Self::new(
            QueryMode::Single,
            today - Duration::days(FALLBACK_WINDOW_DAYS),
            today,
            DEFAULT_CURRENCY_HINT,
        )
    }

    /// The date-range window used when the dates could not be read.
    pub fn fallback_window(today: NaiveDate) -> (NaiveDate, NaiveDate) {
        (today - Duration::days(FALLBACK_WINDOW_DAYS), today)
    }

    pub fn start_str(&self) -> String {
        format_tr_date(self.start_date)
    }

    pub fn end_str(&self) -> String {
        format_tr_date(self.end_date)
    }
}

#[derive(Deserialize)]
struct IntentWire {
    mode: QueryMode,
    #[serde(with = "tr_date")]
    start_date: NaiveDate,
    #[serde(with = "tr_date")]
    end_date: NaiveDate,
    currency: String,
}

impl From<IntentWire> for QueryIntent {
    fn from(wire: IntentWire) -> Self {
        QueryIntent::new(wire.mode, wire.start_date, wire.end_date, wire.currency)
    }
}

/// Serde adapter for `dd/mm/yyyy` dates.
pub mod tr_date {
    use super::{format_tr_date, parse_tr_date};
    use chrono::NaiveDate;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(date: &NaiveDate, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&format_tr_date(*date))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<NaiveDate, D::Error> {
        let raw = String::deserialize(deserializer)?;
        parse_tr_date(&raw).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(d: u32, m: u32, y: i32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn mode_parsing_is_case_insensitive() {
        assert_eq!("ALL".parse::<QueryMode>().unwrap(), QueryMode::All);
        assert_eq!(" Single ".parse::<QueryMode>().unwrap(), QueryMode::Single);
        assert_eq!("both".parse::<QueryMode>().unwrap(), QueryMode::Both);
        assert!("some".parse::<QueryMode>().is_err());
    }

    #[test]
    fn branch_selection_follows_mode() {
        assert!(QueryMode::All.runs_all_branch());
        assert!(!QueryMode::All.runs_single_branch());
        assert!(!QueryMode::Single.runs_all_branch());
        assert!(QueryMode::Single.runs_single_branch());
        assert!(QueryMode::Both.runs_all_branch());
        assert!(QueryMode::Both.runs_single_branch());
    }

    #[test]
    fn reversed_range_is_swapped() {
        let intent = QueryIntent::new(QueryMode::Single, date(10, 3, 2025), date(7, 3, 2025), "SEK");
        assert_eq!(intent.start_date, date(7, 3, 2025));
        assert_eq!(intent.end_date, date(10, 3, 2025));
    }

    #[test]
    fn fallback_covers_last_three_days() {
        let today = date(17, 10, 2026);
        let intent = QueryIntent::fallback(today);
        assert_eq!(intent.mode, QueryMode::Single);
        assert_eq!(intent.start_str(), "14/10/2026");
        assert_eq!(intent.end_str(), "17/10/2026");
        assert_eq!(intent.currency_hint, DEFAULT_CURRENCY_HINT);
    }

    #[test]
    fn serializes_with_wire_keys_and_dates() {
        let intent = QueryIntent::new(QueryMode::Both, date(1, 2, 2025), date(3, 2, 2025), "İsveç Kronu");
        let value = serde_json::to_value(&intent).unwrap();
        assert_eq!(value["mode"], "both");
        assert_eq!(value["start_date"], "01/02/2025");
        assert_eq!(value["end_date"], "03/02/2025");
        assert_eq!(value["currency"], "İsveç Kronu");

        let back: QueryIntent = serde_json::from_value(value).unwrap();
        assert_eq!(back, intent);
    }

    #[test]
    fn deserialization_enforces_ordering() {
        let raw = r#"{"mode":"SINGLE","start_date":"09/01/2025","end_date":"02/01/2025","currency":"USD"}"#;
        let intent: QueryIntent = serde_json::from_str(raw).unwrap();
        assert!(intent.start_date <= intent.end_date);
        assert_eq!(intent.mode, QueryMode::Single);
    }

    #[test]
    fn blank_currency_becomes_default() {
        let intent = QueryIntent::new(QueryMode::All, date(1, 1, 2025), date(1, 1, 2025), "  ");
        assert_eq!(intent.currency_hint, DEFAULT_CURRENCY_HINT);
    }
}
