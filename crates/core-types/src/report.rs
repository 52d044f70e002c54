//! The two terminal shapes of a run.

use crate::intent::{tr_date, QueryIntent, QueryMode};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Which date field a write targeted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DateField {
    Start,
    End,
}

impl DateField {
    pub fn as_str(&self) -> &'static str {
        match self {
            DateField::Start => "start",
            DateField::End => "end",
        }
    }
}

impl fmt::Display for DateField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Non-fatal condition observed during a clean run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RunWarning {
    /// The on-screen date did not read back as written.
    DateMismatch {
        field: DateField,
        expected: String,
        observed: Option<String>,
    },
    /// The currency control kept whatever it already held.
    CurrencyNotNarrowed { hint: String },
}

impl fmt::Display for RunWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunWarning::DateMismatch {
                field,
                expected,
                observed,
            } => write!(
                f,
                "{field} date reads {} instead of {expected}",
                observed.as_deref().unwrap_or("<unreadable>")
            ),
            RunWarning::CurrencyNotNarrowed { hint } => {
                write!(f, "currency '{hint}' could not be selected")
            }
        }
    }
}

/// Success terminal: `{mode, start_date, end_date, currency}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunReport {
    pub mode: QueryMode,
    #[serde(with = "tr_date")]
    pub start_date: NaiveDate,
    #[serde(with = "tr_date")]
    pub end_date: NaiveDate,
    pub currency: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<RunWarning>,
}

impl RunReport {
    pub fn from_intent(intent: &QueryIntent) -> Self {
        Self {
            mode: intent.mode,
            start_date: intent.start_date,
            end_date: intent.end_date,
            currency: intent.currency_hint.clone(),
            warnings: Vec::new(),
        }
    }

    pub fn with_warnings(mut self, warnings: Vec<RunWarning>) -> Self {
        self.warnings = warnings;
        self
    }
}

/// Error terminal: `{message}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunFailure {
    pub message: String,
}

impl RunFailure {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl fmt::Display for RunFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}
