//! Core data types for action primitives

use cdp_adapter::OptionEntry;
use fxportal_core_types::RunWarning;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Name used when the browser suggests none.
pub const DEFAULT_DOWNLOAD_NAME: &str = "indirilen.xlsx";

/// How a field write was finally carried out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WriteStrategy {
    /// Real keyboard input on a visible candidate
    Typed,
    /// Programmatic value assignment with synthesized events
    Injected,
    /// Neither strategy touched any element
    Unwritten,
}

impl WriteStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            WriteStrategy::Typed => "typed",
            WriteStrategy::Injected => "injected",
            WriteStrategy::Unwritten => "unwritten",
        }
    }
}

impl fmt::Display for WriteStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of a field write. Warnings carry every read-back mismatch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldWriteOutcome {
    pub strategy: WriteStrategy,
    pub warnings: Vec<RunWarning>,
}

impl FieldWriteOutcome {
    /// Whether some strategy wrote something.
    pub fn wrote(&self) -> bool {
        self.strategy != WriteStrategy::Unwritten
    }

    /// Written and read back as intended.
    pub fn is_verified(&self) -> bool {
        self.wrote() && self.warnings.is_empty()
    }
}

/// Options of a selection control as read at interaction time, in DOM order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OptionCatalog {
    entries: Vec<OptionEntry>,
}

impl OptionCatalog {
    pub fn new(entries: Vec<OptionEntry>) -> Self {
        Self { entries }
    }

    pub fn entries(&self) -> &[OptionEntry] {
        &self.entries
    }

    pub fn labels(&self) -> Vec<String> {
        self.entries
            .iter()
            .map(|entry| entry.label.trim().to_string())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entry whose trimmed label equals `label` exactly.
    pub fn by_label(&self, label: &str) -> Option<&OptionEntry> {
        let label = label.trim();
        self.entries.iter().find(|entry| entry.label.trim() == label)
    }

    /// First entry whose label carries `(CODE)`, else one whose value is the code.
    pub fn by_code(&self, code: &str) -> Option<&OptionEntry> {
        let bracketed = format!("({code})");
        self.entries
            .iter()
            .find(|entry| entry.label.contains(&bracketed))
            .or_else(|| {
                self.entries
                    .iter()
                    .find(|entry| entry.value.eq_ignore_ascii_case(code))
            })
    }
}

impl fmt::Display for OptionCatalog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.labels().join(", "))
    }
}

/// The disambiguator's pick; `label` is always a catalog member.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchResult {
    pub label: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
}

/// A downloaded file after it was persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DownloadArtifact {
    pub suggested_name: String,
    pub saved_path: PathBuf,
}
