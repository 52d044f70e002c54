use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::AdapterError;
use crate::query::ElementQuery;

/// Keys the form writers need.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Key {
    /// Platform select-all chord (Meta+A on macOS, Control+A elsewhere).
    SelectAll,
    Backspace,
    Enter,
    Tab,
}

/// CDP key descriptor: `key`, `code`, windows virtual key code, text.
pub(crate) struct KeyDescriptor {
    pub key: &'static str,
    pub code: &'static str,
    pub virtual_key: i64,
    pub text: Option<&'static str>,
    pub modifiers: i64,
}

impl Key {
    pub(crate) fn descriptor(self) -> KeyDescriptor {
        match self {
            Key::SelectAll => KeyDescriptor {
                key: "a",
                code: "KeyA",
                virtual_key: 65,
                text: None,
                // CDP modifier bits: Ctrl = 2, Meta = 4
                modifiers: if cfg!(target_os = "macos") { 4 } else { 2 },
            },
            Key::Backspace => KeyDescriptor {
                key: "Backspace",
                code: "Backspace",
                virtual_key: 8,
                text: None,
                modifiers: 0,
            },
            Key::Enter => KeyDescriptor {
                key: "Enter",
                code: "Enter",
                virtual_key: 13,
                text: Some("\r"),
                modifiers: 0,
            },
            Key::Tab => KeyDescriptor {
                key: "Tab",
                code: "Tab",
                virtual_key: 9,
                text: None,
                modifiers: 0,
            },
        }
    }
}

/// One `<option>` as seen in the live control, in DOM order.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OptionEntry {
    pub label: String,
    pub value: String,
}

/// How `select_option` identifies the option to pick.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "by", content = "text", rename_all = "snake_case")]
pub enum OptionPick {
    /// Exact (trimmed) display label.
    Label(String),
    /// Backing `value` attribute.
    Value(String),
}

/// A finished browser download, still under the browser-assigned name.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CompletedDownload {
    pub suggested_filename: String,
    pub path: PathBuf,
}

/// Semantic browser operations on a single page.
///
/// Element-level calls act immediately; waiting for visibility is the
/// caller's job. Lookups that find nothing return
/// [`AdapterErrorKind::TargetNotFound`](crate::AdapterErrorKind::TargetNotFound).
#[async_trait]
pub trait PageDriver: Send + Sync {
    /// Loads `url`; fails with `NavTimeout` if the page is not usable by `deadline`.
    async fn navigate(&self, url: &str, deadline: Duration) -> Result<(), AdapterError>;

    async fn is_visible(&self, query: &ElementQuery) -> Result<bool, AdapterError>;

    async fn click(&self, query: &ElementQuery) -> Result<(), AdapterError>;

    async fn focus(&self, query: &ElementQuery) -> Result<(), AdapterError>;

    /// Key press on whatever element has focus.
    async fn press_key(&self, key: Key) -> Result<(), AdapterError>;

    /// Text input on whatever element has focus.
    async fn insert_text(&self, text: &str) -> Result<(), AdapterError>;

    /// `value` of the first match, `None` when nothing matches.
    async fn read_value(&self, query: &ElementQuery) -> Result<Option<String>, AdapterError>;

    /// Forces `value` into every match, lifting readonly/disabled and firing
    /// input/change/blur plus any attached date-picker hook. Returns the
    /// number of elements written.
    async fn inject_value(&self, query: &ElementQuery, value: &str)
        -> Result<usize, AdapterError>;

    /// Sets hidden inputs whose name/id looks like a start or end date.
    /// `None` leaves that side untouched. Returns the number of fields set.
    async fn sync_hidden_fields(
        &self,
        start: Option<&str>,
        end: Option<&str>,
    ) -> Result<usize, AdapterError>;

    /// Clicks the first button/link whose text matches any pattern
    /// (case-insensitive regex). Returns whether something was clicked.
    async fn click_by_text(&self, patterns: &[String]) -> Result<bool, AdapterError>;

    async fn option_entries(&self, query: &ElementQuery) -> Result<Vec<OptionEntry>, AdapterError>;

    /// Selects an option and fires input/change. Returns the selected value.
    async fn select_option(
        &self,
        query: &ElementQuery,
        pick: &OptionPick,
    ) -> Result<String, AdapterError>;

    /// Starts accepting downloads into `dir` and listening for them.
    async fn arm_download(&self, dir: &Path) -> Result<(), AdapterError>;

    /// Waits for the next download armed by [`PageDriver::arm_download`].
    async fn await_download(&self, timeout: Duration) -> Result<CompletedDownload, AdapterError>;

    async fn close(&self) -> Result<(), AdapterError>;
}
