//! fxportal L0 page driver.
//!
//! This crate owns everything that talks to Chromium: the semantic
//! [`PageDriver`] surface the upper layers program against, the
//! [`ElementQuery`] predicates compiled to in-page resolvers, the chromiumoxide
//! backed implementation and the per-request [`BrowserSession`].

use std::{env, path::PathBuf};
use which::which;

pub mod chromium;
pub mod driver;
#[cfg(any(test, feature = "fake"))]
pub mod fake;
pub mod query;
pub mod session;

pub use chromium::{ChromiumLauncher, ChromiumPage};
pub use config::CdpConfig;
pub use driver::{CompletedDownload, Key, OptionEntry, OptionPick, PageDriver};
pub use error::{AdapterError, AdapterErrorKind};
pub use query::ElementQuery;
pub use session::{BrowserLauncher, BrowserSession};

pub mod error {
    use serde::{Deserialize, Serialize};
    use std::fmt;
    use thiserror::Error;

    /// High-level error categories surfaced by the driver.
    #[derive(Clone, Debug, Error, PartialEq, Eq, Serialize, Deserialize)]
    pub enum AdapterErrorKind {
        #[error("navigation timed out")]
        NavTimeout,
        #[error("cdp i/o failure")]
        CdpIo,
        #[error("target element not found")]
        TargetNotFound,
        #[error("option not found")]
        OptionNotFound,
        #[error("download did not complete")]
        DownloadTimeout,
        #[error("internal error")]
        Internal,
    }

    /// Enriched error metadata passed back to higher layers.
    #[derive(Clone, Debug, Serialize, Deserialize)]
    pub struct AdapterError {
        pub kind: AdapterErrorKind,
        pub hint: Option<String>,
        pub retriable: bool,
    }

    impl fmt::Display for AdapterError {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "{}", self.kind)?;
            if let Some(hint) = &self.hint {
                write!(f, ": {}", hint)?;
            }
            Ok(())
        }
    }

    impl std::error::Error for AdapterError {}

    impl AdapterError {
        pub fn new(kind: AdapterErrorKind) -> Self {
            Self {
                kind,
                hint: None,
                retriable: false,
            }
        }

        pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
            self.hint = Some(hint.into());
            self
        }

        pub fn retriable(mut self, flag: bool) -> Self {
            self.retriable = flag;
            self
        }

        pub fn cdp_io(err: impl fmt::Display) -> Self {
            Self::new(AdapterErrorKind::CdpIo)
                .with_hint(err.to_string())
                .retriable(true)
        }

        pub fn internal(err: impl fmt::Display) -> Self {
            Self::new(AdapterErrorKind::Internal).with_hint(err.to_string())
        }

        pub fn is_not_found(&self) -> bool {
            matches!(
                self.kind,
                AdapterErrorKind::TargetNotFound | AdapterErrorKind::OptionNotFound
            )
        }
    }
}

pub mod config {
    use crate::detect_chrome_executable;
    use serde::{Deserialize, Serialize};
    use std::{env, path::PathBuf};

    /// Browser launch options.
    #[derive(Clone, Debug, Serialize, Deserialize)]
    #[serde(default)]
    pub struct CdpConfig {
        pub executable: PathBuf,
        pub headless: bool,
        pub lang: String,
        pub user_agent: String,
        pub ignore_https_errors: bool,
        pub no_sandbox: bool,
        pub request_timeout_ms: u64,
        pub window_width: u32,
        pub window_height: u32,
    }

    pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/140.0.0.0 Safari/537.36";

    impl Default for CdpConfig {
        fn default() -> Self {
            Self {
                executable: default_chrome_path(),
                headless: resolve_headless_default(),
                lang: "tr-TR".to_string(),
                user_agent: DEFAULT_USER_AGENT.to_string(),
                ignore_https_errors: true,
                no_sandbox: false,
                request_timeout_ms: 125_000,
                window_width: 1366,
                window_height: 900,
            }
        }
    }

    impl CdpConfig {
        /// Re-applies environment overrides on top of file values.
        pub fn apply_env(&mut self) {
            if let Some(headless) = headless_from_env() {
                self.headless = headless;
            }
            if let Some(path) = detect_chrome_from_env() {
                self.executable = path;
            }
        }
    }

    fn headless_from_env() -> Option<bool> {
        // "0", "false", "no", "off" means headful
        let value = env::var("FXPORTAL_HEADLESS").ok()?;
        let lower = value.trim().to_ascii_lowercase();
        if lower.is_empty() {
            return None;
        }
        Some(!matches!(lower.as_str(), "0" | "false" | "no" | "off"))
    }

    fn resolve_headless_default() -> bool {
        headless_from_env().unwrap_or(true)
    }

    fn detect_chrome_from_env() -> Option<PathBuf> {
        let raw = env::var("FXPORTAL_CHROME").ok()?;
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return None;
        }
        let candidate = PathBuf::from(trimmed);
        candidate.exists().then_some(candidate)
    }

    fn default_chrome_path() -> PathBuf {
        detect_chrome_executable().unwrap_or_default()
    }
}

fn detect_chrome_executable() -> Option<PathBuf> {
    if let Ok(raw) = env::var("FXPORTAL_CHROME") {
        let trimmed = raw.trim();
        if !trimmed.is_empty() {
            let candidate = PathBuf::from(trimmed);
            if candidate.exists() {
                return Some(candidate);
            }
        }
    }

    for name in chrome_executable_names() {
        if let Ok(path) = which(name) {
            return Some(path);
        }
    }

    let skip_defaults = env::var("FXPORTAL_SKIP_OS_PATHS")
        .map(|value| !value.trim().is_empty())
        .unwrap_or(false);

    if !skip_defaults {
        for candidate in os_specific_chrome_paths() {
            if candidate.exists() {
                return Some(candidate);
            }
        }
    }

    None
}

fn chrome_executable_names() -> &'static [&'static str] {
    #[cfg(target_os = "windows")]
    {
        &["chrome.exe", "chromium.exe", "msedge.exe"]
    }

    #[cfg(any(target_os = "macos", target_os = "linux", target_os = "freebsd"))]
    {
        &[
            "google-chrome-stable",
            "google-chrome",
            "chromium",
            "chromium-browser",
        ]
    }

    #[cfg(not(any(
        target_os = "windows",
        target_os = "macos",
        target_os = "linux",
        target_os = "freebsd"
    )))]
    {
        &["chrome"]
    }
}

fn os_specific_chrome_paths() -> Vec<PathBuf> {
    #[cfg(target_os = "windows")]
    {
        let mut paths = Vec::new();
        for key in ["PROGRAMFILES", "PROGRAMFILES(X86)", "LOCALAPPDATA"] {
            if let Ok(value) = env::var(key) {
                let root = PathBuf::from(value.trim());
                paths.push(root.join("Google/Chrome/Application/chrome.exe"));
                paths.push(root.join("Chromium/Application/chrome.exe"));
            }
        }
        paths
    }

    #[cfg(target_os = "macos")]
    {
        vec![
            PathBuf::from("/Applications/Google Chrome.app/Contents/MacOS/Google Chrome"),
            PathBuf::from("/Applications/Chromium.app/Contents/MacOS/Chromium"),
        ]
    }

    #[cfg(any(target_os = "linux", target_os = "freebsd"))]
    {
        vec![
            PathBuf::from("/usr/bin/google-chrome-stable"),
            PathBuf::from("/usr/bin/google-chrome"),
            PathBuf::from("/usr/bin/chromium-browser"),
            PathBuf::from("/usr/bin/chromium"),
        ]
    }

    #[cfg(not(any(
        target_os = "windows",
        target_os = "macos",
        target_os = "linux",
        target_os = "freebsd"
    )))]
    {
        Vec::new()
    }
}
