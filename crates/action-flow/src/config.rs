//! Workflow configuration

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Rate query page of the KKTC Merkez Bankası portal.
pub const DEFAULT_PORTAL_URL: &str =
    "https://www.kktcmerkezbankasi.org/tr/veriler/doviz_kurlari/kur_sorgulama";

/// Directory name created under the desktop for saved exports.
pub const DEFAULT_OUTPUT_DIR_NAME: &str = "KKTCMB_Downloads";

/// Portal, output location and every bound the workflow waits on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FlowConfig {
    pub portal_url: String,
    pub output_dir: PathBuf,
    pub timeouts: FlowTimeouts,
}

impl Default for FlowConfig {
    fn default() -> Self {
        Self {
            portal_url: DEFAULT_PORTAL_URL.to_string(),
            output_dir: default_output_dir(),
            timeouts: FlowTimeouts::default(),
        }
    }
}

impl FlowConfig {
    pub fn with_output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.output_dir = dir.into();
        self
    }

    pub fn with_portal_url(mut self, url: impl Into<String>) -> Self {
        self.portal_url = url.into();
        self
    }

    pub fn with_timeouts(mut self, timeouts: FlowTimeouts) -> Self {
        self.timeouts = timeouts;
        self
    }
}

/// `~/Desktop/KKTCMB_Downloads`, or relative to the working directory when
/// no home directory is known.
pub fn default_output_dir() -> PathBuf {
    dirs::desktop_dir()
        .or_else(|| dirs::home_dir().map(|home| home.join("Desktop")))
        .unwrap_or_else(|| PathBuf::from("."))
        .join(DEFAULT_OUTPUT_DIR_NAME)
}

/// Per-operation bounds in milliseconds. None of them is infinite.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FlowTimeouts {
    pub navigation_ms: u64,
    pub overlay_probe_ms: u64,
    pub tab_click_ms: u64,
    pub date_field_ms: u64,
    pub currency_control_ms: u64,
    pub list_button_ms: u64,
    pub result_indicator_ms: u64,
    pub download_control_ms: u64,
    pub all_download_wait_ms: u64,
    pub single_download_wait_ms: u64,
    pub typing_delay_ms: u64,
}

impl Default for FlowTimeouts {
    fn default() -> Self {
        Self {
            navigation_ms: 120_000,
            overlay_probe_ms: 250,
            tab_click_ms: 4_000,
            date_field_ms: 1_500,
            currency_control_ms: 5_000,
            list_button_ms: 6_000,
            result_indicator_ms: 7_000,
            download_control_ms: 5_000,
            all_download_wait_ms: 20_000,
            single_download_wait_ms: 25_000,
            typing_delay_ms: 30,
        }
    }
}

impl FlowTimeouts {
    /// Small bounds for tests against an in-memory page.
    pub fn immediate() -> Self {
        Self {
            navigation_ms: 1_000,
            overlay_probe_ms: 10,
            tab_click_ms: 10,
            date_field_ms: 10,
            currency_control_ms: 10,
            list_button_ms: 10,
            result_indicator_ms: 10,
            download_control_ms: 10,
            all_download_wait_ms: 50,
            single_download_wait_ms: 50,
            typing_delay_ms: 0,
        }
    }

    pub fn navigation(&self) -> Duration {
        Duration::from_millis(self.navigation_ms)
    }

    pub fn overlay_probe(&self) -> Duration {
        Duration::from_millis(self.overlay_probe_ms)
    }

    pub fn tab_click(&self) -> Duration {
        Duration::from_millis(self.tab_click_ms)
    }

    pub fn date_field(&self) -> Duration {
        Duration::from_millis(self.date_field_ms)
    }

    pub fn currency_control(&self) -> Duration {
        Duration::from_millis(self.currency_control_ms)
    }

    pub fn list_button(&self) -> Duration {
        Duration::from_millis(self.list_button_ms)
    }

    pub fn result_indicator(&self) -> Duration {
        Duration::from_millis(self.result_indicator_ms)
    }

    pub fn download_control(&self) -> Duration {
        Duration::from_millis(self.download_control_ms)
    }

    pub fn all_download_wait(&self) -> Duration {
        Duration::from_millis(self.all_download_wait_ms)
    }

    pub fn single_download_wait(&self) -> Duration {
        Duration::from_millis(self.single_download_wait_ms)
    }

    pub fn typing_delay(&self) -> Duration {
        Duration::from_millis(self.typing_delay_ms)
    }
}
