//! Application configuration
//!
//! One YAML document with a section per layer. Every section has defaults,
//! so an empty or partial file is valid.

use action_flow::FlowConfig;
use cdp_adapter::CdpConfig;
use serde::{Deserialize, Serialize};
use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;
use tracing::info;

use crate::llm::OpenAiConfig;

pub const OPENAI_API_KEY_ENV: &str = "OPENAI_API_KEY";
pub const OUTPUT_DIR_ENV: &str = "FXPORTAL_OUTPUT_DIR";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub portal: FlowConfig,
    pub browser: CdpConfig,
    pub llm: LlmConfig,
    pub serve: ServeConfig,
}

impl Config {
    /// Environment variables win over file values.
    pub fn apply_env(&mut self) {
        if let Some(key) = non_empty_env(OPENAI_API_KEY_ENV) {
            self.llm.api_key = Some(key);
            info!("Using OpenAI API key from {}", OPENAI_API_KEY_ENV);
        }
        if let Some(dir) = non_empty_env(OUTPUT_DIR_ENV) {
            self.portal.output_dir = PathBuf::from(dir);
        }
        self.browser.apply_env();
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    pub model: String,
    pub api_base: String,
    /// Comma-separated keys are tried in order when one is rate limited.
    pub api_key: Option<String>,
    pub temperature: f32,
    pub timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            model: "gpt-4o-mini".to_string(),
            api_base: "https://api.openai.com/v1".to_string(),
            api_key: None,
            temperature: 0.0,
            timeout_secs: 60,
        }
    }
}

impl LlmConfig {
    pub fn api_keys(&self) -> Vec<String> {
        self.api_key
            .as_deref()
            .unwrap_or_default()
            .split(',')
            .map(str::trim)
            .filter(|key| !key.is_empty())
            .map(str::to_string)
            .collect()
    }

    pub fn to_openai(&self) -> OpenAiConfig {
        OpenAiConfig {
            api_keys: self.api_keys(),
            model: self.model.clone(),
            api_base: self.api_base.clone(),
            temperature: self.temperature,
            timeout: Duration::from_secs(self.timeout_secs),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServeConfig {
    pub addr: SocketAddr,
    /// Concurrent browser runs; further connections wait for a slot.
    pub max_concurrent_runs: usize,
}

impl Default for ServeConfig {
    fn default() -> Self {
        Self {
            addr: SocketAddr::from(([127, 0, 0, 1], 8000)),
            max_concurrent_runs: 2,
        }
    }
}

fn non_empty_env(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_yaml_keeps_defaults() {
        let yaml = "llm:\n  model: gpt-4o\nserve:\n  addr: 0.0.0.0:9000\nportal:\n  output_dir: /tmp/kur\n";
        let config: Config = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.llm.model, "gpt-4o");
        assert_eq!(config.llm.temperature, 0.0);
        assert_eq!(config.serve.addr.port(), 9000);
        assert_eq!(config.serve.max_concurrent_runs, 2);
        assert_eq!(config.portal.output_dir, PathBuf::from("/tmp/kur"));
        assert_eq!(config.browser.lang, "tr-TR");
    }

    #[test]
    fn api_keys_are_split_and_trimmed() {
        let llm = LlmConfig {
            api_key: Some(" sk-a, ,sk-b ".into()),
            ..LlmConfig::default()
        };
        assert_eq!(llm.api_keys(), vec!["sk-a", "sk-b"]);
        assert!(LlmConfig::default().api_keys().is_empty());
        assert_eq!(llm.to_openai().timeout, Duration::from_secs(60));
    }
}
