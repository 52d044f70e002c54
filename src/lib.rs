//! fxportal library
//!
//! Prompt in, Excel export out: the text-model adapters, the intent
//! extractor, the runner that hands intents to the portal workflow and the
//! websocket console that streams its progress.

pub mod cli;
pub mod config;
pub mod intent;
pub mod llm;
pub mod matcher;
pub mod runner;
pub mod server;

pub use config::{Config, LlmConfig, ServeConfig};
pub use intent::{Extraction, IntentExtractor};
pub use llm::{LlmError, OpenAiTextModel, TextModel};
pub use matcher::LlmOptionMatcher;
pub use runner::{run_prompt, RunnerDeps};

/// One-page console served at `/`.
pub const CONSOLE_HTML: &str = include_str!("static/index.html");
