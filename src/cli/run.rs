use std::io::Write;
use std::sync::Arc;

use action_flow::Terminal;
use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use chrono::Local;
use clap::Args;
use fxportal_core_types::{LogSink, Progress, SinkError};
use tracing::warn;

use crate::intent::IntentExtractor;
use crate::runner::{run_prompt, text_model, RunnerDeps};
use crate::Config;

#[derive(Args, Clone, Debug)]
pub struct RunArgs {
    /// Free-text request, e.g. "son 3 gün İsveç Kronu"
    pub prompt: String,
}

#[derive(Args, Clone, Debug)]
pub struct IntentArgs {
    /// Free-text request to resolve
    pub prompt: String,
}

/// Progress lines straight to stdout.
#[derive(Debug, Default, Clone, Copy)]
pub struct StdoutSink;

#[async_trait]
impl LogSink for StdoutSink {
    async fn emit(&self, message: &str) -> Result<(), SinkError> {
        let mut stdout = std::io::stdout().lock();
        writeln!(stdout, "{message}").map_err(|err| SinkError::Other(err.to_string()))
    }
}

pub async fn cmd_run(args: RunArgs, config: &Config) -> Result<()> {
    let deps = RunnerDeps::from_config(config).context("Failed to prepare the text model")?;
    let progress = Progress::new(Arc::new(StdoutSink));

    let run = run_prompt(&args.prompt, &deps, &progress).await;

    println!("{}", terminal_json(&run.terminal)?);
    match run.terminal {
        Terminal::Report(_) => Ok(()),
        Terminal::Failed(failure) => bail!("run failed: {}", failure.message),
    }
}

/// The bare report or failure body, without the terminal tag.
fn terminal_json(terminal: &Terminal) -> serde_json::Result<String> {
    match terminal {
        Terminal::Report(report) => serde_json::to_string_pretty(report),
        Terminal::Failed(failure) => serde_json::to_string_pretty(failure),
    }
}

pub async fn cmd_intent(args: IntentArgs, config: &Config) -> Result<()> {
    let model = text_model(config).context("Failed to prepare the text model")?;
    let extractor = IntentExtractor::new(model);
    let today = Local::now().date_naive();

    let extraction = extractor.extract(&args.prompt, today).await;
    if !extraction.is_parsed() {
        warn!("Extraction reply unusable; printing the default intent");
    }
    let intent = extraction.into_intent(today);
    println!("{}", serde_json::to_string_pretty(&intent)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use fxportal_core_types::{QueryIntent, QueryMode, RunFailure, RunReport};
    use serde_json::{json, Value};

    #[test]
    fn report_is_printed_without_the_terminal_tag() {
        let day = NaiveDate::from_ymd_opt(2025, 3, 7).unwrap();
        let intent = QueryIntent::new(QueryMode::Single, day, day, "SEK");
        let printed = terminal_json(&Terminal::Report(RunReport::from_intent(&intent))).unwrap();
        let value: Value = serde_json::from_str(&printed).unwrap();
        assert_eq!(
            value,
            json!({
                "mode": "single",
                "start_date": "07/03/2025",
                "end_date": "07/03/2025",
                "currency": "SEK"
            })
        );
    }

    #[test]
    fn failure_is_printed_as_a_bare_message() {
        let printed = terminal_json(&Terminal::Failed(RunFailure::new("navigation timed out"))).unwrap();
        let value: Value = serde_json::from_str(&printed).unwrap();
        assert_eq!(value, json!({"message": "navigation timed out"}));
    }
}
