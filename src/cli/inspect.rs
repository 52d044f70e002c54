use std::sync::Arc;

use action_primitives::{MatcherError, OptionMatcher};
use anyhow::{Context, Result};
use async_trait::async_trait;
use fxportal_core_types::Progress;

use super::run::StdoutSink;
use crate::runner::orchestrator;
use crate::Config;

/// Inspection never selects anything, so no text model is needed.
struct NoMatcher;

#[async_trait]
impl OptionMatcher for NoMatcher {
    async fn choose(&self, _hint: &str, _labels: &[String]) -> Result<String, MatcherError> {
        Err(MatcherError::Unavailable("catalog inspection only".into()))
    }
}

/// Opens the portal, reads the currency control and prints every option.
pub async fn cmd_inspect(config: &Config) -> Result<()> {
    let progress = Progress::new(Arc::new(StdoutSink));

    let catalog = orchestrator(config, Arc::new(NoMatcher))
        .inspect_catalog(&progress)
        .await
        .context("Failed to read the currency list")?;

    println!("{}", serde_json::to_string_pretty(&catalog)?);
    Ok(())
}
