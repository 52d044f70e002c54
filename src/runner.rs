//! Prompt to finished run: extraction, fallback and orchestration

use action_flow::{FlowExecutor, FlowRun, Orchestrator};
use action_primitives::OptionMatcher;
use cdp_adapter::ChromiumLauncher;
use chrono::{Local, NaiveDate};
use fxportal_core_types::{Progress, QueryIntent, RunId};
use std::sync::Arc;
use tracing::{info, info_span, Instrument};

use crate::config::Config;
use crate::intent::{Extraction, IntentExtractor};
use crate::llm::{LlmError, OpenAiTextModel, TextModel};
use crate::matcher::LlmOptionMatcher;

/// Everything a run needs besides the prompt.
#[derive(Clone)]
pub struct RunnerDeps {
    pub extractor: Arc<IntentExtractor>,
    pub executor: Arc<dyn FlowExecutor>,
}

impl RunnerDeps {
    pub fn new(extractor: IntentExtractor, executor: Arc<dyn FlowExecutor>) -> Self {
        Self {
            extractor: Arc::new(extractor),
            executor,
        }
    }

    /// Real text model and Chromium, shared by every run. A missing API key
    /// is not an error here; each run then falls back to the default intent.
    pub fn from_config(config: &Config) -> Result<Self, LlmError> {
        let model = text_model(config)?;
        let executor = orchestrator(config, Arc::new(LlmOptionMatcher::new(model.clone())));
        Ok(Self::new(IntentExtractor::new(model), Arc::new(executor)))
    }
}

pub fn text_model(config: &Config) -> Result<Arc<dyn TextModel>, LlmError> {
    Ok(Arc::new(OpenAiTextModel::new(config.llm.to_openai())?))
}

pub fn orchestrator(config: &Config, matcher: Arc<dyn OptionMatcher>) -> Orchestrator {
    Orchestrator::new(
        Arc::new(ChromiumLauncher::new(config.browser.clone())),
        matcher,
        config.portal.clone(),
    )
}

pub async fn run_prompt(prompt: &str, deps: &RunnerDeps, progress: &Progress) -> FlowRun {
    run_prompt_on(prompt, Local::now().date_naive(), deps, progress).await
}

/// [`run_prompt`] with an explicit "today" for relative dates.
pub async fn run_prompt_on(
    prompt: &str,
    today: NaiveDate,
    deps: &RunnerDeps,
    progress: &Progress,
) -> FlowRun {
    let span = info_span!("run", run_id = %RunId::new());
    async {
        progress.log(format!("💬 Prompt: {prompt}")).await;

        let intent = resolve_intent(prompt, today, &deps.extractor, progress).await;
        info!(
            mode = %intent.mode,
            start = %intent.start_str(),
            end = %intent.end_str(),
            currency = %intent.currency_hint,
            "Intent resolved"
        );

        deps.executor.execute(&intent, progress).await
    }
    .instrument(span)
    .await
}

/// Extraction plus the total fallback, with the outcome logged to the sink.
pub async fn resolve_intent(
    prompt: &str,
    today: NaiveDate,
    extractor: &IntentExtractor,
    progress: &Progress,
) -> QueryIntent {
    match extractor.extract(prompt, today).await {
        Extraction::Parsed(intent) => {
            progress
                .log(format!("📦 Extracted parameters: {}", describe(&intent)))
                .await;
            intent
        }
        unparsed @ Extraction::Unparsed { .. } => {
            let intent = unparsed.into_intent(today);
            progress
                .warn(format!(
                    "Could not read the parameters, using the default: {}",
                    describe(&intent)
                ))
                .await;
            intent
        }
    }
}

fn describe(intent: &QueryIntent) -> String {
    serde_json::to_string(intent).unwrap_or_else(|_| {
        format!(
            "{} {} → {} {}",
            intent.mode,
            intent.start_str(),
            intent.end_str(),
            intent.currency_hint
        )
    })
}
