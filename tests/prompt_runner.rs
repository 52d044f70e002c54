//! Prompt-to-run wiring with a scripted text model and an in-memory portal

use action_flow::{FlowConfig, FlowExecutor, FlowRun, FlowState, FlowTimeouts, Orchestrator, Terminal};
use async_trait::async_trait;
use cdp_adapter::fake::{FakeElement, FakeLauncher, FakePage};
use cdp_adapter::ElementQuery;
use chrono::NaiveDate;
use fxportal_cli::runner::run_prompt_on;
use fxportal_cli::{
    IntentExtractor, LlmConfig, LlmError, LlmOptionMatcher, OpenAiTextModel, RunnerDeps, TextModel,
};
use fxportal_core_types::{MemorySink, Progress, QueryIntent, QueryMode, RunReport};
use parking_lot::Mutex;
use std::path::Path;
use std::sync::Arc;

type Script = Box<dyn Fn(&str, &str) -> Result<String, LlmError> + Send + Sync>;

struct ScriptedModel {
    script: Script,
    calls: Mutex<Vec<String>>,
}

impl ScriptedModel {
    fn new(
        script: impl Fn(&str, &str) -> Result<String, LlmError> + Send + Sync + 'static,
    ) -> Arc<Self> {
        Arc::new(Self {
            script: Box::new(script),
            calls: Mutex::new(Vec::new()),
        })
    }
}

#[async_trait]
impl TextModel for ScriptedModel {
    async fn complete(&self, system: &str, user: &str) -> Result<String, LlmError> {
        self.calls.lock().push(user.to_string());
        (self.script)(system, user)
    }
}

fn is_extraction(system: &str) -> bool {
    system.contains("currency report automation")
}

fn today() -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 3, 7).unwrap()
}

fn currency() -> ElementQuery {
    ElementQuery::css("select#edit-kur-kod")
}

fn portal() -> Arc<FakePage> {
    let export = ElementQuery::text_in(&["a"], "EXCEL İndir");
    Arc::new(
        FakePage::new()
            .with_element(
                ElementQuery::text_in(&["a"], "Döviz Cinsi Bazında Kur Sorgulama"),
                FakeElement::visible(),
            )
            .with_element(ElementQuery::css("#edit-baslangic-tarihi"), FakeElement::visible())
            .with_element(ElementQuery::css("#edit-bitis-tarihi"), FakeElement::visible())
            .with_select(
                currency(),
                &[("ABD Doları (USD)", "1"), ("İsveç Kronu (SEK)", "46")],
                Some("1"),
            )
            .with_element(ElementQuery::text_in(&["button"], "Listele"), FakeElement::visible())
            .with_element(ElementQuery::css("table"), FakeElement::visible())
            .with_element(export.clone(), FakeElement::visible())
            .with_download_trigger(export, "DovizCinsi.xlsx"),
    )
}

fn deps(model: Arc<dyn TextModel>, page: Arc<FakePage>, dir: &Path) -> RunnerDeps {
    let config = FlowConfig::default()
        .with_output_dir(dir)
        .with_timeouts(FlowTimeouts::immediate());
    let orchestrator = Orchestrator::new(
        Arc::new(FakeLauncher::new(page)),
        Arc::new(LlmOptionMatcher::new(model.clone())),
        config,
    );
    RunnerDeps::new(IntentExtractor::new(model), Arc::new(orchestrator))
}

fn progress() -> (Progress, MemorySink) {
    let sink = MemorySink::new();
    (Progress::new(Arc::new(sink.clone())), sink)
}

#[tokio::test]
async fn swedish_krona_prompt_downloads_one_file() {
    let dir = tempfile::tempdir().unwrap();
    let page = portal();
    let model = ScriptedModel::new(|system, _| {
        if is_extraction(system) {
            Ok("```json\n{\"mode\":\"single\",\"start_date\":\"04/03/2025\",\"end_date\":\"07/03/2025\",\"currency\":\"İsveç Kronu\"}\n```".into())
        } else {
            Ok("İsveç Kronu (SEK)".into())
        }
    });
    let (progress, lines) = progress();

    let run = run_prompt_on("son 3 gün İsveç Kronu", today(), &deps(model.clone(), page.clone(), dir.path()), &progress).await;

    let report = run.terminal.report().expect("report");
    assert_eq!(report.mode, QueryMode::Single);
    assert_eq!(report.start_date, NaiveDate::from_ymd_opt(2025, 3, 4).unwrap());
    assert_eq!(report.currency, "İsveç Kronu");
    assert_eq!(page.selected(&currency()).as_deref(), Some("46"));
    assert_eq!(run.artifacts.len(), 1);
    assert!(dir.path().join("DovizCinsi.xlsx").exists());
    assert_eq!(lines.lines()[0], "💬 Prompt: son 3 gün İsveç Kronu");
    assert!(lines.contains("📦 Extracted parameters"));
    assert_eq!(model.calls.lock().len(), 2);
}

#[tokio::test]
async fn unreadable_extraction_runs_the_default_intent() {
    let dir = tempfile::tempdir().unwrap();
    let page = portal();
    let model = ScriptedModel::new(|system, _| {
        if is_extraction(system) {
            Ok("Sorry, I am not sure what you mean.".into())
        } else {
            Ok("ABD Doları (USD)".into())
        }
    });
    let (progress, lines) = progress();

    let run = run_prompt_on("kur", today(), &deps(model.clone(), page.clone(), dir.path()), &progress).await;

    let report = run.terminal.report().expect("report");
    assert_eq!(report.mode, QueryMode::Single);
    assert_eq!(report.currency, "default");
    assert_eq!(report.end_date, today());
    assert!(lines.contains("⚠️ Could not read the parameters"));
    // the default hint never reaches the matcher
    assert_eq!(model.calls.lock().len(), 1);
    assert_eq!(page.selected(&currency()).as_deref(), Some("1"));
    assert!(run.visited(FlowState::SingleBranch));
}

#[tokio::test]
async fn unreachable_model_still_produces_a_report() {
    let dir = tempfile::tempdir().unwrap();
    let model = ScriptedModel::new(|_, _| Err(LlmError::Request("connection refused".into())));

    let run = run_prompt_on("son 3 gün İsveç Kronu", today(), &deps(model, portal(), dir.path()), &progress().0).await;

    assert!(run.terminal.is_report());
    assert_eq!(run.artifacts.len(), 1);
}

#[tokio::test]
async fn missing_api_key_downloads_with_the_default_intent() {
    let dir = tempfile::tempdir().unwrap();
    let page = portal();
    let model: Arc<dyn TextModel> =
        Arc::new(OpenAiTextModel::new(LlmConfig::default().to_openai()).unwrap());
    let (progress, lines) = progress();

    let run = run_prompt_on("son 3 gün İsveç Kronu", today(), &deps(model, page.clone(), dir.path()), &progress).await;

    let report = run.terminal.report().expect("report");
    assert_eq!(report.currency, "default");
    assert_eq!(run.artifacts.len(), 1);
    assert!(lines.contains("⚠️ Could not read the parameters"));
    assert_eq!(page.selected(&currency()).as_deref(), Some("1"));
}

struct Recording {
    seen: Mutex<Vec<QueryIntent>>,
}

#[async_trait]
impl FlowExecutor for Recording {
    async fn execute(&self, intent: &QueryIntent, _progress: &Progress) -> FlowRun {
        self.seen.lock().push(intent.clone());
        FlowRun {
            terminal: Terminal::Report(RunReport::from_intent(intent)),
            states: vec![FlowState::Start, FlowState::Done],
            artifacts: Vec::new(),
        }
    }
}

#[tokio::test]
async fn extracted_intent_reaches_the_executor_unchanged() {
    let model = ScriptedModel::new(|_, _| {
        Ok(r#"{"mode":"both","start_date":"01/03/2025","end_date":"07/03/2025","currency":"Euro"}"#.into())
    });
    let executor = Arc::new(Recording {
        seen: Mutex::new(Vec::new()),
    });
    let deps = RunnerDeps::new(IntentExtractor::new(model), executor.clone());

    let run = run_prompt_on("bu hafta euro ve tüm kurlar", today(), &deps, &progress().0).await;

    assert!(run.terminal.is_report());
    let seen = executor.seen.lock();
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0].mode, QueryMode::Both);
    assert_eq!(seen[0].start_str(), "01/03/2025");
    assert_eq!(seen[0].currency_hint, "Euro");
}
