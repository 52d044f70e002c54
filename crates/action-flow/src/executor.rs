//! Flow executor implementation
//!
//! `START → NAVIGATED → OVERLAYS_CLEARED → [ALL_BRANCH] → [SINGLE_BRANCH] → DONE`,
//! with `ERROR` reachable from any state. One browser session per run,
//! closed on every exit path.

use action_locator::Action;
use action_primitives::{
    capture_download, read_catalog, ActionError, DownloadArtifact, DownloadTimeouts, Disambiguator,
    FieldWriter, OptionCatalog, OptionMatcher,
};
use async_trait::async_trait;
use cdp_adapter::{BrowserLauncher, BrowserSession, PageDriver};
use futures::FutureExt;
use fxportal_core_types::{
    Progress, QueryIntent, RunFailure, RunReport, RunWarning, DEFAULT_CURRENCY_HINT,
};
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::config::FlowConfig;
use crate::errors::FlowError;
use crate::selectors::PortalSelectors;
use crate::types::{FlowRun, FlowState, FlowTrace, Terminal};

/// Runs a whole export for one intent
#[async_trait]
pub trait FlowExecutor: Send + Sync {
    /// Always returns exactly one terminal; never panics outward.
    async fn execute(&self, intent: &QueryIntent, progress: &Progress) -> FlowRun;
}

/// The portal workflow driven against sessions from a [`BrowserLauncher`]
pub struct Orchestrator {
    launcher: Arc<dyn BrowserLauncher>,
    disambiguator: Disambiguator,
    writer: FieldWriter,
    selectors: PortalSelectors,
    config: FlowConfig,
}

impl Orchestrator {
    pub fn new(
        launcher: Arc<dyn BrowserLauncher>,
        matcher: Arc<dyn OptionMatcher>,
        config: FlowConfig,
    ) -> Self {
        let timeouts = config.timeouts;
        Self {
            launcher,
            disambiguator: Disambiguator::new(matcher)
                .with_control_timeout(timeouts.currency_control()),
            writer: FieldWriter::new()
                .with_per_attempt(timeouts.date_field())
                .with_typing_delay(timeouts.typing_delay()),
            selectors: PortalSelectors::default(),
            config,
        }
    }

    pub fn with_selectors(mut self, selectors: PortalSelectors) -> Self {
        self.selectors = selectors;
        self
    }

    pub fn config(&self) -> &FlowConfig {
        &self.config
    }

    pub fn selectors(&self) -> &PortalSelectors {
        &self.selectors
    }

    /// Opens the portal and returns the live currency list without
    /// downloading anything.
    pub async fn inspect_catalog(&self, progress: &Progress) -> Result<OptionCatalog, FlowError> {
        let session = self.open_session().await?;
        let result = self.read_live_catalog(session.page(), progress).await;
        close_session(&session).await;
        result
    }

    async fn read_live_catalog(
        &self,
        page: &dyn PageDriver,
        progress: &Progress,
    ) -> Result<OptionCatalog, FlowError> {
        self.navigate(page, progress).await?;
        self.clear_overlays(page, progress).await;
        self.open_tab(page, FlowState::SingleBranch, progress).await;
        let (_, catalog) = read_catalog(
            page,
            &self.selectors.currency,
            self.config.timeouts.currency_control(),
        )
        .await
        .map_err(|source| FlowError::step(FlowState::SingleBranch, source))?;
        progress
            .log(format!("📋 Currency options ({}): {catalog}", catalog.len()))
            .await;
        Ok(catalog)
    }

    /// Best-effort overlay sweep. Finding nothing is the normal case.
    pub async fn clear_overlays(&self, page: &dyn PageDriver, progress: &Progress) -> bool {
        let dismissed = self
            .selectors
            .overlays
            .sweep(page, Action::Click, self.config.timeouts.overlay_probe())
            .await;
        if dismissed {
            progress.log("🧹 Cookie/consent overlay dismissed").await;
        }
        dismissed
    }

    async fn open_session(&self) -> Result<BrowserSession, FlowError> {
        self.launcher
            .launch()
            .await
            .map_err(|err| FlowError::Launch(err.to_string()))
    }

    async fn navigate(&self, page: &dyn PageDriver, progress: &Progress) -> Result<(), FlowError> {
        progress.log("🌐 Opening the rate query page…").await;
        page.navigate(&self.config.portal_url, self.config.timeouts.navigation())
            .await
            .map_err(|err| FlowError::Navigation(err.to_string()))
    }

    async fn drive(
        &self,
        page: &dyn PageDriver,
        intent: &QueryIntent,
        progress: &Progress,
        trace: &mut FlowTrace,
    ) -> Result<Vec<RunWarning>, FlowError> {
        self.navigate(page, progress).await?;
        trace.enter(FlowState::Navigated);

        self.clear_overlays(page, progress).await;
        trace.enter(FlowState::OverlaysCleared);

        let mut warnings = Vec::new();

        if intent.mode.runs_all_branch() {
            trace.enter(FlowState::AllBranch);
            let artifact = self.all_branch(page, progress).await?;
            trace.artifacts.push(artifact);
        }

        if intent.mode.runs_single_branch() {
            trace.enter(FlowState::SingleBranch);
            let artifact = self
                .single_branch(page, intent, progress, &mut warnings)
                .await?;
            trace.artifacts.push(artifact);
        }

        Ok(warnings)
    }

    /// All currencies for one date: by-date tab, then export.
    async fn all_branch(
        &self,
        page: &dyn PageDriver,
        progress: &Progress,
    ) -> Result<DownloadArtifact, FlowError> {
        progress.log("➡️ By-date query (all currencies)").await;
        self.open_tab(page, FlowState::AllBranch, progress).await;

        let artifact = self
            .export(page, self.config.timeouts.all_download_wait(), progress)
            .await
            .map_err(|source| FlowError::step(FlowState::AllBranch, source))?;
        progress
            .log(format!("✅ All-currency file saved: {}", artifact.suggested_name))
            .await;
        Ok(artifact)
    }

    /// One currency over a date range: dates, currency, list, wait, export.
    async fn single_branch(
        &self,
        page: &dyn PageDriver,
        intent: &QueryIntent,
        progress: &Progress,
        warnings: &mut Vec<RunWarning>,
    ) -> Result<DownloadArtifact, FlowError> {
        progress.log("➡️ By-currency query (single currency)").await;
        self.open_tab(page, FlowState::SingleBranch, progress).await;

        let dates = self
            .writer
            .set_date_range(
                page,
                &self.selectors.start_date,
                &self.selectors.end_date,
                &intent.start_str(),
                &intent.end_str(),
                progress,
            )
            .await;
        if !dates.wrote() {
            progress
                .warn("Dates could not be written; continuing anyway")
                .await;
        }
        warnings.extend(dates.warnings);

        self.narrow_currency(page, intent, progress, warnings).await;

        let timeouts = &self.config.timeouts;
        if !self
            .selectors
            .list_button
            .locate_and_act(page, Action::Click, timeouts.list_button())
            .await
        {
            progress
                .log("ℹ️ List button not visible; the table may already be loaded")
                .await;
        }

        match self
            .selectors
            .results
            .wait_visible(page, timeouts.result_indicator())
            .await
        {
            Some(located) => debug!(query = %located.query, "Results visible"),
            None => {
                progress
                    .log("ℹ️ No result indicator appeared; trying the export anyway")
                    .await
            }
        }

        let artifact = self
            .export(page, timeouts.single_download_wait(), progress)
            .await
            .map_err(|source| FlowError::step(FlowState::SingleBranch, source))?;
        progress
            .log(format!("✅ Single-currency file saved: {}", artifact.suggested_name))
            .await;
        Ok(artifact)
    }

    async fn narrow_currency(
        &self,
        page: &dyn PageDriver,
        intent: &QueryIntent,
        progress: &Progress,
        warnings: &mut Vec<RunWarning>,
    ) {
        let hint = intent.currency_hint.trim();
        if hint.is_empty() || hint.eq_ignore_ascii_case(DEFAULT_CURRENCY_HINT) {
            progress
                .log("ℹ️ No currency requested; keeping the portal's current selection")
                .await;
            return;
        }
        match self
            .disambiguator
            .resolve_option(page, &self.selectors.currency, hint, progress)
            .await
        {
            Some(choice) => info!(label = %choice.label, code = ?choice.code, "Currency narrowed"),
            None => warnings.push(RunWarning::CurrencyNotNarrowed {
                hint: hint.to_string(),
            }),
        }
    }

    async fn open_tab(&self, page: &dyn PageDriver, branch: FlowState, progress: &Progress) {
        let chain = match branch {
            FlowState::AllBranch => &self.selectors.by_date_tab,
            _ => &self.selectors.by_currency_tab,
        };
        if !chain
            .locate_and_act(page, Action::Click, self.config.timeouts.tab_click())
            .await
        {
            warn!(tab = %chain.name(), "Tab not found; assuming it is already active");
            progress
                .log(format!("ℹ️ '{}' not found; assuming it is already open", chain.name()))
                .await;
        }
    }

    /// One capture; a non-fatal failure (a CDP hiccup while arming) gets a
    /// single second attempt.
    async fn export(
        &self,
        page: &dyn PageDriver,
        wait: std::time::Duration,
        progress: &Progress,
    ) -> Result<DownloadArtifact, ActionError> {
        let timeouts = DownloadTimeouts {
            control: self.config.timeouts.download_control(),
            wait,
        };
        match capture_download(page, &self.selectors.export, &self.config.output_dir, timeouts, progress)
            .await
        {
            Err(err) if !err.is_fatal() => {
                warn!(error = %err, "Export attempt failed; retrying once");
                capture_download(page, &self.selectors.export, &self.config.output_dir, timeouts, progress)
                    .await
            }
            outcome => outcome,
        }
    }
}

#[async_trait]
impl FlowExecutor for Orchestrator {
    async fn execute(&self, intent: &QueryIntent, progress: &Progress) -> FlowRun {
        info!(mode = %intent.mode, start = %intent.start_str(), end = %intent.end_str(), "Executing export flow");
        let mut trace = FlowTrace::new();

        let session = match self.open_session().await {
            Ok(session) => session,
            Err(err) => return fail(trace, err, progress).await,
        };

        let outcome = AssertUnwindSafe(self.drive(session.page(), intent, progress, &mut trace))
            .catch_unwind()
            .await
            .unwrap_or_else(|_| Err(FlowError::Internal("flow panicked".to_string())));

        close_session(&session).await;

        match outcome {
            Ok(warnings) => {
                let report = RunReport::from_intent(intent).with_warnings(warnings);
                progress.log("🎉 Done.").await;
                info!(artifacts = trace.artifacts.len(), "Export flow completed");
                trace.finish(Terminal::Report(report))
            }
            Err(err) => fail(trace, err, progress).await,
        }
    }
}

impl std::fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator")
            .field("config", &self.config)
            .field("selectors", &self.selectors)
            .finish_non_exhaustive()
    }
}

async fn fail(trace: FlowTrace, err: FlowError, progress: &Progress) -> FlowRun {
    error!(state = %trace.current(), error = %err, "Export flow failed");
    progress.warn(format!("Run failed: {err}")).await;
    trace.finish(Terminal::Failed(RunFailure::new(err.to_string())))
}

async fn close_session(session: &BrowserSession) {
    if let Err(err) = session.close().await {
        warn!(error = %err, "Browser session did not close cleanly");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FlowTimeouts;
    use action_primitives::MatcherError;
    use cdp_adapter::fake::{ClickEffect, FakeElement, FakeLauncher, FakePage};
    use cdp_adapter::{AdapterError, AdapterErrorKind, ElementQuery};
    use chrono::NaiveDate;
    use fxportal_core_types::QueryMode;

    struct Refusing;

    #[async_trait]
    impl OptionMatcher for Refusing {
        async fn choose(&self, _hint: &str, _labels: &[String]) -> Result<String, MatcherError> {
            Err(MatcherError::Unavailable("offline".into()))
        }
    }

    fn intent(mode: QueryMode, hint: &str) -> QueryIntent {
        let day = NaiveDate::from_ymd_opt(2025, 3, 7).unwrap();
        QueryIntent::new(mode, day, day, hint)
    }

    fn orchestrator(launcher: Arc<FakeLauncher>, dir: &std::path::Path) -> Orchestrator {
        let config = FlowConfig::default()
            .with_output_dir(dir)
            .with_timeouts(FlowTimeouts::immediate());
        Orchestrator::new(launcher, Arc::new(Refusing), config)
    }

    fn export_page() -> FakePage {
        let export = ElementQuery::text_in(&["a"], "EXCEL İndir");
        FakePage::new()
            .with_element(export.clone(), FakeElement::visible())
            .with_download_trigger(export, "kurlar.xlsx")
    }

    #[tokio::test]
    async fn all_mode_runs_only_the_all_branch() {
        let dir = tempfile::tempdir().unwrap();
        let launcher = Arc::new(FakeLauncher::new(Arc::new(export_page())));
        let run = orchestrator(launcher.clone(), dir.path())
            .execute(&intent(QueryMode::All, "default"), &Progress::tracing())
            .await;

        assert!(run.terminal.is_report());
        assert_eq!(
            run.states,
            vec![
                FlowState::Start,
                FlowState::Navigated,
                FlowState::OverlaysCleared,
                FlowState::AllBranch,
                FlowState::Done
            ]
        );
        assert_eq!(run.artifacts.len(), 1);
        assert!(launcher.page().is_closed());
    }

    #[tokio::test]
    async fn navigation_failure_is_terminal_and_closes_the_session() {
        let dir = tempfile::tempdir().unwrap();
        let page = FakePage::new().fail_navigation(
            AdapterError::new(AdapterErrorKind::NavTimeout).with_hint("120000ms elapsed"),
        );
        let launcher = Arc::new(FakeLauncher::new(Arc::new(page)));
        let run = orchestrator(launcher.clone(), dir.path())
            .execute(&intent(QueryMode::Both, "SEK"), &Progress::tracing())
            .await;

        let failure = run.terminal.failure().unwrap();
        assert!(failure.message.contains("Portal did not load"));
        assert_eq!(run.states, vec![FlowState::Start, FlowState::Error]);
        assert!(run.artifacts.is_empty());
        assert!(launcher.page().is_closed());
    }

    #[tokio::test]
    async fn launch_failure_is_reported_not_raised() {
        let dir = tempfile::tempdir().unwrap();
        let launcher = Arc::new(FakeLauncher::failing(
            AdapterError::new(AdapterErrorKind::Internal).with_hint("chrome missing"),
        ));
        let run = orchestrator(launcher, dir.path())
            .execute(&intent(QueryMode::All, "default"), &Progress::tracing())
            .await;
        assert!(run.terminal.failure().unwrap().message.contains("chrome missing"));
        assert_eq!(run.final_state(), Some(FlowState::Error));
    }

    #[tokio::test]
    async fn overlay_sweep_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let banner = ElementQuery::text("Kabul Et");
        let page = Arc::new(
            FakePage::new()
                .with_element(banner.clone(), FakeElement::visible())
                .on_click(banner.clone(), ClickEffect::Hide(banner.clone())),
        );
        let flow = orchestrator(Arc::new(FakeLauncher::new(page.clone())), dir.path());
        let progress = Progress::tracing();

        assert!(flow.clear_overlays(page.as_ref(), &progress).await);
        assert!(!flow.clear_overlays(page.as_ref(), &progress).await);
        assert_eq!(page.clicks_on(&banner), 1);
    }

    #[tokio::test]
    async fn transient_arm_failure_is_retried_once() {
        let dir = tempfile::tempdir().unwrap();
        let page = export_page().fail_next_arm(AdapterError::cdp_io("socket reset"));
        let launcher = Arc::new(FakeLauncher::new(Arc::new(page)));
        let run = orchestrator(launcher.clone(), dir.path())
            .execute(&intent(QueryMode::All, "default"), &Progress::tracing())
            .await;

        assert!(run.terminal.is_report());
        assert_eq!(run.artifacts.len(), 1);
        let arms = launcher
            .page()
            .calls()
            .iter()
            .filter(|call| call.as_str() == "arm download")
            .count();
        assert_eq!(arms, 2);
    }

    #[tokio::test]
    async fn missing_export_control_fails_the_run() {
        let dir = tempfile::tempdir().unwrap();
        let launcher = Arc::new(FakeLauncher::new(Arc::new(FakePage::new())));
        let run = orchestrator(launcher.clone(), dir.path())
            .execute(&intent(QueryMode::All, "default"), &Progress::tracing())
            .await;

        let failure = run.terminal.failure().unwrap();
        assert!(failure.message.starts_with("all_branch failed: Control not found"));
        assert!(run.visited(FlowState::AllBranch));
        assert!(launcher.page().is_closed());
    }
}
