//! chromiumoxide-backed [`PageDriver`] and launcher.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::browser::{
    DownloadProgressState, EventDownloadProgress, EventDownloadWillBegin,
    SetDownloadBehaviorBehavior, SetDownloadBehaviorParams,
};
use chromiumoxide::cdp::browser_protocol::emulation::SetLocaleOverrideParams;
use chromiumoxide::cdp::browser_protocol::input::{
    DispatchKeyEventParams, DispatchKeyEventType, DispatchMouseEventParams,
    DispatchMouseEventType, InsertTextParams, MouseButton,
};
use chromiumoxide::error::CdpError;
use chromiumoxide::listeners::EventStream;
use chromiumoxide::Page;
use futures::{FutureExt, Stream, StreamExt};
use serde_json::Value;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use url::Url;

use crate::config::CdpConfig;
use crate::driver::{CompletedDownload, Key, OptionEntry, OptionPick, PageDriver};
use crate::error::{AdapterError, AdapterErrorKind};
use crate::query::ElementQuery;
use crate::session::{BrowserLauncher, BrowserSession, SessionTeardown};

const CLICK_BODY: &str = r#"
    if (!target) { return null; }
    target.scrollIntoView({ block: 'center', inline: 'center' });
    const rect = target.getBoundingClientRect();
    return { x: rect.left + rect.width / 2, y: rect.top + rect.height / 2 };
"#;

const FOCUS_BODY: &str = r#"
    const el = target || els[0];
    if (!el) { return false; }
    if (typeof el.focus === 'function') { el.focus(); }
    return true;
"#;

const VISIBLE_BODY: &str = "    return target !== null;";

const READ_BODY: &str = r#"
    const el = els[0];
    if (!el) { return null; }
    const raw = el.value !== undefined ? el.value : el.textContent;
    return raw === null || raw === undefined ? '' : String(raw);
"#;

const INJECT_BODY: &str = r#"
    let count = 0;
    els.forEach((el) => {
        el.removeAttribute('readonly');
        el.removeAttribute('disabled');
        const proto = el instanceof HTMLTextAreaElement
            ? HTMLTextAreaElement.prototype
            : HTMLInputElement.prototype;
        const descriptor = Object.getOwnPropertyDescriptor(proto, 'value');
        if (descriptor && descriptor.set && (el instanceof HTMLInputElement || el instanceof HTMLTextAreaElement)) {
            descriptor.set.call(el, arg);
        } else {
            el.value = arg;
        }
        ['input', 'change', 'blur'].forEach((type) => el.dispatchEvent(new Event(type, { bubbles: true })));
        if (window.jQuery && window.jQuery.fn && window.jQuery.fn.datepicker) {
            try { window.jQuery(el).datepicker('setDate', arg); } catch (err) {}
        }
        count += 1;
    });
    return count;
"#;

const OPTIONS_BODY: &str = r#"
    const el = target || els[0];
    if (!el || !el.options) { return null; }
    return Array.from(el.options).map((opt) => ({ label: (opt.text || '').trim(), value: opt.value }));
"#;

const SELECT_BODY: &str = r#"
    const el = target || els[0];
    if (!el || !el.options) { return { status: 'not-found' }; }
    const options = Array.from(el.options);
    const option = arg.by === 'label'
        ? options.find((opt) => (opt.text || '').trim() === arg.text.trim())
        : options.find((opt) => opt.value === arg.text);
    if (!option) { return { status: 'option-missing' }; }
    el.value = option.value;
    el.dispatchEvent(new Event('input', { bubbles: true }));
    el.dispatchEvent(new Event('change', { bubbles: true }));
    return { status: 'selected', value: el.value };
"#;

const HIDDEN_SYNC_FN: &str = r#"
(start, end) => {
    let touched = 0;
    Array.from(document.querySelectorAll("input[type='hidden']"))
        .filter((el) => /baslangic|bitis|start|end|tarih/i.test(el.name || el.id || ''))
        .forEach((el) => {
            const key = el.name || el.id || '';
            if (start !== null && /baslangic|start/i.test(key)) { el.value = start; touched += 1; }
            if (end !== null && /bitis|end/i.test(key)) { el.value = end; touched += 1; }
            el.dispatchEvent(new Event('change', { bubbles: true }));
        });
    return touched;
}
"#;

const CLICK_TEXT_FN: &str = r#"
(sources) => {
    const patterns = sources
        .map((src) => { try { return new RegExp(src, 'i'); } catch (err) { return null; } })
        .filter(Boolean);
    const hit = Array.from(document.querySelectorAll("button, a, input[type='button'], input[type='submit']"))
        .find((el) => patterns.some((re) => re.test(el.textContent || el.value || '')));
    if (!hit) { return false; }
    hit.click();
    return true;
}
"#;

struct ArmedDownload {
    dir: PathBuf,
    will_begin: EventStream<EventDownloadWillBegin>,
    progress: EventStream<EventDownloadProgress>,
}

/// A single Chromium tab.
pub struct ChromiumPage {
    page: Page,
    browser: Arc<Mutex<Browser>>,
    armed: Mutex<Option<ArmedDownload>>,
}

impl ChromiumPage {
    pub fn new(page: Page, browser: Arc<Mutex<Browser>>) -> Self {
        Self {
            page,
            browser,
            armed: Mutex::new(None),
        }
    }

    async fn evaluate(&self, expression: String) -> Result<Value, AdapterError> {
        let result = self
            .page
            .evaluate(expression)
            .await
            .map_err(AdapterError::cdp_io)?;
        Ok(result.into_value::<Value>().unwrap_or(Value::Null))
    }

    async fn evaluate_query(
        &self,
        query: &ElementQuery,
        body: &str,
    ) -> Result<Value, AdapterError> {
        self.evaluate(query.script(body)?).await
    }

    async fn evaluate_query_with(
        &self,
        query: &ElementQuery,
        arg: &impl serde::Serialize,
        body: &str,
    ) -> Result<Value, AdapterError> {
        let literal = serde_json::to_string(arg).map_err(AdapterError::internal)?;
        let body = format!("    const arg = {};\n{}", literal, body);
        self.evaluate(query.script(&body)?).await
    }

    async fn dispatch_mouse(
        &self,
        kind: DispatchMouseEventType,
        x: f64,
        y: f64,
    ) -> Result<(), AdapterError> {
        let params = DispatchMouseEventParams::builder()
            .r#type(kind)
            .x(x)
            .y(y)
            .button(MouseButton::Left)
            .click_count(1)
            .build()
            .map_err(AdapterError::internal)?;
        self.page
            .execute(params)
            .await
            .map_err(AdapterError::cdp_io)?;
        Ok(())
    }

    async fn dispatch_key(&self, kind: DispatchKeyEventType, key: Key) -> Result<(), AdapterError> {
        let descriptor = key.descriptor();
        let mut builder = DispatchKeyEventParams::builder()
            .r#type(kind.clone())
            .key(descriptor.key)
            .code(descriptor.code)
            .windows_virtual_key_code(descriptor.virtual_key)
            .native_virtual_key_code(descriptor.virtual_key)
            .modifiers(descriptor.modifiers);
        if matches!(kind, DispatchKeyEventType::KeyDown) {
            if let Some(text) = descriptor.text {
                builder = builder.text(text);
            }
        }
        let params = builder.build().map_err(AdapterError::internal)?;
        self.page
            .execute(params)
            .await
            .map_err(AdapterError::cdp_io)?;
        Ok(())
    }
}

fn not_found(query: &ElementQuery) -> AdapterError {
    AdapterError::new(AdapterErrorKind::TargetNotFound).with_hint(format!("no match for '{query}'"))
}

#[async_trait]
impl PageDriver for ChromiumPage {
    async fn navigate(&self, url: &str, deadline: Duration) -> Result<(), AdapterError> {
        let target = Url::parse(url).map_err(|err| {
            AdapterError::new(AdapterErrorKind::Internal).with_hint(format!("invalid url '{url}': {err}"))
        })?;
        info!(target: "cdp-adapter", url = %target, deadline_ms = deadline.as_millis() as u64, "navigating");
        match tokio::time::timeout(deadline, self.page.goto(target.as_str())).await {
            Err(_) | Ok(Err(CdpError::Timeout)) => Err(AdapterError::new(AdapterErrorKind::NavTimeout)
                .with_hint(format!("{url} did not load within {}s", deadline.as_secs()))),
            Ok(Err(err)) => Err(AdapterError::cdp_io(err)),
            Ok(Ok(_)) => Ok(()),
        }
    }

    async fn is_visible(&self, query: &ElementQuery) -> Result<bool, AdapterError> {
        let value = self.evaluate_query(query, VISIBLE_BODY).await?;
        Ok(value.as_bool().unwrap_or(false))
    }

    async fn click(&self, query: &ElementQuery) -> Result<(), AdapterError> {
        let value = self.evaluate_query(query, CLICK_BODY).await?;
        let (x, y) = match (
            value.get("x").and_then(Value::as_f64),
            value.get("y").and_then(Value::as_f64),
        ) {
            (Some(x), Some(y)) => (x, y),
            _ => return Err(not_found(query)),
        };
        debug!(target: "cdp-adapter", query = %query, x, y, "click");
        self.dispatch_mouse(DispatchMouseEventType::MouseMoved, x, y).await?;
        self.dispatch_mouse(DispatchMouseEventType::MousePressed, x, y).await?;
        self.dispatch_mouse(DispatchMouseEventType::MouseReleased, x, y).await
    }

    async fn focus(&self, query: &ElementQuery) -> Result<(), AdapterError> {
        let value = self.evaluate_query(query, FOCUS_BODY).await?;
        if value.as_bool().unwrap_or(false) {
            Ok(())
        } else {
            Err(not_found(query))
        }
    }

    async fn press_key(&self, key: Key) -> Result<(), AdapterError> {
        self.dispatch_key(DispatchKeyEventType::KeyDown, key).await?;
        self.dispatch_key(DispatchKeyEventType::KeyUp, key).await?;
        if key == Key::SelectAll {
            // Some inputs ignore the chord without a native menu; select() covers them.
            self.evaluate(
                "(() => { const el = document.activeElement; if (el && typeof el.select === 'function') { el.select(); } return true; })()"
                    .to_string(),
            )
            .await?;
        }
        Ok(())
    }

    async fn insert_text(&self, text: &str) -> Result<(), AdapterError> {
        let params = InsertTextParams::builder()
            .text(text)
            .build()
            .map_err(AdapterError::internal)?;
        self.page
            .execute(params)
            .await
            .map_err(AdapterError::cdp_io)?;
        Ok(())
    }

    async fn read_value(&self, query: &ElementQuery) -> Result<Option<String>, AdapterError> {
        let value = self.evaluate_query(query, READ_BODY).await?;
        Ok(value.as_str().map(str::to_string))
    }

    async fn inject_value(
        &self,
        query: &ElementQuery,
        value: &str,
    ) -> Result<usize, AdapterError> {
        let written = self.evaluate_query_with(query, &value, INJECT_BODY).await?;
        Ok(written.as_u64().unwrap_or(0) as usize)
    }

    async fn sync_hidden_fields(
        &self,
        start: Option<&str>,
        end: Option<&str>,
    ) -> Result<usize, AdapterError> {
        let args = serde_json::to_string(&[start, end]).map_err(AdapterError::internal)?;
        let expression = format!("({})(...{})", HIDDEN_SYNC_FN.trim(), args);
        let touched = self.evaluate(expression).await?;
        Ok(touched.as_u64().unwrap_or(0) as usize)
    }

    async fn click_by_text(&self, patterns: &[String]) -> Result<bool, AdapterError> {
        let args = serde_json::to_string(patterns).map_err(AdapterError::internal)?;
        let expression = format!("({})({})", CLICK_TEXT_FN.trim(), args);
        let clicked = self.evaluate(expression).await?;
        Ok(clicked.as_bool().unwrap_or(false))
    }

    async fn option_entries(&self, query: &ElementQuery) -> Result<Vec<OptionEntry>, AdapterError> {
        let value = self.evaluate_query(query, OPTIONS_BODY).await?;
        if value.is_null() {
            return Err(not_found(query));
        }
        serde_json::from_value(value).map_err(AdapterError::internal)
    }

    async fn select_option(
        &self,
        query: &ElementQuery,
        pick: &OptionPick,
    ) -> Result<String, AdapterError> {
        let result = self.evaluate_query_with(query, pick, SELECT_BODY).await?;
        let status = result
            .get("status")
            .and_then(Value::as_str)
            .unwrap_or("unknown");
        match status {
            "selected" => Ok(result
                .get("value")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string()),
            "not-found" => Err(not_found(query)),
            "option-missing" => Err(AdapterError::new(AdapterErrorKind::OptionNotFound)
                .with_hint(format!("{pick:?} not offered by '{query}'"))),
            other => Err(AdapterError::new(AdapterErrorKind::Internal)
                .with_hint(format!("selectOption failed: {other}"))),
        }
    }

    async fn arm_download(&self, dir: &Path) -> Result<(), AdapterError> {
        tokio::fs::create_dir_all(dir)
            .await
            .map_err(AdapterError::internal)?;
        let dir = tokio::fs::canonicalize(dir)
            .await
            .map_err(AdapterError::internal)?;
        let params = SetDownloadBehaviorParams::builder()
            .behavior(SetDownloadBehaviorBehavior::AllowAndName)
            .download_path(dir.to_string_lossy().to_string())
            .events_enabled(true)
            .build()
            .map_err(AdapterError::internal)?;

        let browser = self.browser.lock().await;
        browser.execute(params).await.map_err(AdapterError::cdp_io)?;
        let will_begin = browser
            .event_listener::<EventDownloadWillBegin>()
            .await
            .map_err(AdapterError::cdp_io)?;
        let progress = browser
            .event_listener::<EventDownloadProgress>()
            .await
            .map_err(AdapterError::cdp_io)?;
        drop(browser);

        debug!(target: "cdp-adapter", dir = %dir.display(), "download armed");
        *self.armed.lock().await = Some(ArmedDownload {
            dir,
            will_begin,
            progress,
        });
        Ok(())
    }

    async fn await_download(&self, timeout: Duration) -> Result<CompletedDownload, AdapterError> {
        let ArmedDownload {
            dir,
            will_begin,
            progress,
        } = self.armed.lock().await.take().ok_or_else(|| {
            AdapterError::new(AdapterErrorKind::Internal).with_hint("no download armed")
        })?;

        let began = will_begin.map(|event| (event.guid.clone(), event.suggested_filename.clone()));
        let progress = progress.map(|event| (event.guid.clone(), event.state.clone()));
        let wait = track_download(began, progress, &dir);

        match tokio::time::timeout(timeout, wait).await {
            Ok(result) => result,
            Err(_) => Err(AdapterError::new(AdapterErrorKind::DownloadTimeout)
                .with_hint(format!("no download within {}ms", timeout.as_millis()))),
        }
    }

    async fn close(&self) -> Result<(), AdapterError> {
        self.page
            .clone()
            .close()
            .await
            .map_err(AdapterError::cdp_io)
    }
}

/// Follows download events until one completes. Start events are always
/// drained first so a completed guid can be paired with its suggested name.
async fn track_download<B, P>(
    mut began: B,
    mut progress: P,
    dir: &Path,
) -> Result<CompletedDownload, AdapterError>
where
    B: Stream<Item = (String, String)> + Unpin,
    P: Stream<Item = (String, DownloadProgressState)> + Unpin,
{
    let mut names: HashMap<String, String> = HashMap::new();
    loop {
        tokio::select! {
            biased;
            Some((guid, name)) = began.next() => {
                debug!(target: "cdp-adapter", guid = %guid, name = %name, "download started");
                names.insert(guid, name);
            }
            Some((guid, state)) = progress.next() => match state {
                DownloadProgressState::Completed => {
                    if !names.contains_key(&guid) {
                        while let Some(Some((pending, name))) = began.next().now_or_never() {
                            names.insert(pending, name);
                        }
                    }
                    let suggested_filename = names.remove(&guid).unwrap_or_default();
                    return Ok(CompletedDownload {
                        suggested_filename,
                        path: dir.join(&guid),
                    });
                }
                DownloadProgressState::Canceled => {
                    return Err(AdapterError::new(AdapterErrorKind::DownloadTimeout)
                        .with_hint("browser canceled the download"));
                }
                _ => {}
            },
            else => {
                return Err(AdapterError::cdp_io("download event stream closed"));
            }
        }
    }
}

struct ChromiumTeardown {
    browser: Arc<Mutex<Browser>>,
    handler: JoinHandle<()>,
}

#[async_trait]
impl SessionTeardown for ChromiumTeardown {
    async fn shutdown(&mut self) -> Result<(), AdapterError> {
        let mut browser = self.browser.lock().await;
        let closed = browser.close().await.map_err(AdapterError::cdp_io);
        if let Err(err) = browser.wait().await {
            warn!(target: "cdp-adapter", error = %err, "browser process did not exit cleanly");
        }
        self.handler.abort();
        closed.map(|_| ())
    }
}

/// Launches one dedicated Chromium per session.
#[derive(Clone, Debug)]
pub struct ChromiumLauncher {
    config: CdpConfig,
}

impl ChromiumLauncher {
    pub fn new(config: CdpConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &CdpConfig {
        &self.config
    }

    fn browser_config(&self) -> Result<BrowserConfig, AdapterError> {
        let cfg = &self.config;
        let mut builder = BrowserConfig::builder()
            .request_timeout(Duration::from_millis(cfg.request_timeout_ms))
            .window_size(cfg.window_width, cfg.window_height)
            .viewport(None)
            .arg(format!("--lang={}", cfg.lang))
            .arg(format!("--user-agent={}", cfg.user_agent))
            .arg("--no-first-run")
            .arg("--no-default-browser-check");
        if cfg.ignore_https_errors {
            builder = builder.arg("--ignore-certificate-errors");
        }
        if !cfg.headless {
            builder = builder.with_head();
        }
        if cfg.no_sandbox {
            builder = builder.no_sandbox();
        }
        if !cfg.executable.as_os_str().is_empty() {
            builder = builder.chrome_executable(&cfg.executable);
        }
        builder.build().map_err(AdapterError::internal)
    }
}

#[async_trait]
impl BrowserLauncher for ChromiumLauncher {
    async fn launch(&self) -> Result<BrowserSession, AdapterError> {
        info!(
            target: "cdp-adapter",
            headless = self.config.headless,
            executable = %self.config.executable.display(),
            "launching chromium"
        );
        let (browser, mut handler) = Browser::launch(self.browser_config()?)
            .await
            .map_err(AdapterError::cdp_io)?;
        let handler = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(err) = event {
                    debug!(target: "cdp-adapter", error = %err, "handler event error");
                }
            }
        });

        let browser = Arc::new(Mutex::new(browser));
        let mut teardown = ChromiumTeardown {
            browser: Arc::clone(&browser),
            handler,
        };

        let page = {
            let guard = browser.lock().await;
            guard.new_page("about:blank").await
        };
        let page = match page {
            Ok(page) => page,
            Err(err) => {
                let _ = teardown.shutdown().await;
                return Err(AdapterError::cdp_io(err));
            }
        };

        let locale = SetLocaleOverrideParams {
            locale: Some(self.config.lang.clone()),
        };
        if let Err(err) = page.execute(locale).await {
            debug!(target: "cdp-adapter", error = %err, "locale override rejected");
        }

        let driver = Arc::new(ChromiumPage::new(page, browser));
        Ok(BrowserSession::new(driver, Some(Box::new(teardown))))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn browser_config_builds_with_defaults() {
        let mut config = CdpConfig::default();
        config.executable = PathBuf::from("/usr/bin/true");
        let launcher = ChromiumLauncher::new(config);
        assert!(launcher.browser_config().is_ok());
    }

    fn began(events: &[(&str, &str)]) -> impl Stream<Item = (String, String)> + Unpin {
        futures::stream::iter(
            events
                .iter()
                .map(|(guid, name)| (guid.to_string(), name.to_string()))
                .collect::<Vec<_>>(),
        )
    }

    fn progress(
        events: Vec<(&str, DownloadProgressState)>,
    ) -> impl Stream<Item = (String, DownloadProgressState)> + Unpin {
        futures::stream::iter(
            events
                .into_iter()
                .map(|(guid, state)| (guid.to_string(), state))
                .collect::<Vec<_>>(),
        )
    }

    #[tokio::test]
    async fn buffered_completion_keeps_the_suggested_name() {
        for _ in 0..32 {
            let done = track_download(
                began(&[("g1", "doviz_kurlari.xlsx")]),
                progress(vec![
                    ("g1", DownloadProgressState::InProgress),
                    ("g1", DownloadProgressState::Completed),
                ]),
                Path::new("/tmp/dl"),
            )
            .await
            .unwrap();
            assert_eq!(done.suggested_filename, "doviz_kurlari.xlsx");
            assert_eq!(done.path, PathBuf::from("/tmp/dl/g1"));
        }
    }

    #[tokio::test]
    async fn names_from_a_live_channel_are_paired() {
        let (tx, rx) = futures::channel::mpsc::unbounded();
        let completed = progress(vec![("g2", DownloadProgressState::Completed)]);
        tx.unbounded_send(("g2".to_string(), "kur_SEK.xlsx".to_string()))
            .unwrap();
        let done = track_download(rx, completed, Path::new("/tmp/dl"))
            .await
            .unwrap();
        assert_eq!(done.suggested_filename, "kur_SEK.xlsx");
    }

    #[tokio::test]
    async fn canceled_download_is_a_download_timeout() {
        let err = track_download(
            began(&[]),
            progress(vec![("g3", DownloadProgressState::Canceled)]),
            Path::new("/tmp/dl"),
        )
        .await
        .unwrap_err();
        assert_eq!(err.kind, AdapterErrorKind::DownloadTimeout);
    }

    #[tokio::test]
    #[ignore = "requires Chrome/Chromium installed"]
    async fn launches_and_reads_a_data_url() {
        let launcher = ChromiumLauncher::new(CdpConfig::default());
        let session = launcher.launch().await.unwrap();
        let page = session.page();
        page.navigate(
            "data:text/html,<input id='d' value='01/02/2025'><select id='c'><option value='SEK'>İsveç Kronu (SEK)</option></select>",
            Duration::from_secs(30),
        )
        .await
        .unwrap();
        let query = ElementQuery::css("#d");
        assert!(page.is_visible(&query).await.unwrap());
        assert_eq!(page.read_value(&query).await.unwrap().as_deref(), Some("01/02/2025"));
        let entries = page.option_entries(&ElementQuery::css("#c")).await.unwrap();
        assert_eq!(entries[0].value, "SEK");
        session.close().await.unwrap();
    }
}
