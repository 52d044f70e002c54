//! Deterministic in-memory page used by tests across the workspace.
//!
//! Elements are keyed by the exact [`ElementQuery`] that finds them; a query
//! with no registered element matches nothing.

use std::collections::{HashMap, HashSet, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use uuid::Uuid;

use crate::driver::{CompletedDownload, Key, OptionEntry, OptionPick, PageDriver};
use crate::error::{AdapterError, AdapterErrorKind};
use crate::query::ElementQuery;
use crate::session::{BrowserLauncher, BrowserSession};

#[derive(Clone, Debug, Default)]
pub struct FakeElement {
    pub visible: bool,
    pub value: String,
    /// Keyboard input is ignored; injection still works.
    pub readonly: bool,
    /// Every write is ignored.
    pub frozen: bool,
}

impl FakeElement {
    pub fn visible() -> Self {
        Self {
            visible: true,
            ..Self::default()
        }
    }

    pub fn hidden() -> Self {
        Self::default()
    }

    pub fn with_value(mut self, value: impl Into<String>) -> Self {
        self.value = value.into();
        self
    }

    pub fn readonly(mut self) -> Self {
        self.readonly = true;
        self
    }

    pub fn frozen(mut self) -> Self {
        self.frozen = true;
        self
    }
}

/// Side effect of clicking an element.
#[derive(Clone, Debug)]
pub enum ClickEffect {
    Hide(ElementQuery),
    Show(ElementQuery),
}

#[derive(Clone, Debug)]
struct FakeSelect {
    options: Vec<OptionEntry>,
    selected: Option<String>,
}

#[derive(Default)]
struct FakeState {
    elements: HashMap<ElementQuery, FakeElement>,
    selects: HashMap<ElementQuery, FakeSelect>,
    hidden: Vec<(String, String)>,
    apply_button: Option<String>,
    effects: HashMap<ElementQuery, Vec<ClickEffect>>,
    download_triggers: HashMap<ElementQuery, String>,
    one_shot_triggers: HashSet<ElementQuery>,
    arm_errors: VecDeque<AdapterError>,
    focused: Option<ElementQuery>,
    select_all: bool,
    armed_dir: Option<PathBuf>,
    pending: VecDeque<String>,
    nav_error: Option<AdapterError>,
    navigations: Vec<String>,
    calls: Vec<String>,
    closed: bool,
}

#[derive(Default)]
pub struct FakePage {
    state: Mutex<FakeState>,
}

impl FakePage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_element(self, query: ElementQuery, element: FakeElement) -> Self {
        self.state.lock().elements.insert(query, element);
        self
    }

    pub fn with_select(
        self,
        query: ElementQuery,
        options: &[(&str, &str)],
        selected: Option<&str>,
    ) -> Self {
        let options = options
            .iter()
            .map(|(label, value)| OptionEntry {
                label: label.to_string(),
                value: value.to_string(),
            })
            .collect();
        self.state.lock().selects.insert(
            query,
            FakeSelect {
                options,
                selected: selected.map(str::to_string),
            },
        );
        self
    }

    pub fn with_hidden(self, name: &str, value: &str) -> Self {
        self.state
            .lock()
            .hidden
            .push((name.to_string(), value.to_string()));
        self
    }

    pub fn with_apply_button(self, label: &str) -> Self {
        self.state.lock().apply_button = Some(label.to_string());
        self
    }

    pub fn on_click(self, query: ElementQuery, effect: ClickEffect) -> Self {
        self.state
            .lock()
            .effects
            .entry(query)
            .or_default()
            .push(effect);
        self
    }

    /// Clicking `query` while a download is armed produces `suggested_name`.
    pub fn with_download_trigger(self, query: ElementQuery, suggested_name: &str) -> Self {
        self.state
            .lock()
            .download_triggers
            .insert(query, suggested_name.to_string());
        self
    }

    /// Like [`Self::with_download_trigger`], but only the first armed click
    /// downloads anything.
    pub fn with_download_trigger_once(self, query: ElementQuery, suggested_name: &str) -> Self {
        self.state.lock().one_shot_triggers.insert(query.clone());
        self.with_download_trigger(query, suggested_name)
    }

    /// The next `arm_download` call fails with `error`.
    pub fn fail_next_arm(self, error: AdapterError) -> Self {
        self.state.lock().arm_errors.push_back(error);
        self
    }

    pub fn fail_navigation(self, error: AdapterError) -> Self {
        self.state.lock().nav_error = Some(error);
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.state.lock().calls.clone()
    }

    pub fn clicks_on(&self, query: &ElementQuery) -> usize {
        let needle = format!("click {query}");
        self.state
            .lock()
            .calls
            .iter()
            .filter(|call| **call == needle)
            .count()
    }

    pub fn value_of(&self, query: &ElementQuery) -> Option<String> {
        self.state
            .lock()
            .elements
            .get(query)
            .map(|element| element.value.clone())
    }

    pub fn selected(&self, query: &ElementQuery) -> Option<String> {
        self.state
            .lock()
            .selects
            .get(query)
            .and_then(|select| select.selected.clone())
    }

    pub fn hidden_value(&self, name: &str) -> Option<String> {
        self.state
            .lock()
            .hidden
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.clone())
    }

    pub fn navigations(&self) -> Vec<String> {
        self.state.lock().navigations.clone()
    }

    pub fn is_closed(&self) -> bool {
        self.state.lock().closed
    }
}

fn not_found(query: &ElementQuery) -> AdapterError {
    AdapterError::new(AdapterErrorKind::TargetNotFound).with_hint(format!("no match for '{query}'"))
}

fn pattern_matches(pattern: &str, text: &str) -> bool {
    let text = text.to_lowercase();
    pattern
        .split('|')
        .map(str::to_lowercase)
        .any(|alternative| !alternative.is_empty() && text.contains(&alternative))
}

#[async_trait]
impl PageDriver for FakePage {
    async fn navigate(&self, url: &str, _deadline: Duration) -> Result<(), AdapterError> {
        let mut state = self.state.lock();
        state.calls.push(format!("navigate {url}"));
        if let Some(err) = state.nav_error.clone() {
            return Err(err);
        }
        state.navigations.push(url.to_string());
        Ok(())
    }

    async fn is_visible(&self, query: &ElementQuery) -> Result<bool, AdapterError> {
        let mut state = self.state.lock();
        state.calls.push(format!("probe {query}"));
        let element_visible = state
            .elements
            .get(query)
            .map(|element| element.visible)
            .unwrap_or(false);
        Ok(element_visible || state.selects.contains_key(query))
    }

    async fn click(&self, query: &ElementQuery) -> Result<(), AdapterError> {
        let mut state = self.state.lock();
        let visible = state
            .elements
            .get(query)
            .map(|element| element.visible)
            .unwrap_or(false);
        if !visible {
            return Err(not_found(query));
        }
        state.calls.push(format!("click {query}"));
        state.focused = Some(query.clone());
        let effects = state.effects.get(query).cloned().unwrap_or_default();
        for effect in effects {
            match effect {
                ClickEffect::Hide(target) => {
                    if let Some(element) = state.elements.get_mut(&target) {
                        element.visible = false;
                    }
                }
                ClickEffect::Show(target) => {
                    state.elements.entry(target).or_default().visible = true;
                }
            }
        }
        if state.armed_dir.is_some() {
            let once = state.one_shot_triggers.contains(query);
            let fired = if once {
                state.download_triggers.remove(query)
            } else {
                state.download_triggers.get(query).cloned()
            };
            if let Some(name) = fired {
                state.pending.push_back(name);
            }
        }
        Ok(())
    }

    async fn focus(&self, query: &ElementQuery) -> Result<(), AdapterError> {
        let mut state = self.state.lock();
        if !state.elements.contains_key(query) {
            return Err(not_found(query));
        }
        state.calls.push(format!("focus {query}"));
        state.focused = Some(query.clone());
        Ok(())
    }

    async fn press_key(&self, key: Key) -> Result<(), AdapterError> {
        let mut state = self.state.lock();
        state.calls.push(format!("key {key:?}"));
        match key {
            Key::SelectAll => state.select_all = true,
            Key::Backspace => {
                let clear = std::mem::take(&mut state.select_all);
                if let Some(focused) = state.focused.clone() {
                    if let Some(element) = state.elements.get_mut(&focused) {
                        if !element.readonly && !element.frozen {
                            if clear {
                                element.value.clear();
                            } else {
                                element.value.pop();
                            }
                        }
                    }
                }
            }
            Key::Enter => {}
            Key::Tab => state.focused = None,
        }
        Ok(())
    }

    async fn insert_text(&self, text: &str) -> Result<(), AdapterError> {
        let mut state = self.state.lock();
        state.calls.push(format!("type {text}"));
        let replace = std::mem::take(&mut state.select_all);
        if let Some(focused) = state.focused.clone() {
            if let Some(element) = state.elements.get_mut(&focused) {
                if !element.readonly && !element.frozen {
                    if replace {
                        element.value.clear();
                    }
                    element.value.push_str(text);
                }
            }
        }
        Ok(())
    }

    async fn read_value(&self, query: &ElementQuery) -> Result<Option<String>, AdapterError> {
        let state = self.state.lock();
        if let Some(select) = state.selects.get(query) {
            return Ok(Some(select.selected.clone().unwrap_or_default()));
        }
        Ok(state.elements.get(query).map(|element| element.value.clone()))
    }

    async fn inject_value(
        &self,
        query: &ElementQuery,
        value: &str,
    ) -> Result<usize, AdapterError> {
        let mut state = self.state.lock();
        state.calls.push(format!("inject {query}"));
        match state.elements.get_mut(query) {
            Some(element) => {
                if !element.frozen {
                    element.readonly = false;
                    element.value = value.to_string();
                }
                Ok(1)
            }
            None => Ok(0),
        }
    }

    async fn sync_hidden_fields(
        &self,
        start: Option<&str>,
        end: Option<&str>,
    ) -> Result<usize, AdapterError> {
        let mut state = self.state.lock();
        state.calls.push("sync hidden".to_string());
        let mut touched = 0;
        for (name, value) in state.hidden.iter_mut() {
            let key = name.to_lowercase();
            if let Some(start) = start {
                if key.contains("baslangic") || key.contains("start") {
                    *value = start.to_string();
                    touched += 1;
                }
            }
            if let Some(end) = end {
                if key.contains("bitis") || key.contains("end") {
                    *value = end.to_string();
                    touched += 1;
                }
            }
        }
        Ok(touched)
    }

    async fn click_by_text(&self, patterns: &[String]) -> Result<bool, AdapterError> {
        let mut state = self.state.lock();
        let Some(label) = state.apply_button.clone() else {
            return Ok(false);
        };
        let hit = patterns.iter().any(|pattern| pattern_matches(pattern, &label));
        if hit {
            state.calls.push(format!("click text={label}"));
        }
        Ok(hit)
    }

    async fn option_entries(&self, query: &ElementQuery) -> Result<Vec<OptionEntry>, AdapterError> {
        let state = self.state.lock();
        state
            .selects
            .get(query)
            .map(|select| select.options.clone())
            .ok_or_else(|| not_found(query))
    }

    async fn select_option(
        &self,
        query: &ElementQuery,
        pick: &OptionPick,
    ) -> Result<String, AdapterError> {
        let mut state = self.state.lock();
        state.calls.push(format!("select {pick:?}"));
        let select = state.selects.get_mut(query).ok_or_else(|| not_found(query))?;
        let chosen = select
            .options
            .iter()
            .find(|entry| match pick {
                OptionPick::Label(label) => entry.label.trim() == label.trim(),
                OptionPick::Value(value) => entry.value == *value,
            })
            .map(|entry| entry.value.clone())
            .ok_or_else(|| {
                AdapterError::new(AdapterErrorKind::OptionNotFound)
                    .with_hint(format!("{pick:?} not offered by '{query}'"))
            })?;
        select.selected = Some(chosen.clone());
        Ok(chosen)
    }

    async fn arm_download(&self, dir: &Path) -> Result<(), AdapterError> {
        std::fs::create_dir_all(dir).map_err(AdapterError::internal)?;
        let mut state = self.state.lock();
        state.calls.push("arm download".to_string());
        if let Some(err) = state.arm_errors.pop_front() {
            return Err(err);
        }
        state.armed_dir = Some(dir.to_path_buf());
        Ok(())
    }

    async fn await_download(&self, timeout: Duration) -> Result<CompletedDownload, AdapterError> {
        let ready = {
            let mut state = self.state.lock();
            let dir = state.armed_dir.take();
            dir.and_then(|dir| state.pending.pop_front().map(|name| (dir, name)))
        };
        match ready {
            Some((dir, suggested_filename)) => {
                let path = dir.join(Uuid::new_v4().to_string());
                std::fs::write(&path, suggested_filename.as_bytes())
                    .map_err(AdapterError::internal)?;
                Ok(CompletedDownload {
                    suggested_filename,
                    path,
                })
            }
            None => {
                tokio::time::sleep(timeout).await;
                Err(AdapterError::new(AdapterErrorKind::DownloadTimeout)
                    .with_hint(format!("no download within {}ms", timeout.as_millis())))
            }
        }
    }

    async fn close(&self) -> Result<(), AdapterError> {
        let mut state = self.state.lock();
        state.calls.push("close".to_string());
        state.closed = true;
        Ok(())
    }
}

/// Hands out sessions over one shared [`FakePage`].
pub struct FakeLauncher {
    page: Arc<FakePage>,
    launches: AtomicUsize,
    fail: Option<AdapterError>,
}

impl FakeLauncher {
    pub fn new(page: Arc<FakePage>) -> Self {
        Self {
            page,
            launches: AtomicUsize::new(0),
            fail: None,
        }
    }

    pub fn failing(error: AdapterError) -> Self {
        Self {
            page: Arc::new(FakePage::new()),
            launches: AtomicUsize::new(0),
            fail: Some(error),
        }
    }

    pub fn page(&self) -> Arc<FakePage> {
        Arc::clone(&self.page)
    }

    pub fn launches(&self) -> usize {
        self.launches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl BrowserLauncher for FakeLauncher {
    async fn launch(&self) -> Result<BrowserSession, AdapterError> {
        self.launches.fetch_add(1, Ordering::SeqCst);
        if let Some(err) = &self.fail {
            return Err(err.clone());
        }
        let page: Arc<dyn PageDriver> = self.page.clone();
        Ok(BrowserSession::new(page, None))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn typing_respects_readonly() {
        let editable = ElementQuery::css("#a");
        let locked = ElementQuery::css("#b");
        let page = FakePage::new()
            .with_element(editable.clone(), FakeElement::visible().with_value("old"))
            .with_element(locked.clone(), FakeElement::visible().readonly());

        page.click(&editable).await.unwrap();
        page.press_key(Key::SelectAll).await.unwrap();
        page.press_key(Key::Backspace).await.unwrap();
        page.insert_text("01/02/2025").await.unwrap();
        assert_eq!(page.value_of(&editable).as_deref(), Some("01/02/2025"));

        page.click(&locked).await.unwrap();
        page.insert_text("x").await.unwrap();
        assert_eq!(page.value_of(&locked).as_deref(), Some(""));
        assert_eq!(page.inject_value(&locked, "y").await.unwrap(), 1);
        assert_eq!(page.value_of(&locked).as_deref(), Some("y"));
    }

    #[tokio::test]
    async fn download_requires_arming_and_trigger() {
        let dir = tempfile::tempdir().unwrap();
        let trigger = ElementQuery::text("EXCEL İndir");
        let page = FakePage::new()
            .with_element(trigger.clone(), FakeElement::visible())
            .with_download_trigger(trigger.clone(), "kurlar.xlsx");

        page.arm_download(dir.path()).await.unwrap();
        page.click(&trigger).await.unwrap();
        let done = page.await_download(Duration::from_millis(10)).await.unwrap();
        assert_eq!(done.suggested_filename, "kurlar.xlsx");
        assert!(done.path.exists());

        let err = page
            .await_download(Duration::from_millis(10))
            .await
            .unwrap_err();
        assert_eq!(err.kind, AdapterErrorKind::DownloadTimeout);
    }

    #[tokio::test]
    async fn select_by_label_and_value() {
        let control = ElementQuery::css("select#c");
        let page = FakePage::new().with_select(
            control.clone(),
            &[("ABD Doları (USD)", "USD"), ("İsveç Kronu (SEK)", "SEK")],
            Some("USD"),
        );
        let err = page
            .select_option(&control, &OptionPick::Label("İsveç Kronu".into()))
            .await
            .unwrap_err();
        assert_eq!(err.kind, AdapterErrorKind::OptionNotFound);
        page.select_option(&control, &OptionPick::Value("SEK".into()))
            .await
            .unwrap();
        assert_eq!(page.selected(&control).as_deref(), Some("SEK"));
    }
}
