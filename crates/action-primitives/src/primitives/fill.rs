//! Fill primitive - make a form field hold a value despite picker widgets
//!
//! Strategy order, each only if the previous fully failed:
//! 1. Keyboard typing on the first visible candidate
//! 2. DOM injection into every candidate, hidden mirror sync, apply button
//!
//! Either way the field is read back afterwards. A mismatch never fails the
//! write; it becomes a [`RunWarning::DateMismatch`] and a progress warning.

use action_locator::{LocatorChain, Strategy};
use cdp_adapter::{AdapterError, ElementQuery, Key, PageDriver};
use fxportal_core_types::{DateField, Progress, RunWarning};
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::types::{FieldWriteOutcome, WriteStrategy};

/// Default visibility wait per candidate.
pub const DEFAULT_FIELD_TIMEOUT: Duration = Duration::from_millis(1500);

/// Default pause between typed characters.
pub const DEFAULT_TYPING_DELAY: Duration = Duration::from_millis(30);

/// Text of confirm buttons some date pickers render.
pub const DEFAULT_APPLY_PATTERN: &str = "Uygula|Tamam|Apply";

/// Writes date-like values into form fields.
#[derive(Debug, Clone)]
pub struct FieldWriter {
    per_attempt: Duration,
    typing_delay: Duration,
    apply_patterns: Vec<String>,
}

impl Default for FieldWriter {
    fn default() -> Self {
        Self {
            per_attempt: DEFAULT_FIELD_TIMEOUT,
            typing_delay: DEFAULT_TYPING_DELAY,
            apply_patterns: vec![DEFAULT_APPLY_PATTERN.to_string()],
        }
    }
}

impl FieldWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_per_attempt(mut self, timeout: Duration) -> Self {
        self.per_attempt = timeout;
        self
    }

    pub fn with_typing_delay(mut self, delay: Duration) -> Self {
        self.typing_delay = delay;
        self
    }

    /// Writes one field.
    pub async fn set_field_value(
        &self,
        page: &dyn PageDriver,
        candidates: &LocatorChain,
        value: &str,
        role: DateField,
        verify: bool,
        progress: &Progress,
    ) -> FieldWriteOutcome {
        info!(chain = %candidates.name(), %role, value, "Writing field");

        let mut strategy = WriteStrategy::Unwritten;
        for candidate in candidates.strategies() {
            if self.type_candidate(page, candidate.as_ref(), value).await {
                progress
                    .log(format!("⌨️ Typed {role} date {value} ({})", candidate.query()))
                    .await;
                strategy = WriteStrategy::Typed;
                break;
            }
        }

        if strategy == WriteStrategy::Unwritten {
            let (start, end) = match role {
                DateField::Start => (Some(value), None),
                DateField::End => (None, Some(value)),
            };
            let touched = self.inject(page, &[(candidates, value)], start, end).await;
            if touched > 0 {
                progress
                    .log(format!("🧠 Injected {role} date {value} via script"))
                    .await;
                strategy = WriteStrategy::Injected;
            }
        }

        let warnings = if verify {
            let observed = read_back(page, candidates).await;
            progress
                .log(format!(
                    "🔎 On-screen {role} value: {}",
                    observed.as_deref().unwrap_or("<none>")
                ))
                .await;
            mismatches(&[(role, value, observed)])
        } else {
            Vec::new()
        };
        warn_mismatches(&warnings, progress).await;

        FieldWriteOutcome { strategy, warnings }
    }

    /// Writes a start/end pair whose candidate lists are zipped pairwise.
    ///
    /// The first pair where both sides type successfully wins; otherwise
    /// injection covers both fields in one pass.
    pub async fn set_date_range(
        &self,
        page: &dyn PageDriver,
        start_candidates: &LocatorChain,
        end_candidates: &LocatorChain,
        start: &str,
        end: &str,
        progress: &Progress,
    ) -> FieldWriteOutcome {
        info!(start, end, "Writing date range");

        let mut strategy = WriteStrategy::Unwritten;
        let pairs = start_candidates
            .strategies()
            .iter()
            .zip(end_candidates.strategies());
        for (start_candidate, end_candidate) in pairs {
            if !self.type_candidate(page, start_candidate.as_ref(), start).await {
                continue;
            }
            if !self.type_candidate(page, end_candidate.as_ref(), end).await {
                continue;
            }
            progress
                .log(format!(
                    "⌨️ Typed dates {start} → {end} ({} , {})",
                    start_candidate.query(),
                    end_candidate.query()
                ))
                .await;
            strategy = WriteStrategy::Typed;
            break;
        }

        if strategy == WriteStrategy::Unwritten {
            let touched = self
                .inject(
                    page,
                    &[(start_candidates, start), (end_candidates, end)],
                    Some(start),
                    Some(end),
                )
                .await;
            if touched > 0 {
                progress
                    .log(format!("🧠 Injected dates {start} → {end} via script"))
                    .await;
                strategy = WriteStrategy::Injected;
            } else {
                warn!(start, end, "No date field accepted a value");
            }
        }

        let observed_start = read_back(page, start_candidates).await;
        let observed_end = read_back(page, end_candidates).await;
        progress
            .log(format!(
                "🔎 On-screen dates: {} → {}",
                observed_start.as_deref().unwrap_or("<none>"),
                observed_end.as_deref().unwrap_or("<none>")
            ))
            .await;

        let warnings = mismatches(&[
            (DateField::Start, start, observed_start),
            (DateField::End, end, observed_end),
        ]);
        warn_mismatches(&warnings, progress).await;

        FieldWriteOutcome { strategy, warnings }
    }

    async fn type_candidate(
        &self,
        page: &dyn PageDriver,
        candidate: &dyn Strategy,
        value: &str,
    ) -> bool {
        match candidate.try_locate(page, self.per_attempt).await {
            Ok(Some(located)) => match self.type_into(page, &located.query, value).await {
                Ok(()) => true,
                Err(err) => {
                    debug!(query = %located.query, error = %err, "Typing failed");
                    false
                }
            },
            Ok(None) => false,
            Err(err) => {
                debug!(query = %candidate.query(), error = %err, "Locate failed");
                false
            }
        }
    }

    /// focus, click, select-all, backspace, per-character typing, Enter, Tab
    async fn type_into(
        &self,
        page: &dyn PageDriver,
        query: &ElementQuery,
        value: &str,
    ) -> Result<(), AdapterError> {
        page.focus(query).await?;
        page.click(query).await?;
        page.press_key(Key::SelectAll).await?;
        page.press_key(Key::Backspace).await?;
        let mut buf = [0u8; 4];
        for ch in value.chars() {
            page.insert_text(ch.encode_utf8(&mut buf)).await?;
            if !self.typing_delay.is_zero() {
                sleep(self.typing_delay).await;
            }
        }
        page.press_key(Key::Enter).await?;
        page.press_key(Key::Tab).await?;
        Ok(())
    }

    /// Returns how many elements (visible or hidden) received a value.
    async fn inject(
        &self,
        page: &dyn PageDriver,
        targets: &[(&LocatorChain, &str)],
        hidden_start: Option<&str>,
        hidden_end: Option<&str>,
    ) -> usize {
        let mut touched = 0;
        for (chain, value) in targets {
            for query in chain.queries() {
                match page.inject_value(query, value).await {
                    Ok(count) => touched += count,
                    Err(err) => debug!(%query, error = %err, "Injection failed"),
                }
            }
        }

        match page.sync_hidden_fields(hidden_start, hidden_end).await {
            Ok(count) => {
                debug!(count, "Hidden mirrors synced");
                touched += count;
            }
            Err(err) => debug!(error = %err, "Hidden mirror sync failed"),
        }

        match page.click_by_text(&self.apply_patterns).await {
            Ok(true) => debug!("Apply control clicked"),
            Ok(false) => {}
            Err(err) => debug!(error = %err, "Apply control click failed"),
        }

        touched
    }
}

/// Value of the first candidate that matches anything.
async fn read_back(page: &dyn PageDriver, candidates: &LocatorChain) -> Option<String> {
    for query in candidates.queries() {
        match page.read_value(query).await {
            Ok(Some(value)) => return Some(value),
            Ok(None) => {}
            Err(err) => debug!(%query, error = %err, "Read-back failed"),
        }
    }
    None
}

fn mismatches(checks: &[(DateField, &str, Option<String>)]) -> Vec<RunWarning> {
    checks
        .iter()
        .filter(|(_, expected, observed)| observed.as_deref().map(str::trim) != Some(*expected))
        .map(|(field, expected, observed)| RunWarning::DateMismatch {
            field: *field,
            expected: expected.to_string(),
            observed: observed.clone(),
        })
        .collect()
}

async fn warn_mismatches(warnings: &[RunWarning], progress: &Progress) {
    if warnings.is_empty() {
        return;
    }
    for warning in warnings {
        warn!(%warning, "Field did not read back as written");
    }
    progress
        .warn("On-screen dates do not match the target; continuing, the form may update them on submit.")
        .await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use cdp_adapter::fake::{FakeElement, FakePage};
    use fxportal_core_types::MemorySink;
    use std::sync::Arc;

    fn writer() -> FieldWriter {
        FieldWriter::new()
            .with_per_attempt(Duration::from_millis(20))
            .with_typing_delay(Duration::ZERO)
    }

    fn sink() -> (Progress, MemorySink) {
        let sink = MemorySink::new();
        (Progress::new(Arc::new(sink.clone())), sink)
    }

    fn chains() -> (LocatorChain, LocatorChain, ElementQuery, ElementQuery) {
        let start = ElementQuery::css("#edit-baslangic-tarihi");
        let end = ElementQuery::css("#edit-bitis-tarihi");
        let start_chain = LocatorChain::new("start")
            .css("#BaslangicTarihi")
            .query(start.clone());
        let end_chain = LocatorChain::new("end")
            .css("#BitisTarihi")
            .query(end.clone());
        (start_chain, end_chain, start, end)
    }

    #[tokio::test]
    async fn typing_wins_when_fields_are_editable() {
        let (start_chain, end_chain, start, end) = chains();
        let page = FakePage::new()
            .with_element(start.clone(), FakeElement::visible().with_value("01/01/2024"))
            .with_element(end.clone(), FakeElement::visible().with_value("01/01/2024"));
        let (progress, lines) = sink();

        let outcome = writer()
            .set_date_range(&page, &start_chain, &end_chain, "04/03/2025", "07/03/2025", &progress)
            .await;

        assert_eq!(outcome.strategy, WriteStrategy::Typed);
        assert!(outcome.is_verified());
        assert_eq!(page.value_of(&start).as_deref(), Some("04/03/2025"));
        assert_eq!(page.value_of(&end).as_deref(), Some("07/03/2025"));
        assert!(!page.calls().iter().any(|call| call.starts_with("inject")));
        assert!(lines.contains("Typed dates 04/03/2025 → 07/03/2025"));

        let calls = page.calls();
        let focused = calls
            .iter()
            .position(|call| *call == format!("focus {start}"))
            .expect("start field focused");
        assert_eq!(calls[focused + 1], format!("click {start}"));
    }

    #[tokio::test]
    async fn hidden_pickers_fall_back_to_injection() {
        let (start_chain, end_chain, start, end) = chains();
        let page = FakePage::new()
            .with_element(start.clone(), FakeElement::hidden())
            .with_element(end.clone(), FakeElement::hidden())
            .with_hidden("baslangic_tarihi", "")
            .with_hidden("bitis_tarihi", "")
            .with_apply_button("Uygula");
        let (progress, _) = sink();

        let outcome = writer()
            .set_date_range(&page, &start_chain, &end_chain, "04/03/2025", "07/03/2025", &progress)
            .await;

        assert_eq!(outcome.strategy, WriteStrategy::Injected);
        assert!(outcome.warnings.is_empty());
        assert_eq!(page.value_of(&start).as_deref(), Some("04/03/2025"));
        assert_eq!(page.hidden_value("baslangic_tarihi").as_deref(), Some("04/03/2025"));
        assert_eq!(page.hidden_value("bitis_tarihi").as_deref(), Some("07/03/2025"));
        assert!(page.calls().contains(&"click text=Uygula".to_string()));
    }

    #[tokio::test]
    async fn readonly_typing_is_caught_by_read_back() {
        let (start_chain, end_chain, start, end) = chains();
        let page = FakePage::new()
            .with_element(start.clone(), FakeElement::visible().readonly().with_value("01/01/2024"))
            .with_element(end.clone(), FakeElement::visible().with_value("01/01/2024"));
        let (progress, lines) = sink();

        let outcome = writer()
            .set_date_range(&page, &start_chain, &end_chain, "04/03/2025", "07/03/2025", &progress)
            .await;

        assert_eq!(outcome.strategy, WriteStrategy::Typed);
        assert_eq!(
            outcome.warnings,
            vec![RunWarning::DateMismatch {
                field: DateField::Start,
                expected: "04/03/2025".into(),
                observed: Some("01/01/2024".into()),
            }]
        );
        assert!(lines.lines().iter().any(|line| line.starts_with("⚠️")));
    }

    #[tokio::test]
    async fn frozen_field_never_silently_succeeds() {
        let start = ElementQuery::css("#d");
        let chain = LocatorChain::new("start").query(start.clone());
        let page = FakePage::new().with_element(start.clone(), FakeElement::hidden().frozen());
        let (progress, lines) = sink();

        let outcome = writer()
            .set_field_value(&page, &chain, "04/03/2025", DateField::Start, true, &progress)
            .await;

        assert_eq!(outcome.strategy, WriteStrategy::Injected);
        assert!(!outcome.is_verified());
        assert_eq!(outcome.warnings.len(), 1);
        assert!(lines.contains("On-screen dates do not match"));
    }

    #[tokio::test]
    async fn nothing_to_write_reports_unwritten_and_unreadable() {
        let chain = LocatorChain::new("end").css("#missing");
        let page = FakePage::new();
        let (progress, _) = sink();

        let outcome = writer()
            .set_field_value(&page, &chain, "07/03/2025", DateField::End, true, &progress)
            .await;

        assert_eq!(outcome.strategy, WriteStrategy::Unwritten);
        assert_eq!(
            outcome.warnings,
            vec![RunWarning::DateMismatch {
                field: DateField::End,
                expected: "07/03/2025".into(),
                observed: None,
            }]
        );
    }

    #[tokio::test]
    async fn single_field_injection_only_touches_its_own_mirror() {
        let end = ElementQuery::css("#end");
        let chain = LocatorChain::new("end").query(end.clone());
        let page = FakePage::new()
            .with_element(end.clone(), FakeElement::hidden())
            .with_hidden("baslangic_tarihi", "keep")
            .with_hidden("bitis_tarihi", "");
        let (progress, _) = sink();

        let outcome = writer()
            .set_field_value(&page, &chain, "07/03/2025", DateField::End, false, &progress)
            .await;

        assert!(outcome.wrote());
        assert!(outcome.warnings.is_empty());
        assert_eq!(page.hidden_value("baslangic_tarihi").as_deref(), Some("keep"));
        assert_eq!(page.hidden_value("bitis_tarihi").as_deref(), Some("07/03/2025"));
    }
}
