//! Select primitive - narrow a dropdown to the option a free-text hint means
//!
//! The option list is read live on every call, handed to an external
//! [`OptionMatcher`], and the reply is applied by exact label or, failing
//! that, by the bracketed code it carries. A label outside the catalog is
//! never selected.

use action_locator::LocatorChain;
use async_trait::async_trait;
use cdp_adapter::{ElementQuery, OptionPick, PageDriver};
use fxportal_core_types::Progress;
use regex::Regex;
use std::sync::{Arc, OnceLock};
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::errors::{ActionError, MatcherError};
use crate::types::{MatchResult, OptionCatalog};

/// Default visibility wait for the selection control.
pub const DEFAULT_CONTROL_TIMEOUT: Duration = Duration::from_millis(5000);

/// Picks one label from a list given a user hint.
#[async_trait]
pub trait OptionMatcher: Send + Sync {
    /// Returns the raw reply; only an exact list member is trusted.
    async fn choose(&self, hint: &str, labels: &[String]) -> Result<String, MatcherError>;
}

/// Resolves a hint against a live selection control.
#[derive(Clone)]
pub struct Disambiguator {
    matcher: Arc<dyn OptionMatcher>,
    control_timeout: Duration,
}

impl Disambiguator {
    pub fn new(matcher: Arc<dyn OptionMatcher>) -> Self {
        Self {
            matcher,
            control_timeout: DEFAULT_CONTROL_TIMEOUT,
        }
    }

    pub fn with_control_timeout(mut self, timeout: Duration) -> Self {
        self.control_timeout = timeout;
        self
    }

    /// Selects the option `hint` refers to. `None` leaves the control as it was.
    pub async fn resolve_option(
        &self,
        page: &dyn PageDriver,
        control: &LocatorChain,
        hint: &str,
        progress: &Progress,
    ) -> Option<MatchResult> {
        let (query, catalog) = match read_catalog(page, control, self.control_timeout).await {
            Ok(found) => found,
            Err(err) => {
                progress
                    .warn(format!("Currency list unavailable: {err}"))
                    .await;
                return None;
            }
        };
        progress
            .log(format!("📋 Currency options ({}): {catalog}", catalog.len()))
            .await;
        if catalog.is_empty() {
            return None;
        }

        let reply = match self.matcher.choose(hint, &catalog.labels()).await {
            Ok(reply) => clean_reply(&reply),
            Err(err) => {
                warn!(hint, error = %err, "Option matcher failed");
                progress
                    .warn(format!("Currency matching failed ({err}); keeping the current selection"))
                    .await;
                return None;
            }
        };
        info!(hint, reply = %reply, "Option matcher replied");
        progress.log(format!("🤖 Model choice: {reply}")).await;

        if let Some(result) = self.select_by_label(page, &query, &catalog, &reply).await {
            progress
                .log(format!("✅ Currency selected: {}", result.label))
                .await;
            return Some(result);
        }

        if let Some(result) = self.select_by_code(page, &query, &catalog, &reply).await {
            progress
                .log(format!(
                    "✅ Currency selected by code {}: {}",
                    result.code.as_deref().unwrap_or_default(),
                    result.label
                ))
                .await;
            return Some(result);
        }

        progress
            .warn(format!("No currency option matches '{reply}'; keeping the current selection"))
            .await;
        None
    }

    async fn select_by_label(
        &self,
        page: &dyn PageDriver,
        query: &ElementQuery,
        catalog: &OptionCatalog,
        reply: &str,
    ) -> Option<MatchResult> {
        let entry = catalog.by_label(reply)?;
        let label = entry.label.trim().to_string();
        match page
            .select_option(query, &OptionPick::Label(label.clone()))
            .await
        {
            Ok(_) => Some(MatchResult {
                code: extract_code(&label),
                label,
            }),
            Err(err) => {
                debug!(%query, %label, error = %err, "Selection by label failed");
                None
            }
        }
    }

    async fn select_by_code(
        &self,
        page: &dyn PageDriver,
        query: &ElementQuery,
        catalog: &OptionCatalog,
        reply: &str,
    ) -> Option<MatchResult> {
        let code = extract_code(reply)?;
        let entry = catalog.by_code(&code)?;
        match page
            .select_option(query, &OptionPick::Value(entry.value.clone()))
            .await
        {
            Ok(_) => Some(MatchResult {
                label: entry.label.trim().to_string(),
                code: Some(code),
            }),
            Err(err) => {
                debug!(%query, %code, error = %err, "Selection by value failed");
                None
            }
        }
    }
}

impl std::fmt::Debug for Disambiguator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Disambiguator")
            .field("control_timeout", &self.control_timeout)
            .finish_non_exhaustive()
    }
}

/// Waits for the first visible control candidate and reads its options.
pub async fn read_catalog(
    page: &dyn PageDriver,
    control: &LocatorChain,
    timeout: Duration,
) -> Result<(ElementQuery, OptionCatalog), ActionError> {
    if let Some(located) = control.wait_visible(page, timeout).await {
        let entries = page.option_entries(&located.query).await?;
        debug!(query = %located.query, count = entries.len(), "Catalog read");
        return Ok((located.query, OptionCatalog::new(entries)));
    }
    Err(ActionError::ControlNotFound(format!(
        "no candidate of '{}' became visible",
        control.name()
    )))
}

fn clean_reply(reply: &str) -> String {
    reply
        .trim()
        .trim_matches(|c: char| c == '"' || c == '\'' || c == '`')
        .trim()
        .to_string()
}

fn code_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r"\(([A-Z]{3})\)").ok())
        .as_ref()
}

/// `(SEK)` anywhere in the text, or a bare three-letter reply.
pub fn extract_code(text: &str) -> Option<String> {
    if let Some(caps) = code_pattern().and_then(|pattern| pattern.captures(text)) {
        return caps.get(1).map(|m| m.as_str().to_string());
    }
    let bare = text.trim();
    (bare.len() == 3 && bare.chars().all(|c| c.is_ascii_alphabetic()))
        .then(|| bare.to_ascii_uppercase())
}
