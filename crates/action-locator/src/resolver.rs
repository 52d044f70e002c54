//! Locator chain with first-match fallback

use crate::{errors::LocatorError, strategies::*, types::*};
use cdp_adapter::{ElementQuery, PageDriver};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Ordered alternative ways to find one logical element.
///
/// Order encodes priority only; there is no scoring.
#[derive(Clone)]
pub struct LocatorChain {
    name: String,
    strategies: Vec<Arc<dyn Strategy>>,
}

impl LocatorChain {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            strategies: Vec::new(),
        }
    }

    pub fn from_queries(name: impl Into<String>, queries: impl IntoIterator<Item = ElementQuery>) -> Self {
        queries
            .into_iter()
            .fold(Self::new(name), |chain, query| chain.query(query))
    }

    pub fn push(mut self, strategy: Arc<dyn Strategy>) -> Self {
        self.strategies.push(strategy);
        self
    }

    pub fn query(self, query: ElementQuery) -> Self {
        self.push(Arc::new(QueryStrategy::new(query)))
    }

    pub fn css(self, selector: impl Into<String>) -> Self {
        self.query(ElementQuery::css(selector))
    }

    pub fn nth(self, selector: impl Into<String>, index: usize) -> Self {
        self.query(ElementQuery::nth(selector, index))
    }

    pub fn text(self, content: impl Into<String>) -> Self {
        self.query(ElementQuery::text(content))
    }

    pub fn text_in(self, tags: &[&str], content: impl Into<String>) -> Self {
        self.query(ElementQuery::text_in(tags, content))
    }

    pub fn aria_label(self, contains: impl Into<String>, ignore_case: bool) -> Self {
        self.query(ElementQuery::aria_label(contains, ignore_case))
    }

    pub fn input_value(self, selector: impl Into<String>, value: impl Into<String>) -> Self {
        self.query(ElementQuery::input_value(selector, value))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn len(&self) -> usize {
        self.strategies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.strategies.is_empty()
    }

    pub fn strategies(&self) -> &[Arc<dyn Strategy>] {
        &self.strategies
    }

    pub fn queries(&self) -> impl Iterator<Item = &ElementQuery> {
        self.strategies.iter().map(|strategy| strategy.query())
    }

    /// Acts on the first candidate that becomes visible. Returns whether any
    /// candidate both appeared and accepted the action.
    pub async fn locate_and_act(
        &self,
        page: &dyn PageDriver,
        action: Action,
        per_attempt_timeout: Duration,
    ) -> bool {
        self.run(page, &action, per_attempt_timeout).await.is_some()
    }

    /// [`Action::ReadValue`] through the chain.
    pub async fn locate_and_read(
        &self,
        page: &dyn PageDriver,
        per_attempt_timeout: Duration,
    ) -> Option<String> {
        self.run(page, &Action::ReadValue, per_attempt_timeout)
            .await
            .and_then(|hit| hit.value)
    }

    /// Best-effort pass where finding nothing is the normal outcome.
    pub async fn sweep(
        &self,
        page: &dyn PageDriver,
        action: Action,
        per_attempt_timeout: Duration,
    ) -> bool {
        match self.run(page, &action, per_attempt_timeout).await {
            Some(hit) => {
                debug!(chain = %self.name, query = %hit.located.query, "sweep hit");
                true
            }
            None => {
                debug!(chain = %self.name, "sweep found nothing");
                false
            }
        }
    }

    /// First candidate that becomes visible, without acting on it.
    pub async fn wait_visible(
        &self,
        page: &dyn PageDriver,
        per_attempt_timeout: Duration,
    ) -> Option<Located> {
        for strategy in &self.strategies {
            match strategy.try_locate(page, per_attempt_timeout).await {
                Ok(Some(located)) => {
                    debug!(chain = %self.name, query = %located.query, "candidate visible");
                    return Some(located);
                }
                Ok(None) => {}
                Err(err) => {
                    warn!(chain = %self.name, query = %strategy.query(), error = %err, "candidate failed");
                }
            }
        }
        None
    }

    /// Full chain run returning which candidate won.
    pub async fn run(
        &self,
        page: &dyn PageDriver,
        action: &Action,
        per_attempt_timeout: Duration,
    ) -> Option<ChainHit> {
        for (position, strategy) in self.strategies.iter().enumerate() {
            debug!(chain = %self.name, strategy = strategy.name(), query = %strategy.query(), "trying candidate");
            match self
                .attempt(page, strategy.as_ref(), action, per_attempt_timeout)
                .await
            {
                Ok(Some((located, value))) => {
                    info!(
                        chain = %self.name,
                        query = %located.query,
                        action = action.name(),
                        position,
                        "candidate succeeded"
                    );
                    return Some(ChainHit {
                        located,
                        position,
                        value,
                    });
                }
                Ok(None) => {
                    debug!(chain = %self.name, query = %strategy.query(), "candidate not visible");
                }
                Err(err) => {
                    warn!(chain = %self.name, query = %strategy.query(), error = %err, "candidate failed");
                }
            }
        }
        debug!(chain = %self.name, "all candidates exhausted");
        None
    }

    async fn attempt(
        &self,
        page: &dyn PageDriver,
        strategy: &dyn Strategy,
        action: &Action,
        timeout: Duration,
    ) -> Result<Option<(Located, Option<String>)>, LocatorError> {
        let Some(located) = strategy.try_locate(page, timeout).await? else {
            return Ok(None);
        };
        let value = strategy
            .act(page, &located, action)
            .await
            .map_err(|err| LocatorError::StrategyFailed {
                strategy: strategy.name().to_string(),
                reason: err.to_string(),
            })?;
        Ok(Some((located, value)))
    }
}

impl fmt::Debug for LocatorChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LocatorChain")
            .field("name", &self.name)
            .field(
                "queries",
                &self.queries().map(ToString::to_string).collect::<Vec<_>>(),
            )
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cdp_adapter::fake::{ClickEffect, FakeElement, FakePage};

    fn short() -> Duration {
        Duration::from_millis(30)
    }

    #[tokio::test]
    async fn first_visible_candidate_short_circuits() {
        let a = ElementQuery::text("Kabul Et");
        let b = ElementQuery::text("Kabul");
        let c = ElementQuery::text("Tamam");
        let page = FakePage::new()
            .with_element(a.clone(), FakeElement::visible())
            .with_element(b.clone(), FakeElement::visible())
            .with_element(c.clone(), FakeElement::visible());
        let chain = LocatorChain::from_queries("overlay", [a.clone(), b.clone(), c.clone()]);

        assert!(chain.locate_and_act(&page, Action::Click, short()).await);

        let calls = page.calls();
        assert_eq!(calls, vec![format!("probe {a}"), format!("click {a}")]);
        assert_eq!(page.clicks_on(&b), 0);
        assert_eq!(page.clicks_on(&c), 0);
    }

    #[tokio::test]
    async fn falls_through_to_later_candidate() {
        let missing = ElementQuery::css("#BaslangicTarihi");
        let present = ElementQuery::css("#edit-baslangic-tarihi");
        let page = FakePage::new().with_element(present.clone(), FakeElement::visible());
        let chain = LocatorChain::new("start")
            .query(missing)
            .query(present.clone());

        let hit = chain.run(&page, &Action::Click, short()).await.unwrap();
        assert_eq!(hit.position, 1);
        assert_eq!(hit.located.query, present);
    }

    #[tokio::test]
    async fn failing_action_moves_to_next_candidate() {
        // Selects report visible but cannot be clicked by the fake.
        let select_only = ElementQuery::css("select#edit-kur-kod");
        let button = ElementQuery::text_in(&["button"], "Listele");
        let page = FakePage::new()
            .with_select(select_only.clone(), &[("A", "a")], None)
            .with_element(button.clone(), FakeElement::visible());
        let chain = LocatorChain::new("list")
            .query(select_only)
            .query(button.clone());

        assert!(chain.locate_and_act(&page, Action::Click, short()).await);
        assert_eq!(page.clicks_on(&button), 1);
    }

    #[tokio::test]
    async fn empty_or_exhausted_chain_fails() {
        let page = FakePage::new();
        assert!(!LocatorChain::new("none").locate_and_act(&page, Action::Click, short()).await);
        let chain = LocatorChain::new("gone").css("#a").css("#b");
        assert!(!chain.locate_and_act(&page, Action::Click, short()).await);
    }

    #[tokio::test]
    async fn sweep_twice_is_a_no_op_the_second_time() {
        let banner = ElementQuery::text("Kabul Et");
        let page = FakePage::new()
            .with_element(banner.clone(), FakeElement::visible())
            .on_click(banner.clone(), ClickEffect::Hide(banner.clone()));
        let chain = LocatorChain::new("overlay").query(banner.clone()).text("Tamam");

        assert!(chain.sweep(&page, Action::Click, short()).await);
        assert!(!chain.sweep(&page, Action::Click, short()).await);
        assert_eq!(page.clicks_on(&banner), 1);
    }

    #[tokio::test]
    async fn wait_visible_does_not_act() {
        let row = ElementQuery::css("table tbody tr");
        let page = FakePage::new().with_element(row.clone(), FakeElement::visible());
        let chain = LocatorChain::new("results").css("table").query(row.clone());

        let located = chain.wait_visible(&page, short()).await.unwrap();
        assert_eq!(located.query, row);
        assert_eq!(page.clicks_on(&row), 0);
    }

    #[tokio::test]
    async fn read_returns_first_visible_value() {
        let field = ElementQuery::nth("input[type='text']", 0);
        let page = FakePage::new().with_element(field.clone(), FakeElement::visible().with_value("07/03/2025"));
        let chain = LocatorChain::new("start").css("#missing").query(field);
        assert_eq!(
            chain.locate_and_read(&page, short()).await.as_deref(),
            Some("07/03/2025")
        );
    }
}
