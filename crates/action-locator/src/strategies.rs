//! Element location strategies
//!
//! A strategy answers one question: does my element become visible before
//! the deadline? "No" is `Ok(None)`; only driver failures are errors.

use crate::{errors::LocatorError, types::*};
use async_trait::async_trait;
use cdp_adapter::{ElementQuery, Key, PageDriver};
use std::time::Duration;
use tokio::time::{sleep, Instant};
use tracing::debug;

/// Default polling interval for visibility waits.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Strategy trait for element location
#[async_trait]
pub trait Strategy: Send + Sync {
    /// Wait up to `timeout` for the element to become visible
    async fn try_locate(
        &self,
        page: &dyn PageDriver,
        timeout: Duration,
    ) -> Result<Option<Located>, LocatorError>;

    /// Perform `action` on a located element
    async fn act(
        &self,
        page: &dyn PageDriver,
        located: &Located,
        action: &Action,
    ) -> Result<Option<String>, LocatorError> {
        perform(page, &located.query, action).await
    }

    /// The predicate this strategy evaluates
    fn query(&self) -> &ElementQuery;

    /// Get strategy type
    fn strategy_type(&self) -> LocatorStrategy {
        LocatorStrategy::of(self.query())
    }

    /// Get strategy name
    fn name(&self) -> &'static str {
        self.strategy_type().name()
    }
}

/// Polls a single [`ElementQuery`] until it is visible.
#[derive(Debug, Clone)]
pub struct QueryStrategy {
    query: ElementQuery,
}

impl QueryStrategy {
    pub fn new(query: ElementQuery) -> Self {
        Self { query }
    }
}

#[async_trait]
impl Strategy for QueryStrategy {
    async fn try_locate(
        &self,
        page: &dyn PageDriver,
        timeout: Duration,
    ) -> Result<Option<Located>, LocatorError> {
        let started = Instant::now();
        let deadline = started + timeout;
        loop {
            if page.is_visible(&self.query).await? {
                return Ok(Some(Located {
                    query: self.query.clone(),
                    strategy: self.strategy_type(),
                    waited: started.elapsed(),
                }));
            }
            let now = Instant::now();
            if now >= deadline {
                debug!(query = %self.query, "not visible before deadline");
                return Ok(None);
            }
            sleep(DEFAULT_POLL_INTERVAL.min(deadline - now)).await;
        }
    }

    fn query(&self) -> &ElementQuery {
        &self.query
    }
}

/// Executes an action against an element already known to be visible.
pub async fn perform(
    page: &dyn PageDriver,
    query: &ElementQuery,
    action: &Action,
) -> Result<Option<String>, LocatorError> {
    match action {
        Action::Click => {
            page.click(query).await?;
            Ok(None)
        }
        Action::Fill(value) => {
            page.click(query).await?;
            page.press_key(Key::SelectAll).await?;
            page.press_key(Key::Backspace).await?;
            page.insert_text(value).await?;
            Ok(None)
        }
        Action::ReadValue => Ok(page.read_value(query).await?),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cdp_adapter::fake::{FakeElement, FakePage};

    #[tokio::test]
    async fn missing_element_is_none_not_error() {
        let page = FakePage::new();
        let strategy = QueryStrategy::new(ElementQuery::css("#nope"));
        let located = strategy
            .try_locate(&page, Duration::from_millis(30))
            .await
            .unwrap();
        assert!(located.is_none());
    }

    #[tokio::test]
    async fn visible_element_is_found_immediately() {
        let query = ElementQuery::text("Kabul Et");
        let page = FakePage::new().with_element(query.clone(), FakeElement::visible());
        let located = QueryStrategy::new(query.clone())
            .try_locate(&page, Duration::from_secs(5))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(located.query, query);
        assert_eq!(located.strategy, LocatorStrategy::Text);
        assert!(located.waited < Duration::from_secs(1));
    }

    #[tokio::test]
    async fn fill_replaces_existing_value() {
        let query = ElementQuery::css("#d");
        let page = FakePage::new().with_element(query.clone(), FakeElement::visible().with_value("x"));
        perform(&page, &query, &Action::Fill("02/01/2025".into()))
            .await
            .unwrap();
        assert_eq!(page.value_of(&query).as_deref(), Some("02/01/2025"));
    }
}
