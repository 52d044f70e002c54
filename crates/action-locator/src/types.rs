//! Core types for locator chains

use cdp_adapter::ElementQuery;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Which kind of predicate a strategy evaluates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LocatorStrategy {
    /// CSS selector strategy
    Css,

    /// n-th CSS match strategy
    Nth,

    /// Text content strategy
    Text,

    /// aria-label fragment strategy
    AriaLabel,

    /// Input `value` strategy
    InputValue,
}

impl LocatorStrategy {
    /// Get strategy name as string
    pub fn name(&self) -> &'static str {
        match self {
            LocatorStrategy::Css => "css",
            LocatorStrategy::Nth => "nth",
            LocatorStrategy::Text => "text",
            LocatorStrategy::AriaLabel => "aria-label",
            LocatorStrategy::InputValue => "input-value",
        }
    }

    pub fn of(query: &ElementQuery) -> Self {
        match query {
            ElementQuery::Css { .. } => LocatorStrategy::Css,
            ElementQuery::Nth { .. } => LocatorStrategy::Nth,
            ElementQuery::Text { .. } => LocatorStrategy::Text,
            ElementQuery::AriaLabel { .. } => LocatorStrategy::AriaLabel,
            ElementQuery::InputValue { .. } => LocatorStrategy::InputValue,
        }
    }
}

/// A visible element found by one strategy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Located {
    pub query: ElementQuery,
    pub strategy: LocatorStrategy,
    /// How long the strategy waited before the element showed up.
    pub waited: Duration,
}

/// What to do with the first located element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    Click,
    /// Select-all, clear and type `value`.
    Fill(String),
    ReadValue,
}

impl Action {
    pub fn name(&self) -> &'static str {
        match self {
            Action::Click => "click",
            Action::Fill(_) => "fill",
            Action::ReadValue => "read",
        }
    }
}

/// Result of a chain run that acted on some element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainHit {
    pub located: Located,
    /// Index of the winning strategy in the chain.
    pub position: usize,
    /// Value read by [`Action::ReadValue`].
    pub value: Option<String>,
}
