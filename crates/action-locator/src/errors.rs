//! Error types for locator chains

use cdp_adapter::AdapterError;
use thiserror::Error;

/// Locator error enumeration
#[derive(Debug, Error, Clone)]
pub enum LocatorError {
    /// No strategy matched
    #[error("Element not found: {0}")]
    ElementNotFound(String),

    /// Action on a located element failed
    #[error("Strategy '{strategy}' failed: {reason}")]
    StrategyFailed { strategy: String, reason: String },

    /// CDP communication error
    #[error("CDP error: {0}")]
    CdpError(String),

    /// Timeout during resolution
    #[error("Resolution timeout: {0}")]
    Timeout(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<AdapterError> for LocatorError {
    fn from(err: AdapterError) -> Self {
        if err.is_not_found() {
            LocatorError::ElementNotFound(err.to_string())
        } else {
            LocatorError::CdpError(err.to_string())
        }
    }
}
