//! Error types for action primitives

use cdp_adapter::{AdapterError, AdapterErrorKind};
use thiserror::Error;

/// Errors raised by the primitives that can end a run
#[derive(Debug, Error, Clone)]
pub enum ActionError {
    /// Navigation timed out waiting for page load
    #[error("Navigation timeout: {0}")]
    NavTimeout(String),

    /// No candidate of a control chain could be located and clicked
    #[error("Control not found: {0}")]
    ControlNotFound(String),

    /// Dropdown option was not found
    #[error("Option not found in dropdown: {0}")]
    OptionNotFound(String),

    /// A download was expected but never completed
    #[error("Download timeout: {0}")]
    DownloadTimeout(String),

    /// CDP communication or protocol error
    #[error("CDP I/O error: {0}")]
    CdpIo(String),

    /// Persisting an artifact failed
    #[error("Filesystem error: {0}")]
    Io(String),

    /// Internal error (should not happen in normal operation)
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ActionError {
    /// Whether the remaining workflow is meaningless after this error
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            ActionError::NavTimeout(_)
                | ActionError::ControlNotFound(_)
                | ActionError::DownloadTimeout(_)
                | ActionError::Io(_)
                | ActionError::Internal(_)
        )
    }
}

impl From<AdapterError> for ActionError {
    fn from(err: AdapterError) -> Self {
        let message = err.to_string();
        let detail = err.hint.clone().unwrap_or_else(|| message.clone());
        match err.kind {
            AdapterErrorKind::NavTimeout => ActionError::NavTimeout(detail),
            AdapterErrorKind::TargetNotFound => ActionError::ControlNotFound(detail),
            AdapterErrorKind::OptionNotFound => ActionError::OptionNotFound(detail),
            AdapterErrorKind::DownloadTimeout => ActionError::DownloadTimeout(detail),
            AdapterErrorKind::CdpIo => ActionError::CdpIo(message),
            AdapterErrorKind::Internal => ActionError::Internal(message),
        }
    }
}

/// Failure of the external option-matching service
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MatcherError {
    /// Service could not be reached or refused the request
    #[error("Matcher unavailable: {0}")]
    Unavailable(String),

    /// Service answered with nothing usable
    #[error("Matcher returned an empty reply")]
    EmptyReply,
}

impl From<std::io::Error> for ActionError {
    fn from(err: std::io::Error) -> Self {
        ActionError::Io(err.to_string())
    }
}
