//! Flow execution error types

use action_primitives::ActionError;
use thiserror::Error;

use crate::types::FlowState;

/// Conditions that end a run with the error terminal
#[derive(Debug, Error, Clone)]
pub enum FlowError {
    /// No browser session could be provisioned
    #[error("Browser launch failed: {0}")]
    Launch(String),

    /// The portal never reached a usable load state
    #[error("Portal did not load: {0}")]
    Navigation(String),

    /// A primitive failed in a way that makes the rest of the run meaningless
    #[error("{state} failed: {source}")]
    Step {
        state: FlowState,
        #[source]
        source: ActionError,
    },

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl FlowError {
    pub fn step(state: FlowState, source: ActionError) -> Self {
        FlowError::Step { state, source }
    }
}
