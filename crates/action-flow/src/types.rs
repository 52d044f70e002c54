//! Core types for the export workflow

use action_primitives::DownloadArtifact;
use fxportal_core_types::{RunFailure, RunReport};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Workflow states. `Error` is absorbing and reachable from any state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlowState {
    Start,
    Navigated,
    OverlaysCleared,
    AllBranch,
    SingleBranch,
    Done,
    Error,
}

impl FlowState {
    pub fn as_str(&self) -> &'static str {
        match self {
            FlowState::Start => "start",
            FlowState::Navigated => "navigated",
            FlowState::OverlaysCleared => "overlays_cleared",
            FlowState::AllBranch => "all_branch",
            FlowState::SingleBranch => "single_branch",
            FlowState::Done => "done",
            FlowState::Error => "error",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, FlowState::Done | FlowState::Error)
    }
}

impl fmt::Display for FlowState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Exactly one of the two caller-facing shapes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum Terminal {
    Report(RunReport),
    Failed(RunFailure),
}

impl Terminal {
    pub fn is_report(&self) -> bool {
        matches!(self, Terminal::Report(_))
    }

    pub fn report(&self) -> Option<&RunReport> {
        match self {
            Terminal::Report(report) => Some(report),
            Terminal::Failed(_) => None,
        }
    }

    pub fn failure(&self) -> Option<&RunFailure> {
        match self {
            Terminal::Report(_) => None,
            Terminal::Failed(failure) => Some(failure),
        }
    }
}

/// Outcome of one orchestrated run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlowRun {
    pub terminal: Terminal,
    /// States in the order they were entered, ending in `Done` or `Error`
    pub states: Vec<FlowState>,
    /// Files saved before the run ended, in capture order
    pub artifacts: Vec<DownloadArtifact>,
}

impl FlowRun {
    pub fn visited(&self, state: FlowState) -> bool {
        self.states.contains(&state)
    }

    pub fn final_state(&self) -> Option<FlowState> {
        self.states.last().copied()
    }
}

/// Mutable record a run accumulates before its terminal is known.
#[derive(Debug, Default)]
pub(crate) struct FlowTrace {
    pub states: Vec<FlowState>,
    pub artifacts: Vec<DownloadArtifact>,
}

impl FlowTrace {
    pub fn new() -> Self {
        Self {
            states: vec![FlowState::Start],
            artifacts: Vec::new(),
        }
    }

    pub fn enter(&mut self, state: FlowState) {
        tracing::debug!(%state, "flow state");
        self.states.push(state);
    }

    pub fn current(&self) -> FlowState {
        self.states.last().copied().unwrap_or(FlowState::Start)
    }

    pub fn finish(mut self, terminal: Terminal) -> FlowRun {
        let last = match terminal {
            Terminal::Report(_) => FlowState::Done,
            Terminal::Failed(_) => FlowState::Error,
        };
        self.enter(last);
        FlowRun {
            terminal,
            states: self.states,
            artifacts: self.artifacts,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failed_trace_ends_in_error() {
        let mut trace = FlowTrace::new();
        trace.enter(FlowState::Navigated);
        let run = trace.finish(Terminal::Failed(RunFailure::new("boom")));
        assert_eq!(
            run.states,
            vec![FlowState::Start, FlowState::Navigated, FlowState::Error]
        );
        assert!(run.final_state().is_some_and(|state| state.is_terminal()));
        assert_eq!(run.terminal.failure().map(|f| f.message.as_str()), Some("boom"));
    }
}
