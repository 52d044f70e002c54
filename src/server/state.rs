use std::sync::Arc;
use tokio::sync::Semaphore;

use crate::runner::RunnerDeps;

/// Shared by every connection. Each run still launches its own browser;
/// `runs` only bounds how many do so at once.
#[derive(Clone)]
pub struct ServeState {
    pub(crate) deps: RunnerDeps,
    pub(crate) runs: Arc<Semaphore>,
}

impl ServeState {
    pub fn new(deps: RunnerDeps, max_concurrent_runs: usize) -> Self {
        Self {
            deps,
            runs: Arc::new(Semaphore::new(max_concurrent_runs.max(1))),
        }
    }

    pub fn available_runs(&self) -> usize {
        self.runs.available_permits()
    }
}
