//! Shared primitives for the fxportal export engine.
//!
//! Everything that more than one layer needs to agree on lives here: the
//! structured query intent, the progress sink capability and the two terminal
//! shapes a run can produce.

pub mod intent;
pub mod report;
pub mod sink;

pub use intent::*;
pub use report::*;
pub use sink::*;

use uuid::Uuid;

/// Correlation id attached to one extraction run.
#[derive(Clone, Debug, Eq, PartialEq, Hash, serde::Serialize, serde::Deserialize)]
pub struct RunId(pub String);

impl RunId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RunId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}
