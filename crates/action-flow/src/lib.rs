//! Flow Orchestration Layer
//!
//! Sequences one export run against the rate query portal: navigation,
//! overlay dismissal, the by-date and by-currency branches, and download
//! capture. Every run gets its own browser session and ends in exactly one
//! [`Terminal`].

pub mod config;
pub mod errors;
pub mod executor;
pub mod selectors;
pub mod types;

pub use config::{default_output_dir, FlowConfig, FlowTimeouts, DEFAULT_PORTAL_URL};
pub use errors::FlowError;
pub use executor::{FlowExecutor, Orchestrator};
pub use selectors::PortalSelectors;
pub use types::{FlowRun, FlowState, Terminal};
