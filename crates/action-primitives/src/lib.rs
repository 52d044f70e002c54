//! L3 Action Primitives - resilient form operations on a single page
//!
//! This crate provides the building blocks the export workflow composes:
//! - A field writer that falls back from real typing to DOM injection
//! - An option disambiguator backed by an external matching service
//! - Download capture with deterministic file naming
//!
//! Every primitive takes the page explicitly and reports user-facing
//! progress through [`fxportal_core_types::Progress`].

pub mod errors;
mod primitives;
pub mod types;

pub use errors::*;
pub use primitives::*;
pub use types::*;
