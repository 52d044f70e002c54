//! Action primitives implementation
//!
//! Three primitives the export flow is built from:
//! 1. fill - write a value into a form field and verify it
//! 2. select - resolve a free-text hint to one dropdown option
//! 3. download - trigger an export and persist the file

mod download;
mod fill;
mod select;

pub use download::*;
pub use fill::*;
pub use select::*;
