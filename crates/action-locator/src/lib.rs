//! L1 Locator chains
//!
//! One logical UI element usually has several spellings on the page. A
//! [`LocatorChain`] holds them in priority order and acts on the first one that
//! becomes visible within a bounded wait:
//! - every strategy gets its own per-attempt timeout
//! - the first successful action short-circuits the chain
//! - a strategy whose action fails counts as a miss, never as an error

pub mod errors;
pub mod resolver;
pub mod strategies;
pub mod types;

pub use errors::*;
pub use resolver::*;
pub use strategies::*;
pub use types::*;
