mod router;
mod state;
mod ws;

pub use router::build_console_router;
pub use state::ServeState;
pub use ws::{log_message, terminal_message};
