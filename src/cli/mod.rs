pub mod app;
pub mod commands;
pub mod context;
pub mod dispatch;
pub mod env;
pub mod inspect;
pub mod run;
pub mod runtime;
pub mod serve;

pub use inspect::cmd_inspect;
pub use run::{cmd_intent, cmd_run, IntentArgs, RunArgs};
pub use serve::{cmd_serve, ServeArgs};
