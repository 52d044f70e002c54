use clap::Subcommand;

use super::run::{IntentArgs, RunArgs};
use super::serve::ServeArgs;

#[derive(Subcommand, Clone)]
pub enum Commands {
    /// Extract the query from a prompt and download the matching exports
    Run(RunArgs),

    /// Print the query a prompt resolves to, without opening a browser
    Intent(IntentArgs),

    /// Print the portal's current currency list
    Inspect,

    /// Serve the websocket console
    Serve(ServeArgs),
}
