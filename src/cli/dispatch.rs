use super::env::CliArgs;
use super::inspect::cmd_inspect;
use super::run::{cmd_intent, cmd_run};
use super::serve::cmd_serve;
use crate::cli::commands::Commands;
use crate::cli::context::CliContext;
use anyhow::Result;

pub async fn dispatch(cli: &CliArgs, ctx: &CliContext) -> Result<()> {
    match cli.command.clone() {
        Commands::Run(args) => cmd_run(args, ctx.config()).await,
        Commands::Intent(args) => cmd_intent(args, ctx.config()).await,
        Commands::Inspect => cmd_inspect(ctx.config()).await,
        Commands::Serve(args) => cmd_serve(args, ctx).await,
    }
}
