use std::net::SocketAddr;

use anyhow::{Context, Result};
use clap::Args;
use tokio::net::TcpListener;
use tracing::info;

use super::context::CliContext;
use crate::runner::RunnerDeps;
use crate::server::{build_console_router, ServeState};

#[derive(Args, Clone, Debug)]
pub struct ServeArgs {
    /// Bind address (defaults to serve.addr from the config)
    #[arg(long)]
    pub addr: Option<SocketAddr>,
}

pub async fn cmd_serve(args: ServeArgs, ctx: &CliContext) -> Result<()> {
    let config = ctx.config();
    let deps = RunnerDeps::from_config(config).context("Failed to prepare the text model")?;
    let state = ServeState::new(deps, config.serve.max_concurrent_runs);
    let router = build_console_router(state);

    let addr = args.addr.unwrap_or(config.serve.addr);
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind console server on {}", addr))?;
    info!(
        config = %ctx.config_path().display(),
        max_concurrent_runs = config.serve.max_concurrent_runs,
        "Console available at http://{}",
        addr
    );

    axum::serve(listener, router)
        .await
        .context("console server exited unexpectedly")?;
    Ok(())
}
