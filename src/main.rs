use anyhow::Result;

#[tokio::main]
async fn main() -> Result<()> {
    fxportal_cli::cli::app::run().await
}
