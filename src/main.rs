use anyhow::Result;
use ctxchat::cli;

#[tokio::main]
async fn main() -> Result<()> {
    cli::run().await
}
