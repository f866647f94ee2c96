use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

pub mod chat;

use crate::core::AppConfig;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// File holding the Anthropic API key
    #[arg(long)]
    api_key_file: Option<PathBuf>,

    /// Open a saved conversation on start
    #[arg(long)]
    load: Option<PathBuf>,
}

pub async fn run() -> Result<()> {
    let args = Cli::parse();

    // Logs go to stderr so they don't interleave with the transcript
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("{}=warn", env!("CARGO_CRATE_NAME")).into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let mut config = AppConfig::default();
    if let Some(path) = args.api_key_file {
        config.api_key_path = path;
    }

    chat::run(config, args.load).await
}
