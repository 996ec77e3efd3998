mod commands;
mod config;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use crate::config::Cli;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with_writer(std::io::stderr)
        .init();
    tracing::debug!("intentbox v{}", env!("CARGO_PKG_VERSION"));

    let cli = Cli::parse();
    commands::run(cli).await
}
