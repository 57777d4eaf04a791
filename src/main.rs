#![recursion_limit = "256"]

mod application;
mod cli;
mod data;
mod domain;
mod infra;
mod ml;

use anyhow::Result;
use clap::Parser;
use cli::Cli;

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("log_outlier=info")),
        )
        .init();

    let cli = Cli::parse();
    cli.run()
}
