//! Turnstile CLI - run publish admission checks from the command line.

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;

use commands::{Cli, Commands};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "turnstile=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Admit(args) => commands::admit::run(&args).await,
        Commands::ParseRef(args) => commands::parse_ref::run(&args),
        Commands::CheckPackage(args) => commands::check_package::run(&args).await,
        Commands::Version => {
            println!("turnstile {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}
