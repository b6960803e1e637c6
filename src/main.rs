//! repoctx CLI entry point

use clap::Parser;
use repoctx::cli::{Cli, Commands};
use repoctx::core::error::Result;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_env("REPOCTX_LOG"))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Index(args) => repoctx::cli::index::run(args),
        Commands::Context(args) => repoctx::cli::context::run(args),
        Commands::Status(args) => repoctx::cli::status::run(args),
    }
}
