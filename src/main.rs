//! Playlist Engine - command-line front end.
//!
//! Plays playlist files against the simulated streaming engine and manages
//! the configuration file.

use clap::{CommandFactory, Parser};
use playlist_engine::cli;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

fn main() -> anyhow::Result<()> {
    let args = cli::Cli::parse();

    // Initialize logging
    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true).with_writer(std::io::stderr))
        .with(EnvFilter::from_default_env().add_directive("playlist_engine=info".parse()?))
        .init();

    // Try to run a CLI command
    if cli::run_command(&args)? {
        return Ok(());
    }

    // No command specified
    cli::Cli::command().print_help()?;
    println!();
    Ok(())
}
