//! CLI command definitions and dispatch.
//!
//! Each subcommand is implemented in its own submodule:
//! - `simulate`: play a playlist file against the simulated engine
//! - `config`: show or initialise the configuration file

mod config;
mod simulate;

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use crate::player::PlayMode;

pub use config::cmd_config;
pub use simulate::cmd_simulate;

/// Playlist Engine CLI
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available subcommands
#[derive(Subcommand)]
pub enum Commands {
    /// Play a playlist file against the simulated streaming engine
    Simulate {
        /// Playlist file (TOML with [[tracks]] entries)
        playlist: PathBuf,
        /// Index of the first item to play
        #[arg(short, long, default_value_t = 0)]
        start: usize,
        /// Play mode (overrides the config file)
        #[arg(short, long, value_enum)]
        mode: Option<ModeArg>,
        /// Stop after this many items finished playing
        #[arg(short, long, default_value_t = 3)]
        tracks: usize,
        /// Print observer events as JSON lines
        #[arg(long)]
        json: bool,
    },
    /// Show the configuration file
    Config {
        /// Write a default config file if none exists
        #[arg(long)]
        init: bool,
    },
}

/// Play mode as accepted on the command line
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ModeArg {
    SequentialLoop,
    RepeatOne,
    Shuffle,
}

impl From<ModeArg> for PlayMode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::SequentialLoop => PlayMode::SequentialLoop,
            ModeArg::RepeatOne => PlayMode::RepeatOne,
            ModeArg::Shuffle => PlayMode::Shuffle,
        }
    }
}

/// Run the specified CLI command.
///
/// Returns `Ok(true)` if a command was run, `Ok(false)` if no command was
/// specified.
pub fn run_command(cli: &Cli) -> anyhow::Result<bool> {
    match &cli.command {
        Some(Commands::Simulate {
            playlist,
            start,
            mode,
            tracks,
            json,
        }) => {
            cmd_simulate(playlist, *start, mode.map(PlayMode::from), *tracks, *json)?;
            Ok(true)
        }
        Some(Commands::Config { init }) => {
            cmd_config(*init)?;
            Ok(true)
        }
        None => Ok(false),
    }
}
