//! Command-line interface for playlist-engine.
//!
//! This module provides CLI commands for exercising the playback controller
//! against the simulated engine and for managing the configuration file.

mod commands;

pub use commands::{Cli, Commands, ModeArg, run_command};
