//! Command-line interface for the `dondeayudo` binary.

mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

pub use commands::{
    AdminCommand, CacheCommand, CategoryArg, ConfigCommand, OutputFormat, PointsCommand,
    StateArg, StatusCommand, SyncCommand,
};

use crate::logging::Verbosity;

/// dondeayudo - Aid points for emergencies in Chile
///
/// Downloads the public map of shelters, supply depots and help requests,
/// keeps a local copy for offline use, and manages points through the admin
/// API.
#[derive(Debug, Parser)]
#[command(name = "dondeayudo")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to custom configuration file
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Increase verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// The command to execute
    #[command(subcommand)]
    pub command: Command,
}

/// Available commands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Load the cache, refresh from the network and report the result
    Sync(SyncCommand),

    /// List points
    Points(PointsCommand),

    /// Show the cached snapshot
    Status(StatusCommand),

    /// Manage the local cache
    #[command(subcommand)]
    Cache(CacheCommand),

    /// View or validate configuration
    #[command(subcommand)]
    Config(ConfigCommand),

    /// Manage points through the admin API
    #[command(subcommand)]
    Admin(AdminCommand),
}

impl Cli {
    /// Get the verbosity level based on flags.
    #[must_use]
    pub fn verbosity(&self) -> Verbosity {
        Verbosity::from_flags(self.quiet, self.verbose)
    }
}
