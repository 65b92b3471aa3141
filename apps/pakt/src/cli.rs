//! Command line interface definition

use clap::{Parser, Subcommand};

/// pakt - package manager for Zig projects
#[derive(Parser)]
#[command(name = "pakt")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Fetch dependencies and generate deps.zig")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable debug logging
    #[arg(long, global = true)]
    pub debug: bool,
}

/// Available commands
#[derive(Subcommand)]
pub enum Commands {
    /// Resolve and fetch all dependencies, write pakt.lock and deps.zig
    #[command(alias = "f")]
    Fetch,

    /// Drop the pinned resolution for the given root aliases, then fetch
    #[command(alias = "up")]
    Update {
        /// Root dependency aliases to refresh
        #[arg(required = true)]
        aliases: Vec<String>,
    },
}
