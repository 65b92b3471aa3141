//! pakt - package manager for Zig projects
//!
//! Resolves the project's dependencies, refreshes pakt.lock, and
//! generates the deps.zig consumed by the Zig build system.

mod cli;
mod events;

use crate::cli::{Cli, Commands};
use clap::Parser;
use pakt_engine::{Engine, DEPS_FILE, LOCKFILE};
use pakt_errors::Error;
use pakt_events::EventSender;
use pakt_manifest::{Project, MANIFEST_FILE};
use pakt_net::NetClient;
use std::path::Path;
use std::process;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(cli.debug);

    if let Err(e) = run(cli).await {
        // Explained errors were already rendered in full.
        if !e.is_explained() {
            eprintln!("error: {e}");
        }
        process::exit(1);
    }
}

fn init_tracing(debug: bool) {
    let default = if debug { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default)),
        )
        .with_target(false)
        .init();
}

async fn run(cli: Cli) -> Result<(), Error> {
    let root = std::env::current_dir()?;
    let project = Project::load(&root.join(MANIFEST_FILE)).await?;

    let lock_path = root.join(LOCKFILE);
    let lock_text = match tokio::fs::read_to_string(&lock_path).await {
        Ok(text) => text,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => String::new(),
        Err(e) => return Err(Error::io_with_path(&e, &lock_path)),
    };

    let (tx, rx) = pakt_events::channel();
    let renderer = tokio::spawn(events::render(rx, cli.debug));

    let result = execute(cli.command, project, &lock_text, &root, tx).await;

    // All senders are gone once execute returns; drain the renderer so
    // late events still reach the terminal.
    let _ = renderer.await;
    result
}

async fn execute(
    command: Commands,
    project: Project,
    lock_text: &str,
    root: &Path,
    tx: EventSender,
) -> Result<(), Error> {
    let net = NetClient::with_defaults()?;
    let mut engine = Engine::new(project, lock_text, net, root, tx)?;

    if let Commands::Update { aliases } = &command {
        for alias in aliases {
            engine.clear_resolution(alias);
        }
    }

    engine.fetch().await?;
    engine.write_lockfile(&root.join(LOCKFILE)).await?;
    engine.write_deps_file(&root.join(DEPS_FILE)).await?;
    Ok(())
}
