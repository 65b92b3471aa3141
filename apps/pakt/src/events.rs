//! Event rendering for the CLI
//!
//! Library crates never print; everything user-visible arrives here
//! over the event channel and goes out through tracing.

use pakt_events::{Event, EventReceiver};
use tracing::{debug, error, info, warn};

pub async fn render(mut rx: EventReceiver, debug_enabled: bool) {
    while let Some(event) = rx.recv().await {
        match event {
            Event::FetchStarting { direct_deps } => {
                info!("fetching {direct_deps} direct dependencies");
            }
            Event::FetchCompleted { packages } => info!("resolved {packages} packages"),
            Event::DownloadStarted { url, .. } => info!("downloading {url}"),
            Event::DownloadProgress { .. } => {}
            Event::DownloadCompleted { url, size } => debug!("downloaded {url} ({size} bytes)"),
            Event::DependencyResolved {
                alias,
                source,
                location,
            } => info!("{alias} ({source}) -> {location}"),
            Event::DependencyReused { alias, source } => {
                debug!("{alias} ({source}) already resolved");
            }
            Event::CacheEntryRemoved { name } => debug!("cache: removed {name}"),
            Event::CacheCleaned { removed } => info!("cache: removed {removed} stale entries"),
            Event::Warning { message, context } => match context {
                Some(context) => warn!("{message}: {context}"),
                None => warn!("{message}"),
            },
            Event::Error { message, details } => match details {
                Some(details) => error!("{message}: {details}"),
                None => error!("{message}"),
            },
            Event::DebugLog { message } => {
                if debug_enabled {
                    debug!("{message}");
                }
            }
        }
    }
}
