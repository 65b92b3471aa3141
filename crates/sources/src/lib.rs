#![deny(clippy::pedantic, unsafe_code)]
#![allow(clippy::module_name_repetitions)]

//! Dependency source drivers for pakt
//!
//! Each source kind (registry package, local path, remote tarball, git
//! repository) implements the [`SourceDriver`] capability set. The
//! driver list is closed: the engine dispatches over the four concrete
//! driver types, never over a registry.
//!
//! Worker bodies are infallible by signature: every failure is carried
//! in-band inside the returned [`FetchReport`] so the engine can
//! reconcile rows in a stable order regardless of completion order.

mod archive;
mod git;
mod local;
mod pkg;
mod url;

pub use git::{GitDriver, GitResolution};
pub use local::{LocalDriver, LocalResolution};
pub use pkg::{PkgDriver, PkgResolution};
pub use url::{UrlDriver, UrlResolution};

use async_trait::async_trait;
use pakt_errors::{Error, LockfileError};
use pakt_events::{EventSender, EventSenderExt};
use pakt_net::NetClient;
use pakt_types::{Dependency, Source, SourceKind};
use std::path::PathBuf;
use std::str::SplitWhitespace;
use std::sync::Arc;

/// Shared context handed to every worker.
///
/// Cheap to clone; one clone per spawned worker.
#[derive(Debug, Clone)]
pub struct FetchContext {
    pub net: NetClient,
    pub project_root: PathBuf,
    pub cache_root: PathBuf,
    pub tx: EventSender,
}

impl FetchContext {
    pub fn new(
        net: NetClient,
        project_root: impl Into<PathBuf>,
        cache_root: impl Into<PathBuf>,
        tx: EventSender,
    ) -> Self {
        Self {
            net,
            project_root: project_root.into(),
            cache_root: cache_root.into(),
            tx,
        }
    }
}

/// Outcome classification of one worker run
#[derive(Debug)]
pub enum FetchResult<R> {
    /// The dependency is identical to an already-live entry; the
    /// caller's graph should point at the existing subtree.
    UseExisting(usize),
    /// A stale entry matched; rebind it to this dependency.
    Rebind(usize),
    /// A live entry matched; re-expand its cached child list for this
    /// occurrence instead of sharing the subtree.
    CopyDeps(usize),
    /// A fresh entry was produced.
    New(R),
    /// The fetch failed; reconciliation decides how to surface it.
    Failed(Error),
}

/// Everything a worker writes for its row
#[derive(Debug)]
pub struct FetchReport<R> {
    pub result: FetchResult<R>,
    /// Absolute path where the dependency's contents are available
    pub path: Option<PathBuf>,
    /// Child dependencies discovered in the fetched package's manifest
    pub deps: Vec<Dependency>,
}

impl<R> FetchReport<R> {
    /// A successful report
    pub fn resolved(result: FetchResult<R>, path: PathBuf, deps: Vec<Dependency>) -> Self {
        Self {
            result,
            path: Some(path),
            deps,
        }
    }

    /// A failed report; the error travels in-band
    pub fn failed(err: impl Into<Error>) -> Self {
        Self {
            result: FetchResult::Failed(err.into()),
            path: None,
            deps: Vec::new(),
        }
    }

    /// Report a fetch failure to the user and carry the Explained
    /// marker in-band.
    ///
    /// Independent failures across a batch all reach the user this
    /// way before the engine aborts once.
    pub fn explain(tx: &EventSender, alias: &str, err: impl Into<Error>) -> Self {
        let err = err.into();
        if err.is_explained() {
            return Self::failed(err);
        }
        tx.emit(pakt_events::Event::Error {
            message: format!("failed to fetch dependency {alias}"),
            details: Some(err.to_string()),
        });
        Self::failed(Error::Explained)
    }
}

/// Capability set every dependency source kind provides.
///
/// Drivers are stateless unit types; per-source state (resolution
/// entries, queue rows) lives in the engine. `fetch` must be safe to
/// run concurrently across rows: it reads only its own inputs and the
/// per-batch entries snapshot, and must never wait on another row.
#[async_trait]
pub trait SourceDriver {
    /// Lockfile tag and display name
    const NAME: &'static str;
    /// Source kind this driver serves
    const KIND: SourceKind;
    /// Per-source resolution entry type
    type Resolution: Clone + std::fmt::Debug + PartialEq + Send + Sync + 'static;

    /// Parse one whitespace-tokenized lockfile line tail.
    ///
    /// # Errors
    ///
    /// Returns a [`LockfileError`] describing why the line tail is
    /// malformed; the store loader drops the line and warns.
    fn parse_lock_line(fields: &mut SplitWhitespace<'_>)
        -> Result<Self::Resolution, LockfileError>;

    /// Emit one entry as a tag-prefixed lockfile line.
    fn write_lock_line(entry: &Self::Resolution, out: &mut String);

    /// Locate an entry equivalent to the given descriptor.
    fn find_resolution(
        ctx: &FetchContext,
        source: &Source,
        entries: &[Self::Resolution],
    ) -> Option<usize>;

    /// Worker body: dedupe against the entries snapshot, fetch if
    /// needed, and report the outcome. Never fails out-of-band.
    async fn fetch(
        ctx: FetchContext,
        dep: Dependency,
        entries: Arc<Vec<Self::Resolution>>,
    ) -> FetchReport<Self::Resolution>;

    /// Back-reference of an entry: the dep table index it was
    /// validated against this run, if any.
    fn dep_idx(entry: &Self::Resolution) -> Option<usize>;

    /// Bind an entry to a dep table index, marking it fresh.
    fn bind(entry: &mut Self::Resolution, dep_idx: usize);

    /// Cache directory basename for this entry; `None` for sources
    /// that do not cache on disk.
    fn cache_basename(entry: &Self::Resolution) -> Option<String>;
}
