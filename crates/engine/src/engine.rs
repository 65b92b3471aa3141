//! The fetch engine
//!
//! Seeds the dependency table from the project's direct dependencies,
//! drains the fetch queue breadth-first until no batch discovers new
//! children, then garbage-collects the cache and prunes lockfile
//! entries that this run never validated.

use crate::emit::{self, BuildPkg};
use crate::lockfile;
use crate::queue::{NextBuffer, SourceState};
use crate::table::DepTable;
use pakt_errors::Error;
use pakt_events::{Event, EventSender, EventSenderExt};
use pakt_manifest::Project;
use pakt_net::NetClient;
use pakt_sources::{FetchContext, GitDriver, LocalDriver, PkgDriver, UrlDriver};
use pakt_types::{Edge, Parent, SourceKind};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

/// Cache directory name, reserved in the project root
pub const CACHE_DIR: &str = ".pakt";

/// Lockfile name
pub const LOCKFILE: &str = "pakt.lock";

/// Generated build-graph file name
pub const DEPS_FILE: &str = "deps.zig";

/// Dependency resolution and fetch engine
#[derive(Debug)]
pub struct Engine {
    project: Project,
    ctx: FetchContext,
    table: DepTable,
    pkg: SourceState<PkgDriver>,
    local: SourceState<LocalDriver>,
    url: SourceState<UrlDriver>,
    git: SourceState<GitDriver>,
    /// Accumulated edges, in breadth-first processing order
    edges: Vec<Edge>,
    /// dep index -> on-disk location, filled per batch
    paths: HashMap<usize, PathBuf>,
}

impl Engine {
    /// Create an engine seeded with the project's direct dependencies
    /// and the prior lockfile contents.
    ///
    /// # Errors
    ///
    /// Returns `Explained` if the lockfile contains an unknown source
    /// tag (the offending line is reported on the event channel).
    pub fn new(
        project: Project,
        lock_text: &str,
        net: NetClient,
        project_root: impl Into<PathBuf>,
        tx: EventSender,
    ) -> Result<Self, Error> {
        let project_root = project_root.into();
        let cache_root = project_root.join(CACHE_DIR);
        let ctx = FetchContext::new(net, project_root, cache_root, tx.clone());

        let resolutions = lockfile::parse(lock_text, &tx)?;
        let mut table = DepTable::with_capacity(project.deps.len() + project.build_deps.len());
        let mut pkg = SourceState::<PkgDriver>::new(resolutions.pkg);
        let mut local = SourceState::<LocalDriver>::new(resolutions.local);
        let mut url = SourceState::<UrlDriver>::new(resolutions.url);
        let mut git = SourceState::<GitDriver>::new(resolutions.git);

        let seeds = project
            .deps
            .iter()
            .map(|dep| (dep, Parent::RootNormal))
            .chain(project.build_deps.iter().map(|dep| (dep, Parent::RootBuild)));
        for (dep, parent) in seeds {
            let idx = table.push(dep.clone(), parent);
            let edge = Edge::new(parent, idx, dep.alias.clone());
            match dep.source.kind() {
                SourceKind::Pkg => pkg.push_row(edge),
                SourceKind::Local => local.push_row(edge),
                SourceKind::Url => url.push_row(edge),
                SourceKind::Git => git.push_row(edge),
            }
        }

        Ok(Self {
            project,
            ctx,
            table,
            pkg,
            local,
            url,
            git,
            edges: Vec::new(),
            paths: HashMap::new(),
        })
    }

    /// Resolve and fetch the whole transitive closure.
    ///
    /// # Errors
    ///
    /// Returns `Explained` when one or more fetches failed and were
    /// already reported; any other error is surfaced once by the
    /// caller.
    pub async fn fetch(&mut self) -> Result<(), Error> {
        self.ctx.tx.emit(Event::FetchStarting {
            direct_deps: self.queued_rows(),
        });

        while !self.queue_is_empty() {
            self.run_batch().await?;
        }

        self.collect_garbage().await?;
        self.prune_stale();

        self.ctx.tx.emit(Event::FetchCompleted {
            packages: self.table.len(),
        });
        Ok(())
    }

    /// One breadth-first batch: fan out workers, join them all, fold
    /// the results in sequentially, stage the next batch.
    async fn run_batch(&mut self) -> Result<(), Error> {
        let pkg_handles = self.pkg.spawn_batch(&self.ctx, &self.table);
        let local_handles = self.local.spawn_batch(&self.ctx, &self.table);
        let url_handles = self.url.spawn_batch(&self.ctx, &self.table);
        let git_handles = self.git.spawn_batch(&self.ctx, &self.table);

        // Every spawned worker is joined before any join failure
        // propagates.
        let joined_pkg = self.pkg.join_batch(pkg_handles).await;
        let joined_local = self.local.join_batch(local_handles).await;
        let joined_url = self.url.join_batch(url_handles).await;
        let joined_git = self.git.join_batch(git_handles).await;
        joined_pkg?;
        joined_local?;
        joined_url?;
        joined_git?;

        let mut next = NextBuffer::default();
        let mut explained = false;
        self.pkg.reconcile(
            &self.ctx,
            &mut self.table,
            &mut self.paths,
            &mut self.edges,
            &mut next,
            &mut explained,
            &self.ctx.tx,
        )?;
        self.local.reconcile(
            &self.ctx,
            &mut self.table,
            &mut self.paths,
            &mut self.edges,
            &mut next,
            &mut explained,
            &self.ctx.tx,
        )?;
        self.url.reconcile(
            &self.ctx,
            &mut self.table,
            &mut self.paths,
            &mut self.edges,
            &mut next,
            &mut explained,
            &self.ctx.tx,
        )?;
        self.git.reconcile(
            &self.ctx,
            &mut self.table,
            &mut self.paths,
            &mut self.edges,
            &mut next,
            &mut explained,
            &self.ctx.tx,
        )?;

        if explained {
            return Err(Error::Explained);
        }

        self.pkg.promote(next.pkg);
        self.local.promote(next.local);
        self.url.promote(next.url);
        self.git.promote(next.git);
        Ok(())
    }

    /// Drop the lockfile entries backing the root dependency with this
    /// alias, forcing it (and its subtree) to be refetched.
    pub fn clear_resolution(&mut self, alias: &str) {
        self.pkg.clear_root(&self.ctx, alias, &self.table);
        self.local.clear_root(&self.ctx, alias, &self.table);
        self.url.clear_root(&self.ctx, alias, &self.table);
        self.git.clear_root(&self.ctx, alias, &self.table);
    }

    /// Remove cache directories that no validated entry claims.
    ///
    /// Skipped on Windows, where recursive deletion trips over hidden
    /// and read-only entries left by some git checkouts.
    async fn collect_garbage(&self) -> Result<(), Error> {
        if cfg!(windows) {
            return Ok(());
        }

        let mut live = HashSet::new();
        self.pkg.live_basenames(&mut live);
        self.url.live_basenames(&mut live);
        self.git.live_basenames(&mut live);

        let mut dir = match tokio::fs::read_dir(&self.ctx.cache_root).await {
            Ok(dir) => dir,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
            Err(e) => return Err(Error::io_with_path(&e, &self.ctx.cache_root)),
        };

        let mut removed = 0usize;
        while let Some(child) = dir.next_entry().await? {
            if !child.file_type().await?.is_dir() {
                continue;
            }
            let name = child.file_name().to_string_lossy().into_owned();
            if live.contains(&name) {
                continue;
            }
            tokio::fs::remove_dir_all(child.path())
                .await
                .map_err(|e| Error::io_with_path(&e, child.path()))?;
            self.ctx.tx.emit(Event::CacheEntryRemoved { name });
            removed += 1;
        }

        if removed > 0 {
            self.ctx.tx.emit(Event::CacheCleaned { removed });
        }
        Ok(())
    }

    fn prune_stale(&mut self) {
        self.pkg.prune_stale();
        self.local.prune_stale();
        self.url.prune_stale();
        self.git.prune_stale();
    }

    fn queue_is_empty(&self) -> bool {
        self.pkg.is_idle() && self.local.is_idle() && self.url.is_idle() && self.git.is_idle()
    }

    fn queued_rows(&self) -> usize {
        self.pkg.rows.len() + self.local.rows.len() + self.url.rows.len() + self.git.rows.len()
    }

    /// Serialize the lockfile, sources in fixed order
    #[must_use]
    pub fn lockfile(&self) -> String {
        let mut out = String::new();
        self.pkg.write_lock(&mut out);
        self.local.write_lock(&mut out);
        self.url.write_lock(&mut out);
        self.git.write_lock(&mut out);
        out
    }

    /// Render the generated deps.zig source
    #[must_use]
    pub fn render_deps_file(&self) -> String {
        emit::render_deps_file(&self.project, &self.edges, &self.paths)
    }

    /// Expand the build-dependency subtrees into owned records
    #[must_use]
    pub fn build_deps_graph(&self) -> Vec<BuildPkg> {
        emit::build_graph(&self.edges, &self.paths)
    }

    /// Write the lockfile next to the project manifest
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    pub async fn write_lockfile(&self, path: &Path) -> Result<(), Error> {
        tokio::fs::write(path, self.lockfile())
            .await
            .map_err(|e| Error::io_with_path(&e, path))
    }

    /// Write the generated deps.zig
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    pub async fn write_deps_file(&self, path: &Path) -> Result<(), Error> {
        tokio::fs::write(path, self.render_deps_file())
            .await
            .map_err(|e| Error::io_with_path(&e, path))
    }

    /// Accumulated edges, breadth-first
    #[must_use]
    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    /// On-disk locations by dep index
    #[must_use]
    pub fn paths(&self) -> &HashMap<usize, PathBuf> {
        &self.paths
    }

    /// Number of dependencies encountered so far
    #[must_use]
    pub fn dep_count(&self) -> usize {
        self.table.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pakt_manifest::Project;
    use std::collections::BTreeMap;

    fn empty_project() -> Project {
        Project {
            name: "empty".to_string(),
            deps: Vec::new(),
            build_deps: Vec::new(),
            packages: BTreeMap::new(),
        }
    }

    #[tokio::test]
    async fn zero_dep_project_fetches_to_nothing() {
        let (tx, _rx) = pakt_events::channel();
        let temp = tempfile::tempdir().unwrap();
        let mut engine = Engine::new(
            empty_project(),
            "",
            NetClient::with_defaults().unwrap(),
            temp.path(),
            tx,
        )
        .unwrap();

        engine.fetch().await.unwrap();

        assert!(engine.edges().is_empty());
        assert!(engine.paths().is_empty());
        assert_eq!(engine.dep_count(), 0);
        assert!(engine.lockfile().is_empty());
        assert!(engine.build_deps_graph().is_empty());

        let rendered = engine.render_deps_file();
        assert!(rendered.contains("pub const pkgs = struct {\n    pub fn addAllTo"));
        assert!(!rendered.contains("exports"));
    }

    #[tokio::test]
    async fn unknown_lock_tag_aborts_construction_as_explained() {
        let (tx, _rx) = pakt_events::channel();
        let temp = tempfile::tempdir().unwrap();
        let err = Engine::new(
            empty_project(),
            "svn https://example.com/repo 42\n",
            NetClient::with_defaults().unwrap(),
            temp.path(),
            tx,
        )
        .unwrap_err();
        assert!(err.is_explained());
    }
}
