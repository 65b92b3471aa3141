//! Per-source fetch queue and reconciliation
//!
//! Each source kind owns one [`SourceState`]: its resolution entries,
//! the queue rows of the batch in flight, and the per-run bookkeeping
//! that backs dedupe. Workers run concurrently; everything here that
//! mutates state runs strictly sequentially, in row order, after all
//! workers of the batch have been joined.

use crate::table::DepTable;
use pakt_errors::Error;
use pakt_events::{Event, EventSender, EventSenderExt};
use pakt_sources::{FetchContext, FetchReport, FetchResult, SourceDriver};
use pakt_types::{Dependency, Edge, Parent, SourceKind};
use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::task::JoinHandle;

/// One queue row: an edge being fetched plus the worker's findings
#[derive(Debug)]
pub(crate) struct Row<R> {
    pub edge: Edge,
    /// Written once when the worker is joined
    pub report: Option<FetchReport<R>>,
    /// Adopted from the report during reconciliation
    pub path: Option<PathBuf>,
    /// Children to stage for the next batch
    pub deps: Vec<Dependency>,
}

impl<R> Row<R> {
    fn new(edge: Edge) -> Self {
        Self {
            edge,
            report: None,
            path: None,
            deps: Vec::new(),
        }
    }
}

/// Edges staged for the next batch, keyed by the child's source kind
#[derive(Debug, Default)]
pub(crate) struct NextBuffer {
    pub pkg: Vec<Edge>,
    pub local: Vec<Edge>,
    pub url: Vec<Edge>,
    pub git: Vec<Edge>,
}

impl NextBuffer {
    pub fn push(&mut self, kind: SourceKind, edge: Edge) {
        match kind {
            SourceKind::Pkg => self.pkg.push(edge),
            SourceKind::Local => self.local.push(edge),
            SourceKind::Url => self.url.push(edge),
            SourceKind::Git => self.git.push(edge),
        }
    }
}

/// Per-source engine state
#[derive(Debug)]
pub(crate) struct SourceState<D: SourceDriver> {
    pub entries: Vec<D::Resolution>,
    pub rows: Vec<Row<D::Resolution>>,
    /// Child lists of entries resolved this run, by resolution index
    deps_cache: HashMap<usize, Vec<Dependency>>,
    /// dep index -> resolution index bindings made this run
    binding: HashMap<usize, usize>,
}

impl<D: SourceDriver> SourceState<D> {
    pub fn new(entries: Vec<D::Resolution>) -> Self {
        Self {
            entries,
            rows: Vec::new(),
            deps_cache: HashMap::new(),
            binding: HashMap::new(),
        }
    }

    pub fn push_row(&mut self, edge: Edge) {
        self.rows.push(Row::new(edge));
    }

    pub fn is_idle(&self) -> bool {
        self.rows.is_empty()
    }

    /// Spawn one worker per row. Shared inputs travel as per-batch
    /// snapshots; each worker's writable region is its own report.
    pub fn spawn_batch(
        &self,
        ctx: &FetchContext,
        table: &DepTable,
    ) -> Vec<JoinHandle<(usize, FetchReport<D::Resolution>)>> {
        let entries = Arc::new(self.entries.clone());
        self.rows
            .iter()
            .enumerate()
            .map(|(row_idx, row)| {
                let ctx = ctx.clone();
                let dep = table.get(row.edge.to).clone();
                let entries = Arc::clone(&entries);
                tokio::spawn(async move { (row_idx, D::fetch(ctx, dep, entries).await) })
            })
            .collect()
    }

    /// Join every spawned worker, writing reports back by row index.
    /// A panicked worker surfaces only after all handles are joined.
    pub async fn join_batch(
        &mut self,
        handles: Vec<JoinHandle<(usize, FetchReport<D::Resolution>)>>,
    ) -> Result<(), Error> {
        let mut first_err = None;
        for handle in handles {
            match handle.await {
                Ok((row_idx, report)) => self.rows[row_idx].report = Some(report),
                Err(e) => {
                    if first_err.is_none() {
                        first_err = Some(Error::internal(format!("fetch worker failed: {e}")));
                    }
                }
            }
        }
        match first_err {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// Fold the batch's worker reports into the engine state.
    ///
    /// Runs in stable row order, which is what makes in-batch dedupe
    /// deterministic: workers only see the entries snapshot taken at
    /// batch start, so two rows resolving the same descriptor both
    /// report a result for it, and the first row in index order wins.
    /// Explained failures set the sticky flag and let the remaining
    /// rows reconcile; any other failure aborts the batch at once.
    #[allow(clippy::too_many_lines)]
    pub fn reconcile(
        &mut self,
        ctx: &FetchContext,
        table: &mut DepTable,
        paths: &mut HashMap<usize, PathBuf>,
        edges: &mut Vec<Edge>,
        next: &mut NextBuffer,
        explained: &mut bool,
        tx: &EventSender,
    ) -> Result<(), Error> {
        for row_idx in 0..self.rows.len() {
            let Some(report) = self.rows[row_idx].report.take() else {
                return Err(Error::internal("fetch worker left no report"));
            };
            let FetchReport { result, path, deps } = report;
            let edge_to = self.rows[row_idx].edge.to;
            let alias = self.rows[row_idx].edge.alias.clone();
            let location = path
                .as_deref()
                .map(|p| p.display().to_string())
                .unwrap_or_default();

            let deps = match result {
                FetchResult::Failed(e) => {
                    if e.is_explained() {
                        *explained = true;
                        continue;
                    }
                    return Err(e);
                }
                FetchResult::UseExisting(_) => {
                    tx.emit(Event::DependencyReused {
                        alias,
                        source: D::NAME.to_string(),
                    });
                    deps
                }
                FetchResult::Rebind(res_idx) => {
                    if D::dep_idx(&self.entries[res_idx]).is_some() {
                        // An earlier row of this batch rebound the same
                        // entry; share its subtree instead.
                        tx.emit(Event::DependencyReused {
                            alias,
                            source: D::NAME.to_string(),
                        });
                        Vec::new()
                    } else {
                        D::bind(&mut self.entries[res_idx], edge_to);
                        self.record_binding(edge_to, res_idx)?;
                        self.deps_cache.insert(res_idx, deps.clone());
                        tx.emit(Event::DependencyResolved {
                            alias,
                            source: D::NAME.to_string(),
                            location,
                        });
                        deps
                    }
                }
                FetchResult::CopyDeps(res_idx) => {
                    if self.ancestor_bound_to(table, edge_to, res_idx) {
                        return Err(pakt_errors::SourceError::DependencyCycle { alias }.into());
                    }
                    tx.emit(Event::DependencyReused {
                        alias,
                        source: D::NAME.to_string(),
                    });
                    self.deps_cache.get(&res_idx).cloned().unwrap_or_default()
                }
                FetchResult::New(entry) => {
                    let source = &table.get(edge_to).source;
                    if let Some(res_idx) = D::find_resolution(ctx, source, &self.entries) {
                        // A sibling row earlier in this batch already
                        // produced an equivalent entry.
                        if D::dep_idx(&self.entries[res_idx]).is_some() {
                            tx.emit(Event::DependencyReused {
                                alias,
                                source: D::NAME.to_string(),
                            });
                            Vec::new()
                        } else {
                            D::bind(&mut self.entries[res_idx], edge_to);
                            self.record_binding(edge_to, res_idx)?;
                            self.deps_cache.insert(res_idx, deps.clone());
                            tx.emit(Event::DependencyResolved {
                                alias,
                                source: D::NAME.to_string(),
                                location,
                            });
                            deps
                        }
                    } else {
                        let res_idx = self.entries.len();
                        self.entries.push(entry);
                        D::bind(&mut self.entries[res_idx], edge_to);
                        self.record_binding(edge_to, res_idx)?;
                        self.deps_cache.insert(res_idx, deps.clone());
                        tx.emit(Event::DependencyResolved {
                            alias,
                            source: D::NAME.to_string(),
                            location,
                        });
                        deps
                    }
                }
            };

            self.rows[row_idx].path = path;
            self.rows[row_idx].deps = deps;
        }

        // Paths first: one path per dep index, ever.
        for row in &self.rows {
            if let Some(path) = &row.path {
                let previous = paths.insert(row.edge.to, path.clone());
                assert!(
                    previous.is_none(),
                    "duplicate path registered for dep {}",
                    row.edge.to
                );
            }
        }

        // Stage discovered children for the next batch.
        for row in &self.rows {
            for child in &row.deps {
                let child_idx = table.push(child.clone(), Parent::Dep(row.edge.to));
                next.push(
                    child.source.kind(),
                    Edge::new(Parent::Dep(row.edge.to), child_idx, child.alias.clone()),
                );
            }
        }

        // Finally adopt this batch's edges, preserving row order.
        edges.extend(self.rows.iter().map(|row| row.edge.clone()));

        Ok(())
    }

    /// Replace the drained rows with the staged edges of the next batch
    pub fn promote(&mut self, staged: Vec<Edge>) {
        self.rows.clear();
        self.rows.extend(staged.into_iter().map(Row::new));
    }

    /// Drop the lockfile entry backing a root dependency with this
    /// alias, forcing a refetch.
    pub fn clear_root(&mut self, ctx: &FetchContext, alias: &str, table: &DepTable) {
        let targets: Vec<usize> = self
            .rows
            .iter()
            .filter(|row| row.edge.parent.is_root() && row.edge.alias == alias)
            .map(|row| row.edge.to)
            .collect();

        for dep_idx in targets {
            let dep = table.get(dep_idx);
            if dep.source.kind() != D::KIND {
                continue;
            }
            if let Some(res_idx) = D::find_resolution(ctx, &dep.source, &self.entries) {
                // Ordered remove keeps the survivors' relative order.
                self.entries.remove(res_idx);
            }
        }
    }

    /// Cache basenames of entries validated this run
    pub fn live_basenames(&self, out: &mut HashSet<String>) {
        for entry in &self.entries {
            if D::dep_idx(entry).is_some() {
                if let Some(basename) = D::cache_basename(entry) {
                    out.insert(basename);
                }
            }
        }
    }

    /// Drop entries that were never validated this run
    pub fn prune_stale(&mut self) {
        self.entries.retain(|entry| D::dep_idx(entry).is_some());
    }

    pub fn write_lock(&self, out: &mut String) {
        for entry in &self.entries {
            D::write_lock_line(entry, out);
        }
    }

    fn record_binding(&mut self, dep_idx: usize, res_idx: usize) -> Result<(), Error> {
        if self.binding.insert(dep_idx, res_idx).is_some() {
            return Err(Error::internal(format!(
                "dep {dep_idx} bound to more than one resolution"
            )));
        }
        Ok(())
    }

    /// True when an ancestor of `dep_idx` already resolved to
    /// `res_idx`: expanding it again would never terminate.
    fn ancestor_bound_to(&self, table: &DepTable, mut dep_idx: usize, res_idx: usize) -> bool {
        loop {
            match table.parent(dep_idx) {
                Parent::Dep(parent) => {
                    if self.binding.get(&parent) == Some(&res_idx) {
                        return true;
                    }
                    dep_idx = parent;
                }
                Parent::RootNormal | Parent::RootBuild => return false,
            }
        }
    }
}
