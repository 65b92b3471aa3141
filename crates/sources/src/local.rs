//! Local path source driver
//!
//! Local dependencies are used in place: nothing is copied into the
//! cache, so this driver never participates in cache GC.

use crate::{FetchContext, FetchReport, FetchResult, SourceDriver};
use async_trait::async_trait;
use pakt_errors::{LockfileError, SourceError};
use pakt_manifest::read_dep_manifest;
use pakt_types::{Dependency, Source, SourceKind};
use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use std::str::SplitWhitespace;
use std::sync::Arc;

/// Lockfile entry for a local dependency
#[derive(Debug, Clone, PartialEq)]
pub struct LocalResolution {
    /// Path resolved against the project root
    pub path: PathBuf,
    pub dep_idx: Option<usize>,
}

#[derive(Debug)]
pub struct LocalDriver;

impl LocalDriver {
    fn resolve(ctx: &FetchContext, declared: &Path) -> PathBuf {
        if declared.is_absolute() {
            declared.to_path_buf()
        } else {
            ctx.project_root.join(declared)
        }
    }
}

#[async_trait]
impl SourceDriver for LocalDriver {
    const NAME: &'static str = "local";
    const KIND: SourceKind = SourceKind::Local;
    type Resolution = LocalResolution;

    fn parse_lock_line(
        fields: &mut SplitWhitespace<'_>,
    ) -> Result<Self::Resolution, LockfileError> {
        let path = fields
            .next()
            .ok_or(LockfileError::MissingField { field: "path" })?;
        if fields.next().is_some() {
            return Err(LockfileError::TrailingFields { field: "path" });
        }
        Ok(LocalResolution {
            path: PathBuf::from(path),
            dep_idx: None,
        })
    }

    fn write_lock_line(entry: &Self::Resolution, out: &mut String) {
        let _ = writeln!(out, "local {}", entry.path.display());
    }

    fn find_resolution(
        ctx: &FetchContext,
        source: &Source,
        entries: &[Self::Resolution],
    ) -> Option<usize> {
        let Source::Local(local) = source else {
            return None;
        };
        let resolved = Self::resolve(ctx, &local.path);
        entries.iter().position(|entry| entry.path == resolved)
    }

    async fn fetch(
        ctx: FetchContext,
        dep: Dependency,
        entries: Arc<Vec<Self::Resolution>>,
    ) -> FetchReport<Self::Resolution> {
        let Source::Local(ref local) = dep.source else {
            return FetchReport::failed(SourceError::FetchFailed {
                name: dep.alias,
                message: "descriptor is not a local path".to_string(),
            });
        };

        let resolved = Self::resolve(&ctx, &local.path);
        match tokio::fs::try_exists(&resolved).await {
            Ok(true) => {}
            _ => {
                return FetchReport::explain(&ctx.tx, &dep.alias, SourceError::LocalPathMissing {
                    path: resolved.display().to_string(),
                });
            }
        }

        if let Some(idx) = Self::find_resolution(&ctx, &dep.source, &entries) {
            if entries[idx].dep_idx.is_some() {
                return FetchReport::resolved(FetchResult::UseExisting(idx), resolved, Vec::new());
            }
            return match read_dep_manifest(&resolved).await {
                Ok(deps) => FetchReport::resolved(FetchResult::Rebind(idx), resolved, deps),
                Err(e) => FetchReport::explain(&ctx.tx, &dep.alias, e),
            };
        }

        match read_dep_manifest(&resolved).await {
            Ok(deps) => FetchReport::resolved(
                FetchResult::New(LocalResolution {
                    path: resolved.clone(),
                    dep_idx: None,
                }),
                resolved,
                deps,
            ),
            Err(e) => FetchReport::explain(&ctx.tx, &dep.alias, e),
        }
    }

    fn dep_idx(entry: &Self::Resolution) -> Option<usize> {
        entry.dep_idx
    }

    fn bind(entry: &mut Self::Resolution, dep_idx: usize) {
        entry.dep_idx = Some(dep_idx);
    }

    fn cache_basename(_entry: &Self::Resolution) -> Option<String> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lock_line_round_trip() {
        let entry = LocalResolution {
            path: PathBuf::from("libs/mylib"),
            dep_idx: None,
        };
        let mut line = String::new();
        LocalDriver::write_lock_line(&entry, &mut line);
        assert_eq!(line, "local libs/mylib\n");

        let mut fields = line.trim_end().split_whitespace();
        assert_eq!(fields.next(), Some("local"));
        let parsed = LocalDriver::parse_lock_line(&mut fields).unwrap();
        assert_eq!(parsed, entry);
    }

    #[test]
    fn lock_line_rejects_bad_shapes() {
        let mut empty = "".split_whitespace();
        assert!(matches!(
            LocalDriver::parse_lock_line(&mut empty),
            Err(LockfileError::MissingField { .. })
        ));

        let mut extra = "libs/a extra".split_whitespace();
        assert!(matches!(
            LocalDriver::parse_lock_line(&mut extra),
            Err(LockfileError::TrailingFields { .. })
        ));
    }
}
