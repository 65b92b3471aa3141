//! Git repository source driver
//!
//! Repositories are cloned through the system `git` binary. The first
//! fetch pins the checked-out commit; later runs reproduce exactly that
//! commit, including when the cached clone has to be re-materialized.

use crate::{FetchContext, FetchReport, FetchResult, SourceDriver};
use async_trait::async_trait;
use pakt_errors::{Error, LockfileError, SourceError};
use pakt_manifest::read_dep_manifest;
use pakt_types::{Dependency, Source, SourceKind};
use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use std::str::SplitWhitespace;
use std::sync::Arc;
use tokio::process::Command;

/// Lockfile entry for a git dependency
#[derive(Debug, Clone, PartialEq)]
pub struct GitResolution {
    pub url: String,
    /// Branch or tag requested at resolution time; "HEAD" when none was
    pub reference: String,
    /// Pinned commit id
    pub commit: String,
    pub dep_idx: Option<usize>,
}

#[derive(Debug)]
pub struct GitDriver;

/// Repository name: last path segment with a trailing .git removed
fn repo_stem(url: &str) -> &str {
    let tail = url.trim_end_matches('/').rsplit('/').next().unwrap_or(url);
    let stem = tail.trim_end_matches(".git");
    if stem.is_empty() {
        "repo"
    } else {
        stem
    }
}

async fn run_git(args: &[&str], cwd: Option<&Path>, url: &str) -> Result<String, Error> {
    let mut cmd = Command::new("git");
    cmd.args(args);
    if let Some(cwd) = cwd {
        cmd.current_dir(cwd);
    }
    let output = cmd.output().await?;

    if !output.status.success() {
        return Err(SourceError::GitFailed {
            operation: args.first().copied().unwrap_or("?").to_string(),
            url: url.to_string(),
            detail: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        }
        .into());
    }
    Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
}

impl GitDriver {
    fn cache_dir(ctx: &FetchContext, entry: &GitResolution) -> PathBuf {
        let basename = Self::cache_basename(entry).unwrap_or_default();
        ctx.cache_root.join(basename)
    }

    /// Clone and check out the pinned commit of a stale entry.
    async fn materialize(ctx: &FetchContext, entry: &GitResolution, dir: &Path) -> Result<(), Error> {
        tokio::fs::create_dir_all(&ctx.cache_root)
            .await
            .map_err(|e| Error::io_with_path(&e, &ctx.cache_root))?;
        let staging = tempfile::tempdir_in(&ctx.cache_root)?;
        let target = staging.path().join("repo");
        let target_str = target.display().to_string();

        run_git(&["clone", &entry.url, &target_str], None, &entry.url).await?;
        run_git(
            &["checkout", "--detach", &entry.commit],
            Some(&target),
            &entry.url,
        )
        .await?;

        let _ = tokio::fs::remove_dir_all(dir).await;
        tokio::fs::rename(&target, dir)
            .await
            .map_err(|e| Error::io_with_path(&e, dir))?;
        Ok(())
    }

    /// First fetch of a repository: clone, pin HEAD, move into the cache.
    async fn clone_fresh(
        ctx: &FetchContext,
        url: &str,
        reference: Option<&str>,
    ) -> Result<GitResolution, Error> {
        tokio::fs::create_dir_all(&ctx.cache_root)
            .await
            .map_err(|e| Error::io_with_path(&e, &ctx.cache_root))?;
        let staging = tempfile::tempdir_in(&ctx.cache_root)?;
        let target = staging.path().join("repo");
        let target_str = target.display().to_string();

        let mut args = vec!["clone"];
        if let Some(reference) = reference {
            args.push("--branch");
            args.push(reference);
        }
        args.push(url);
        args.push(&target_str);
        run_git(&args, None, url).await?;

        let commit = run_git(&["rev-parse", "HEAD"], Some(&target), url).await?;
        let entry = GitResolution {
            url: url.to_string(),
            reference: reference.unwrap_or("HEAD").to_string(),
            commit,
            dep_idx: None,
        };

        let dir = Self::cache_dir(ctx, &entry);
        let _ = tokio::fs::remove_dir_all(&dir).await;
        tokio::fs::rename(&target, &dir)
            .await
            .map_err(|e| Error::io_with_path(&e, &dir))?;
        Ok(entry)
    }
}

#[async_trait]
impl SourceDriver for GitDriver {
    const NAME: &'static str = "git";
    const KIND: SourceKind = SourceKind::Git;
    type Resolution = GitResolution;

    fn parse_lock_line(
        fields: &mut SplitWhitespace<'_>,
    ) -> Result<Self::Resolution, LockfileError> {
        let url = fields
            .next()
            .ok_or(LockfileError::MissingField { field: "url" })?;
        let reference = fields
            .next()
            .ok_or(LockfileError::MissingField { field: "reference" })?;
        let commit = fields
            .next()
            .ok_or(LockfileError::MissingField { field: "commit" })?;
        if fields.next().is_some() {
            return Err(LockfileError::TrailingFields { field: "commit" });
        }
        Ok(GitResolution {
            url: url.to_string(),
            reference: reference.to_string(),
            commit: commit.to_string(),
            dep_idx: None,
        })
    }

    fn write_lock_line(entry: &Self::Resolution, out: &mut String) {
        let _ = writeln!(
            out,
            "git {} {} {}",
            entry.url, entry.reference, entry.commit
        );
    }

    fn find_resolution(
        _ctx: &FetchContext,
        source: &Source,
        entries: &[Self::Resolution],
    ) -> Option<usize> {
        let Source::Git(git) = source else {
            return None;
        };
        entries.iter().position(|entry| entry.url == git.url)
    }

    async fn fetch(
        ctx: FetchContext,
        dep: Dependency,
        entries: Arc<Vec<Self::Resolution>>,
    ) -> FetchReport<Self::Resolution> {
        let Source::Git(ref git) = dep.source else {
            return FetchReport::failed(SourceError::FetchFailed {
                name: dep.alias,
                message: "descriptor is not a git repository".to_string(),
            });
        };

        if let Some(idx) = Self::find_resolution(&ctx, &dep.source, &entries) {
            let entry = &entries[idx];
            let dir = Self::cache_dir(&ctx, entry);

            if entry.dep_idx.is_some() {
                // Deps are re-expanded per occurrence; the engine fills
                // them from its per-run cache.
                return FetchReport::resolved(FetchResult::CopyDeps(idx), dir, Vec::new());
            }

            if !matches!(tokio::fs::try_exists(&dir).await, Ok(true)) {
                if let Err(e) = Self::materialize(&ctx, entry, &dir).await {
                    return FetchReport::explain(&ctx.tx, &dep.alias, e);
                }
            }
            return match read_dep_manifest(&dir).await {
                Ok(deps) => FetchReport::resolved(FetchResult::Rebind(idx), dir, deps),
                Err(e) => FetchReport::explain(&ctx.tx, &dep.alias, e),
            };
        }

        let entry = match Self::clone_fresh(&ctx, &git.url, git.reference.as_deref()).await {
            Ok(entry) => entry,
            Err(e) => return FetchReport::explain(&ctx.tx, &dep.alias, e),
        };
        let dir = Self::cache_dir(&ctx, &entry);

        match read_dep_manifest(&dir).await {
            Ok(deps) => FetchReport::resolved(FetchResult::New(entry), dir, deps),
            Err(e) => FetchReport::explain(&ctx.tx, &dep.alias, e),
        }
    }

    fn dep_idx(entry: &Self::Resolution) -> Option<usize> {
        entry.dep_idx
    }

    fn bind(entry: &mut Self::Resolution, dep_idx: usize) {
        entry.dep_idx = Some(dep_idx);
    }

    fn cache_basename(entry: &Self::Resolution) -> Option<String> {
        let commit = if entry.commit.len() >= 10 {
            &entry.commit[..10]
        } else {
            entry.commit.as_str()
        };
        Some(format!("{}-{commit}", repo_stem(&entry.url)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn repo_stems() {
        assert_eq!(repo_stem("https://github.com/truemedian/zfetch"), "zfetch");
        assert_eq!(repo_stem("https://example.com/a/b.git"), "b");
        assert_eq!(repo_stem("https://example.com/tail/"), "tail");
    }

    #[test]
    fn lock_line_round_trip() {
        let entry = GitResolution {
            url: "https://github.com/truemedian/zfetch".to_string(),
            reference: "v0.1.0".to_string(),
            commit: "0123456789abcdef0123456789abcdef01234567".to_string(),
            dep_idx: None,
        };
        let mut line = String::new();
        GitDriver::write_lock_line(&entry, &mut line);

        let mut fields = line.trim_end().split_whitespace();
        assert_eq!(fields.next(), Some("git"));
        let parsed = GitDriver::parse_lock_line(&mut fields).unwrap();
        assert_eq!(parsed, entry);
    }

    #[test]
    fn lock_line_requires_three_fields() {
        let mut tail = "https://example.com/repo main".split_whitespace();
        assert!(matches!(
            GitDriver::parse_lock_line(&mut tail),
            Err(LockfileError::MissingField { field: "commit" })
        ));
    }

    #[test]
    fn cache_basename_pins_short_commit() {
        let entry = GitResolution {
            url: "https://example.com/repo.git".to_string(),
            reference: "HEAD".to_string(),
            commit: "0123456789abcdef0123456789abcdef01234567".to_string(),
            dep_idx: None,
        };
        assert_eq!(
            GitDriver::cache_basename(&entry).unwrap(),
            "repo-0123456789"
        );
    }
}
