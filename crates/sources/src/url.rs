//! Remote tarball source driver
//!
//! Artifacts are gzipped tarballs addressed by URL. The BLAKE3 digest
//! of the archive identifies the cached extraction; a digest declared
//! in the manifest is verified on first fetch, and the digest recorded
//! in the lockfile is verified whenever a stale entry has to be
//! re-materialized.

use crate::archive::fetch_archive;
use crate::{FetchContext, FetchReport, FetchResult, SourceDriver};
use async_trait::async_trait;
use pakt_errors::{LockfileError, SourceError};
use pakt_hash::Hash;
use pakt_manifest::read_dep_manifest;
use pakt_types::{Dependency, Source, SourceKind};
use std::fmt::Write as _;
use std::path::PathBuf;
use std::str::SplitWhitespace;
use std::sync::Arc;

/// Lockfile entry for a url dependency
#[derive(Debug, Clone, PartialEq)]
pub struct UrlResolution {
    pub url: String,
    pub integrity: Hash,
    pub dep_idx: Option<usize>,
}

#[derive(Debug)]
pub struct UrlDriver;

/// Last path segment of a URL with common archive suffixes removed
fn url_stem(url: &str) -> &str {
    let tail = url.rsplit('/').next().unwrap_or(url);
    let stem = tail
        .trim_end_matches(".tar.gz")
        .trim_end_matches(".tgz")
        .trim_end_matches(".tar");
    if stem.is_empty() {
        "pkg"
    } else {
        stem
    }
}

impl UrlDriver {
    fn cache_dir(ctx: &FetchContext, entry: &UrlResolution) -> PathBuf {
        // cache_basename is always Some for this driver
        let basename = Self::cache_basename(entry).unwrap_or_default();
        ctx.cache_root.join(basename)
    }
}

#[async_trait]
impl SourceDriver for UrlDriver {
    const NAME: &'static str = "url";
    const KIND: SourceKind = SourceKind::Url;
    type Resolution = UrlResolution;

    fn parse_lock_line(
        fields: &mut SplitWhitespace<'_>,
    ) -> Result<Self::Resolution, LockfileError> {
        let url = fields
            .next()
            .ok_or(LockfileError::MissingField { field: "url" })?;
        let digest = fields
            .next()
            .ok_or(LockfileError::MissingField { field: "integrity" })?;
        if fields.next().is_some() {
            return Err(LockfileError::TrailingFields { field: "integrity" });
        }
        let integrity = Hash::parse(digest).map_err(|_| LockfileError::InvalidDigest {
            input: digest.to_string(),
        })?;
        Ok(UrlResolution {
            url: url.to_string(),
            integrity,
            dep_idx: None,
        })
    }

    fn write_lock_line(entry: &Self::Resolution, out: &mut String) {
        let _ = writeln!(out, "url {} {}", entry.url, entry.integrity);
    }

    fn find_resolution(
        _ctx: &FetchContext,
        source: &Source,
        entries: &[Self::Resolution],
    ) -> Option<usize> {
        let Source::Url(url) = source else {
            return None;
        };
        entries.iter().position(|entry| entry.url == url.url)
    }

    async fn fetch(
        ctx: FetchContext,
        dep: Dependency,
        entries: Arc<Vec<Self::Resolution>>,
    ) -> FetchReport<Self::Resolution> {
        let Source::Url(ref url) = dep.source else {
            return FetchReport::failed(SourceError::FetchFailed {
                name: dep.alias,
                message: "descriptor is not a url".to_string(),
            });
        };

        if let Some(idx) = Self::find_resolution(&ctx, &dep.source, &entries) {
            let entry = &entries[idx];
            let dir = Self::cache_dir(&ctx, entry);

            if entry.dep_idx.is_some() {
                return FetchReport::resolved(FetchResult::UseExisting(idx), dir, Vec::new());
            }

            // Stale entry: the cached extraction may have been GC'd or
            // deleted out from under us since the last run.
            if !matches!(tokio::fs::try_exists(&dir).await, Ok(true)) {
                if let Err(e) =
                    fetch_archive(&ctx, &entry.url, Some(&entry.integrity), &dep.alias, &dir).await
                {
                    return FetchReport::explain(&ctx.tx, &dep.alias, e);
                }
            }
            return match read_dep_manifest(&dir).await {
                Ok(deps) => FetchReport::resolved(FetchResult::Rebind(idx), dir, deps),
                Err(e) => FetchReport::explain(&ctx.tx, &dep.alias, e),
            };
        }

        let declared = match url.integrity.as_deref().map(Hash::parse).transpose() {
            Ok(declared) => declared,
            Err(e) => return FetchReport::explain(&ctx.tx, &dep.alias, e),
        };

        // Digest is not known until the archive is on disk, so stage
        // the extraction in a scratch directory and rename into place.
        if let Err(e) = tokio::fs::create_dir_all(&ctx.cache_root).await {
            return FetchReport::explain(&ctx.tx, &dep.alias, pakt_errors::Error::io_with_path(&e, &ctx.cache_root));
        }
        let staging = match tempfile::tempdir_in(&ctx.cache_root) {
            Ok(staging) => staging,
            Err(e) => return FetchReport::explain(&ctx.tx, &dep.alias, pakt_errors::Error::from(e)),
        };
        let integrity = match fetch_archive(
            &ctx,
            &url.url,
            declared.as_ref(),
            &dep.alias,
            staging.path(),
        )
        .await
        {
            Ok(integrity) => integrity,
            Err(e) => return FetchReport::explain(&ctx.tx, &dep.alias, e),
        };

        let entry = UrlResolution {
            url: url.url.clone(),
            integrity,
            dep_idx: None,
        };
        let dir = Self::cache_dir(&ctx, &entry);
        let _ = tokio::fs::remove_dir_all(&dir).await;
        if let Err(e) = tokio::fs::rename(staging.path(), &dir).await {
            return FetchReport::explain(&ctx.tx, &dep.alias, pakt_errors::Error::io_with_path(&e, &dir));
        }

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
        Some(format!(
            "{}-{}",
            url_stem(&entry.url),
            entry.integrity.short()
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn url_stems() {
        assert_eq!(url_stem("https://example.com/a/args.tar.gz"), "args");
        assert_eq!(url_stem("https://example.com/lib.tgz"), "lib");
        assert_eq!(url_stem("https://example.com/"), "pkg");
    }

    #[test]
    fn lock_line_round_trip() {
        let entry = UrlResolution {
            url: "https://example.com/args.tar.gz".to_string(),
            integrity: Hash::from_data(b"archive"),
            dep_idx: None,
        };
        let mut line = String::new();
        UrlDriver::write_lock_line(&entry, &mut line);

        let mut fields = line.trim_end().split_whitespace();
        assert_eq!(fields.next(), Some("url"));
        let parsed = UrlDriver::parse_lock_line(&mut fields).unwrap();
        assert_eq!(parsed, entry);
    }

    #[test]
    fn lock_line_rejects_bad_digest() {
        let mut tail = "https://example.com/a.tar.gz nothex".split_whitespace();
        assert!(matches!(
            UrlDriver::parse_lock_line(&mut tail),
            Err(LockfileError::InvalidDigest { .. })
        ));
    }

    #[test]
    fn cache_basename_is_stem_plus_digest() {
        let entry = UrlResolution {
            url: "https://example.com/args.tar.gz".to_string(),
            integrity: Hash::from_data(b"archive"),
            dep_idx: None,
        };
        let basename = UrlDriver::cache_basename(&entry).unwrap();
        assert!(basename.starts_with("args-"));
        assert_eq!(basename.len(), "args-".len() + 10);
    }
}
