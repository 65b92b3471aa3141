//! Registry package source driver
//!
//! The registry is addressed over HTTPS: a JSON version index per
//! package plus one gzipped tarball per version. The base URL comes
//! from the PAKT_REGISTRY environment variable when set; the engine
//! itself never reads the environment.

use crate::archive::fetch_archive;
use crate::{FetchContext, FetchReport, FetchResult, SourceDriver};
use async_trait::async_trait;
use pakt_errors::{Error, LockfileError, SourceError};
use pakt_hash::Hash;
use pakt_manifest::read_dep_manifest;
use pakt_types::{Dependency, PkgSource, Source, SourceKind};
use semver::Version;
use serde::Deserialize;
use std::fmt::Write as _;
use std::path::PathBuf;
use std::str::SplitWhitespace;
use std::sync::Arc;

/// Default registry base URL
pub const DEFAULT_REGISTRY: &str = "https://pkgs.pakt.dev";

/// Lockfile entry for a registry package
#[derive(Debug, Clone, PartialEq)]
pub struct PkgResolution {
    pub user: String,
    pub name: String,
    pub version: Version,
    pub integrity: Hash,
    pub dep_idx: Option<usize>,
}

#[derive(Debug)]
pub struct PkgDriver;

/// Version index document served by the registry
#[derive(Debug, Deserialize)]
struct RegistryIndex {
    versions: Vec<String>,
}

fn registry_base() -> String {
    std::env::var("PAKT_REGISTRY").unwrap_or_else(|_| DEFAULT_REGISTRY.to_string())
}

impl PkgDriver {
    fn cache_dir(ctx: &FetchContext, entry: &PkgResolution) -> PathBuf {
        let basename = Self::cache_basename(entry).unwrap_or_default();
        ctx.cache_root.join(basename)
    }

    fn archive_url(base: &str, pkg: &PkgSource, version: &Version) -> String {
        format!("{base}/{}/{}/{version}/pkg.tar.gz", pkg.user, pkg.name)
    }

    /// Pick the highest indexed version satisfying the requested range.
    async fn select_version(ctx: &FetchContext, pkg: &PkgSource) -> Result<Version, Error> {
        let base = registry_base();
        let coords = format!("{}/{}", pkg.user, pkg.name);
        let index: RegistryIndex = ctx
            .net
            .get_json(&format!("{base}/{coords}/index.json"))
            .await?;

        index
            .versions
            .iter()
            .filter_map(|raw| Version::parse(raw).ok())
            .filter(|version| pkg.range.matches(version))
            .max()
            .ok_or_else(|| {
                SourceError::NoMatchingVersion {
                    package: coords,
                    range: pkg.range.to_string(),
                }
                .into()
            })
    }
}

#[async_trait]
impl SourceDriver for PkgDriver {
    const NAME: &'static str = "pkg";
    const KIND: SourceKind = SourceKind::Pkg;
    type Resolution = PkgResolution;

    fn parse_lock_line(
        fields: &mut SplitWhitespace<'_>,
    ) -> Result<Self::Resolution, LockfileError> {
        let user = fields
            .next()
            .ok_or(LockfileError::MissingField { field: "user" })?;
        let name = fields
            .next()
            .ok_or(LockfileError::MissingField { field: "name" })?;
        let version = fields
            .next()
            .ok_or(LockfileError::MissingField { field: "version" })?;
        let digest = fields
            .next()
            .ok_or(LockfileError::MissingField { field: "integrity" })?;
        if fields.next().is_some() {
            return Err(LockfileError::TrailingFields { field: "integrity" });
        }

        let version = Version::parse(version).map_err(|_| LockfileError::InvalidVersion {
            input: version.to_string(),
        })?;
        let integrity = Hash::parse(digest).map_err(|_| LockfileError::InvalidDigest {
            input: digest.to_string(),
        })?;

        Ok(PkgResolution {
            user: user.to_string(),
            name: name.to_string(),
            version,
            integrity,
            dep_idx: None,
        })
    }

    fn write_lock_line(entry: &Self::Resolution, out: &mut String) {
        let _ = writeln!(
            out,
            "pkg {} {} {} {}",
            entry.user, entry.name, entry.version, entry.integrity
        );
    }

    fn find_resolution(
        _ctx: &FetchContext,
        source: &Source,
        entries: &[Self::Resolution],
    ) -> Option<usize> {
        let Source::Pkg(pkg) = source else {
            return None;
        };
        entries.iter().position(|entry| {
            entry.user == pkg.user && entry.name == pkg.name && pkg.range.matches(&entry.version)
        })
    }

    async fn fetch(
        ctx: FetchContext,
        dep: Dependency,
        entries: Arc<Vec<Self::Resolution>>,
    ) -> FetchReport<Self::Resolution> {
        let Source::Pkg(ref pkg) = dep.source else {
            return FetchReport::failed(SourceError::FetchFailed {
                name: dep.alias,
                message: "descriptor is not a registry package".to_string(),
            });
        };

        if let Some(idx) = Self::find_resolution(&ctx, &dep.source, &entries) {
            let entry = &entries[idx];
            let dir = Self::cache_dir(&ctx, entry);

            if entry.dep_idx.is_some() {
                return FetchReport::resolved(FetchResult::UseExisting(idx), dir, Vec::new());
            }

            if !matches!(tokio::fs::try_exists(&dir).await, Ok(true)) {
                let url = Self::archive_url(&registry_base(), pkg, &entry.version);
                if let Err(e) =
                    fetch_archive(&ctx, &url, Some(&entry.integrity), &dep.alias, &dir).await
                {
                    return FetchReport::explain(&ctx.tx, &dep.alias, e);
                }
            }
            return match read_dep_manifest(&dir).await {
                Ok(deps) => FetchReport::resolved(FetchResult::Rebind(idx), dir, deps),
                Err(e) => FetchReport::explain(&ctx.tx, &dep.alias, e),
            };
        }

        let version = match Self::select_version(&ctx, pkg).await {
            Ok(version) => version,
            Err(e) => return FetchReport::explain(&ctx.tx, &dep.alias, e),
        };

        let entry = PkgResolution {
            user: pkg.user.clone(),
            name: pkg.name.clone(),
            version: version.clone(),
            integrity: Hash::from_data(b""),
            dep_idx: None,
        };
        let dir = Self::cache_dir(&ctx, &entry);
        let url = Self::archive_url(&registry_base(), pkg, &version);
        let integrity = match fetch_archive(&ctx, &url, None, &dep.alias, &dir).await {
            Ok(integrity) => integrity,
            Err(e) => return FetchReport::explain(&ctx.tx, &dep.alias, e),
        };
        let entry = PkgResolution { integrity, ..entry };

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
        Some(format!("{}-{}-{}", entry.user, entry.name, entry.version))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use semver::VersionReq;

    fn entry(user: &str, name: &str, version: &str) -> PkgResolution {
        PkgResolution {
            user: user.to_string(),
            name: name.to_string(),
            version: Version::parse(version).unwrap(),
            integrity: Hash::from_data(version.as_bytes()),
            dep_idx: None,
        }
    }

    fn descriptor(user: &str, name: &str, range: &str) -> Source {
        Source::Pkg(PkgSource {
            user: user.to_string(),
            name: name.to_string(),
            range: VersionReq::parse(range).unwrap(),
        })
    }

    #[test]
    fn lock_line_round_trip() {
        let entry = entry("nektro", "ini", "0.1.2");
        let mut line = String::new();
        PkgDriver::write_lock_line(&entry, &mut line);
        assert!(line.starts_with("pkg nektro ini 0.1.2 "));

        let mut fields = line.trim_end().split_whitespace();
        assert_eq!(fields.next(), Some("pkg"));
        let parsed = PkgDriver::parse_lock_line(&mut fields).unwrap();
        assert_eq!(parsed, entry);
    }

    #[test]
    fn lock_line_rejects_bad_version() {
        let digest = Hash::from_data(b"x");
        let tail = format!("nektro ini not-semver {digest}");
        let mut fields = tail.split_whitespace();
        assert!(matches!(
            PkgDriver::parse_lock_line(&mut fields),
            Err(LockfileError::InvalidVersion { .. })
        ));
    }

    #[test]
    fn find_resolution_respects_range() {
        let (tx, _rx) = pakt_events::channel();
        let ctx = FetchContext::new(
            pakt_net::NetClient::with_defaults().unwrap(),
            "/project",
            "/project/.pakt",
            tx,
        );
        let entries = vec![entry("nektro", "ini", "0.1.2"), entry("u", "other", "2.0.0")];

        assert_eq!(
            PkgDriver::find_resolution(&ctx, &descriptor("nektro", "ini", "^0.1"), &entries),
            Some(0)
        );
        // Same coordinates but an unsatisfiable range finds nothing.
        assert_eq!(
            PkgDriver::find_resolution(&ctx, &descriptor("nektro", "ini", "^1.0"), &entries),
            None
        );
    }

    #[test]
    fn cache_basename_uses_full_coordinates() {
        assert_eq!(
            PkgDriver::cache_basename(&entry("nektro", "ini", "0.1.2")).unwrap(),
            "nektro-ini-0.1.2"
        );
    }
}
