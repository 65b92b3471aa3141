//! Dependency source descriptors

use semver::VersionReq;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// A declared requirement on another package.
///
/// The alias is the local name by which the dependent refers to the
/// package; it is unique only within a single parent's dependency list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dependency {
    pub alias: String,
    pub source: Source,
}

impl Dependency {
    pub fn new(alias: impl Into<String>, source: Source) -> Self {
        Self {
            alias: alias.into(),
            source,
        }
    }
}

/// Tagged source descriptor over the fixed set of source kinds
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Source {
    Pkg(PkgSource),
    Local(LocalSource),
    Url(UrlSource),
    Git(GitSource),
}

impl Source {
    #[must_use]
    pub fn kind(&self) -> SourceKind {
        match self {
            Self::Pkg(_) => SourceKind::Pkg,
            Self::Local(_) => SourceKind::Local,
            Self::Url(_) => SourceKind::Url,
            Self::Git(_) => SourceKind::Git,
        }
    }
}

/// Registry package coordinates plus the requested version range
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PkgSource {
    pub user: String,
    pub name: String,
    pub range: VersionReq,
}

/// Filesystem path, resolved against the project root at fetch time
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalSource {
    pub path: PathBuf,
}

/// Remote gzipped tarball with an optional declared BLAKE3 integrity
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UrlSource {
    pub url: String,
    pub integrity: Option<String>,
}

/// Version-controlled repository with an optional branch or tag
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GitSource {
    pub url: String,
    pub reference: Option<String>,
}

/// Source tags; the discriminant set is closed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    Pkg,
    Local,
    Url,
    Git,
}

impl SourceKind {
    /// All source kinds, in the fixed serialization order
    pub const ALL: [Self; 4] = [Self::Pkg, Self::Local, Self::Url, Self::Git];

    /// The tag string used in lockfile lines and manifests
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::Pkg => "pkg",
            Self::Local => "local",
            Self::Url => "url",
            Self::Git => "git",
        }
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_matches_variant() {
        let dep = Dependency::new(
            "ini",
            Source::Pkg(PkgSource {
                user: "nektro".to_string(),
                name: "ini".to_string(),
                range: VersionReq::parse("^0.1").unwrap(),
            }),
        );
        assert_eq!(dep.source.kind(), SourceKind::Pkg);
        assert_eq!(dep.source.kind().to_string(), "pkg");
    }

    #[test]
    fn all_kinds_are_distinct_tags() {
        let names: Vec<_> = SourceKind::ALL.iter().map(|k| k.name()).collect();
        assert_eq!(names, ["pkg", "local", "url", "git"]);
    }
}
