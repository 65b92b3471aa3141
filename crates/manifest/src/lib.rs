#![deny(clippy::pedantic, unsafe_code)]
#![allow(clippy::module_name_repetitions)]

//! Project manifest handling for pakt
//!
//! This crate defines the `pakt.toml` format and converts its raw
//! dependency tables into typed [`Dependency`] values. The same loader
//! reads the manifests of fetched dependencies during transitive
//! discovery; only their `[deps]` table matters there.

use pakt_errors::{Error, ManifestError};
use pakt_types::{Dependency, GitSource, LocalSource, PkgSource, Source, UrlSource};
use semver::VersionReq;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Manifest file name, both for projects and fetched dependencies
pub const MANIFEST_FILE: &str = "pakt.toml";

/// Default root file for exported packages that do not name one
pub const DEFAULT_ROOT: &str = "src/main.zig";

/// A loaded project: the engine's view of `pakt.toml`
#[derive(Debug, Clone)]
pub struct Project {
    pub name: String,
    pub deps: Vec<Dependency>,
    pub build_deps: Vec<Dependency>,
    /// Exported sub-packages, in map order
    pub packages: BTreeMap<String, ExportedPackage>,
}

/// An exported sub-package entry
#[derive(Debug, Clone, Default)]
pub struct ExportedPackage {
    pub root: Option<PathBuf>,
}

impl Project {
    /// Parse a project from manifest text
    ///
    /// # Errors
    ///
    /// Returns an error if the TOML is malformed or a dependency table
    /// does not name exactly one source.
    pub fn from_toml(text: &str) -> Result<Self, Error> {
        let raw: RawManifest = toml::from_str(text).map_err(|e| ManifestError::Parse {
            message: e.to_string(),
        })?;
        raw.into_project()
    }

    /// Load a project from a manifest file
    ///
    /// # Errors
    ///
    /// Returns an error if the file is missing or unreadable, or if
    /// parsing fails.
    pub async fn load(path: &Path) -> Result<Self, Error> {
        let text = tokio::fs::read_to_string(path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ManifestError::NotFound {
                    path: path.display().to_string(),
                }
                .into()
            } else {
                Error::io_with_path(&e, path)
            }
        })?;
        Self::from_toml(&text)
    }
}

/// Read the dependency list of a fetched package.
///
/// A missing manifest means the package simply has no declared
/// dependencies; that is not an error.
///
/// # Errors
///
/// Returns an error if a manifest exists but cannot be read or parsed.
pub async fn read_dep_manifest(dir: &Path) -> Result<Vec<Dependency>, Error> {
    let path = dir.join(MANIFEST_FILE);
    let text = match tokio::fs::read_to_string(&path).await {
        Ok(text) => text,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(Error::io_with_path(&e, &path)),
    };
    Ok(Project::from_toml(&text)?.deps)
}

/// Raw serde shape of pakt.toml
#[derive(Debug, Deserialize)]
struct RawManifest {
    project: RawProject,
    #[serde(default)]
    deps: BTreeMap<String, RawDep>,
    #[serde(default)]
    build_deps: BTreeMap<String, RawDep>,
    #[serde(default)]
    packages: BTreeMap<String, RawPackage>,
}

#[derive(Debug, Deserialize)]
struct RawProject {
    name: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawDep {
    pkg: Option<String>,
    version: Option<String>,
    local: Option<PathBuf>,
    url: Option<String>,
    integrity: Option<String>,
    git: Option<String>,
    #[serde(rename = "ref")]
    reference: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawPackage {
    root: Option<PathBuf>,
}

impl RawManifest {
    fn into_project(self) -> Result<Project, Error> {
        let deps = convert_deps(self.deps)?;
        let build_deps = convert_deps(self.build_deps)?;
        let packages = self
            .packages
            .into_iter()
            .map(|(name, raw)| (name, ExportedPackage { root: raw.root }))
            .collect();

        Ok(Project {
            name: self.project.name,
            deps,
            build_deps,
            packages,
        })
    }
}

fn convert_deps(raw: BTreeMap<String, RawDep>) -> Result<Vec<Dependency>, Error> {
    raw.into_iter()
        .map(|(alias, spec)| {
            let source = convert_source(&alias, spec)?;
            Ok(Dependency { alias, source })
        })
        .collect()
}

fn convert_source(alias: &str, spec: RawDep) -> Result<Source, Error> {
    match (spec.pkg, spec.local, spec.url, spec.git) {
        (Some(coords), None, None, None) => {
            reject_field(alias, "pkg", "integrity", spec.integrity.is_some())?;
            reject_field(alias, "pkg", "ref", spec.reference.is_some())?;

            let (user, name) = coords.split_once('/').ok_or_else(|| ManifestError::Parse {
                message: format!("pkg coordinates for {alias} must look like user/name"),
            })?;
            let input = spec.version.unwrap_or_else(|| "*".to_string());
            let range =
                VersionReq::parse(&input).map_err(|_| ManifestError::InvalidVersionReq {
                    alias: alias.to_string(),
                    input,
                })?;
            Ok(Source::Pkg(PkgSource {
                user: user.to_string(),
                name: name.to_string(),
                range,
            }))
        }
        (None, Some(path), None, None) => {
            reject_field(alias, "local", "version", spec.version.is_some())?;
            reject_field(alias, "local", "integrity", spec.integrity.is_some())?;
            reject_field(alias, "local", "ref", spec.reference.is_some())?;
            Ok(Source::Local(LocalSource { path }))
        }
        (None, None, Some(url), None) => {
            reject_field(alias, "url", "version", spec.version.is_some())?;
            reject_field(alias, "url", "ref", spec.reference.is_some())?;
            Ok(Source::Url(UrlSource {
                url,
                integrity: spec.integrity,
            }))
        }
        (None, None, None, Some(url)) => {
            reject_field(alias, "git", "version", spec.version.is_some())?;
            reject_field(alias, "git", "integrity", spec.integrity.is_some())?;
            Ok(Source::Git(GitSource {
                url,
                reference: spec.reference,
            }))
        }
        (None, None, None, None) => Err(ManifestError::MissingSource {
            alias: alias.to_string(),
        }
        .into()),
        _ => Err(ManifestError::AmbiguousSource {
            alias: alias.to_string(),
        }
        .into()),
    }
}

fn reject_field(
    alias: &str,
    kind: &'static str,
    field: &'static str,
    present: bool,
) -> Result<(), Error> {
    if present {
        return Err(ManifestError::FieldNotAllowed {
            alias: alias.to_string(),
            kind,
            field,
        }
        .into());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pakt_types::SourceKind;

    const FULL: &str = r#"
[project]
name = "myapp"

[deps]
ini = { pkg = "nektro/ini", version = "^0.1" }
args = { url = "https://example.com/args.tar.gz" }
zfetch = { git = "https://github.com/truemedian/zfetch", ref = "v0.1.0" }
mylib = { local = "libs/mylib" }

[build_deps]
gen = { pkg = "tools/gen" }

[packages]
myapp = { root = "src/lib.zig" }
extra = {}
"#;

    #[test]
    fn parses_all_source_kinds() {
        let project = Project::from_toml(FULL).unwrap();
        assert_eq!(project.name, "myapp");
        assert_eq!(project.deps.len(), 4);
        assert_eq!(project.build_deps.len(), 1);

        // BTreeMap order: args, ini, mylib, zfetch
        let kinds: Vec<_> = project.deps.iter().map(|d| d.source.kind()).collect();
        assert_eq!(
            kinds,
            [
                SourceKind::Url,
                SourceKind::Pkg,
                SourceKind::Local,
                SourceKind::Git
            ]
        );
    }

    #[test]
    fn pkg_version_defaults_to_any() {
        let project = Project::from_toml(FULL).unwrap();
        let gen = &project.build_deps[0];
        match &gen.source {
            Source::Pkg(pkg) => {
                assert_eq!(pkg.user, "tools");
                assert_eq!(pkg.name, "gen");
                assert!(pkg.range.matches(&semver::Version::new(99, 0, 0)));
            }
            other => panic!("unexpected source: {other:?}"),
        }
    }

    #[test]
    fn exported_package_roots() {
        let project = Project::from_toml(FULL).unwrap();
        assert_eq!(
            project.packages["myapp"].root.as_deref(),
            Some(Path::new("src/lib.zig"))
        );
        assert!(project.packages["extra"].root.is_none());
    }

    #[test]
    fn rejects_ambiguous_and_missing_sources() {
        let ambiguous = r#"
[project]
name = "x"
[deps]
a = { pkg = "u/a", local = "here" }
"#;
        assert!(matches!(
            Project::from_toml(ambiguous),
            Err(Error::Manifest(ManifestError::AmbiguousSource { .. }))
        ));

        let missing = r#"
[project]
name = "x"
[deps]
a = { version = "1.0" }
"#;
        assert!(matches!(
            Project::from_toml(missing),
            Err(Error::Manifest(ManifestError::MissingSource { .. }))
        ));
    }

    #[test]
    fn rejects_misplaced_fields() {
        let bad = r#"
[project]
name = "x"
[deps]
a = { git = "https://example.com/a", integrity = "deadbeef" }
"#;
        assert!(matches!(
            Project::from_toml(bad),
            Err(Error::Manifest(ManifestError::FieldNotAllowed { .. }))
        ));
    }
}
