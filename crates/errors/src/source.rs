//! Errors reported by the dependency source drivers
//!
//! Worker failures are carried in-band inside fetch reports, so every
//! variant here is Clone and self-contained.

use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum SourceError {
    #[error("local dependency path does not exist: {path}")]
    LocalPathMissing { path: String },

    #[error("registry index for {package} is malformed: {message}")]
    RegistryIndexMalformed { package: String, message: String },

    #[error("no version of {package} satisfies {range}")]
    NoMatchingVersion { package: String, range: String },

    #[error("integrity mismatch for {name}: expected {expected}, got {actual}")]
    IntegrityMismatch {
        name: String,
        expected: String,
        actual: String,
    },

    #[error("git {operation} failed for {url}: {detail}")]
    GitFailed {
        operation: String,
        url: String,
        detail: String,
    },

    #[error("failed to extract archive for {name}: {detail}")]
    ExtractFailed { name: String, detail: String },

    #[error("dependency manifest at {path} is invalid: {message}")]
    DepManifestInvalid { path: String, message: String },

    #[error("dependency cycle through {alias}")]
    DependencyCycle { alias: String },

    #[error("fetch failed for {name}: {message}")]
    FetchFailed { name: String, message: String },
}
