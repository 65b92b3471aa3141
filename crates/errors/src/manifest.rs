//! Project manifest error types

use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum ManifestError {
    #[error("manifest not found: {path}")]
    NotFound { path: String },

    #[error("manifest parse error: {message}")]
    Parse { message: String },

    #[error("dependency {alias} must name exactly one of pkg, local, url, git")]
    AmbiguousSource { alias: String },

    #[error("dependency {alias} names no source")]
    MissingSource { alias: String },

    #[error("dependency {alias} has invalid version requirement {input}")]
    InvalidVersionReq { alias: String, input: String },

    #[error("field {field} is not allowed on a {kind} dependency ({alias})")]
    FieldNotAllowed {
        alias: String,
        kind: &'static str,
        field: &'static str,
    },
}
