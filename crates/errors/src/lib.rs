#![deny(clippy::pedantic, unsafe_code)]
#![allow(clippy::module_name_repetitions)]

//! Error types for the pakt package manager
//!
//! This crate provides fine-grained error types organized by domain.
//! All error types implement Clone so they can travel through worker
//! reports and event payloads.

use thiserror::Error;

pub mod lockfile;
pub mod manifest;
pub mod network;
pub mod source;

// Re-export all error types at the root
pub use lockfile::LockfileError;
pub use manifest::ManifestError;
pub use network::NetworkError;
pub use source::SourceError;

/// Generic error type for cross-crate boundaries
#[derive(Debug, Clone, Error)]
pub enum Error {
    #[error("network error: {0}")]
    Network(#[from] NetworkError),

    #[error("source error: {0}")]
    Source(#[from] SourceError),

    #[error("lockfile error: {0}")]
    Lockfile(#[from] LockfileError),

    #[error("manifest error: {0}")]
    Manifest(#[from] ManifestError),

    /// The failure has already been reported to the user in full.
    /// Callers must propagate the abort without emitting another
    /// diagnostic for it.
    #[error("operation aborted")]
    Explained,

    #[error("internal error: {0}")]
    Internal(String),

    #[error("I/O error: {message}")]
    Io {
        kind: std::io::ErrorKind,
        message: String,
        path: Option<std::path::PathBuf>,
    },
}

impl Error {
    /// Create an internal error with a message
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Create an Io error with an associated path
    pub fn io_with_path(err: &std::io::Error, path: impl Into<std::path::PathBuf>) -> Self {
        Self::Io {
            kind: err.kind(),
            message: err.to_string(),
            path: Some(path.into()),
        }
    }

    /// True for the marker kind that has already been user-communicated
    #[must_use]
    pub fn is_explained(&self) -> bool {
        matches!(self, Self::Explained)
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Self::Io {
            kind: err.kind(),
            message: err.to_string(),
            path: None,
        }
    }
}

/// Result type alias for pakt operations
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explained_is_detected_through_conversions() {
        let err = Error::Explained;
        assert!(err.is_explained());
        assert!(!Error::internal("boom").is_explained());
    }

    #[test]
    fn io_error_keeps_kind_and_path() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err = Error::io_with_path(&io, "/tmp/x");
        match err {
            Error::Io { kind, path, .. } => {
                assert_eq!(kind, std::io::ErrorKind::NotFound);
                assert_eq!(path.unwrap(), std::path::PathBuf::from("/tmp/x"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
