//! Lockfile parsing error types

use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum LockfileError {
    #[error("unknown source tag: {tag}")]
    UnknownSource { tag: String },

    #[error("missing field: {field}")]
    MissingField { field: &'static str },

    #[error("invalid version: {input}")]
    InvalidVersion { input: String },

    #[error("invalid digest: {input}")]
    InvalidDigest { input: String },

    #[error("trailing fields after {field}")]
    TrailingFields { field: &'static str },
}

impl LockfileError {
    /// Short kind name used in warn-and-drop diagnostics
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::UnknownSource { .. } => "UnknownSource",
            Self::MissingField { .. } => "MissingField",
            Self::InvalidVersion { .. } => "InvalidVersion",
            Self::InvalidDigest { .. } => "InvalidDigest",
            Self::TrailingFields { .. } => "TrailingFields",
        }
    }
}
