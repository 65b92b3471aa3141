//! Network-related error types

use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum NetworkError {
    #[error("request timed out: {url}")]
    Timeout { url: String },

    #[error("connection refused: {0}")]
    ConnectionRefused(String),

    #[error("download failed: {0}")]
    DownloadFailed(String),

    #[error("HTTP {status} from {url}")]
    HttpStatus { status: u16, url: String },

    #[error("rate limited, retry after {seconds}s")]
    RateLimited { seconds: u64 },

    #[error("invalid URL: {0}")]
    InvalidUrl(String),
}
