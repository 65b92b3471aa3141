#![deny(clippy::pedantic, unsafe_code)]
#![allow(clippy::module_name_repetitions)]

//! BLAKE3 integrity hashing for pakt
//!
//! Downloaded artifacts are identified and verified by their BLAKE3
//! digest. Hashes travel as lowercase hex strings in manifests and
//! lockfile lines.

use blake3::Hasher;
use pakt_errors::{Error, SourceError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use tokio::fs::File;
use tokio::io::AsyncReadExt;

/// Size of chunks for streaming hash computation
const CHUNK_SIZE: usize = 64 * 1024;

/// A BLAKE3 hash value
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Hash {
    hex: String,
}

impl Hash {
    /// Hash a byte slice
    #[must_use]
    pub fn from_data(data: &[u8]) -> Self {
        Self {
            hex: blake3::hash(data).to_hex().to_string(),
        }
    }

    /// Parse a lowercase hex digest
    ///
    /// # Errors
    ///
    /// Returns an error if the input is not a 64-character hex string.
    pub fn parse(input: &str) -> Result<Self, Error> {
        let valid = input.len() == 64 && input.bytes().all(|b| b.is_ascii_hexdigit());
        if !valid {
            return Err(SourceError::IntegrityMismatch {
                name: "digest".to_string(),
                expected: "64 hex characters".to_string(),
                actual: input.to_string(),
            }
            .into());
        }
        Ok(Self {
            hex: input.to_ascii_lowercase(),
        })
    }

    /// Hash a file in streaming chunks
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened or read.
    pub async fn hash_file(path: &Path) -> Result<Self, Error> {
        let mut file = File::open(path)
            .await
            .map_err(|e| Error::io_with_path(&e, path))?;
        let mut hasher = Hasher::new();
        let mut buf = vec![0u8; CHUNK_SIZE];

        loop {
            let n = file.read(&mut buf).await?;
            if n == 0 {
                break;
            }
            hasher.update(&buf[..n]);
        }

        Ok(Self {
            hex: hasher.finalize().to_hex().to_string(),
        })
    }

    /// The lowercase hex digest
    #[must_use]
    pub fn as_hex(&self) -> &str {
        &self.hex
    }

    /// A short prefix of the digest, used in cache directory names
    #[must_use]
    pub fn short(&self) -> &str {
        &self.hex[..10]
    }
}

impl fmt::Display for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.hex)
    }
}
