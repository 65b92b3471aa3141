//! Download-and-extract helper shared by the url and pkg drivers

use crate::FetchContext;
use pakt_errors::{Error, SourceError};
use pakt_hash::Hash;
use std::path::Path;
use tokio::process::Command;

/// Download a gzipped tarball, hash it, optionally verify the digest,
/// and extract it into `dest`.
///
/// Returns the actual BLAKE3 digest of the archive.
pub(crate) async fn fetch_archive(
    ctx: &FetchContext,
    url: &str,
    expected: Option<&Hash>,
    name: &str,
    dest: &Path,
) -> Result<Hash, Error> {
    let staging = tempfile::NamedTempFile::new().map_err(Error::from)?;
    ctx.net.download_to(url, staging.path(), &ctx.tx).await?;

    let actual = Hash::hash_file(staging.path()).await?;
    if let Some(expected) = expected {
        if *expected != actual {
            return Err(SourceError::IntegrityMismatch {
                name: name.to_string(),
                expected: expected.as_hex().to_string(),
                actual: actual.as_hex().to_string(),
            }
            .into());
        }
    }

    extract_tarball(staging.path(), name, dest).await?;
    Ok(actual)
}

/// Extract a gzipped tarball into `dest`, creating it first.
pub(crate) async fn extract_tarball(archive: &Path, name: &str, dest: &Path) -> Result<(), Error> {
    tokio::fs::create_dir_all(dest)
        .await
        .map_err(|e| Error::io_with_path(&e, dest))?;

    let output = Command::new("tar")
        .arg("-xzf")
        .arg(archive)
        .arg("-C")
        .arg(dest)
        .output()
        .await?;

    if !output.status.success() {
        // Leave no half-extracted directory behind.
        let _ = tokio::fs::remove_dir_all(dest).await;
        return Err(SourceError::ExtractFailed {
            name: name.to_string(),
            detail: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        }
        .into());
    }

    Ok(())
}
