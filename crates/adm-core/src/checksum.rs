//! Content hashing (SHA-256) for the hash cache and verification.
//!
//! Hashing runs off the download hot path; files are read in chunks to keep
//! memory bounded even for multi-gigabyte archives.

use anyhow::{Context, Result};
use sha2::{Digest, Sha256};
use std::fs::File;
use std::io::Read;
use std::path::Path;
use tokio_util::sync::CancellationToken;

use crate::error::Cancelled;

const BUF_SIZE: usize = 64 * 1024;

/// Compute SHA-256 of a file and return the digest as lowercase hex.
pub fn sha256_path(path: &Path) -> Result<String> {
    sha256_path_cancellable(path, &CancellationToken::new())
}

/// Like [`sha256_path`] but checks `cancel` between chunks, so hashing a
/// large archive can be abandoned promptly.
pub fn sha256_path_cancellable(path: &Path, cancel: &CancellationToken) -> Result<String> {
    let mut f = File::open(path).with_context(|| format!("open {}", path.display()))?;
    let mut hasher = Sha256::new();
    let mut buf = [0u8; BUF_SIZE];
    loop {
        if cancel.is_cancelled() {
            return Err(Cancelled::new(format!("hashing {}", path.display())).into());
        }
        let n = f
            .read(&mut buf)
            .with_context(|| format!("read {}", path.display()))?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(hex::encode(hasher.finalize()))
}
