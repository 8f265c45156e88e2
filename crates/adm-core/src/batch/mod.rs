//! Batch download orchestration.
//!
//! Policy lives here, not in the combinators: deduplicate against the hash
//! cache, order by size so small archives land first, cap the run, and wrap
//! every download in its own error boundary so one failing archive never
//! aborts the batch.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use anyhow::{Context, Result};
use futures_util::StreamExt;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::checksum;
use crate::dispatch::ParallelDispatch;
use crate::error::Cancelled;
use crate::fetch::{self, FetchError};
use crate::hash_cache::FileHashCache;
use crate::manifest::Archive;
use crate::resource::Resource;

/// Caps for one `download_all` run.
#[derive(Debug, Clone)]
pub struct BatchOptions {
    /// Upper bound on archives fetched in one run.
    pub max_downloads: usize,
}

impl Default for BatchOptions {
    fn default() -> Self {
        Self {
            max_downloads: 6000,
        }
    }
}

/// Outcome counters for one run.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct BatchSummary {
    pub downloaded: usize,
    /// Archives not attempted: already on disk, duplicate hash, or over the
    /// run cap.
    pub skipped: usize,
    pub failed: usize,
    pub cancelled: usize,
    pub bytes_fetched: u64,
}

/// Sidecar written next to each downloaded archive.
#[derive(Debug, Serialize, Deserialize)]
pub struct MetaSidecar {
    pub name: String,
    pub url: String,
    pub size: u64,
    pub sha256: String,
}

#[derive(Default)]
struct Counters {
    downloaded: AtomicUsize,
    failed: AtomicUsize,
    cancelled: AtomicUsize,
    bytes: AtomicU64,
}

/// Download every archive not already present in `output_dir`.
///
/// Existing files are recognized by content hash through `cache`; remaining
/// archives are fetched smallest-first through `limiter`, each inside a local
/// error boundary that logs and continues. The summary's counters add up to
/// the input length, and the limiter drains to zero before this returns.
pub async fn download_all(
    cache: &FileHashCache,
    archives: Vec<Archive>,
    output_dir: &Path,
    limiter: &Resource,
    cancel: &CancellationToken,
    options: &BatchOptions,
) -> Result<BatchSummary> {
    tokio::fs::create_dir_all(output_dir)
        .await
        .with_context(|| format!("create output dir {}", output_dir.display()))?;

    let existing = hash_existing(cache, output_dir, limiter, cancel).await?;
    tracing::info!(known = existing.len(), "hashed existing files");

    let total = archives.len();
    let mut wanted: Vec<Archive> = archives
        .into_iter()
        .filter(|a| match &a.sha256 {
            Some(hash) => !existing.contains(&hash.to_ascii_lowercase()),
            None => true,
        })
        .collect();
    wanted.sort_by_key(|a| a.size);
    wanted.truncate(options.max_downloads);
    let skipped = total - wanted.len();

    let total_bytes: u64 = wanted.iter().map(|a| a.size).sum();
    tracing::info!(
        count = wanted.len(),
        total_bytes,
        skipped,
        "archives to download"
    );

    let counters = Arc::new(Counters::default());
    wanted
        .do_all(|archive| {
            let cache = cache.clone();
            let limiter = limiter.clone();
            let cancel = cancel.clone();
            let output_dir = output_dir.to_path_buf();
            let counters = Arc::clone(&counters);
            async move {
                match download_one(&cache, &limiter, &archive, &output_dir, &cancel).await {
                    Ok(bytes) => {
                        counters.downloaded.fetch_add(1, Ordering::Relaxed);
                        counters.bytes.fetch_add(bytes, Ordering::Relaxed);
                    }
                    Err(e) if is_cancelled(&e) => {
                        counters.cancelled.fetch_add(1, Ordering::Relaxed);
                        tracing::debug!(archive = %archive.name, "download cancelled");
                    }
                    Err(e) => {
                        counters.failed.fetch_add(1, Ordering::Relaxed);
                        tracing::error!(
                            archive = %archive.name,
                            error = format!("{e:#}"),
                            "download failed, continuing"
                        );
                    }
                }
            }
        })
        .await;

    Ok(BatchSummary {
        downloaded: counters.downloaded.load(Ordering::Relaxed),
        skipped,
        failed: counters.failed.load(Ordering::Relaxed),
        cancelled: counters.cancelled.load(Ordering::Relaxed),
        bytes_fetched: counters.bytes.load(Ordering::Relaxed),
    })
}

/// Hash everything already in `output_dir` (skipping staging and sidecar
/// files) so finished archives are not fetched again. Unreadable files are
/// logged and skipped rather than failing the run.
async fn hash_existing(
    cache: &FileHashCache,
    dir: &Path,
    limiter: &Resource,
    cancel: &CancellationToken,
) -> Result<HashSet<String>> {
    let mut paths = Vec::new();
    let mut entries = tokio::fs::read_dir(dir)
        .await
        .with_context(|| format!("read output dir {}", dir.display()))?;
    while let Some(entry) = entries.next_entry().await? {
        if !entry.file_type().await?.is_file() {
            continue;
        }
        let path = entry.path();
        if matches!(
            path.extension().and_then(|e| e.to_str()),
            Some("part") | Some("meta")
        ) {
            continue;
        }
        paths.push(path);
    }

    let hashes: HashSet<String> = paths
        .keep_all_limited(limiter, |path| {
            let cache = cache.clone();
            let cancel = cancel.clone();
            async move {
                tracing::info!(file = %path.display(), "hashing");
                match cache.hash_of(&path, &cancel).await {
                    Ok(hash) => Some(hash.to_ascii_lowercase()),
                    Err(e) => {
                        tracing::warn!(
                            file = %path.display(),
                            error = format!("{e:#}"),
                            "hash failed, skipping"
                        );
                        None
                    }
                }
            }
        })
        .collect()
        .await;
    Ok(hashes)
}

/// Fetch one archive: weighted admission, `.part` staging, digest check when
/// the manifest carries one, cache priming, `.meta` sidecar.
async fn download_one(
    cache: &FileHashCache,
    limiter: &Resource,
    archive: &Archive,
    output_dir: &Path,
    cancel: &CancellationToken,
) -> Result<u64> {
    let final_path = unique_destination(output_dir, &archive.name, archive.sha256.as_deref());
    let part_path = append_extension(&final_path, "part");

    tracing::info!(archive = %archive.name, size = archive.size, "downloading");
    let job = limiter.begin(&archive.name, archive.size, cancel).await?;
    let job = Arc::new(job);

    let reporter = Arc::clone(&job);
    let bytes = match fetch::fetch_to_path(&archive.url, &part_path, cancel, move |n| {
        reporter.report(n)
    })
    .await
    {
        Ok(bytes) => bytes,
        Err(e) => {
            let _ = tokio::fs::remove_file(&part_path).await;
            return Err(e.into());
        }
    };

    let digest = {
        let part = part_path.clone();
        let cancel = cancel.clone();
        tokio::task::spawn_blocking(move || checksum::sha256_path_cancellable(&part, &cancel))
            .await
            .context("hash task join")??
    };
    if let Some(expected) = &archive.sha256 {
        if !digest.eq_ignore_ascii_case(expected) {
            let _ = tokio::fs::remove_file(&part_path).await;
            anyhow::bail!(
                "digest mismatch for {}: expected {}, got {}",
                archive.name,
                expected,
                digest
            );
        }
    }

    tokio::fs::rename(&part_path, &final_path)
        .await
        .with_context(|| format!("move into place: {}", final_path.display()))?;
    cache.record(&final_path, &digest).await?;
    write_sidecar(&final_path, archive, &digest).await?;

    tracing::info!(archive = %archive.name, bytes, "downloaded");
    Ok(bytes)
}

fn is_cancelled(err: &anyhow::Error) -> bool {
    err.downcast_ref::<Cancelled>().is_some()
        || matches!(
            err.downcast_ref::<FetchError>(),
            Some(FetchError::Cancelled(_))
        )
}

/// Destination for an archive, appending a digest tag when the plain name is
/// taken by a different file.
fn unique_destination(dir: &Path, name: &str, sha256: Option<&str>) -> PathBuf {
    let candidate = dir.join(name);
    if !candidate.exists() {
        return candidate;
    }
    let path = Path::new(name);
    let stem = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or(name);
    let tag = sha256
        .map(|h| &h[..h.len().min(12)])
        .unwrap_or("dup");
    match path.extension().and_then(|e| e.to_str()) {
        Some(ext) => dir.join(format!("{stem}_{tag}.{ext}")),
        None => dir.join(format!("{stem}_{tag}")),
    }
}

/// `foo.zip` → `foo.zip.part` (with_extension would eat the real one).
fn append_extension(path: &Path, ext: &str) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".");
    name.push(ext);
    path.with_file_name(name)
}

async fn write_sidecar(final_path: &Path, archive: &Archive, digest: &str) -> Result<()> {
    let sidecar = MetaSidecar {
        name: archive.name.clone(),
        url: archive.url.clone(),
        size: archive.size,
        sha256: digest.to_string(),
    };
    let body = toml::to_string_pretty(&sidecar)?;
    let path = append_extension(final_path, "meta");
    tokio::fs::write(&path, body)
        .await
        .with_context(|| format!("write sidecar {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unique_destination_appends_digest_tag() {
        let dir = tempfile::tempdir().unwrap();
        let first = unique_destination(dir.path(), "mod.zip", Some("abcdef0123456789"));
        assert_eq!(first, dir.path().join("mod.zip"));

        std::fs::write(dir.path().join("mod.zip"), b"taken").unwrap();
        let second = unique_destination(dir.path(), "mod.zip", Some("abcdef0123456789"));
        assert_eq!(second, dir.path().join("mod_abcdef012345.zip"));

        let no_hash = unique_destination(dir.path(), "mod.zip", None);
        assert_eq!(no_hash, dir.path().join("mod_dup.zip"));
    }

    #[test]
    fn append_extension_keeps_the_original_one() {
        let path = Path::new("/downloads/mod.zip");
        assert_eq!(
            append_extension(path, "part"),
            Path::new("/downloads/mod.zip.part")
        );
        assert_eq!(
            append_extension(path, "meta"),
            Path::new("/downloads/mod.zip.meta")
        );
    }

    #[test]
    fn sidecar_round_trips_through_toml() {
        let sidecar = MetaSidecar {
            name: "mod.zip".into(),
            url: "https://example.com/mod.zip".into(),
            size: 42,
            sha256: "ab12".into(),
        };
        let body = toml::to_string_pretty(&sidecar).unwrap();
        let parsed: MetaSidecar = toml::from_str(&body).unwrap();
        assert_eq!(parsed.name, "mod.zip");
        assert_eq!(parsed.size, 42);
    }
}
