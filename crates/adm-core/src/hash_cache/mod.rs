//! On-disk content-hash cache.
//!
//! Maps file paths to SHA-256 digests keyed by (size, mtime), so unchanged
//! files are never re-read. The batch downloader uses it to skip archives
//! that are already on disk and to prime entries for files it just fetched.

mod db;

pub use db::FileHashCache;

use anyhow::{Context, Result};
use sqlx::Row;
use std::path::Path;
use std::time::UNIX_EPOCH;
use tokio_util::sync::CancellationToken;

use crate::checksum;

use self::db::unix_timestamp;

impl FileHashCache {
    /// Content hash of `path`, re-hashing only when the cached entry is
    /// missing or stale (size or mtime changed). Hashing runs on a blocking
    /// thread and observes `cancel` between chunks.
    pub async fn hash_of(&self, path: &Path, cancel: &CancellationToken) -> Result<String> {
        let meta = tokio::fs::metadata(path)
            .await
            .with_context(|| format!("stat {}", path.display()))?;
        let size = meta.len() as i64;
        let mtime = mtime_seconds(&meta);

        if let Some(hash) = self.lookup(path, size, mtime).await? {
            return Ok(hash);
        }

        let digest = {
            let path = path.to_path_buf();
            let cancel = cancel.clone();
            tokio::task::spawn_blocking(move || checksum::sha256_path_cancellable(&path, &cancel))
                .await
                .context("hash task join")??
        };
        self.store(path, size, mtime, &digest).await?;
        tracing::debug!(path = %path.display(), "hashed and cached");
        Ok(digest)
    }

    /// Prime the cache for a file whose digest is already known (e.g.
    /// verified right after a download) without re-reading it.
    pub async fn record(&self, path: &Path, digest: &str) -> Result<()> {
        let meta = tokio::fs::metadata(path)
            .await
            .with_context(|| format!("stat {}", path.display()))?;
        self.store(path, meta.len() as i64, mtime_seconds(&meta), digest)
            .await
    }

    async fn lookup(&self, path: &Path, size: i64, mtime: i64) -> Result<Option<String>> {
        let row = sqlx::query(
            r#"
            SELECT sha256 FROM file_hashes
            WHERE path = ?1 AND size = ?2 AND mtime = ?3
            "#,
        )
        .bind(path.to_string_lossy().into_owned())
        .bind(size)
        .bind(mtime)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(|r| r.get("sha256")))
    }

    async fn store(&self, path: &Path, size: i64, mtime: i64, digest: &str) -> Result<()> {
        sqlx::query(
            r#"
            INSERT OR REPLACE INTO file_hashes (path, size, mtime, sha256, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5)
            "#,
        )
        .bind(path.to_string_lossy().into_owned())
        .bind(size)
        .bind(mtime)
        .bind(digest.to_string())
        .bind(unix_timestamp())
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

fn mtime_seconds(meta: &std::fs::Metadata) -> i64 {
    meta.modified()
        .ok()
        .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Cancelled;

    #[tokio::test]
    async fn hash_of_caches_and_detects_changes() {
        let cache = db::open_memory().await.unwrap();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("file.bin");
        std::fs::write(&path, b"one").unwrap();

        let cancel = CancellationToken::new();
        let first = cache.hash_of(&path, &cancel).await.unwrap();
        let again = cache.hash_of(&path, &cancel).await.unwrap();
        assert_eq!(first, again);

        // Different length forces a re-hash even if mtime granularity hides
        // the rewrite.
        std::fs::write(&path, b"two!").unwrap();
        let changed = cache.hash_of(&path, &cancel).await.unwrap();
        assert_ne!(first, changed);
    }

    #[tokio::test]
    async fn record_primes_the_cache_without_rehashing() {
        let cache = db::open_memory().await.unwrap();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("file.bin");
        std::fs::write(&path, b"payload").unwrap();

        cache.record(&path, "feedface").await.unwrap();
        let got = cache
            .hash_of(&path, &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(got, "feedface");
    }

    #[tokio::test]
    async fn hash_of_propagates_cancellation() {
        let cache = db::open_memory().await.unwrap();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("file.bin");
        std::fs::write(&path, b"payload").unwrap();

        let cancel = CancellationToken::new();
        cancel.cancel();
        let err = cache.hash_of(&path, &cancel).await.unwrap_err();
        assert!(err.downcast_ref::<Cancelled>().is_some());
    }
}
