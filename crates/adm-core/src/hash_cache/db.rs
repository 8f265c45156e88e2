//! SQLite-backed storage for the content-hash cache.
//!
//! Connection setup and migration; lookups and upserts live in the parent
//! module.

use anyhow::Result;
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::{Pool, Sqlite};
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

/// Encode a filesystem path as a sqlite:// URI, percent-escaping the
/// characters that would break URI parsing.
fn sqlite_uri(path: &Path) -> String {
    let raw = path.to_string_lossy();
    let mut encoded = String::with_capacity(raw.len() + 8);
    for ch in raw.chars() {
        if matches!(ch, '%' | ' ' | '#' | '?' | '&') {
            let mut utf8 = [0u8; 4];
            for byte in ch.encode_utf8(&mut utf8).bytes() {
                encoded.push('%');
                encoded.push_str(&format!("{byte:02X}"));
            }
        } else {
            encoded.push(ch);
        }
    }
    format!("sqlite://{encoded}")
}

/// Handle to the on-disk content-hash cache.
///
/// The database file lives under the XDG state directory,
/// `~/.local/state/adm/hashes.db`.
#[derive(Clone)]
pub struct FileHashCache {
    pub(crate) pool: Pool<Sqlite>,
}

impl FileHashCache {
    /// Open (or create) the default cache database and run migrations.
    pub async fn open_default() -> Result<Self> {
        let state_dir = xdg::BaseDirectories::with_prefix("adm")?.get_state_home();
        tokio::fs::create_dir_all(&state_dir).await?;
        Self::open_at(state_dir.join("hashes.db")).await
    }

    /// Open (or create) the cache at a specific path, creating parent
    /// directories as needed. Used by tests to keep the cache in a temp dir.
    pub async fn open_at(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let uri = sqlite_uri(path) + "?mode=rwc";
        let pool = SqlitePoolOptions::new()
            .max_connections(8)
            .connect(&uri)
            .await?;
        let cache = FileHashCache { pool };
        cache.migrate().await?;
        Ok(cache)
    }

    async fn migrate(&self) -> Result<()> {
        // One row per file path; (size, mtime) decide staleness.
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS file_hashes (
                path TEXT PRIMARY KEY,
                size INTEGER NOT NULL,
                mtime INTEGER NOT NULL,
                sha256 TEXT NOT NULL,
                updated_at INTEGER NOT NULL
            );
            "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

/// Current time as Unix seconds, for the `updated_at` column.
pub(super) fn unix_timestamp() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs() as i64
}

#[cfg(test)]
/// Open an in-memory cache for tests (no disk I/O).
pub(super) async fn open_memory() -> Result<FileHashCache> {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await?;
    let cache = FileHashCache { pool };
    cache.migrate().await?;
    Ok(cache)
}
