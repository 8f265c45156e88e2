//! `adm hash-dir` – hash every file in a directory through the cache.

use anyhow::Result;
use futures_util::StreamExt;
use std::path::Path;
use tokio_util::sync::CancellationToken;

use adm_core::config::AdmConfig;
use adm_core::dispatch::ParallelDispatch;
use adm_core::hash_cache::FileHashCache;
use adm_core::resource::Resource;

pub async fn run_hash_dir(cfg: &AdmConfig, dir: &Path) -> Result<()> {
    let cache = FileHashCache::open_default().await?;
    let limiter = Resource::new("hashing", cfg.max_concurrent_hashes);
    let cancel = CancellationToken::new();

    let mut paths = Vec::new();
    let mut entries = tokio::fs::read_dir(dir).await?;
    while let Some(entry) = entries.next_entry().await? {
        if entry.file_type().await?.is_file() {
            paths.push(entry.path());
        }
    }
    paths.sort();

    if paths.is_empty() {
        println!("No files in {}.", dir.display());
        return Ok(());
    }

    let results = paths.map_all_limited(&limiter, |path| {
        let cache = cache.clone();
        let cancel = cancel.clone();
        async move {
            let digest = cache.hash_of(&path, &cancel).await;
            (path, digest)
        }
    });
    tokio::pin!(results);

    let mut errors = 0usize;
    while let Some((path, digest)) = results.next().await {
        match digest {
            Ok(d) => println!("{}  {}", d, path.display()),
            Err(e) => {
                errors += 1;
                eprintln!("adm: {}: {:#}", path.display(), e);
            }
        }
    }

    if errors > 0 {
        anyhow::bail!("{errors} file(s) could not be hashed");
    }
    Ok(())
}
