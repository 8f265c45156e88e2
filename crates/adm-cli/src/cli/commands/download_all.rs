//! `adm download-all` – fetch every archive listed in the manifests.

use anyhow::Result;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use adm_core::batch::{self, BatchOptions};
use adm_core::config::AdmConfig;
use adm_core::hash_cache::FileHashCache;
use adm_core::manifest;
use adm_core::resource::Resource;

const PROGRESS_INTERVAL: Duration = Duration::from_secs(1);

pub async fn run_download_all(
    cfg: &AdmConfig,
    manifests: &[PathBuf],
    output: &Path,
    jobs: Option<usize>,
    limit: Option<usize>,
) -> Result<()> {
    let archives = manifest::load_manifests(manifests)?;
    if archives.is_empty() {
        println!("No archives to download.");
        return Ok(());
    }
    tracing::info!(count = archives.len(), "manifests loaded");

    let cache = FileHashCache::open_default().await?;
    let limiter = Resource::new(
        "downloads",
        jobs.unwrap_or(cfg.max_concurrent_downloads),
    );
    let cancel = CancellationToken::new();

    // Ctrl-C cancels pending admissions and in-flight transfers; already
    // finished archives stay on disk.
    let interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("interrupt received, cancelling batch");
            interrupt.cancel();
        }
    });

    // Periodic throughput line while the batch runs.
    let progress_stop = CancellationToken::new();
    let progress_handle = tokio::spawn({
        let limiter = limiter.clone();
        let stop = progress_stop.clone();
        async move {
            let mut ticker = tokio::time::interval(PROGRESS_INTERVAL);
            loop {
                tokio::select! {
                    _ = stop.cancelled() => break,
                    _ = ticker.tick() => {
                        let report = limiter.report();
                        if report.in_flight > 0 {
                            println!(
                                "  {} active  {:.2} MiB/s  {:.1} MiB total",
                                report.in_flight,
                                report.rate / 1_048_576.0,
                                report.total_processed as f64 / 1_048_576.0,
                            );
                        }
                    }
                }
            }
        }
    });

    let options = BatchOptions {
        max_downloads: limit.unwrap_or(cfg.max_downloads_per_run),
    };
    let result = batch::download_all(&cache, archives, output, &limiter, &cancel, &options).await;

    progress_stop.cancel();
    let _ = progress_handle.await;

    let summary = result?;
    println!(
        "Downloaded {} ({:.1} MiB), skipped {}, failed {}, cancelled {}.",
        summary.downloaded,
        summary.bytes_fetched as f64 / 1_048_576.0,
        summary.skipped,
        summary.failed,
        summary.cancelled,
    );
    Ok(())
}
