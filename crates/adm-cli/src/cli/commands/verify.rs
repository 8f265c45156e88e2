//! `adm verify` – compare on-disk archives against manifest digests.
//!
//! Verification is cheap per item (one hash) over potentially thousands of
//! archives, so it uses the batched dispatcher rather than a task per file.

use anyhow::{Context, Result};
use futures_util::StreamExt;
use std::path::{Path, PathBuf};

use adm_core::checksum;
use adm_core::config::AdmConfig;
use adm_core::dispatch::ParallelDispatch;
use adm_core::manifest;
use adm_core::resource::Resource;

#[derive(Debug)]
enum Outcome {
    Ok,
    Missing,
    Mismatch { expected: String, actual: String },
    Error(String),
}

pub async fn run_verify(cfg: &AdmConfig, manifest_path: &Path, dir: &Path) -> Result<()> {
    let manifest = manifest::load_manifest(manifest_path)?;
    let limiter = Resource::new("verify", cfg.max_concurrent_hashes);

    let entries: Vec<_> = manifest
        .archives
        .into_iter()
        .filter(|a| a.sha256.is_some())
        .collect();
    if entries.is_empty() {
        println!("Manifest carries no digests; nothing to verify.");
        return Ok(());
    }

    let dir_owned: PathBuf = dir.to_path_buf();
    let results = entries.map_all_batched(&limiter, move |archive| {
        let dir = dir_owned.clone();
        async move {
            let path = dir.join(&archive.name);
            let expected = archive.sha256.clone().unwrap_or_default();
            if !path.exists() {
                return (archive.name, Outcome::Missing);
            }
            let hashed = tokio::task::spawn_blocking({
                let path = path.clone();
                move || checksum::sha256_path(&path)
            })
            .await
            .context("hash task join");
            match hashed {
                Ok(Ok(actual)) if actual.eq_ignore_ascii_case(&expected) => {
                    (archive.name, Outcome::Ok)
                }
                Ok(Ok(actual)) => (archive.name, Outcome::Mismatch { expected, actual }),
                Ok(Err(e)) => (archive.name, Outcome::Error(format!("{e:#}"))),
                Err(e) => (archive.name, Outcome::Error(format!("{e:#}"))),
            }
        }
    });
    tokio::pin!(results);

    let mut ok = 0usize;
    let mut missing = 0usize;
    let mut bad = 0usize;
    while let Some((name, outcome)) = results.next().await {
        match outcome {
            Outcome::Ok => ok += 1,
            Outcome::Missing => {
                missing += 1;
                println!("MISSING  {name}");
            }
            Outcome::Mismatch { expected, actual } => {
                bad += 1;
                println!("BAD      {name}: expected {expected}, got {actual}");
            }
            Outcome::Error(e) => {
                bad += 1;
                println!("ERROR    {name}: {e}");
            }
        }
    }

    println!("{ok} ok, {missing} missing, {bad} bad.");
    if bad > 0 {
        anyhow::bail!("{bad} archive(s) failed verification");
    }
    Ok(())
}
