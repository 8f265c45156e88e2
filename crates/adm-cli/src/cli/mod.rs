//! CLI for the ADM batch archive downloader.

mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use adm_core::config;

use commands::{run_download_all, run_hash_dir, run_verify};

/// Top-level CLI for the ADM batch archive downloader.
#[derive(Debug, Parser)]
#[command(name = "adm")]
#[command(about = "ADM: resource-bounded batch archive downloader", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: CliCommand,
}

#[derive(Debug, Subcommand)]
pub enum CliCommand {
    /// Download every archive named by the given manifests.
    DownloadAll {
        /// Manifest files (JSON); archives are deduplicated by content hash.
        #[arg(required = true)]
        manifests: Vec<PathBuf>,

        /// Output folder for downloaded archives.
        #[arg(short, long)]
        output: PathBuf,

        /// Run up to N downloads concurrently (defaults to the configured limit).
        #[arg(long, value_name = "N")]
        jobs: Option<usize>,

        /// Cap the number of archives fetched this run.
        #[arg(long, value_name = "N")]
        limit: Option<usize>,
    },

    /// Hash every file in a directory through the content-hash cache.
    HashDir {
        /// Directory to scan.
        dir: PathBuf,
    },

    /// Re-hash downloaded archives and compare against manifest digests.
    Verify {
        /// Manifest file (JSON) carrying expected digests.
        manifest: PathBuf,

        /// Directory containing the downloaded archives.
        dir: PathBuf,
    },
}

impl CliCommand {
    pub async fn run_from_args() -> Result<()> {
        let cli = Cli::parse();
        let cfg = config::load_or_init()?;
        tracing::debug!("loaded config: {:?}", cfg);

        match cli.command {
            CliCommand::DownloadAll {
                manifests,
                output,
                jobs,
                limit,
            } => run_download_all(&cfg, &manifests, &output, jobs, limit).await?,
            CliCommand::HashDir { dir } => run_hash_dir(&cfg, &dir).await?,
            CliCommand::Verify { manifest, dir } => run_verify(&cfg, &manifest, &dir).await?,
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests;
