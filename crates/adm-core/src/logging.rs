//! Logging init: file under XDG state dir, or graceful fallback to stderr.

use anyhow::Result;
use std::fs::{self, OpenOptions};
use std::sync::Mutex;
use tracing_subscriber::EnvFilter;

const DEFAULT_FILTER: &str = "info,adm_core=debug,adm_cli=debug";

/// Initialize structured logging to `~/.local/state/adm/adm.log`.
/// On failure (e.g. log dir unwritable), returns Err so the caller can fall
/// back to [`init_stderr`].
pub fn init_file() -> Result<()> {
    let state_dir = xdg::BaseDirectories::with_prefix("adm")?.get_state_home();
    fs::create_dir_all(&state_dir)?;
    let log_path = state_dir.join("adm.log");

    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)?;

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .init();

    tracing::info!("adm logging initialized at {}", log_path.display());

    Ok(())
}

/// Initialize logging to stderr only (no file). Use when [`init_file`] fails
/// so the CLI doesn't crash.
pub fn init_stderr() {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();
}
