//! Single-archive HTTP GET written straight to a file.
//!
//! Transfers run blocking curl handles under `spawn_blocking`; the async
//! caller supplies a chunk callback for progress reporting and a cancellation
//! token that is checked inside the write path.

use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use curl::easy::Easy;
use tokio_util::sync::CancellationToken;

use crate::error::Cancelled;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);
// Abort if throughput drops below 1 KiB/s for 60s; keeps slow links alive
// without letting a dead transfer hang forever.
const LOW_SPEED_LIMIT: u32 = 1024;
const LOW_SPEED_TIME: Duration = Duration::from_secs(60);
const HARD_TIMEOUT: Duration = Duration::from_secs(3600);

/// Error from one transfer. Typed so the batch layer can tell cancellation
/// apart from real failures before converting to anyhow.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("curl: {0}")]
    Curl(#[from] curl::Error),
    /// Non-2xx response status.
    #[error("HTTP {0}")]
    Http(u32),
    #[error("write {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error(transparent)]
    Cancelled(#[from] Cancelled),
}

/// Download `url` into `dest`, reporting each received chunk's size through
/// `on_bytes`. Returns the number of bytes written.
pub async fn fetch_to_path(
    url: &str,
    dest: &Path,
    cancel: &CancellationToken,
    on_bytes: impl Fn(u64) + Send + 'static,
) -> Result<u64, FetchError> {
    let url = url.to_string();
    let dest = dest.to_path_buf();
    let cancel = cancel.clone();
    tokio::task::spawn_blocking(move || fetch_blocking(&url, &dest, &cancel, on_bytes))
        .await
        .unwrap_or_else(|e| panic!("fetch task panicked: {e:?}"))
}

fn fetch_blocking(
    url: &str,
    dest: &Path,
    cancel: &CancellationToken,
    on_bytes: impl Fn(u64),
) -> Result<u64, FetchError> {
    let mut file = File::create(dest).map_err(|e| FetchError::Io {
        path: dest.to_path_buf(),
        source: e,
    })?;

    let written = Arc::new(AtomicU64::new(0));
    let write_error: Arc<Mutex<Option<std::io::Error>>> = Arc::new(Mutex::new(None));

    let mut easy = Easy::new();
    easy.url(url)?;
    easy.follow_location(true)?;
    easy.connect_timeout(CONNECT_TIMEOUT)?;
    easy.low_speed_limit(LOW_SPEED_LIMIT)?;
    easy.low_speed_time(LOW_SPEED_TIME)?;
    easy.timeout(HARD_TIMEOUT)?;

    {
        let written_cb = Arc::clone(&written);
        let write_error_cb = Arc::clone(&write_error);
        let cancel_cb = cancel.clone();
        let mut transfer = easy.transfer();
        transfer.write_function(move |data| {
            if cancel_cb.is_cancelled() {
                // Short write makes curl abort with a write error.
                return Ok(0);
            }
            match file.write_all(data) {
                Ok(()) => {
                    let n = data.len() as u64;
                    written_cb.fetch_add(n, Ordering::Relaxed);
                    on_bytes(n);
                    Ok(data.len())
                }
                Err(e) => {
                    let _ = write_error_cb.lock().unwrap().replace(e);
                    Ok(0)
                }
            }
        })?;
        if let Err(e) = transfer.perform() {
            if e.is_write_error() {
                if cancel.is_cancelled() {
                    return Err(Cancelled::new(format!("downloading {url}")).into());
                }
                if let Some(io) = write_error.lock().unwrap().take() {
                    return Err(FetchError::Io {
                        path: dest.to_path_buf(),
                        source: io,
                    });
                }
            }
            return Err(FetchError::Curl(e));
        }
    }

    let code = easy.response_code()?;
    if !(200..300).contains(&code) {
        return Err(FetchError::Http(code));
    }

    Ok(written.load(Ordering::Relaxed))
}
