//! Scoped slot lease with guaranteed release.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::OwnedSemaphorePermit;

use super::ResourceInner;

/// Progress bookkeeping shared between a [`Job`] and its limiter's
/// active-job registry.
pub(super) struct JobEntry {
    pub(super) id: u64,
    pub(super) label: String,
    pub(super) weight: u64,
    pub(super) progress: AtomicU64,
}

/// A lease on one slot of a [`super::Resource`].
///
/// Exists only between admission and release. Dropping the job returns the
/// slot, on every exit path — normal return, error, or cancellation — so a
/// release can be neither forgotten nor doubled.
pub struct Job {
    inner: Arc<ResourceInner>,
    entry: Arc<JobEntry>,
    _permit: OwnedSemaphorePermit,
}

impl Job {
    pub(super) fn new(
        inner: Arc<ResourceInner>,
        entry: Arc<JobEntry>,
        permit: OwnedSemaphorePermit,
    ) -> Self {
        Self {
            inner,
            entry,
            _permit: permit,
        }
    }

    /// Non-blocking progress report.
    ///
    /// Feeds the owning limiter's throughput window and this job's monotonic
    /// progress counter. Safe to call from any thread, zero or many times.
    pub fn report(&self, amount: u64) {
        self.entry.progress.fetch_add(amount, Ordering::Relaxed);
        self.inner.throughput.record(amount);
    }

    pub fn id(&self) -> u64 {
        self.entry.id
    }

    pub fn label(&self) -> &str {
        &self.entry.label
    }

    /// Caller-declared cost estimate (item count, byte size). Telemetry only;
    /// admission ignores it.
    pub fn weight(&self) -> u64 {
        self.entry.weight
    }

    /// Progress reported so far; never decreases while the job is held.
    pub fn progress(&self) -> u64 {
        self.entry.progress.load(Ordering::Relaxed)
    }
}

impl std::fmt::Debug for Job {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Job")
            .field("id", &self.entry.id)
            .field("label", &self.entry.label)
            .field("weight", &self.entry.weight)
            .field("progress", &self.entry.progress.load(Ordering::Relaxed))
            .finish()
    }
}

impl Drop for Job {
    fn drop(&mut self) {
        self.inner.active.lock().unwrap().remove(&self.entry.id);
        let prev = self.inner.in_flight.fetch_sub(1, Ordering::AcqRel);
        assert!(
            prev > 0,
            "job {} released a \"{}\" slot with none in flight",
            self.entry.id,
            self.inner.name
        );
        tracing::trace!(resource = %self.inner.name, job = self.entry.id, "slot released");
    }
}
