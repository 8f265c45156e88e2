//! Bounded-concurrency resource pools.
//!
//! A [`Resource`] owns a fixed number of slots for one class of work (e.g.
//! "downloads", "hashing"). Callers admit a unit of work with [`Resource::begin`]
//! (or [`Resource::acquire`] when no cancellation signal applies), hold the
//! returned [`Job`] while the work runs, and drop it to give the slot back.
//! Progress reported through live jobs feeds a rolling throughput window used
//! for status display only; it never affects admission.

mod job;
mod throughput;

pub use job::Job;

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;

use crate::error::Cancelled;

use self::job::JobEntry;
use self::throughput::ThroughputWindow;

/// Span of the rolling throughput window.
const THROUGHPUT_WINDOW: Duration = Duration::from_secs(5);

pub(crate) struct ResourceInner {
    name: String,
    max_jobs: usize,
    semaphore: Arc<Semaphore>,
    in_flight: AtomicUsize,
    next_job_id: AtomicU64,
    throughput: ThroughputWindow,
    active: Mutex<HashMap<u64, Arc<JobEntry>>>,
}

/// A named pool of `max_jobs` slots. Cloning is cheap and clones share the
/// same slots and counters; combinators borrow a clone per spawned unit.
#[derive(Clone)]
pub struct Resource {
    inner: Arc<ResourceInner>,
}

impl Resource {
    /// Create a pool with the given capacity. Capacity is clamped to at
    /// least 1 and fixed for the pool's lifetime.
    pub fn new(name: impl Into<String>, max_jobs: usize) -> Self {
        let max_jobs = max_jobs.max(1);
        Self {
            inner: Arc::new(ResourceInner {
                name: name.into(),
                max_jobs,
                semaphore: Arc::new(Semaphore::new(max_jobs)),
                in_flight: AtomicUsize::new(0),
                next_job_id: AtomicU64::new(1),
                throughput: ThroughputWindow::new(THROUGHPUT_WINDOW),
                active: Mutex::new(HashMap::new()),
            }),
        }
    }

    /// Diagnostic label, surfaced in logs and status lines only.
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Fixed slot capacity. The batched combinator sizes its worker set from
    /// this.
    pub fn max_jobs(&self) -> usize {
        self.inner.max_jobs
    }

    /// Number of jobs currently holding a slot.
    pub fn in_flight(&self) -> usize {
        self.inner.in_flight.load(Ordering::Acquire)
    }

    /// Wait for a slot, failing fast if `cancel` fires first.
    ///
    /// An already-fired token fails immediately; cancellation during the wait
    /// leaves the in-flight count untouched. The pool itself never times out —
    /// callers wanting a bounded wait supply a token with a deadline.
    pub async fn begin(
        &self,
        label: &str,
        weight: u64,
        cancel: &CancellationToken,
    ) -> Result<Job, Cancelled> {
        if cancel.is_cancelled() {
            return Err(self.cancelled());
        }
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(self.cancelled()),
            permit = Arc::clone(&self.inner.semaphore).acquire_owned() => {
                let permit = permit.expect("resource semaphore never closes");
                Ok(self.admit(label, weight, permit))
            }
        }
    }

    /// Wait for a slot with no cancellation signal. Used by the combinators,
    /// whose call sites have nothing to cancel admission with.
    pub async fn acquire(&self, label: &str, weight: u64) -> Job {
        let permit = Arc::clone(&self.inner.semaphore)
            .acquire_owned()
            .await
            .expect("resource semaphore never closes");
        self.admit(label, weight, permit)
    }

    fn admit(&self, label: &str, weight: u64, permit: tokio::sync::OwnedSemaphorePermit) -> Job {
        let id = self.inner.next_job_id.fetch_add(1, Ordering::Relaxed);
        let entry = Arc::new(JobEntry {
            id,
            label: label.to_string(),
            weight,
            progress: AtomicU64::new(0),
        });
        self.inner
            .active
            .lock()
            .unwrap()
            .insert(id, Arc::clone(&entry));
        let prev = self.inner.in_flight.fetch_add(1, Ordering::AcqRel);
        debug_assert!(prev < self.inner.max_jobs);
        tracing::trace!(resource = %self.inner.name, job = id, label, weight, "slot admitted");
        Job::new(Arc::clone(&self.inner), entry, permit)
    }

    fn cancelled(&self) -> Cancelled {
        Cancelled::new(format!("waiting for a \"{}\" slot", self.inner.name))
    }

    /// Rolling throughput in units per second (whatever unit jobs report).
    pub fn rate(&self) -> f64 {
        self.inner.throughput.rate()
    }

    /// Lifetime total of all progress reported against this pool.
    pub fn total_processed(&self) -> u64 {
        self.inner.throughput.total()
    }

    /// Point-in-time snapshot for status displays.
    pub fn report(&self) -> ResourceReport {
        let mut jobs: Vec<JobSnapshot> = self
            .inner
            .active
            .lock()
            .unwrap()
            .values()
            .map(|entry| JobSnapshot {
                id: entry.id,
                label: entry.label.clone(),
                weight: entry.weight,
                progress: entry.progress.load(Ordering::Relaxed),
            })
            .collect();
        jobs.sort_by_key(|j| j.id);
        ResourceReport {
            name: self.inner.name.clone(),
            max_jobs: self.inner.max_jobs,
            in_flight: self.in_flight(),
            rate: self.rate(),
            total_processed: self.total_processed(),
            jobs,
        }
    }
}

/// Snapshot of one active job, for display.
#[derive(Debug, Clone)]
pub struct JobSnapshot {
    pub id: u64,
    pub label: String,
    pub weight: u64,
    pub progress: u64,
}

/// Snapshot of a pool's counters and active jobs, for display.
#[derive(Debug, Clone)]
pub struct ResourceReport {
    pub name: String,
    pub max_jobs: usize,
    pub in_flight: usize,
    pub rate: f64,
    pub total_processed: u64,
    pub jobs: Vec<JobSnapshot>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn acquire_and_release_restores_capacity() {
        let pool = Resource::new("test", 2);
        assert_eq!(pool.in_flight(), 0);

        let a = pool.acquire("a", 0).await;
        let b = pool.acquire("b", 0).await;
        assert_eq!(pool.in_flight(), 2);

        drop(a);
        assert_eq!(pool.in_flight(), 1);
        drop(b);
        assert_eq!(pool.in_flight(), 0);
    }

    #[tokio::test]
    async fn in_flight_never_exceeds_capacity() {
        let pool = Resource::new("test", 3);
        let mut handles = Vec::new();
        for i in 0..12u32 {
            let pool = pool.clone();
            handles.push(tokio::spawn(async move {
                let _job = pool.acquire(&format!("job-{i}"), 0).await;
                assert!(pool.in_flight() <= 3);
                tokio::time::sleep(Duration::from_millis(5)).await;
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }
        assert_eq!(pool.in_flight(), 0);
    }

    #[tokio::test]
    async fn begin_fails_fast_on_pre_fired_token() {
        let pool = Resource::new("test", 1);
        let cancel = CancellationToken::new();
        cancel.cancel();

        let err = pool.begin("late", 0, &cancel).await.unwrap_err();
        assert!(err.to_string().contains("test"));
        assert_eq!(pool.in_flight(), 0);
    }

    #[tokio::test]
    async fn cancelling_a_pending_admission_leaves_counts_alone() {
        let pool = Resource::new("test", 1);
        let held = pool.acquire("holder", 0).await;

        let cancel = CancellationToken::new();
        let waiter = {
            let pool = pool.clone();
            let cancel = cancel.clone();
            tokio::spawn(async move { pool.begin("waiter", 0, &cancel).await })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;
        cancel.cancel();

        let result = waiter.await.unwrap();
        assert!(result.is_err());
        assert_eq!(pool.in_flight(), 1);

        drop(held);
        assert_eq!(pool.in_flight(), 0);
    }

    #[tokio::test]
    async fn report_tracks_progress_and_active_jobs() {
        let pool = Resource::new("downloads", 4);
        let job = pool.begin("big.iso", 1_000, &CancellationToken::new()).await.unwrap();
        job.report(700);
        job.report(800);

        assert_eq!(job.progress(), 1_500);
        assert_eq!(pool.total_processed(), 1_500);
        assert!(pool.rate() > 0.0);

        let report = pool.report();
        assert_eq!(report.name, "downloads");
        assert_eq!(report.in_flight, 1);
        assert_eq!(report.jobs.len(), 1);
        assert_eq!(report.jobs[0].label, "big.iso");
        assert_eq!(report.jobs[0].weight, 1_000);
        assert_eq!(report.jobs[0].progress, 1_500);

        drop(job);
        assert!(pool.report().jobs.is_empty());
        // The counter stays readable after the job is gone.
        assert_eq!(pool.total_processed(), 1_500);
    }

    #[tokio::test]
    async fn slots_are_released_when_work_errors() {
        let pool = Resource::new("test", 2);
        let mut handles = Vec::new();
        for i in 0..6u32 {
            let pool = pool.clone();
            handles.push(tokio::spawn(async move {
                let _job = pool.acquire("failing", 0).await;
                if i % 2 == 0 {
                    return Err::<(), String>(format!("unit {i} failed"));
                }
                Ok(())
            }));
        }
        let mut failures = 0;
        for handle in handles {
            if handle.await.unwrap().is_err() {
                failures += 1;
            }
        }
        assert_eq!(failures, 3);
        assert_eq!(pool.in_flight(), 0);
    }
}
