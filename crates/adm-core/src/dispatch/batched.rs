//! Batched fan-out: a fixed worker set over strided partitions.
//!
//! Built for workloads where per-element task creation would dominate cheap
//! work. `min(max_jobs, N)` workers are spawned up front; worker `i` owns
//! input indices `i, i+W, i+2W, …` and holds a single job weighted by its
//! partition size for its whole run.

use std::future::Future;

use futures_util::stream::{self, Stream, StreamExt};

use crate::resource::Resource;

use super::join;

pub(super) fn map_all<I, F, Fut>(
    items: I,
    limiter: &Resource,
    work: F,
) -> impl Stream<Item = Fut::Output>
where
    I: IntoIterator,
    I::Item: Send + 'static,
    F: FnMut(I::Item) -> Fut + Clone + Send + 'static,
    Fut: Future + Send + 'static,
    Fut::Output: Send + 'static,
{
    stream::iter(spawn_workers(items, limiter, work, true))
        .then(join::finish)
        .flat_map(stream::iter)
}

pub(super) async fn do_all<I, F, Fut>(items: I, limiter: &Resource, work: F)
where
    I: IntoIterator,
    I::Item: Send + 'static,
    F: FnMut(I::Item) -> Fut + Clone + Send + 'static,
    Fut: Future + Send + 'static,
    Fut::Output: Send + 'static,
{
    for handle in spawn_workers(items, limiter, work, false) {
        join::finish(handle).await;
    }
}

/// Partition the input round-robin and spawn one worker per partition.
/// Workers collect outputs locally only when `collect` is set, so `do_all`
/// does not buffer results it will never yield.
fn spawn_workers<I, F, Fut>(
    items: I,
    limiter: &Resource,
    work: F,
    collect: bool,
) -> Vec<tokio::task::JoinHandle<Vec<Fut::Output>>>
where
    I: IntoIterator,
    I::Item: Send + 'static,
    F: FnMut(I::Item) -> Fut + Clone + Send + 'static,
    Fut: Future + Send + 'static,
    Fut::Output: Send + 'static,
{
    let items: Vec<I::Item> = items.into_iter().collect();
    let workers = limiter.max_jobs().min(items.len());
    let mut partitions: Vec<Vec<I::Item>> = Vec::with_capacity(workers);
    partitions.resize_with(workers, Vec::new);
    for (index, item) in items.into_iter().enumerate() {
        partitions[index % workers].push(item);
    }

    partitions
        .into_iter()
        .map(|partition| {
            let limiter = limiter.clone();
            let mut work = work.clone();
            tokio::spawn(async move {
                let share = partition.len() as u64;
                let job = limiter.acquire(limiter.name(), share).await;
                let mut out = Vec::with_capacity(if collect { partition.len() } else { 0 });
                for item in partition {
                    job.report(1);
                    let result = work(item).await;
                    if collect {
                        out.push(result);
                    }
                }
                out
            })
        })
        .collect()
}
