//! Limiter-bound fan-out.
//!
//! Every element spawns its task immediately, but the work future only runs
//! once a slot is granted, and the slot is given back as soon as it resolves.

use std::future::Future;

use futures_util::stream::{self, Stream, StreamExt};

use crate::resource::Resource;

use super::join;

pub(super) fn map_all<I, F, Fut>(
    items: I,
    limiter: &Resource,
    mut work: F,
) -> impl Stream<Item = Fut::Output>
where
    I: IntoIterator,
    F: FnMut(I::Item) -> Fut,
    Fut: Future + Send + 'static,
    Fut::Output: Send + 'static,
{
    let handles: Vec<_> = items
        .into_iter()
        .map(|item| {
            let limiter = limiter.clone();
            let fut = work(item);
            tokio::spawn(async move {
                let _job = limiter.acquire("", 0).await;
                fut.await
            })
        })
        .collect();
    stream::iter(handles).then(join::finish)
}

pub(super) async fn do_all<I, F, Fut>(items: I, limiter: &Resource, mut work: F)
where
    I: IntoIterator,
    F: FnMut(I::Item) -> Fut,
    Fut: Future<Output = ()> + Send + 'static,
{
    let handles: Vec<_> = items
        .into_iter()
        .map(|item| {
            let limiter = limiter.clone();
            let fut = work(item);
            tokio::spawn(async move {
                let _job = limiter.acquire("", 0).await;
                fut.await
            })
        })
        .collect();
    for handle in handles {
        join::finish(handle).await;
    }
}

pub(super) fn keep_all<I, F, Fut, T>(
    items: I,
    limiter: &Resource,
    work: F,
) -> impl Stream<Item = T>
where
    I: IntoIterator,
    F: FnMut(I::Item) -> Fut,
    Fut: Future<Output = Option<T>> + Send + 'static,
    T: Send + 'static,
{
    map_all(items, limiter, work).filter_map(|item| async move { item })
}
