//! Unbounded fan-out: one task per element, no admission control.

use std::future::Future;

use futures_util::stream::{self, Stream, StreamExt};

use super::join;

pub(super) fn map_all<I, F, Fut>(items: I, mut work: F) -> impl Stream<Item = Fut::Output>
where
    I: IntoIterator,
    F: FnMut(I::Item) -> Fut,
    Fut: Future + Send + 'static,
    Fut::Output: Send + 'static,
{
    let handles: Vec<_> = items
        .into_iter()
        .map(|item| tokio::spawn(work(item)))
        .collect();
    stream::iter(handles).then(join::finish)
}

pub(super) async fn do_all<I, F, Fut>(items: I, mut work: F)
where
    I: IntoIterator,
    F: FnMut(I::Item) -> Fut,
    Fut: Future<Output = ()> + Send + 'static,
{
    let handles: Vec<_> = items
        .into_iter()
        .map(|item| tokio::spawn(work(item)))
        .collect();
    for handle in handles {
        join::finish(handle).await;
    }
}

pub(super) fn keep_all<I, F, Fut, T>(items: I, work: F) -> impl Stream<Item = T>
where
    I: IntoIterator,
    F: FnMut(I::Item) -> Fut,
    Fut: Future<Output = Option<T>> + Send + 'static,
    T: Send + 'static,
{
    map_all(items, work).filter_map(|item| async move { item })
}
