//! Parallel fan-out combinators over plain collections.
//!
//! Three families, in increasing coordination order: unbounded (one task per
//! element, no throttling), limiter-bound (one task per element, gated by a
//! [`Resource`]), and batched (a fixed worker set over strided partitions).
//! Mapping variants yield their outputs as lazy streams; nothing is delivered
//! until the consumer polls, and each result is produced exactly once.
//!
//! The combinators are thin on purpose: they propagate whatever the work
//! produces and never retry, suppress, or reorder errors. Per-item "log and
//! continue" policies belong to the call site (see [`crate::batch`]).

mod batched;
mod bounded;
mod join;
mod unbounded;

use std::future::Future;

use futures_util::Stream;

use crate::resource::Resource;

/// Fan-out extension methods for any owned collection.
pub trait ParallelDispatch: IntoIterator + Sized
where
    Self::Item: Send + 'static,
{
    /// Start one concurrent unit of work per element immediately, with no
    /// admission control. Results are yielded in input order. Only suitable
    /// when the caller already knows total concurrency is safe.
    fn map_all<F, Fut>(self, work: F) -> impl Stream<Item = Fut::Output>
    where
        F: FnMut(Self::Item) -> Fut,
        Fut: Future + Send + 'static,
        Fut::Output: Send + 'static,
    {
        unbounded::map_all(self, work)
    }

    /// [`map_all`](Self::map_all) without result values.
    fn do_all<F, Fut>(self, work: F) -> impl Future<Output = ()>
    where
        F: FnMut(Self::Item) -> Fut,
        Fut: Future<Output = ()> + Send + 'static,
    {
        unbounded::do_all(self, work)
    }

    /// [`map_all`](Self::map_all) that drops `None` results from the output
    /// stream.
    fn keep_all<F, Fut, T>(self, work: F) -> impl Stream<Item = T>
    where
        F: FnMut(Self::Item) -> Fut,
        Fut: Future<Output = Option<T>> + Send + 'static,
        T: Send + 'static,
    {
        unbounded::keep_all(self, work)
    }

    /// Start one unit per element, each gated by `limiter`: every task spawns
    /// immediately, but its work only runs between slot grant and slot
    /// return, so at most `limiter.max_jobs()` units make progress at once.
    ///
    /// Results are yielded strictly in input order by awaiting each element
    /// in turn. A slow early element therefore delays delivery of later,
    /// already-finished results — the computation is not blocked, only the
    /// hand-off to the consumer. Callers that care about completion order
    /// rather than input order want a different tool.
    fn map_all_limited<F, Fut>(
        self,
        limiter: &Resource,
        work: F,
    ) -> impl Stream<Item = Fut::Output>
    where
        F: FnMut(Self::Item) -> Fut,
        Fut: Future + Send + 'static,
        Fut::Output: Send + 'static,
    {
        bounded::map_all(self, limiter, work)
    }

    /// [`map_all_limited`](Self::map_all_limited) without result values.
    fn do_all_limited<F, Fut>(self, limiter: &Resource, work: F) -> impl Future<Output = ()>
    where
        F: FnMut(Self::Item) -> Fut,
        Fut: Future<Output = ()> + Send + 'static,
    {
        bounded::do_all(self, limiter, work)
    }

    /// [`map_all_limited`](Self::map_all_limited) that drops `None` results
    /// from the output stream.
    fn keep_all_limited<F, Fut, T>(self, limiter: &Resource, work: F) -> impl Stream<Item = T>
    where
        F: FnMut(Self::Item) -> Fut,
        Fut: Future<Output = Option<T>> + Send + 'static,
        T: Send + 'static,
    {
        bounded::keep_all(self, limiter, work)
    }

    /// Batched variant for cheap per-element work: spawns
    /// `min(limiter.max_jobs(), N)` workers up front instead of one task per
    /// element. Worker `i` processes input indices `i, i+W, i+2W, …`, holds a
    /// single job weighted by its partition size, and reports one unit of
    /// progress per element.
    ///
    /// Output is each worker's local results concatenated worker-by-worker —
    /// NOT input order. That is the price of amortizing task creation;
    /// callers needing input order use
    /// [`map_all_limited`](Self::map_all_limited).
    fn map_all_batched<F, Fut>(
        self,
        limiter: &Resource,
        work: F,
    ) -> impl Stream<Item = Fut::Output>
    where
        F: FnMut(Self::Item) -> Fut + Clone + Send + 'static,
        Fut: Future + Send + 'static,
        Fut::Output: Send + 'static,
    {
        batched::map_all(self, limiter, work)
    }

    /// [`map_all_batched`](Self::map_all_batched) without result values.
    fn do_all_batched<F, Fut>(self, limiter: &Resource, work: F) -> impl Future<Output = ()>
    where
        F: FnMut(Self::Item) -> Fut + Clone + Send + 'static,
        Fut: Future + Send + 'static,
        Fut::Output: Send + 'static,
    {
        batched::do_all(self, limiter, work)
    }
}

impl<I> ParallelDispatch for I
where
    I: IntoIterator + Sized,
    I::Item: Send + 'static,
{
}
