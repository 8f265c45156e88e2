//! Join-handle plumbing shared by the combinators.

use tokio::task::JoinHandle;

/// Await one spawned unit of work, resurfacing a panic on the consumer.
pub(super) async fn finish<T>(handle: JoinHandle<T>) -> T {
    match handle.await {
        Ok(value) => value,
        Err(e) if e.is_panic() => std::panic::resume_unwind(e.into_panic()),
        Err(e) => panic!("dispatch task aborted: {e}"),
    }
}
