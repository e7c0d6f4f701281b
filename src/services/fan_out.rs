//! Bounded fork-join over spawned tasks.
//!
//! Each fetch stage hands its items to [`fan_out`], which runs at most
//! `width` of them at once and blocks until every task has finished. Workers
//! never share mutable state; the caller merges the returned values.

use futures::future::join_all;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinError;
use tracing::error;

/// Run `task` over every item with at most `width` tasks in flight
///
/// Results come back in input order. A task that panics yields its
/// `JoinError` in place instead of poisoning the rest of the batch.
pub async fn fan_out<I, F, Fut, T>(items: I, width: usize, task: F) -> Vec<Result<T, JoinError>>
where
    I: IntoIterator,
    F: Fn(I::Item) -> Fut,
    Fut: Future<Output = T> + Send + 'static,
    T: Send + 'static,
{
    let semaphore = Arc::new(Semaphore::new(width.max(1)));
    let mut handles = Vec::new();

    for item in items {
        let permit = semaphore.clone().acquire_owned();
        let fut = task(item);

        handles.push(tokio::spawn(async move {
            // The semaphore is never closed
            let _permit = permit.await;
            fut.await
        }));
    }

    let results = join_all(handles).await;
    for err in results.iter().filter_map(|result| result.as_ref().err()) {
        error!(error = %err, "fan-out task aborted");
    }

    results
}
