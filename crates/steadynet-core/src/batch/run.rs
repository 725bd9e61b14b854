use std::fmt::Display;
use std::future::Future;

use tokio::task::{JoinError, JoinHandle, JoinSet};

use super::outcome::BatchError;
use crate::retry::{Classify, RetryError, RetryExecutor, RetryOptions};

/// Aborts the wrapped task when dropped, so cancelling a batch cancels its items.
struct AbortOnDrop<T>(JoinHandle<T>);

impl<T> Drop for AbortOnDrop<T> {
    fn drop(&mut self) {
        self.0.abort();
    }
}

fn describe(err: &JoinError) -> String {
    if err.is_panic() {
        "panicked".to_string()
    } else {
        "cancelled".to_string()
    }
}

/// Run `operations` with at most `concurrency` in flight at once.
///
/// `concurrency` is clamped to `[1, operations.len()]`. The returned list has
/// one entry per operation, in input order.
pub async fn run_batch<T, E, F, Fut>(
    operations: Vec<F>,
    concurrency: usize,
) -> Vec<Result<T, BatchError<E>>>
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<T, E>> + Send + 'static,
    T: Send + 'static,
    E: Send + 'static,
{
    let total = operations.len();
    if total == 0 {
        return Vec::new();
    }
    let concurrency = concurrency.clamp(1, total);
    tracing::debug!(total, concurrency, "batch started");

    let mut slots: Vec<Option<Result<T, BatchError<E>>>> = (0..total).map(|_| None).collect();
    let mut queue = operations.into_iter().enumerate();
    let mut join_set = JoinSet::new();

    loop {
        while join_set.len() < concurrency {
            let Some((index, operation)) = queue.next() else {
                break;
            };
            let fut = operation();
            join_set.spawn(async move {
                let mut item = AbortOnDrop(tokio::spawn(fut));
                let joined = (&mut item.0).await;
                (index, joined)
            });
        }

        let Some(res) = join_set.join_next().await else {
            break;
        };
        match res {
            Ok((index, Ok(outcome))) => {
                slots[index] = Some(outcome.map_err(BatchError::Operation));
            }
            Ok((index, Err(join_err))) => {
                tracing::warn!(index, error = %join_err, "batch item did not complete");
                slots[index] = Some(Err(BatchError::Panicked(describe(&join_err))));
            }
            Err(join_err) => {
                // Wrapper tasks never panic; leave the slot to be filled below.
                tracing::warn!(error = %join_err, "batch worker task failed");
            }
        }
    }

    let results: Vec<Result<T, BatchError<E>>> = slots
        .into_iter()
        .map(|slot| slot.unwrap_or_else(|| Err(BatchError::Panicked("cancelled".to_string()))))
        .collect();
    let failed = results.iter().filter(|r| r.is_err()).count();
    tracing::debug!(total, failed, "batch finished");
    results
}

/// Like [`run_batch`], but each item goes through the retry executor.
pub async fn run_batch_with_retry<T, E, F, Fut>(
    executor: &RetryExecutor,
    operations: Vec<F>,
    concurrency: usize,
    options: &RetryOptions,
) -> Vec<Result<T, BatchError<RetryError<E>>>>
where
    F: FnMut() -> Fut + Send + 'static,
    Fut: Future<Output = Result<T, E>> + Send + 'static,
    T: Send + 'static,
    E: Classify + Display + Send + 'static,
{
    let items: Vec<_> = operations
        .into_iter()
        .map(|operation| {
            let executor = executor.clone();
            let options = options.clone();
            move || async move { executor.run(operation, &options).await }
        })
        .collect();
    run_batch(items, concurrency).await
}
