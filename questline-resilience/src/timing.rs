//! Elapsed-time instrumentation as an explicit wrapper.

use futures_util::future::{BoxFuture, FutureExt};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

/// Await `future` and return its output with the elapsed time.
pub async fn measure<T, Fut>(future: Fut) -> (T, Duration)
where
    Fut: Future<Output = T>,
{
    let started = Instant::now();
    let output = future.await;
    (output, started.elapsed())
}

/// Wrap `operation` so every invocation logs its duration under `name`.
///
/// The wrapper has the same shape as the operation, so it composes with
/// [`with_retry`](crate::with_retry) and the other executors. Futures may
/// borrow for `'a`.
pub fn timed<'a, T, F, Fut>(
    name: &str,
    mut operation: F,
) -> impl FnMut() -> BoxFuture<'a, T> + 'a
where
    F: FnMut() -> Fut + 'a,
    Fut: Future<Output = T> + Send + 'a,
    T: Send + 'a,
{
    let name: Arc<str> = Arc::from(name);
    move || {
        let name = Arc::clone(&name);
        let future = operation();
        async move {
            let (output, elapsed) = measure(future).await;
            tracing::debug!(
                operation = %name,
                elapsed_ms = elapsed.as_millis() as u64,
                "Operation finished"
            );
            output
        }
        .boxed()
    }
}
