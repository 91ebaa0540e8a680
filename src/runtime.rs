//! Worker-thread offload for the async acquisition path.
//!
//! Acquisition may sleep while waiting for a token. Async callers must never
//! run that sleep on their executor thread, so each step is shipped to a
//! worker thread and the calling task awaits its completion.

use std::panic::{self, AssertUnwindSafe};

/// Runs `f` on a worker thread and waits for it without blocking the caller's
/// executor.
///
/// Inside a Tokio runtime the closure goes to the blocking pool. Any other
/// executor gets a dedicated OS thread whose result arrives over a oneshot
/// channel, which every executor can await.
///
/// Returns `None` if the worker was cancelled before it ran, which happens
/// when the Tokio runtime is shutting down. A panic inside `f` is resumed on
/// the awaiting task.
pub(crate) async fn offload<F, R>(f: F) -> Option<R>
where
    F: FnOnce() -> R + Send + 'static,
    R: Send + 'static,
{
    match tokio::runtime::Handle::try_current() {
        Ok(handle) => match handle.spawn_blocking(f).await {
            Ok(output) => Some(output),
            Err(err) if err.is_panic() => panic::resume_unwind(err.into_panic()),
            Err(_) => None,
        },
        Err(_) => offload_to_thread(f).await,
    }
}

async fn offload_to_thread<F, R>(f: F) -> Option<R>
where
    F: FnOnce() -> R + Send + 'static,
    R: Send + 'static,
{
    let (tx, rx) = tokio::sync::oneshot::channel();
    let job = move || {
        let _ = tx.send(panic::catch_unwind(AssertUnwindSafe(f)));
    };

    let spawned = std::thread::Builder::new()
        .name("rate-guard-worker".into())
        .spawn(job);
    if let Err(err) = spawned {
        tracing::warn!(error = %err, "failed to spawn rate limiter worker thread");
        return None;
    }

    match rx.await {
        Ok(Ok(output)) => Some(output),
        Ok(Err(payload)) => panic::resume_unwind(payload),
        Err(_) => None,
    }
}
