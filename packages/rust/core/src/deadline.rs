//! Wall-clock deadlines around a single blocking unit of work.
//!
//! Two mechanisms with the same contract:
//! - [`invoke_with_deadline`] runs the work on the tokio blocking pool and races
//!   it against a runtime timer. Used by the pipeline for each stage.
//! - [`invoke_with_deadline_blocking`] runs the work on a worker thread while the
//!   caller waits on a channel with a timeout. Used where no runtime is
//!   available, e.g. inside an agent that is itself on a blocking thread.
//!
//! In both cases the work also receives a [`Deadline`] it can poll to stop
//! early. On overrun the work is abandoned: its result is dropped when it
//! eventually finishes. The timer never outlives the call.

use std::sync::mpsc::{self, RecvTimeoutError};
use std::time::Duration;

use pubcompare_shared::Deadline;
use tracing::warn;

/// The guarded work did not finish within `limit`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("deadline of {}s exceeded", limit.as_secs_f64())]
pub struct TimedOut {
    pub limit: Duration,
}

/// Run `work` on the blocking pool, failing with [`TimedOut`] after `limit`.
///
/// Must be called from within a tokio runtime. A panic inside `work` is
/// resumed on the caller.
pub async fn invoke_with_deadline<T, F>(limit: Duration, work: F) -> Result<T, TimedOut>
where
    F: FnOnce(Deadline) -> T + Send + 'static,
    T: Send + 'static,
{
    let deadline = Deadline::after(limit);
    let handle = tokio::task::spawn_blocking(move || work(deadline));

    match tokio::time::timeout(limit, handle).await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(join_err)) if join_err.is_panic() => std::panic::resume_unwind(join_err.into_panic()),
        // Blocking tasks are only cancelled while the runtime shuts down.
        Ok(Err(_)) => Err(TimedOut { limit }),
        Err(_) => {
            warn!(limit_ms = limit.as_millis() as u64, "deadline exceeded, abandoning call");
            Err(TimedOut { limit })
        }
    }
}

/// Run `work` on a watchdog-supervised worker thread, failing with
/// [`TimedOut`] after `limit`. Needs no async runtime.
pub fn invoke_with_deadline_blocking<T, F>(limit: Duration, work: F) -> Result<T, TimedOut>
where
    F: FnOnce(Deadline) -> T + Send + 'static,
    T: Send + 'static,
{
    let deadline = Deadline::after(limit);
    let (tx, rx) = mpsc::sync_channel(1);
    let worker = std::thread::spawn(move || {
        // The receiver is gone if the caller already gave up.
        let _ = tx.send(work(deadline));
    });

    match rx.recv_timeout(limit) {
        Ok(value) => {
            let _ = worker.join();
            Ok(value)
        }
        Err(RecvTimeoutError::Timeout) => {
            warn!(limit_ms = limit.as_millis() as u64, "deadline exceeded, abandoning call");
            Err(TimedOut { limit })
        }
        Err(RecvTimeoutError::Disconnected) => match worker.join() {
            Err(panic) => std::panic::resume_unwind(panic),
            Ok(()) => Err(TimedOut { limit }),
        },
    }
}
