//! Async runtime for a single CLI command.

use std::future::Future;
use std::time::Duration;

use color_eyre::eyre::{Result, WrapErr};

/// How long shutdown waits for blocking work still in flight.
const SHUTDOWN_GRACE: Duration = Duration::from_millis(250);

/// Drive `future` to completion on a fresh multi-threaded runtime.
///
/// A stage that overran its deadline leaves its port call running on the
/// blocking pool. Shutdown waits at most [`SHUTDOWN_GRACE`] for it, so the
/// process exits without waiting for the abandoned call.
pub(crate) fn block_on<F: Future>(future: F) -> Result<F::Output> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .wrap_err("failed to start async runtime")?;
    let output = runtime.block_on(future);
    runtime.shutdown_timeout(SHUTDOWN_GRACE);
    Ok(output)
}
