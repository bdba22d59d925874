//! Blocking exchanges raced against a caller's cancellation token.

use tokio_util::sync::CancellationToken;

use crate::error::{Error, Result};

/// Run `work` on the blocking pool, returning early with [`Error::Cancelled`]
/// if `cancel` fires first.
///
/// Cancellation abandons the wait, not the work: the closure runs to
/// completion and everything it owns (pooled guards included) is dropped on
/// the blocking thread once it finishes.
///
/// # Errors
/// Returns the closure's error, [`Error::Cancelled`], or [`Error::Task`] when the
/// blocking task panics.
pub async fn run_blocking<T, F>(cancel: &CancellationToken, work: F) -> Result<T>
where
    F: FnOnce() -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    if cancel.is_cancelled() {
        return Err(Error::Cancelled);
    }

    let handle = tokio::task::spawn_blocking(work);

    tokio::select! {
        biased;
        () = cancel.cancelled() => Err(Error::Cancelled),
        joined = handle => joined?,
    }
}
