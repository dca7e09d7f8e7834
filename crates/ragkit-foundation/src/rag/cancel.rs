//! Cooperative cancellation for long-running pipeline calls

use ragkit_kernel::{RagError, RagResult};
use std::future::Future;
use tokio_util::sync::CancellationToken;

/// Run `fut` unless `token` is cancelled first.
///
/// An already-cancelled token wins without polling `fut`. A cancelled call
/// yields [`RagError::Cancelled`] naming `operation`.
pub async fn run_cancellable<T, F>(
    token: &CancellationToken,
    operation: &str,
    fut: F,
) -> RagResult<T>
where
    F: Future<Output = RagResult<T>>,
{
    tokio::select! {
        biased;
        _ = token.cancelled() => Err(RagError::Cancelled(operation.to_string())),
        result = fut => result,
    }
}
