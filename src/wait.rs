//! Cancellable, deadline-bounded polling.
//!
//! Used for external conditions the solver cannot be notified about, such as
//! an acknowledgment file appearing in a drop directory or an operator
//! finishing a login.

use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// How a [`wait_until`] call ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WaitOutcome<T> {
    Ready(T),
    TimedOut,
    Cancelled,
}

impl<T> WaitOutcome<T> {
    pub fn ready(self) -> Option<T> {
        match self {
            Self::Ready(value) => Some(value),
            _ => None,
        }
    }
}

/// Poll `probe` every `poll_interval` until it yields a value, `timeout`
/// elapses or `cancel` fires.
///
/// The probe runs once immediately and once more at the deadline, so a
/// condition that becomes true during the last interval is still seen.
pub async fn wait_until<T, F, Fut>(
    mut probe: F,
    poll_interval: Duration,
    timeout: Duration,
    cancel: &CancellationToken,
) -> WaitOutcome<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Option<T>>,
{
    let deadline = Instant::now() + timeout;
    loop {
        if cancel.is_cancelled() {
            return WaitOutcome::Cancelled;
        }
        if let Some(value) = probe().await {
            return WaitOutcome::Ready(value);
        }

        let now = Instant::now();
        if now >= deadline {
            tracing::debug!(timeout_secs = timeout.as_secs_f64(), "Wait timed out");
            return WaitOutcome::TimedOut;
        }

        let nap = poll_interval.min(deadline - now);
        tokio::select! {
            _ = cancel.cancelled() => return WaitOutcome::Cancelled,
            _ = tokio::time::sleep(nap) => {}
        }
    }
}
