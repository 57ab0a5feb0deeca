//! Auto-extend task for a held lock
//!
//! One supervised tokio task per lock handle. It extends the lock on every
//! tick and exits on the first failed extension or when cancelled. The
//! cancellation signal is a one-shot sender that can be taken exactly once;
//! dropping it (e.g. when the handle is dropped) cancels as well.

use std::sync::Arc;
use std::time::Duration;

use cronlock_api::DistributedMutex;
use parking_lot::Mutex;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior, interval_at};
use tracing::{debug, trace, warn};

use crate::metrics;

/// Why the renewal task stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenewalExit {
    /// The handle signalled cancellation.
    Cancelled,
    /// The service reported this holder no longer owns the lock.
    Rejected,
    /// The extend call errored.
    Failed,
}

/// Outcome of a finished renewal task
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenewalReport {
    pub exit: RenewalExit,
    pub extensions: u64,
}

pub(crate) struct RenewalTask {
    cancel: Mutex<Option<oneshot::Sender<()>>>,
    handle: Mutex<Option<JoinHandle<RenewalReport>>>,
}

impl RenewalTask {
    /// Start renewing `mutex` every `period`; the first extension happens one
    /// period after the call.
    pub(crate) fn spawn(mutex: Arc<dyn DistributedMutex>, period: Duration) -> Self {
        let (tx, rx) = oneshot::channel();
        let handle = tokio::spawn(run(mutex, period, rx));
        Self {
            cancel: Mutex::new(Some(tx)),
            handle: Mutex::new(Some(handle)),
        }
    }

    /// Close the cancellation signal. Returns `false` if it was already closed.
    pub(crate) fn cancel(&self) -> bool {
        match self.cancel.lock().take() {
            Some(tx) => {
                // The task may already have exited on its own.
                let _ = tx.send(());
                true
            }
            None => false,
        }
    }

    /// Wait for the task to finish. Returns `None` if it was already joined.
    pub(crate) async fn join(&self) -> Option<RenewalReport> {
        let handle = self.handle.lock().take();
        match handle?.await {
            Ok(report) => Some(report),
            Err(e) => {
                warn!(error = %e, "Renewal task did not complete");
                None
            }
        }
    }

    pub(crate) fn is_running(&self) -> bool {
        self.handle
            .lock()
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }
}

async fn run(
    mutex: Arc<dyn DistributedMutex>,
    period: Duration,
    mut cancel: oneshot::Receiver<()>,
) -> RenewalReport {
    let key = mutex.name().to_string();
    let mut ticker = interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut extensions = 0u64;

    debug!(key = %key, period_ms = period.as_millis() as u64, "Renewal task started");

    loop {
        tokio::select! {
            biased;
            _ = &mut cancel => {
                debug!(key = %key, extensions, "Renewal task cancelled");
                return RenewalReport { exit: RenewalExit::Cancelled, extensions };
            }
            _ = ticker.tick() => {}
        }

        match mutex.extend().await {
            Ok(true) => {
                extensions += 1;
                metrics::record_extend(&key, true);
                trace!(key = %key, extensions, "Lock extended");
            }
            Ok(false) => {
                metrics::record_extend(&key, false);
                debug!(key = %key, extensions, "Lock no longer held, stopping renewal");
                return RenewalReport { exit: RenewalExit::Rejected, extensions };
            }
            Err(e) => {
                metrics::record_extend(&key, false);
                warn!(key = %key, extensions, error = %e, "Lock extension failed, stopping renewal");
                return RenewalReport { exit: RenewalExit::Failed, extensions };
            }
        }
    }
}
