//! # Shutdown Signal
//!
//! Cooperative cancellation carrying the reason the client stopped.
//!
//! ```
//! use rc_uplink::shutdown::{self, StopReason};
//!
//! # tokio_test::block_on(async {
//! let (handle, mut signal) = shutdown::channel();
//! handle.cancel(StopReason::Requested);
//! assert_eq!(signal.cancelled().await, StopReason::Requested);
//! # });
//! ```

use std::sync::Arc;

use tokio::sync::watch;

/// Why the client stopped without an error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// Ctrl+C
    Interrupted,
    /// The configured run duration elapsed
    DeadlineExceeded,
    /// Stopped programmatically
    Requested,
}

impl std::fmt::Display for StopReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StopReason::Interrupted => f.write_str("interrupted"),
            StopReason::DeadlineExceeded => f.write_str("deadline exceeded"),
            StopReason::Requested => f.write_str("stop requested"),
        }
    }
}

/// Creates a connected handle/signal pair
#[must_use]
pub fn channel() -> (CancelHandle, CancelSignal) {
    let (tx, rx) = watch::channel(None);
    (CancelHandle { tx: Arc::new(tx) }, CancelSignal { rx })
}

/// Triggers cancellation; cheap to clone
#[derive(Debug, Clone)]
pub struct CancelHandle {
    tx: Arc<watch::Sender<Option<StopReason>>>,
}

impl CancelHandle {
    /// Requests a stop. The first reason wins.
    ///
    /// Returns `false` if a reason was already set.
    pub fn cancel(&self, reason: StopReason) -> bool {
        self.tx.send_if_modified(|current| {
            if current.is_some() {
                return false;
            }
            *current = Some(reason);
            true
        })
    }

    /// Whether a stop has been requested
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.tx.borrow().is_some()
    }
}

/// Observed by the loop
#[derive(Debug, Clone)]
pub struct CancelSignal {
    rx: watch::Receiver<Option<StopReason>>,
}

impl CancelSignal {
    /// Resolves once a stop is requested.
    ///
    /// Cancel-safe, so it can sit in a `tokio::select!` that is re-entered
    /// every iteration. Never resolves if all handles are dropped without
    /// cancelling.
    pub async fn cancelled(&mut self) -> StopReason {
        loop {
            if let Some(reason) = *self.rx.borrow_and_update() {
                return reason;
            }
            if self.rx.changed().await.is_err() {
                std::future::pending::<()>().await;
            }
        }
    }

    /// The stop reason, if one was set
    #[must_use]
    pub fn reason(&self) -> Option<StopReason> {
        *self.rx.borrow()
    }
}
