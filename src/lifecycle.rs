//! Disposal state machine.
//!
//! ```text
//! Live ──begin()──► Disposing ──finish()──► Disposed
//! ```
//!
//! Transitions only go forward and each happens once. `begin()` is the single
//! synchronization point: it is a compare-and-set on a `watch` channel, so
//! exactly one caller wins the teardown no matter how many race for it. The
//! winner also fires a [`CancellationToken`] that in-flight reads and writes
//! select on, which is how they learn about disposal at their next suspension
//! point.

use tokio::sync::watch;
use tokio_util::sync::{CancellationToken, WaitForCancellationFuture};

/// Liveness of a handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum DisposalState {
    /// Accepting reads and writes.
    Live,
    /// Teardown started; new operations fail, in-flight ones are unwinding.
    Disposing,
    /// Streams released.
    Disposed,
}

/// Shared disposal state.
#[derive(Debug)]
pub struct Lifecycle {
    state: watch::Sender<DisposalState>,
    signal: CancellationToken,
}

impl Lifecycle {
    /// Create a live lifecycle.
    pub fn new() -> Self {
        let (state, _) = watch::channel(DisposalState::Live);
        Self {
            state,
            signal: CancellationToken::new(),
        }
    }

    /// Current state.
    #[inline]
    pub fn state(&self) -> DisposalState {
        *self.state.borrow()
    }

    /// True from the moment disposal begins; never false again.
    #[inline]
    pub fn is_disposed(&self) -> bool {
        self.signal.is_cancelled()
    }

    /// Move `Live → Disposing`.
    ///
    /// Returns `true` for exactly one caller over the lifetime of the
    /// lifecycle; that caller owns the teardown and must call [`finish`].
    ///
    /// [`finish`]: Lifecycle::finish
    pub fn begin(&self) -> bool {
        let won = self.state.send_if_modified(|state| {
            if *state == DisposalState::Live {
                *state = DisposalState::Disposing;
                true
            } else {
                false
            }
        });
        if won {
            self.signal.cancel();
        }
        won
    }

    /// Move `Disposing → Disposed` and wake everyone waiting in [`disposed`].
    ///
    /// [`disposed`]: Lifecycle::disposed
    pub fn finish(&self) {
        self.state.send_if_modified(|state| {
            if *state == DisposalState::Disposing {
                *state = DisposalState::Disposed;
                true
            } else {
                false
            }
        });
    }

    /// Future that resolves once disposal has begun.
    pub fn signaled(&self) -> WaitForCancellationFuture<'_> {
        self.signal.cancelled()
    }

    /// Owned token cancelled when disposal begins, for tasks that outlive a
    /// borrow of the lifecycle.
    pub fn token(&self) -> CancellationToken {
        self.signal.child_token()
    }

    /// Wait until teardown has finished.
    pub async fn disposed(&self) {
        let mut rx = self.state.subscribe();
        // The sender lives in `self`, so the channel cannot close while we wait.
        let _ = rx.wait_for(|state| *state == DisposalState::Disposed).await;
    }
}

impl Default for Lifecycle {
    fn default() -> Self {
        Self::new()
    }
}
