//! Cooperative cancellation for in-flight requests.
//!
//! The request generator never looks at the signal; it is handed to the
//! transport untouched, and transports that support cancellation race the
//! exchange against [`AbortSignal::aborted`].

use std::sync::Arc;

use tokio_util::sync::{CancellationToken, WaitForCancellationFutureOwned};

/// Owner side of an abort signal.
#[derive(Debug, Clone, Default)]
pub struct AbortController {
    signal: AbortSignal,
}

impl AbortController {
    /// Create a controller with a fresh signal.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Signal handed to requests.
    #[must_use]
    pub fn signal(&self) -> AbortSignal {
        self.signal.clone()
    }

    /// Abort every request observing the signal.
    pub fn abort(&self) {
        self.signal.token.cancel();
    }
}

/// Observer side of an abort signal.
///
/// Clones observe the same controller and compare equal.
#[derive(Debug, Clone, Default)]
pub struct AbortSignal {
    token: Arc<CancellationToken>,
}

impl AbortSignal {
    /// Whether the controller has aborted.
    #[must_use]
    pub fn is_aborted(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Resolve once the controller aborts.
    ///
    /// Dropping the future unregisters it, so a long-lived signal can be
    /// shared by any number of finished requests.
    pub fn aborted(&self) -> WaitForCancellationFutureOwned {
        CancellationToken::clone(&self.token).cancelled_owned()
    }
}

impl PartialEq for AbortSignal {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.token, &other.token)
    }
}

#[cfg(test)]
mod tests {
    use core::{
        pin::pin,
        task::{Context, Waker},
    };
    use std::task::Wake;

    use super::*;

    #[tokio::test]
    async fn aborted_resolves_after_abort() {
        let controller = AbortController::new();
        let signal = controller.signal();
        assert!(!signal.is_aborted());

        let waiter = tokio::spawn(signal.aborted());
        controller.abort();
        waiter.await.unwrap();
        assert!(signal.is_aborted());
    }

    #[tokio::test]
    async fn aborted_is_ready_when_already_aborted() {
        let controller = AbortController::new();
        controller.abort();
        controller.signal().aborted().await;
    }

    #[test]
    fn signals_compare_by_identity() {
        let controller = AbortController::new();
        assert_eq!(controller.signal(), controller.signal());
        assert_ne!(controller.signal(), AbortController::new().signal());
    }

    struct NoopWake;

    impl Wake for NoopWake {
        fn wake(self: Arc<Self>) {}
    }

    #[test]
    fn finished_waits_do_not_accumulate() {
        let controller = AbortController::new();
        let signal = controller.signal();
        let wake = Arc::new(NoopWake);

        for _ in 0..1000 {
            let waker = Waker::from(Arc::clone(&wake));
            let mut cx = Context::from_waker(&waker);
            let mut aborted = pin!(signal.aborted());
            assert!(aborted.as_mut().poll(&mut cx).is_pending());
        }

        // Every registered waker was released with its future.
        assert_eq!(Arc::strong_count(&wake), 1);
        assert!(!signal.is_aborted());
    }
}
