//! Single-assignment futures and the cancellation signal they listen to.
//!
//! A [`OneShot`] is settled at most once, by [`resolve`](OneShot::resolve)
//! or [`reject`](OneShot::reject); whichever comes first wins. Any number
//! of tasks may [`wait`](OneShot::wait) on it, before or after settlement,
//! and all of them observe the same outcome.
//!
//! A [`CancelSignal`] fires at most once. One-shots attached to it are
//! rejected with [`CallError::Cancelled`] if they are still pending when
//! it fires.

use std::fmt;
use std::sync::{Arc, Mutex};

use callbridge_core::{CallError, CallResult};
use tokio::sync::watch;

/// A value that settles exactly once and can be awaited many times.
pub struct OneShot<T> {
    slot: Arc<watch::Sender<Option<CallResult<T>>>>,
}

impl<T> OneShot<T> {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(None);
        Self { slot: Arc::new(tx) }
    }

    /// Settle with a value. Returns `false` if already settled.
    pub fn resolve(&self, value: T) -> bool {
        self.settle(Ok(value))
    }

    /// Settle with an error. Returns `false` if already settled.
    pub fn reject(&self, err: CallError) -> bool {
        self.settle(Err(err))
    }

    pub fn is_settled(&self) -> bool {
        self.slot.borrow().is_some()
    }

    fn settle(&self, outcome: CallResult<T>) -> bool {
        self.slot.send_if_modified(move |slot| {
            if slot.is_some() {
                return false;
            }
            *slot = Some(outcome);
            true
        })
    }
}

impl<T: Clone> OneShot<T> {
    /// The outcome, if settled.
    pub fn peek(&self) -> Option<CallResult<T>> {
        self.slot.borrow().clone()
    }

    /// Wait for settlement.
    pub async fn wait(&self) -> CallResult<T> {
        let mut rx = self.slot.subscribe();
        // The sender lives in `self`, so the channel cannot close under us.
        let settled = rx
            .wait_for(Option::is_some)
            .await
            .map_err(|_| CallError::Cancelled)?;
        (*settled).clone().unwrap_or(Err(CallError::Cancelled))
    }
}

impl<T: Send + Sync + 'static> OneShot<T> {
    /// Reject with [`CallError::Cancelled`] when `signal` fires, unless
    /// settled first.
    pub fn attach(&self, signal: &CancelSignal) {
        let this = self.clone();
        signal.on_cancel(move || {
            this.reject(CallError::Cancelled);
        });
    }
}

impl<T> Clone for OneShot<T> {
    fn clone(&self) -> Self {
        Self {
            slot: Arc::clone(&self.slot),
        }
    }
}

impl<T> Default for OneShot<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for OneShot<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OneShot")
            .field("settled", &self.is_settled())
            .finish()
    }
}

// ── Cancellation signal ─────────────────────────────────────────────

type CancelListener = Box<dyn FnOnce() + Send>;

#[derive(Default)]
struct SignalState {
    fired: bool,
    listeners: Vec<CancelListener>,
}

/// Fire-once signal with registered listeners.
#[derive(Clone, Default)]
pub struct CancelSignal {
    state: Arc<Mutex<SignalState>>,
}

impl CancelSignal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `listener` when the signal fires. Runs immediately if it
    /// already has.
    pub fn on_cancel(&self, listener: impl FnOnce() + Send + 'static) {
        {
            let mut state = self.state.lock().expect("cancel signal lock");
            if !state.fired {
                state.listeners.push(Box::new(listener));
                return;
            }
        }
        listener();
    }

    /// Fire the signal. Returns `false` if it had already fired.
    ///
    /// Listeners run on the calling thread, outside the signal's lock.
    pub fn fire(&self) -> bool {
        let listeners = {
            let mut state = self.state.lock().expect("cancel signal lock");
            if state.fired {
                return false;
            }
            state.fired = true;
            std::mem::take(&mut state.listeners)
        };
        for listener in listeners {
            listener();
        }
        true
    }

    pub fn is_fired(&self) -> bool {
        self.state.lock().expect("cancel signal lock").fired
    }
}

impl fmt::Debug for CancelSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CancelSignal")
            .field("fired", &self.is_fired())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    #[test]
    fn first_settlement_wins() {
        let fut = OneShot::new();
        assert!(fut.resolve(1));
        assert!(!fut.resolve(2));
        assert!(!fut.reject(CallError::Cancelled));
        assert_eq!(fut.peek(), Some(Ok(1)));
    }

    #[test]
    fn reject_then_resolve_keeps_error() {
        let fut: OneShot<u32> = OneShot::new();
        assert!(fut.reject(CallError::transport("boom", Some(2))));
        assert!(!fut.resolve(5));
        assert_eq!(fut.peek(), Some(Err(CallError::transport("boom", Some(2)))));
    }

    #[test]
    fn unsettled_peek_is_none() {
        let fut: OneShot<u32> = OneShot::new();
        assert!(!fut.is_settled());
        assert_eq!(fut.peek(), None);
    }

    #[tokio::test]
    async fn wait_after_settlement_returns_same_outcome() {
        let fut = OneShot::new();
        fut.resolve("done".to_string());
        assert_eq!(fut.wait().await.unwrap(), "done");
        assert_eq!(fut.wait().await.unwrap(), "done");
    }

    #[tokio::test]
    async fn many_waiters_observe_one_settlement() {
        let fut: OneShot<u32> = OneShot::new();
        let a = tokio::spawn({
            let fut = fut.clone();
            async move { fut.wait().await }
        });
        let b = tokio::spawn({
            let fut = fut.clone();
            async move { fut.wait().await }
        });
        tokio::task::yield_now().await;

        fut.resolve(42);

        assert_eq!(a.await.unwrap(), Ok(42));
        assert_eq!(b.await.unwrap(), Ok(42));
    }

    #[test]
    fn signal_rejects_pending_future() {
        let signal = CancelSignal::new();
        let fut: OneShot<u32> = OneShot::new();
        fut.attach(&signal);

        assert!(signal.fire());
        assert_eq!(fut.peek(), Some(Err(CallError::Cancelled)));
    }

    #[test]
    fn signal_after_settlement_has_no_effect() {
        let signal = CancelSignal::new();
        let fut = OneShot::new();
        fut.attach(&signal);
        fut.resolve(7);

        signal.fire();
        assert_eq!(fut.peek(), Some(Ok(7)));
    }

    #[test]
    fn signal_fires_once() {
        let signal = CancelSignal::new();
        let hits = Arc::new(AtomicUsize::new(0));
        let h = hits.clone();
        signal.on_cancel(move || {
            h.fetch_add(1, Ordering::SeqCst);
        });

        assert!(signal.fire());
        assert!(!signal.fire());
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn listener_added_after_fire_runs_immediately() {
        let signal = CancelSignal::new();
        signal.fire();

        let fut: OneShot<u32> = OneShot::new();
        fut.attach(&signal);
        assert_eq!(fut.peek(), Some(Err(CallError::Cancelled)));
    }
}
