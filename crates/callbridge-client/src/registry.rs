//! Call registry: the live calls, keyed by identifier.
//!
//! The registry is the sole owner of every [`CallState`]. An entry is
//! inserted when a call starts and removed exactly once, by the router,
//! when the call's terminal event arrives (or when the client shuts
//! down). Handles and façades hold clones of the state's futures and
//! stream, never the entry itself.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

use callbridge_core::{CallId, Metadata};
use tracing::{debug, warn};

use crate::broadcast::BroadcastStream;
use crate::oneshot::{CancelSignal, OneShot};

/// Monotonic per-call flags.
#[derive(Debug, Default)]
pub struct CallFlags {
    finished_sending: AtomicBool,
    cancelled: AtomicBool,
}

impl CallFlags {
    /// Returns `true` only for the first caller.
    pub fn mark_finished_sending(&self) -> bool {
        !self.finished_sending.swap(true, Ordering::AcqRel)
    }

    pub fn is_finished_sending(&self) -> bool {
        self.finished_sending.load(Ordering::Acquire)
    }

    /// Returns `true` only for the first caller.
    pub fn mark_cancelled(&self) -> bool {
        !self.cancelled.swap(true, Ordering::AcqRel)
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }
}

/// Everything pending for one call.
///
/// Cloning is cheap; all clones share the same futures, stream, and flags.
#[derive(Clone, Debug)]
pub struct CallState {
    pub headers: OneShot<Metadata>,
    pub trailers: OneShot<Metadata>,
    pub stream: BroadcastStream,
    pub flags: Arc<CallFlags>,
    /// Fired by `cancel()`; rejects `headers` and `trailers` if pending.
    pub cancel: CancelSignal,
}

impl CallState {
    pub fn new() -> Self {
        let cancel = CancelSignal::new();
        let headers = OneShot::new();
        let trailers = OneShot::new();
        headers.attach(&cancel);
        trailers.attach(&cancel);

        Self {
            headers,
            trailers,
            stream: BroadcastStream::new(),
            flags: Arc::new(CallFlags::default()),
            cancel,
        }
    }
}

impl Default for CallState {
    fn default() -> Self {
        Self::new()
    }
}

/// Maps live call identifiers to their state.
#[derive(Debug, Default)]
pub struct CallRegistry {
    calls: Mutex<HashMap<CallId, CallState>>,
}

impl CallRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create the state for a new call.
    ///
    /// Identifiers come from a [`CallIdAllocator`](crate::CallIdAllocator)
    /// and are never live twice; if one somehow is, the existing state is
    /// kept and returned.
    pub fn register(&self, id: CallId) -> CallState {
        let mut calls = self.calls.lock().expect("registry lock");
        if let Some(existing) = calls.get(&id) {
            warn!(call_id = %id, "call id registered twice, keeping existing state");
            return existing.clone();
        }
        let state = CallState::new();
        calls.insert(id, state.clone());
        debug!(call_id = %id, live = calls.len(), "registered call");
        state
    }

    pub fn lookup(&self, id: CallId) -> Option<CallState> {
        self.calls.lock().expect("registry lock").get(&id).cloned()
    }

    /// Remove and return a call's state. `None` if not live.
    pub fn remove(&self, id: CallId) -> Option<CallState> {
        let mut calls = self.calls.lock().expect("registry lock");
        let removed = calls.remove(&id);
        if removed.is_some() {
            debug!(call_id = %id, live = calls.len(), "removed call");
        }
        removed
    }

    pub fn contains(&self, id: CallId) -> bool {
        self.calls.lock().expect("registry lock").contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.calls.lock().expect("registry lock").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Remove every entry, for client shutdown.
    pub fn drain(&self) -> Vec<(CallId, CallState)> {
        let mut calls = self.calls.lock().expect("registry lock");
        let mut drained: Vec<_> = calls.drain().collect();
        drained.sort_by_key(|(id, _)| *id);
        drained
    }
}
