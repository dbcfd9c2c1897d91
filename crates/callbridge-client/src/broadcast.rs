//! Multi-subscriber stream of response chunks.
//!
//! A [`BroadcastStream`] delivers every chunk published while a
//! subscriber is attached to that subscriber, once, in publish order.
//! `publish_complete` and `publish_error` are terminal and mutually
//! exclusive; after either, nothing more is delivered. There is no
//! replay: a subscriber only sees what is published after it attaches.
//!
//! Handlers run on the publishing thread with no stream lock held, so a
//! handler may subscribe or unsubscribe (itself or others) freely. A
//! subscriber detached mid-publish receives nothing further, including
//! the rest of the current publish.

use std::fmt;
use std::sync::{Arc, Mutex, Weak};

use bytes::Bytes;
use callbridge_core::CallError;
use tracing::trace;

type DataHandler = Box<dyn Fn(&Bytes) + Send + Sync>;
type CompleteHandler = Box<dyn Fn() + Send + Sync>;
type ErrorHandler = Box<dyn Fn(&CallError) + Send + Sync>;

struct Subscriber {
    on_data: DataHandler,
    on_complete: CompleteHandler,
    on_error: ErrorHandler,
}

#[derive(Default)]
struct StreamState {
    next_id: u64,
    subscribers: Vec<(u64, Arc<Subscriber>)>,
    terminal: Option<Terminal>,
}

/// How a stream ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Terminal {
    Complete,
    Error(CallError),
}

impl StreamState {
    fn is_attached(&self, id: u64) -> bool {
        self.subscribers.iter().any(|(sid, _)| *sid == id)
    }
}

/// Response chunks for one call, fanned out to any number of subscribers.
#[derive(Clone, Default)]
pub struct BroadcastStream {
    state: Arc<Mutex<StreamState>>,
}

impl BroadcastStream {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach a subscriber. Keep the returned [`Subscription`] to detach
    /// later; dropping it leaves the subscriber attached.
    pub fn subscribe(
        &self,
        on_data: impl Fn(&Bytes) + Send + Sync + 'static,
        on_complete: impl Fn() + Send + Sync + 'static,
        on_error: impl Fn(&CallError) + Send + Sync + 'static,
    ) -> Subscription {
        let subscriber = Arc::new(Subscriber {
            on_data: Box::new(on_data),
            on_complete: Box::new(on_complete),
            on_error: Box::new(on_error),
        });

        let mut state = self.state.lock().expect("stream lock");
        let id = state.next_id;
        state.next_id += 1;
        state.subscribers.push((id, subscriber));

        Subscription {
            state: Arc::downgrade(&self.state),
            id,
        }
    }

    /// Attach a data-only subscriber.
    pub fn on_data(&self, on_data: impl Fn(&Bytes) + Send + Sync + 'static) -> Subscription {
        self.subscribe(on_data, || {}, |_| {})
    }

    /// Deliver a chunk to every attached subscriber. Returns how many
    /// received it; zero after a terminal publish.
    pub fn publish_data(&self, chunk: Bytes) -> usize {
        let Some(snapshot) = self.snapshot() else {
            trace!(len = chunk.len(), "data published after terminal, dropped");
            return 0;
        };

        let mut delivered = 0;
        for (id, subscriber) in snapshot {
            if self.is_attached(id) {
                (subscriber.on_data)(&chunk);
                delivered += 1;
            }
        }
        delivered
    }

    /// End the stream successfully. Returns `false` if already ended.
    pub fn publish_complete(&self) -> bool {
        self.terminate(Terminal::Complete)
    }

    /// End the stream with an error. Returns `false` if already ended.
    pub fn publish_error(&self, err: &CallError) -> bool {
        self.terminate(Terminal::Error(err.clone()))
    }

    pub fn is_terminated(&self) -> bool {
        self.terminal().is_some()
    }

    pub fn terminal(&self) -> Option<Terminal> {
        self.state.lock().expect("stream lock").terminal.clone()
    }

    pub fn subscriber_count(&self) -> usize {
        self.state.lock().expect("stream lock").subscribers.len()
    }

    fn terminate(&self, terminal: Terminal) -> bool {
        let snapshot = {
            let mut state = self.state.lock().expect("stream lock");
            if state.terminal.is_some() {
                return false;
            }
            state.terminal = Some(terminal.clone());
            state.subscribers.clone()
        };

        for (id, subscriber) in snapshot {
            if !self.is_attached(id) {
                continue;
            }
            match &terminal {
                Terminal::Complete => (subscriber.on_complete)(),
                Terminal::Error(err) => (subscriber.on_error)(err),
            }
        }

        // Nothing can be delivered after a terminal publish; release the
        // handlers and whatever they captured.
        self.state.lock().expect("stream lock").subscribers.clear();
        true
    }

    fn snapshot(&self) -> Option<Vec<(u64, Arc<Subscriber>)>> {
        let state = self.state.lock().expect("stream lock");
        if state.terminal.is_some() {
            return None;
        }
        Some(state.subscribers.clone())
    }

    fn is_attached(&self, id: u64) -> bool {
        self.state.lock().expect("stream lock").is_attached(id)
    }
}

impl fmt::Debug for BroadcastStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.lock().expect("stream lock");
        f.debug_struct("BroadcastStream")
            .field("subscribers", &state.subscribers.len())
            .field("terminal", &state.terminal)
            .finish()
    }
}

/// Capability to detach one subscriber.
#[derive(Debug)]
pub struct Subscription {
    state: Weak<Mutex<StreamState>>,
    id: u64,
}

impl Subscription {
    /// Detach. Returns `false` if already detached or the stream is gone.
    pub fn unsubscribe(&self) -> bool {
        let Some(state) = self.state.upgrade() else {
            return false;
        };
        let mut state = state.lock().expect("stream lock");
        let before = state.subscribers.len();
        state.subscribers.retain(|(id, _)| *id != self.id);
        state.subscribers.len() != before
    }
}
