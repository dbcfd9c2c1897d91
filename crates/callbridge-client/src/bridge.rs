//! The transport bridge seam.
//!
//! A [`TransportBridge`] owns the actual network: it opens connections,
//! writes request messages, and reports everything that happens on every
//! call through one shared [`EventSender`]. The client never reads from
//! the network itself; it only issues commands and consumes events.

use std::fmt;
use std::future::Future;
use std::pin::Pin;

use bytes::Bytes;
use callbridge_core::{BridgeEvent, CallConfig, CallError, CallId, CallResult, Metadata, MethodType};
use tokio::sync::mpsc;
use tracing::trace;

/// Boxed future returned by bridge commands.
pub type BoxFuture<T> = Pin<Box<dyn Future<Output = T> + Send>>;

/// Everything a bridge needs to open one call.
#[derive(Debug, Clone, Copy)]
pub struct StartCall<'a> {
    pub id: CallId,
    pub config: &'a CallConfig,
    /// Full method path, e.g. `/echo.Echo/UnaryEcho`.
    pub method: &'a str,
    pub headers: &'a Metadata,
    pub method_type: MethodType,
}

/// Commands the client issues to the transport.
///
/// `start_call` is synchronous: a bridge that cannot open the call says
/// so immediately. The remaining commands complete asynchronously.
pub trait TransportBridge: Send + Sync + 'static {
    /// Check that the bridge is usable. Called before every call starts;
    /// an error aborts call construction.
    fn link(&self) -> CallResult<()> {
        Ok(())
    }

    fn start_call(&self, call: StartCall<'_>) -> CallResult<()>;

    /// Write one request message. `Ok(false)` means the bridge declined it.
    fn send_message(&self, id: CallId, message: Bytes) -> BoxFuture<CallResult<bool>>;

    /// Ask the transport to abort the call. `Ok(false)` if it was not open.
    fn cancel_call(&self, id: CallId) -> BoxFuture<CallResult<bool>>;

    /// Half-close the request side.
    fn finish_client_streaming(&self, id: CallId) -> BoxFuture<CallResult<()>>;
}

/// A bridge that is never available. Every call fails with
/// [`CallError::Linkage`].
#[derive(Debug, Default, Clone, Copy)]
pub struct UnlinkedBridge;

const UNLINKED: &str = "transport bridge is not linked";

impl TransportBridge for UnlinkedBridge {
    fn link(&self) -> CallResult<()> {
        Err(CallError::Linkage(UNLINKED.into()))
    }

    fn start_call(&self, _call: StartCall<'_>) -> CallResult<()> {
        Err(CallError::Linkage(UNLINKED.into()))
    }

    fn send_message(&self, _id: CallId, _message: Bytes) -> BoxFuture<CallResult<bool>> {
        Box::pin(async { Err(CallError::Linkage(UNLINKED.into())) })
    }

    fn cancel_call(&self, _id: CallId) -> BoxFuture<CallResult<bool>> {
        Box::pin(async { Err(CallError::Linkage(UNLINKED.into())) })
    }

    fn finish_client_streaming(&self, _id: CallId) -> BoxFuture<CallResult<()>> {
        Box::pin(async { Err(CallError::Linkage(UNLINKED.into())) })
    }
}

// ── Event channel ───────────────────────────────────────────────────

/// Create the shared inbound event channel.
///
/// Hand the sender to the bridge and the receiver to
/// [`Client::new`](crate::Client::new).
pub fn event_channel() -> (EventSender, EventReceiver) {
    let (tx, rx) = mpsc::unbounded_channel();
    let sender = EventSender { tx };
    let receiver = EventReceiver {
        rx,
        loopback: sender.clone(),
    };
    (sender, receiver)
}

/// Bridge side of the event channel.
#[derive(Clone)]
pub struct EventSender {
    tx: mpsc::UnboundedSender<BridgeEvent>,
}

impl EventSender {
    /// Push one event. Returns `false` once the client has gone away.
    pub fn send(&self, event: BridgeEvent) -> bool {
        trace!(call_id = %event.id, kind = event.kind_name(), "bridge event");
        self.tx.send(event).is_ok()
    }

    /// Push one JSON wire record.
    pub fn send_json(&self, record: &str) -> Result<bool, serde_json::Error> {
        let event = BridgeEvent::from_json(record)?;
        Ok(self.send(event))
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

impl fmt::Debug for EventSender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventSender")
            .field("closed", &self.tx.is_closed())
            .finish()
    }
}

/// Client side of the event channel.
pub struct EventReceiver {
    rx: mpsc::UnboundedReceiver<BridgeEvent>,
    /// Lets the client report its own failures on the same path as the
    /// bridge's.
    loopback: EventSender,
}

impl EventReceiver {
    pub async fn recv(&mut self) -> Option<BridgeEvent> {
        self.rx.recv().await
    }

    pub(crate) fn loopback(&self) -> EventSender {
        self.loopback.clone()
    }
}

impl fmt::Debug for EventReceiver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventReceiver").finish_non_exhaustive()
    }
}
