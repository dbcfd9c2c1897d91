//! Typed façades for the four RPC shapes.
//!
//! Each façade starts a call through the [`Client`](crate::Client),
//! encodes requests and decodes responses with the method's codec, and
//! reports the outcome exactly once through its listeners.
//!
//! | shape            | requests              | responses                   |
//! |------------------|-----------------------|-----------------------------|
//! | unary            | one, at start         | callback                    |
//! | server-streaming | one, at start         | `data` / `end` / `status`   |
//! | client-streaming | `write`* then `end()` | `end` / `status`            |
//! | bidi-streaming   | `write`* then `end()` | `data` / `end` / `status`   |

mod bidi;
mod client_streaming;
mod server_streaming;
mod unary;

pub use bidi::BidiStream;
pub use client_streaming::ClientStream;
pub use server_streaming::ServerStream;
pub use unary::UnaryCall;

use std::sync::{Arc, Mutex};

use bytes::Bytes;
use callbridge_core::{CallError, CallResult, Metadata, Status, codes};
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::call::CallHandle;
use crate::codec::Codec;
use crate::oneshot::OneShot;

type DataListener<T> = Arc<dyn Fn(&T) + Send + Sync>;
type StatusListener = Arc<dyn Fn(&Status) + Send + Sync>;

struct ListenerSet<T> {
    data: Vec<DataListener<T>>,
    end: Vec<StatusListener>,
    status: Vec<StatusListener>,
    closed: bool,
    /// Set when the call ended rather than being cancelled.
    outcome: Option<Status>,
}

/// `data` / `end` / `status` listeners for one façade.
///
/// Once closed, by the call ending or by cancellation, every listener
/// is released. An `end` or `status` listener registered after the call
/// ended is called with the final status straight away; one registered
/// after cancellation is dropped. Data listeners only see messages that
/// arrive after they are registered.
pub(crate) struct Listeners<T> {
    set: Mutex<ListenerSet<T>>,
}

impl<T> Listeners<T> {
    pub(crate) fn new() -> Self {
        Self {
            set: Mutex::new(ListenerSet {
                data: Vec::new(),
                end: Vec::new(),
                status: Vec::new(),
                closed: false,
                outcome: None,
            }),
        }
    }

    pub(crate) fn on_data(&self, listener: DataListener<T>) {
        let mut set = self.set.lock().expect("listeners lock");
        if !set.closed {
            set.data.push(listener);
        }
    }

    pub(crate) fn on_end(&self, listener: StatusListener) {
        self.register_final(listener, |set| &mut set.end);
    }

    pub(crate) fn on_status(&self, listener: StatusListener) {
        self.register_final(listener, |set| &mut set.status);
    }

    fn register_final(
        &self,
        listener: StatusListener,
        slot: impl FnOnce(&mut ListenerSet<T>) -> &mut Vec<StatusListener>,
    ) {
        let outcome = {
            let mut set = self.set.lock().expect("listeners lock");
            if !set.closed {
                slot(&mut *set).push(listener);
                return;
            }
            set.outcome.clone()
        };
        if let Some(status) = outcome {
            listener(&status);
        }
    }

    pub(crate) fn emit_data(&self, message: &T) {
        let data = {
            let set = self.set.lock().expect("listeners lock");
            if set.closed {
                return;
            }
            set.data.clone()
        };
        for listener in data {
            listener(message);
        }
    }

    /// Report the final status to `status` then `end` listeners, once.
    pub(crate) fn finish(&self, status: &Status) -> bool {
        let (status_listeners, end_listeners) = {
            let mut set = self.set.lock().expect("listeners lock");
            if set.closed {
                return false;
            }
            set.closed = true;
            set.outcome = Some(status.clone());
            set.data.clear();
            (
                std::mem::take(&mut set.status),
                std::mem::take(&mut set.end),
            )
        };
        for listener in status_listeners {
            listener(status);
        }
        for listener in end_listeners {
            listener(status);
        }
        true
    }

    /// Drop every listener without reporting anything.
    pub(crate) fn clear(&self) {
        let mut set = self.set.lock().expect("listeners lock");
        set.closed = true;
        set.data.clear();
        set.end.clear();
        set.status.clear();
    }
}

/// Wire a call's response stream to a façade's listeners.
///
/// With a codec, each chunk is decoded and handed to `data` listeners; a
/// chunk that fails to decode ends the façade with an `INTERNAL` status
/// and cancels the call. Without one, chunks are ignored.
pub(crate) fn attach_listeners<C: Codec>(
    call: &CallHandle,
    listeners: &Arc<Listeners<C::Response>>,
    codec: Option<Arc<C>>,
) {
    let state = call.state();
    let weak = call.downgrade();

    let on_data = {
        let listeners = listeners.clone();
        let headers = state.headers.clone();
        move |chunk: &Bytes| {
            let Some(codec) = codec.as_ref() else {
                return;
            };
            match codec.decode(chunk) {
                Ok(message) => listeners.emit_data(&message),
                Err(e) => {
                    debug!(error = %e, "response failed to decode, cancelling call");
                    listeners.finish(&Status {
                        code: codes::INTERNAL,
                        details: e.details(),
                        metadata: headers_so_far(&headers),
                    });
                    if let Some(call) = weak.upgrade() {
                        call.cancel();
                    }
                }
            }
        }
    };
    let on_complete = {
        let listeners = listeners.clone();
        let trailers = state.trailers.clone();
        move || {
            let trailers = match trailers.peek() {
                Some(Ok(trailers)) => trailers,
                _ => Metadata::new(),
            };
            listeners.finish(&Status::ok(trailers));
        }
    };
    let on_error = {
        let listeners = listeners.clone();
        let headers = state.headers.clone();
        move |err: &CallError| {
            listeners.finish(&Status::from_error(err, headers_so_far(&headers)));
        }
    };

    // Detached by the terminal publish.
    let _ = state.stream.subscribe(on_data, on_complete, on_error);
}

fn headers_so_far(headers: &OneShot<Metadata>) -> Metadata {
    match headers.peek() {
        Some(Ok(headers)) => headers,
        _ => Metadata::new(),
    }
}

/// Send the single request of a unary or server-streaming call, then
/// finish the request side once the bridge has accepted it.
pub(crate) fn spawn_single_request(call: CallHandle, message: Bytes) {
    tokio::spawn(async move {
        match call.send_message(message).await {
            Ok(true) => {
                if let Err(e) = call.finish_sending().await {
                    warn!(call_id = %call.id(), error = %e, "finish after single request failed");
                }
            }
            Ok(false) => debug!(call_id = %call.id(), "single request not accepted"),
            Err(e) => warn!(call_id = %call.id(), error = %e, "single request failed"),
        }
    });
}

enum Outbound {
    Message(Bytes),
    Finish,
}

/// Ordered request writer for client-streaming and bidi calls.
///
/// Writes and the final finish are queued and handed to the bridge one
/// at a time, in the order they were made. Finishing closes the queue,
/// so nothing can be queued behind the finish.
pub(crate) struct RequestSink {
    tx: Mutex<Option<mpsc::UnboundedSender<Outbound>>>,
}

impl RequestSink {
    pub(crate) fn spawn(call: CallHandle) -> Self {
        let (tx, mut rx) = mpsc::unbounded_channel();
        tokio::spawn(async move {
            while let Some(item) = rx.recv().await {
                match item {
                    Outbound::Message(message) => match call.send_message(message).await {
                        Ok(true) => {}
                        Ok(false) => debug!(call_id = %call.id(), "request message not accepted"),
                        Err(e) => warn!(call_id = %call.id(), error = %e, "request message failed"),
                    },
                    Outbound::Finish => {
                        if let Err(e) = call.finish_sending().await {
                            warn!(call_id = %call.id(), error = %e, "finishing request side failed");
                        }
                        break;
                    }
                }
            }
        });
        Self {
            tx: Mutex::new(Some(tx)),
        }
    }

    /// Queue one message. `false` once the request side is finished.
    pub(crate) fn write(&self, message: Bytes) -> bool {
        match self.tx.lock().expect("sink lock").as_ref() {
            Some(tx) => tx.send(Outbound::Message(message)).is_ok(),
            None => false,
        }
    }

    /// Queue the finish. Only the first call does anything.
    pub(crate) fn finish(&self) -> bool {
        match self.tx.lock().expect("sink lock").take() {
            Some(tx) => tx.send(Outbound::Finish).is_ok(),
            None => false,
        }
    }
}

/// Encode and queue one request.
pub(crate) fn write_request<C: Codec>(
    sink: &RequestSink,
    codec: &C,
    request: &C::Request,
) -> CallResult<bool> {
    let message = codec.encode(request)?;
    Ok(sink.write(message))
}
