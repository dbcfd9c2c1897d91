//! Event router: demultiplexes bridge events into per-call state.
//!
//! ```text
//!  bridge events (all calls, one channel)
//!        │
//!        ▼
//!  EventRouter::dispatch ──lookup/remove──▶ CallRegistry
//!        │
//!        ├── headers  → headers.resolve
//!        ├── data     → stream.publish_data
//!        ├── trailers → remove, trailers.resolve, stream.publish_complete
//!        └── error    → remove, headers/trailers.reject, stream.publish_error
//! ```
//!
//! Terminal events remove the registry entry *before* settling, so a
//! duplicate terminal (or anything else) arriving afterwards finds no
//! entry and is dropped. Events for unknown identifiers are expected
//! bridge behavior, not protocol violations, and are only traced.

use std::sync::{Arc, Mutex};

use callbridge_core::{BridgeEvent, CallError, CallId, EventKind, Metadata};
use tracing::{debug, trace};

use crate::registry::{CallRegistry, CallState};

/// What [`EventRouter::dispatch`] did with an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatch {
    /// Applied to a live call.
    Delivered,
    /// Applied and ended the call.
    Terminated,
    /// No live call with that identifier.
    Dropped,
}

/// The single entry point for bridge events.
pub struct EventRouter {
    registry: Arc<CallRegistry>,
    /// Serializes dispatch when events arrive from more than one thread.
    gate: Mutex<()>,
}

impl EventRouter {
    pub fn new(registry: Arc<CallRegistry>) -> Self {
        Self {
            registry,
            gate: Mutex::new(()),
        }
    }

    pub fn registry(&self) -> &Arc<CallRegistry> {
        &self.registry
    }

    /// Apply one event.
    ///
    /// Handlers attached to the call's stream run inside this call. They
    /// must not call `dispatch` themselves.
    pub fn dispatch(&self, event: BridgeEvent) -> Dispatch {
        let _gate = self.gate.lock().expect("dispatch lock");
        let id = event.id;
        trace!(call_id = %id, kind = event.kind_name(), "dispatching event");

        match event.kind {
            EventKind::Headers(headers) => {
                let Some(call) = self.registry.lookup(id) else {
                    return dropped(id, "headers");
                };
                call.headers.resolve(headers);
                Dispatch::Delivered
            }
            EventKind::Data(payload) => {
                let Some(call) = self.registry.lookup(id) else {
                    return dropped(id, "data");
                };
                match payload.into_bytes() {
                    Ok(chunk) => {
                        call.stream.publish_data(chunk);
                        Dispatch::Delivered
                    }
                    Err(err) => {
                        debug!(call_id = %id, error = %err, "undecodable payload, failing call");
                        match self.registry.remove(id) {
                            Some(call) => fail(call, &err),
                            None => dropped(id, "data"),
                        }
                    }
                }
            }
            EventKind::Trailers(trailers) => {
                let Some(call) = self.registry.remove(id) else {
                    return dropped(id, "trailers");
                };
                debug!(call_id = %id, "call completed");
                // Trailers-only responses carry no headers; settle them empty.
                call.headers.resolve(Metadata::new());
                call.trailers.resolve(trailers);
                call.stream.publish_complete();
                Dispatch::Terminated
            }
            EventKind::Error { message, code } => {
                let Some(call) = self.registry.remove(id) else {
                    return dropped(id, "error");
                };
                let err = CallError::transport(message, code);
                debug!(call_id = %id, error = %err, ?code, "call failed");
                fail(call, &err)
            }
        }
    }
}

fn fail(call: CallState, err: &CallError) -> Dispatch {
    call.headers.reject(err.clone());
    call.trailers.reject(err.clone());
    call.stream.publish_error(err);
    Dispatch::Terminated
}

fn dropped(id: CallId, kind: &'static str) -> Dispatch {
    debug!(call_id = %id, kind, "no live call for event, dropped");
    Dispatch::Dropped
}
