//! Shared fixtures: a bridge that records every command it receives and
//! a UTF-8 string codec.

#![allow(dead_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use bytes::Bytes;
use callbridge_client::{
    BoxFuture, Client, Codec, EventSender, Method, StartCall, TransportBridge, event_channel,
};
use callbridge_core::{CallError, CallId, CallResult, MethodType};
use tokio::sync::watch;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Op {
    Start {
        id: CallId,
        method: String,
        method_type: MethodType,
    },
    Send {
        id: CallId,
        message: Bytes,
    },
    Finish(CallId),
    Cancel(CallId),
}

/// Accepts every command and records it. Emits no events of its own;
/// tests push events through the [`EventSender`] from [`setup`].
pub struct RecordingBridge {
    ops: watch::Sender<Vec<Op>>,
    refuse_start: AtomicBool,
}

impl RecordingBridge {
    pub fn new() -> Self {
        let (ops, _) = watch::channel(Vec::new());
        Self {
            ops,
            refuse_start: AtomicBool::new(false),
        }
    }

    /// A bridge whose `start_call` always fails.
    pub fn refusing() -> Self {
        let bridge = Self::new();
        bridge.refuse_start.store(true, Ordering::SeqCst);
        bridge
    }

    pub fn ops(&self) -> Vec<Op> {
        self.ops.borrow().clone()
    }

    pub fn count(&self, pred: impl Fn(&Op) -> bool) -> usize {
        self.ops.borrow().iter().filter(|op| pred(op)).count()
    }

    pub fn sent(&self, id: CallId) -> Vec<String> {
        self.ops
            .borrow()
            .iter()
            .filter_map(|op| match op {
                Op::Send { id: sid, message } if *sid == id => {
                    Some(String::from_utf8_lossy(message).into_owned())
                }
                _ => None,
            })
            .collect()
    }

    /// Wait until the recorded commands satisfy `pred`.
    pub async fn wait_for(&self, pred: impl Fn(&[Op]) -> bool) {
        let mut rx = self.ops.subscribe();
        tokio::time::timeout(Duration::from_secs(5), rx.wait_for(|ops| pred(ops)))
            .await
            .expect("timed out waiting for bridge commands")
            .expect("recorder closed");
    }

    fn record(&self, op: Op) {
        self.ops.send_modify(|ops| ops.push(op));
    }
}

impl TransportBridge for RecordingBridge {
    fn start_call(&self, call: StartCall<'_>) -> CallResult<()> {
        if self.refuse_start.load(Ordering::SeqCst) {
            return Err(CallError::transport("no route to host", Some(14)));
        }
        self.record(Op::Start {
            id: call.id,
            method: call.method.to_string(),
            method_type: call.method_type,
        });
        Ok(())
    }

    fn send_message(&self, id: CallId, message: Bytes) -> BoxFuture<CallResult<bool>> {
        self.record(Op::Send { id, message });
        Box::pin(async { Ok(true) })
    }

    fn cancel_call(&self, id: CallId) -> BoxFuture<CallResult<bool>> {
        self.record(Op::Cancel(id));
        Box::pin(async { Ok(true) })
    }

    fn finish_client_streaming(&self, id: CallId) -> BoxFuture<CallResult<()>> {
        self.record(Op::Finish(id));
        Box::pin(async { Ok(()) })
    }
}

/// Strings on the wire as UTF-8.
#[derive(Debug, Default, Clone, Copy)]
pub struct Utf8;

impl Codec for Utf8 {
    type Request = String;
    type Response = String;

    fn encode(&self, request: &String) -> CallResult<Bytes> {
        Ok(Bytes::from(request.clone()))
    }

    fn decode(&self, bytes: &[u8]) -> CallResult<String> {
        String::from_utf8(bytes.to_vec()).map_err(|e| CallError::Codec(e.to_string()))
    }
}

pub fn method(path: &str) -> Method<Utf8> {
    Method::new(path, Utf8)
}

pub fn setup() -> (Client, Arc<RecordingBridge>, EventSender) {
    setup_with(RecordingBridge::new())
}

pub fn setup_with(bridge: RecordingBridge) -> (Client, Arc<RecordingBridge>, EventSender) {
    let (events, inbox) = event_channel();
    let bridge = Arc::new(bridge);
    let client = Client::new(bridge.clone(), inbox);
    (client, bridge, events)
}
