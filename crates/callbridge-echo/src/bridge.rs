//! In-process transport bridge answering the echo service.
//!
//! Calls never leave the process: requests are decoded as
//! [`EchoRequest`]s, answered per [`EchoMethod`], and the answers are
//! pushed back through the event channel in the same JSON-shaped form a
//! native bridge would use (base64 response payloads).

use std::collections::HashMap;
use std::sync::Mutex;

use bytes::Bytes;
use callbridge_client::{BoxFuture, EventSender, StartCall, TransportBridge};
use callbridge_core::{BridgeEvent, CallError, CallId, CallResult, Metadata, codes};
use prost::Message as _;
use tracing::{debug, info, warn};

use crate::proto::{EchoRequest, EchoResponse};
use crate::service::EchoMethod;

struct OpenCall {
    method: EchoMethod,
    /// Request headers, echoed back as response headers.
    headers: Metadata,
    headers_sent: bool,
    requests: Vec<String>,
}

impl OpenCall {
    fn respond(&mut self, id: CallId, messages: Vec<String>, out: &mut Vec<BridgeEvent>) {
        self.send_headers(id, out);
        for message in messages {
            let bytes = EchoResponse::new(message).encode_to_vec();
            out.push(BridgeEvent::data_base64(id, &bytes));
        }
    }

    fn send_headers(&mut self, id: CallId, out: &mut Vec<BridgeEvent>) {
        if !self.headers_sent {
            self.headers_sent = true;
            out.push(BridgeEvent::headers(id, self.headers.clone()));
        }
    }
}

/// Echo transport bridge.
pub struct EchoBridge {
    events: EventSender,
    calls: Mutex<HashMap<CallId, OpenCall>>,
}

impl EchoBridge {
    pub fn new(events: EventSender) -> Self {
        Self {
            events,
            calls: Mutex::new(HashMap::new()),
        }
    }

    /// Calls opened and not yet finished, failed, or cancelled.
    pub fn open_calls(&self) -> usize {
        self.calls.lock().expect("echo calls lock").len()
    }

    fn emit(&self, events: Vec<BridgeEvent>) {
        for event in events {
            if !self.events.send(event) {
                debug!("client gone, echo event dropped");
                return;
            }
        }
    }
}

impl TransportBridge for EchoBridge {
    fn start_call(&self, call: StartCall<'_>) -> CallResult<()> {
        if call.config.host.trim().is_empty() {
            return Err(CallError::transport("no host configured", Some(codes::UNAVAILABLE)));
        }

        let Some(method) = EchoMethod::from_path(call.method) else {
            warn!(call_id = %call.id, method = call.method, "unknown echo method");
            self.emit(vec![BridgeEvent::error(
                call.id,
                format!("unknown method {}", call.method),
                Some(codes::UNIMPLEMENTED),
            )]);
            return Ok(());
        };

        if method.method_type() != call.method_type {
            debug!(call_id = %call.id, %method, requested = %call.method_type, "method type differs from service definition");
        }

        let mut headers = call.headers.clone();
        headers.insert("content-type", "application/grpc");
        self.calls.lock().expect("echo calls lock").insert(
            call.id,
            OpenCall {
                method,
                headers,
                headers_sent: false,
                requests: Vec::new(),
            },
        );
        info!(call_id = %call.id, %method, host = %call.config.host, "echo call opened");
        Ok(())
    }

    fn send_message(&self, id: CallId, message: Bytes) -> BoxFuture<CallResult<bool>> {
        let mut out = Vec::new();
        let accepted = {
            let mut calls = self.calls.lock().expect("echo calls lock");
            match calls.get_mut(&id) {
                None => false,
                Some(call) => match EchoRequest::decode(message) {
                    Ok(request) => {
                        let replies = call.method.on_request(&request.message);
                        if !replies.is_empty() {
                            call.respond(id, replies, &mut out);
                        }
                        call.requests.push(request.message);
                        true
                    }
                    Err(e) => {
                        calls.remove(&id);
                        out.push(BridgeEvent::error(
                            id,
                            format!("malformed request: {e}"),
                            Some(codes::INTERNAL),
                        ));
                        false
                    }
                },
            }
        };
        self.emit(out);
        Box::pin(async move { Ok(accepted) })
    }

    fn cancel_call(&self, id: CallId) -> BoxFuture<CallResult<bool>> {
        let removed = self.calls.lock().expect("echo calls lock").remove(&id);
        let cancelled = removed.is_some();
        if cancelled {
            debug!(call_id = %id, "echo call cancelled");
            self.emit(vec![BridgeEvent::error(id, "call cancelled", Some(codes::CANCELLED))]);
        }
        Box::pin(async move { Ok(cancelled) })
    }

    fn finish_client_streaming(&self, id: CallId) -> BoxFuture<CallResult<()>> {
        let mut out = Vec::new();
        if let Some(mut call) = self.calls.lock().expect("echo calls lock").remove(&id) {
            match call.method.on_finish(&call.requests) {
                Some(replies) => {
                    call.respond(id, replies, &mut out);
                    out.push(BridgeEvent::trailers(
                        id,
                        Metadata::new().with("grpc-status", codes::OK.to_string()),
                    ));
                    debug!(call_id = %id, requests = call.requests.len(), "echo call finished");
                }
                None => out.push(BridgeEvent::error(
                    id,
                    format!("{} expects exactly one request, got {}", call.method, call.requests.len()),
                    Some(codes::INTERNAL),
                )),
            }
        }
        self.emit(out);
        Box::pin(async { Ok(()) })
    }
}

#[cfg(test)]
mod tests {
    use callbridge_client::event_channel;
    use callbridge_core::{CallConfig, EventKind, MethodType};

    use super::*;

    fn start(bridge: &EchoBridge, id: u64, method: &str) -> CallResult<()> {
        bridge.start_call(StartCall {
            id: CallId::new(id),
            config: &CallConfig::new("localhost:50051"),
            method,
            headers: &Metadata::new().with("x-trace", "t1"),
            method_type: MethodType::default(),
        })
    }

    fn request(message: &str) -> Bytes {
        Bytes::from(EchoRequest::new(message).encode_to_vec())
    }

    fn decode(event: &BridgeEvent) -> String {
        match &event.kind {
            EventKind::Data(payload) => {
                let bytes = payload.clone().into_bytes().unwrap();
                EchoResponse::decode(bytes).unwrap().message
            }
            other => panic!("expected data, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn unary_answers_on_finish() {
        let (tx, mut rx) = event_channel();
        let bridge = EchoBridge::new(tx);
        start(&bridge, 1, "/echo.Echo/UnaryEcho").unwrap();

        assert!(bridge.send_message(CallId::new(1), request("ping")).await.unwrap());
        bridge.finish_client_streaming(CallId::new(1)).await.unwrap();

        let headers = rx.recv().await.unwrap();
        match headers.kind {
            EventKind::Headers(md) => {
                assert_eq!(md.get("x-trace"), Some("t1"));
                assert_eq!(md.get("content-type"), Some("application/grpc"));
            }
            other => panic!("expected headers, got {other:?}"),
        }
        assert_eq!(decode(&rx.recv().await.unwrap()), "ping");
        assert_eq!(rx.recv().await.unwrap().kind_name(), "trailers");
        assert_eq!(bridge.open_calls(), 0);
    }

    #[tokio::test]
    async fn bidi_echoes_each_request_immediately() {
        let (tx, mut rx) = event_channel();
        let bridge = EchoBridge::new(tx);
        start(&bridge, 2, "echo.Echo/BidirectionalStreamingEcho").unwrap();

        bridge.send_message(CallId::new(2), request("one")).await.unwrap();
        assert_eq!(rx.recv().await.unwrap().kind_name(), "headers");
        assert_eq!(decode(&rx.recv().await.unwrap()), "one");

        bridge.send_message(CallId::new(2), request("two")).await.unwrap();
        assert_eq!(decode(&rx.recv().await.unwrap()), "two");
    }

    #[tokio::test]
    async fn unknown_method_is_unimplemented() {
        let (tx, mut rx) = event_channel();
        let bridge = EchoBridge::new(tx);
        start(&bridge, 3, "/echo.Echo/Shout").unwrap();

        let event = rx.recv().await.unwrap();
        assert!(matches!(event.kind, EventKind::Error { code: Some(codes::UNIMPLEMENTED), .. }));
        assert!(!bridge.send_message(CallId::new(3), request("x")).await.unwrap());
    }

    #[tokio::test]
    async fn cancel_reports_cancelled_once() {
        let (tx, mut rx) = event_channel();
        let bridge = EchoBridge::new(tx);
        start(&bridge, 4, "/echo.Echo/ServerStreamingEcho").unwrap();

        assert!(bridge.cancel_call(CallId::new(4)).await.unwrap());
        assert!(!bridge.cancel_call(CallId::new(4)).await.unwrap());

        let event = rx.recv().await.unwrap();
        assert!(matches!(event.kind, EventKind::Error { code: Some(codes::CANCELLED), .. }));
        assert_eq!(bridge.open_calls(), 0);
    }

    #[tokio::test]
    async fn missing_host_refuses_start() {
        let (tx, _rx) = event_channel();
        let bridge = EchoBridge::new(tx);
        let err = bridge
            .start_call(StartCall {
                id: CallId::new(5),
                config: &CallConfig::new(""),
                method: "/echo.Echo/UnaryEcho",
                headers: &Metadata::new(),
                method_type: MethodType::Unary,
            })
            .unwrap_err();
        assert_eq!(err.code(), Some(codes::UNAVAILABLE));
    }

    #[tokio::test]
    async fn malformed_request_fails_the_call() {
        let (tx, mut rx) = event_channel();
        let bridge = EchoBridge::new(tx);
        start(&bridge, 6, "/echo.Echo/UnaryEcho").unwrap();

        assert!(!bridge.send_message(CallId::new(6), Bytes::from_static(&[0x0a, 0x05])).await.unwrap());
        let event = rx.recv().await.unwrap();
        assert!(matches!(event.kind, EventKind::Error { code: Some(codes::INTERNAL), .. }));
    }
}
