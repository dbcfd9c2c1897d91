//! The four RPC façades against a recording bridge.

mod common;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use callbridge_core::{BridgeEvent, CallError, Metadata, MethodType, Status, codes};
use common::{Op, method, setup};
use tokio::sync::{mpsc, oneshot};

/// Records data, and sends every final status (from `status` and `end`)
/// into a channel.
struct Observed {
    data: Arc<Mutex<Vec<String>>>,
    statuses: mpsc::UnboundedReceiver<(&'static str, Status)>,
}

macro_rules! observe {
    ($facade:expr, with_data) => {{
        let observed = observe!($facade);
        let data = observed.data.clone();
        $facade.on_data(move |m: &String| data.lock().unwrap().push(m.clone()));
        observed
    }};
    ($facade:expr) => {{
        let (tx, statuses) = mpsc::unbounded_channel();
        let status_tx = tx.clone();
        $facade
            .on_status(move |s| {
                let _ = status_tx.send(("status", s.clone()));
            })
            .on_end(move |s| {
                let _ = tx.send(("end", s.clone()));
            });
        Observed {
            data: Arc::new(Mutex::new(Vec::new())),
            statuses,
        }
    }};
}

#[tokio::test]
async fn unary_ping_pong() {
    let (client, bridge, events) = setup();
    let (tx, rx) = oneshot::channel();

    let unary = client
        .unary(&client.call_config(), &method("/test.Echo/Unary"), &"ping".to_string(), None, move |r| {
            let _ = tx.send(r);
        })
        .unwrap();
    let id = unary.call().id();

    bridge.wait_for(|ops| ops.contains(&Op::Finish(id))).await;
    assert_eq!(bridge.sent(id), vec!["ping"]);
    assert!(matches!(
        bridge.ops()[0],
        Op::Start { method_type: MethodType::Unary, .. }
    ));

    events.send(BridgeEvent::headers(id, Metadata::new()));
    events.send(BridgeEvent::data(id, "pong"));
    events.send(BridgeEvent::trailers(id, Metadata::new()));

    assert_eq!(rx.await.unwrap(), Ok("pong".to_string()));
}

#[tokio::test]
async fn unary_error_reaches_the_callback() {
    let (client, _bridge, events) = setup();
    let (tx, rx) = oneshot::channel();

    let unary = client
        .unary(&client.call_config(), &method("/test.Echo/Unary"), &"ping".to_string(), None, move |r| {
            let _ = tx.send(r);
        })
        .unwrap();

    events.send(BridgeEvent::error(unary.call().id(), "unavailable", Some(14)));

    assert_eq!(
        rx.await.unwrap(),
        Err(CallError::transport("unavailable", Some(14)))
    );
}

#[tokio::test]
async fn unary_without_response_is_an_error() {
    let (client, _bridge, events) = setup();
    let (tx, rx) = oneshot::channel();

    let unary = client
        .unary(&client.call_config(), &method("/test.Echo/Unary"), &"ping".to_string(), None, move |r| {
            let _ = tx.send(r);
        })
        .unwrap();

    events.send(BridgeEvent::trailers(unary.call().id(), Metadata::new()));

    let err = rx.await.unwrap().unwrap_err();
    assert_eq!(err.code(), Some(codes::INTERNAL));
}

#[tokio::test]
async fn unary_cancel_runs_callback_once() {
    let (client, _bridge, events) = setup();
    let calls = Arc::new(AtomicUsize::new(0));
    let (tx, rx) = oneshot::channel();
    let tx = Mutex::new(Some(tx));

    let unary = {
        let calls = calls.clone();
        client
            .unary(&client.call_config(), &method("/test.Echo/Unary"), &"ping".to_string(), None, move |r| {
                calls.fetch_add(1, Ordering::SeqCst);
                if let Some(tx) = tx.lock().unwrap().take() {
                    let _ = tx.send(r);
                }
            })
            .unwrap()
    };

    assert!(unary.cancel());
    assert_eq!(rx.await.unwrap(), Err(CallError::Cancelled));

    events.send(BridgeEvent::error(unary.call().id(), "cancelled", Some(codes::CANCELLED)));
    let _ = unary.call().completed().await;
    tokio::task::yield_now().await;
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn server_stream_delivers_in_order_then_one_status() {
    let (client, bridge, events) = setup();
    let stream = client
        .server_streaming(&client.call_config(), &method("/test.Echo/Stream"), &"a b".to_string(), None)
        .unwrap();
    let mut observed = observe!(stream, with_data);
    let id = stream.call().id();

    bridge.wait_for(|ops| ops.contains(&Op::Finish(id))).await;
    events.send(BridgeEvent::headers(id, Metadata::new()));
    events.send(BridgeEvent::data(id, "a"));
    events.send(BridgeEvent::data(id, "b"));
    events.send(BridgeEvent::trailers(id, Metadata::new().with("done", "yes")));

    let (first, status) = observed.statuses.recv().await.unwrap();
    let (second, end) = observed.statuses.recv().await.unwrap();
    assert_eq!((first, second), ("status", "end"));
    assert_eq!(status, end);
    assert_eq!(status.code, codes::OK);
    assert_eq!(status.metadata.get("done"), Some("yes"));
    assert_eq!(*observed.data.lock().unwrap(), vec!["a", "b"]);

    events.send(BridgeEvent::trailers(id, Metadata::new()));
    drop(events);
    client.shutdown().await;
    assert!(observed.statuses.try_recv().is_err());
}

#[tokio::test]
async fn server_stream_error_status_carries_code_and_headers() {
    let (client, _bridge, events) = setup();
    let stream = client
        .server_streaming(&client.call_config(), &method("/test.Echo/Stream"), &"a".to_string(), None)
        .unwrap();
    let mut observed = observe!(stream);
    let id = stream.call().id();

    events.send(BridgeEvent::headers(id, Metadata::new().with("server", "test")));
    events.send(BridgeEvent::error(id, "deadline exceeded", Some(4)));

    let (_, status) = observed.statuses.recv().await.unwrap();
    assert_eq!(status.code, 4);
    assert_eq!(status.details, "deadline exceeded");
    assert_eq!(status.metadata.get("server"), Some("test"));
}

#[tokio::test]
async fn server_stream_cancel_silences_listeners() {
    let (client, bridge, events) = setup();
    let stream = client
        .server_streaming(&client.call_config(), &method("/test.Echo/Stream"), &"a".to_string(), None)
        .unwrap();
    let mut observed = observe!(stream, with_data);
    let id = stream.call().id();

    assert!(stream.cancel());
    bridge.wait_for(|ops| ops.contains(&Op::Cancel(id))).await;

    events.send(BridgeEvent::data(id, "late"));
    events.send(BridgeEvent::error(id, "cancelled", Some(codes::CANCELLED)));
    let _ = stream.call().completed().await;
    drop(events);
    client.shutdown().await;

    assert!(observed.data.lock().unwrap().is_empty());
    assert!(observed.statuses.try_recv().is_err());
}

#[tokio::test]
async fn undecodable_response_ends_with_internal_and_cancels() {
    let (client, bridge, events) = setup();
    let stream = client
        .server_streaming(&client.call_config(), &method("/test.Echo/Stream"), &"a".to_string(), None)
        .unwrap();
    let mut observed = observe!(stream);
    let id = stream.call().id();

    events.send(BridgeEvent::data(id, vec![0xff, 0xfe]));

    let (_, status) = observed.statuses.recv().await.unwrap();
    assert_eq!(status.code, codes::INTERNAL);
    assert!(stream.call().is_cancelled());
    bridge.wait_for(|ops| ops.contains(&Op::Cancel(id))).await;
}

#[tokio::test]
async fn client_stream_writes_then_finishes_once() {
    let (client, bridge, events) = setup();
    let upload = client
        .client_streaming(&client.call_config(), &method("/test.Echo/Upload"), None)
        .unwrap();
    let mut observed = observe!(upload);
    let id = upload.call().id();

    assert!(upload.write(&"x".to_string()).unwrap());
    assert!(upload.write(&"y".to_string()).unwrap());
    upload.end();
    upload.end();

    bridge.wait_for(|ops| ops.contains(&Op::Finish(id))).await;
    let ops: Vec<Op> = bridge.ops().into_iter().filter(|op| !matches!(op, Op::Start { .. })).collect();
    assert_eq!(
        ops,
        vec![
            Op::Send { id, message: "x".into() },
            Op::Send { id, message: "y".into() },
            Op::Finish(id),
        ]
    );

    events.send(BridgeEvent::headers(id, Metadata::new()));
    events.send(BridgeEvent::data(id, "x y"));
    events.send(BridgeEvent::trailers(id, Metadata::new()));

    let (_, status) = observed.statuses.recv().await.unwrap();
    let (_, end) = observed.statuses.recv().await.unwrap();
    assert!(status.is_ok());
    assert!(end.is_ok());

    drop(events);
    client.shutdown().await;
    assert!(observed.statuses.try_recv().is_err());
    assert!(!upload.write(&"z".to_string()).unwrap());
}

#[tokio::test]
async fn write_after_end_is_refused_and_never_sent() {
    let (client, bridge, _events) = setup();
    let upload = client
        .client_streaming(&client.call_config(), &method("/test.Echo/Upload"), None)
        .unwrap();
    let id = upload.call().id();

    assert!(upload.write(&"a".to_string()).unwrap());
    upload.end();
    assert!(!upload.write(&"late".to_string()).unwrap());

    bridge.wait_for(|ops| ops.contains(&Op::Finish(id))).await;
    assert_eq!(bridge.sent(id), vec!["a"]);
}

#[tokio::test]
async fn status_listener_added_after_the_call_ended_still_fires() {
    let (client, _bridge, events) = setup();
    let stream = client
        .server_streaming(&client.call_config(), &method("/test.Echo/Stream"), &"a".to_string(), None)
        .unwrap();
    let id = stream.call().id();

    events.send(BridgeEvent::trailers(id, Metadata::new().with("done", "yes")));
    stream.call().completed().await.unwrap();

    let mut observed = observe!(stream);
    let (first, status) = observed.statuses.recv().await.unwrap();
    let (second, end) = observed.statuses.recv().await.unwrap();
    assert_eq!((first, second), ("status", "end"));
    assert_eq!(status, end);
    assert_eq!(status.metadata.get("done"), Some("yes"));
}

#[tokio::test]
async fn bidi_directions_are_independent() {
    let (client, bridge, events) = setup();
    let chat = client
        .bidi_streaming(&client.call_config(), &method("/test.Echo/Chat"), None)
        .unwrap();
    let mut observed = observe!(chat, with_data);
    let id = chat.call().id();
    assert_eq!(chat.call().method_type(), MethodType::BidiStreaming);

    chat.write(&"hello".to_string()).unwrap();
    bridge.wait_for(|ops| ops.iter().any(|op| matches!(op, Op::Send { .. }))).await;

    // Responses arrive before the request side is finished.
    events.send(BridgeEvent::data(id, "hello"));
    chat.write(&"again".to_string()).unwrap();
    chat.end();
    bridge.wait_for(|ops| ops.contains(&Op::Finish(id))).await;
    events.send(BridgeEvent::data(id, "again"));
    events.send(BridgeEvent::trailers(id, Metadata::new()));

    let (_, status) = observed.statuses.recv().await.unwrap();
    assert!(status.is_ok());
    assert_eq!(*observed.data.lock().unwrap(), vec!["hello", "again"]);
    assert_eq!(bridge.sent(id), vec!["hello", "again"]);
}

#[tokio::test]
async fn metadata_reaches_the_bridge_call() {
    let (client, _bridge, events) = setup();
    let stream = client
        .server_streaming(
            &client.call_config(),
            &method("/test.Echo/Stream"),
            &"a".to_string(),
            Some(Metadata::new().with("Authorization", "Bearer t")),
        )
        .unwrap();

    assert_eq!(stream.call().request_headers().get("authorization"), Some("Bearer t"));
    events.send(BridgeEvent::trailers(stream.call().id(), Metadata::new()));
    let done = stream.call().completed().await.unwrap();
    assert_eq!(done.request_headers.get("authorization"), Some("Bearer t"));
}
