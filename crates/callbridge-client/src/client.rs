//! The client: owns the registry, the router, and the event pump.
//!
//! ```text
//!  Client::start ──register──▶ CallRegistry ◀──lookup/remove── EventRouter
//!        │                                                         ▲
//!        ▼                                                         │
//!  TransportBridge ──────────── EventSender ─▶ pump task ──dispatch─┘
//! ```

use std::sync::{Arc, Mutex};

use callbridge_core::{BridgeEvent, CallConfig, CallError, CallResult, ClientConfig, Metadata, MethodType};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::bridge::{EventReceiver, EventSender, StartCall, TransportBridge};
use crate::call::{CallHandle, spawn_background};
use crate::id::CallIdAllocator;
use crate::registry::CallRegistry;
use crate::router::{Dispatch, EventRouter};

struct ClientInner {
    bridge: Arc<dyn TransportBridge>,
    config: ClientConfig,
    ids: CallIdAllocator,
    registry: Arc<CallRegistry>,
    router: Arc<EventRouter>,
    /// Start failures are reported as events on this sender.
    loopback: EventSender,
    shutdown_tx: watch::Sender<bool>,
    pump: Mutex<Option<JoinHandle<()>>>,
}

/// Issues calls over one transport bridge and routes its events.
///
/// Cloning is cheap; clones share the same registry and bridge.
#[derive(Clone)]
pub struct Client {
    inner: Arc<ClientInner>,
}

impl Client {
    /// Create a client with default configuration.
    ///
    /// Must be called from within a tokio runtime: the event pump is
    /// spawned onto it.
    pub fn new(bridge: Arc<dyn TransportBridge>, events: EventReceiver) -> Self {
        Self::with_config(ClientConfig::default(), bridge, events)
    }

    pub fn with_config(
        config: ClientConfig,
        bridge: Arc<dyn TransportBridge>,
        events: EventReceiver,
    ) -> Self {
        let registry = Arc::new(CallRegistry::new());
        let router = Arc::new(EventRouter::new(registry.clone()));
        let loopback = events.loopback();
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let pump = tokio::spawn(run_event_pump(router.clone(), events, shutdown_rx));
        info!(host = %config.channel.host, "call client started");

        Self {
            inner: Arc::new(ClientInner {
                bridge,
                config,
                ids: CallIdAllocator::new(),
                registry,
                router,
                loopback,
                shutdown_tx,
                pump: Mutex::new(Some(pump)),
            }),
        }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.inner.config
    }

    /// The bridge config derived from this client's `[channel]` section.
    pub fn call_config(&self) -> CallConfig {
        self.inner.config.call_config()
    }

    /// Start a call.
    ///
    /// `metadata` is layered over the configured default metadata. An
    /// unspecified method type means bidirectional streaming.
    ///
    /// Fails synchronously only when the bridge is not linked or the
    /// client has shut down. A bridge that refuses to open the call is
    /// reported through the call's own futures and stream, exactly as if
    /// the transport had sent an error event.
    pub fn start(
        &self,
        config: &CallConfig,
        method: &str,
        metadata: Option<Metadata>,
        method_type: Option<MethodType>,
    ) -> CallResult<CallHandle> {
        self.start_attached(config, method, metadata, method_type, |_| {})
    }

    /// [`start`](Self::start), running `attach` after the call is
    /// registered and before the bridge is asked to open it, so nothing
    /// the bridge emits can be missed.
    pub(crate) fn start_attached(
        &self,
        config: &CallConfig,
        method: &str,
        metadata: Option<Metadata>,
        method_type: Option<MethodType>,
        attach: impl FnOnce(&CallHandle),
    ) -> CallResult<CallHandle> {
        let inner = &self.inner;
        if *inner.shutdown_tx.borrow() {
            return Err(CallError::Linkage("client has shut down".into()));
        }
        inner.bridge.link()?;

        let method_type = method_type.unwrap_or_default();
        let request_headers = inner.config.merged_metadata(&metadata.unwrap_or_default());
        let id = inner.ids.next();
        let state = inner.registry.register(id);

        let handle = CallHandle::new(
            id,
            method.to_string(),
            method_type,
            request_headers,
            state,
            inner.bridge.clone(),
        );
        attach(&handle);

        let started = inner.bridge.start_call(StartCall {
            id,
            config,
            method,
            headers: handle.request_headers(),
            method_type,
        });
        match started {
            Ok(()) => debug!(call_id = %id, method, %method_type, "call started"),
            Err(e) => {
                warn!(call_id = %id, method, error = %e, "bridge failed to start call");
                inner
                    .loopback
                    .send(BridgeEvent::error(id, e.details(), Some(e.status_code())));
            }
        }
        Ok(handle)
    }

    /// Route one event immediately, bypassing the channel.
    pub fn dispatch(&self, event: BridgeEvent) -> Dispatch {
        self.inner.router.dispatch(event)
    }

    pub fn registry(&self) -> &Arc<CallRegistry> {
        &self.inner.registry
    }

    /// Number of calls that have not yet seen a terminal event.
    pub fn active_calls(&self) -> usize {
        self.inner.registry.len()
    }

    /// Stop the event pump and tear down every outstanding call.
    ///
    /// Outstanding calls observe [`CallError::Cancelled`] on their
    /// futures and streams; the bridge is asked to cancel each of them.
    /// Calls cannot be started afterwards.
    pub async fn shutdown(&self) {
        self.inner.shutdown_tx.send_replace(true);
        let pump = self.inner.pump.lock().expect("pump lock").take();
        if let Some(pump) = pump {
            if let Err(e) = pump.await {
                warn!(error = %e, "event pump ended abnormally");
            }
        }
        self.inner.teardown();
        info!("call client shut down");
    }
}

impl ClientInner {
    fn teardown(&self) {
        for (id, state) in self.registry.drain() {
            debug!(call_id = %id, "tearing down call");
            state.flags.mark_cancelled();
            state.cancel.fire();
            state.stream.publish_error(&CallError::Cancelled);

            let request = self.bridge.cancel_call(id);
            spawn_background(id, "cancel", async move {
                if let Err(e) = request.await {
                    debug!(call_id = %id, error = %e, "bridge cancel during teardown failed");
                }
            });
        }
    }
}

impl Drop for ClientInner {
    fn drop(&mut self) {
        self.shutdown_tx.send_replace(true);
        self.teardown();
    }
}

async fn run_event_pump(
    router: Arc<EventRouter>,
    mut events: EventReceiver,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    debug!("event pump running");
    loop {
        tokio::select! {
            _ = shutdown_rx.changed() => {
                if *shutdown_rx.borrow() {
                    break;
                }
            }
            event = events.recv() => {
                match event {
                    Some(event) => {
                        router.dispatch(event);
                    }
                    None => break,
                }
            }
        }
    }
    info!("event pump stopped");
}
