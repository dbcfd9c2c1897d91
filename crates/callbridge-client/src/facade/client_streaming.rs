use std::fmt;
use std::sync::Arc;

use callbridge_core::{CallConfig, CallResult, Metadata, MethodType, Status};

use crate::call::CallHandle;
use crate::client::Client;
use crate::codec::{Codec, Method};
use crate::facade::{Listeners, RequestSink, attach_listeners, write_request};

/// A stream of requests, then one final status.
///
/// Response messages are not surfaced here; read them from
/// [`call().responses()`](CallHandle::responses) before calling
/// [`end`](Self::end) if the method returns one.
pub struct ClientStream<C: Codec> {
    call: CallHandle,
    codec: Arc<C>,
    sink: RequestSink,
    listeners: Arc<Listeners<C::Response>>,
}

impl<C: Codec> ClientStream<C> {
    pub fn start(
        client: &Client,
        config: &CallConfig,
        method: &Method<C>,
        metadata: Option<Metadata>,
    ) -> CallResult<Self> {
        let listeners = Arc::new(Listeners::new());

        let call = client.start_attached(
            config,
            method.path(),
            metadata,
            Some(MethodType::ClientStreaming),
            |call| attach_listeners::<C>(call, &listeners, None),
        )?;

        Ok(Self {
            sink: RequestSink::spawn(call.clone()),
            codec: method.codec().clone(),
            call,
            listeners,
        })
    }

    /// Queue one request. `Ok(false)` once [`end`](Self::end) was called.
    pub fn write(&self, request: &C::Request) -> CallResult<bool> {
        write_request(&self.sink, self.codec.as_ref(), request)
    }

    /// Finish the request side after every queued write.
    pub fn end(&self) {
        self.sink.finish();
    }

    pub fn on_end(&self, listener: impl Fn(&Status) + Send + Sync + 'static) -> &Self {
        self.listeners.on_end(Arc::new(listener));
        self
    }

    pub fn on_status(&self, listener: impl Fn(&Status) + Send + Sync + 'static) -> &Self {
        self.listeners.on_status(Arc::new(listener));
        self
    }

    pub fn cancel(&self) -> bool {
        self.listeners.clear();
        self.call.cancel()
    }

    pub fn call(&self) -> &CallHandle {
        &self.call
    }
}

impl<C: Codec> fmt::Debug for ClientStream<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientStream").field("call", &self.call).finish()
    }
}

impl Client {
    /// Start a client-streaming call. See [`ClientStream`].
    pub fn client_streaming<C: Codec>(
        &self,
        config: &CallConfig,
        method: &Method<C>,
        metadata: Option<Metadata>,
    ) -> CallResult<ClientStream<C>> {
        ClientStream::start(self, config, method, metadata)
    }
}
