use std::fmt;
use std::sync::Arc;

use callbridge_core::{CallConfig, CallResult, Metadata, MethodType, Status};

use crate::call::CallHandle;
use crate::client::Client;
use crate::codec::{Codec, Method};
use crate::facade::{Listeners, RequestSink, attach_listeners, write_request};

/// Requests and responses flowing independently.
///
/// Writing and ending the request side do not affect the response side;
/// the final [`Status`] comes from the server.
pub struct BidiStream<C: Codec> {
    call: CallHandle,
    codec: Arc<C>,
    sink: RequestSink,
    listeners: Arc<Listeners<C::Response>>,
}

impl<C: Codec> BidiStream<C> {
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
            Some(MethodType::BidiStreaming),
            |call| attach_listeners(call, &listeners, Some(method.codec().clone())),
        )?;

        Ok(Self {
            sink: RequestSink::spawn(call.clone()),
            codec: method.codec().clone(),
            call,
            listeners,
        })
    }

    pub fn write(&self, request: &C::Request) -> CallResult<bool> {
        write_request(&self.sink, self.codec.as_ref(), request)
    }

    pub fn end(&self) {
        self.sink.finish();
    }

    pub fn on_data(&self, listener: impl Fn(&C::Response) + Send + Sync + 'static) -> &Self {
        self.listeners.on_data(Arc::new(listener));
        self
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

impl<C: Codec> fmt::Debug for BidiStream<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BidiStream").field("call", &self.call).finish()
    }
}

impl Client {
    /// Start a bidirectional-streaming call. See [`BidiStream`].
    pub fn bidi_streaming<C: Codec>(
        &self,
        config: &CallConfig,
        method: &Method<C>,
        metadata: Option<Metadata>,
    ) -> CallResult<BidiStream<C>> {
        BidiStream::start(self, config, method, metadata)
    }
}
