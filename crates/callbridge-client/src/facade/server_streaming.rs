use std::fmt;
use std::sync::Arc;

use callbridge_core::{CallConfig, CallResult, Metadata, MethodType, Status};

use crate::call::CallHandle;
use crate::client::Client;
use crate::codec::{Codec, Method};
use crate::facade::{Listeners, attach_listeners, spawn_single_request};

/// One request, a stream of responses.
///
/// `end` and `status` listeners both receive the final [`Status`], once,
/// status listeners first. Cancelling drops every listener without
/// reporting anything.
pub struct ServerStream<C: Codec> {
    call: CallHandle,
    listeners: Arc<Listeners<C::Response>>,
}

impl<C: Codec> ServerStream<C> {
    pub fn start(
        client: &Client,
        config: &CallConfig,
        method: &Method<C>,
        request: &C::Request,
        metadata: Option<Metadata>,
    ) -> CallResult<Self> {
        let message = method.codec().encode(request)?;
        let listeners = Arc::new(Listeners::new());

        let call = client.start_attached(
            config,
            method.path(),
            metadata,
            Some(MethodType::ServerStreaming),
            |call| attach_listeners(call, &listeners, Some(method.codec().clone())),
        )?;

        spawn_single_request(call.clone(), message);
        Ok(Self { call, listeners })
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

impl<C: Codec> fmt::Debug for ServerStream<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServerStream").field("call", &self.call).finish()
    }
}

impl Client {
    /// Start a server-streaming call. See [`ServerStream`].
    pub fn server_streaming<C: Codec>(
        &self,
        config: &CallConfig,
        method: &Method<C>,
        request: &C::Request,
        metadata: Option<Metadata>,
    ) -> CallResult<ServerStream<C>> {
        ServerStream::start(self, config, method, request, metadata)
    }
}
