//! Typed client for the echo service.

use std::sync::Arc;

use callbridge_client::{
    BidiStream, Client, ClientStream, Method, ProstCodec, ServerStream, UnaryCall, event_channel,
};
use callbridge_core::{CallConfig, CallResult, ClientConfig, Metadata};

use crate::bridge::EchoBridge;
use crate::proto::{self, EchoRequest, EchoResponse};

pub type EchoCodec = ProstCodec<EchoRequest, EchoResponse>;

/// Echo service stub over a [`Client`].
#[derive(Clone)]
pub struct EchoClient {
    client: Client,
    config: CallConfig,
    unary: Method<EchoCodec>,
    server_streaming: Method<EchoCodec>,
    client_streaming: Method<EchoCodec>,
    bidirectional_streaming: Method<EchoCodec>,
}

impl EchoClient {
    /// Use an existing client. Calls go to the client's configured host.
    pub fn new(client: Client) -> Self {
        let config = client.call_config();
        Self {
            client,
            config,
            unary: Method::new(proto::UNARY_ECHO, EchoCodec::new()),
            server_streaming: Method::new(proto::SERVER_STREAMING_ECHO, EchoCodec::new()),
            client_streaming: Method::new(proto::CLIENT_STREAMING_ECHO, EchoCodec::new()),
            bidirectional_streaming: Method::new(
                proto::BIDIRECTIONAL_STREAMING_ECHO,
                EchoCodec::new(),
            ),
        }
    }

    /// A client wired to an in-process [`EchoBridge`]. Must be called
    /// from within a tokio runtime.
    pub fn in_process(config: ClientConfig) -> Self {
        let (events, inbox) = event_channel();
        let bridge = Arc::new(EchoBridge::new(events));
        Self::new(Client::with_config(config, bridge, inbox))
    }

    pub fn client(&self) -> &Client {
        &self.client
    }

    pub fn unary_echo(
        &self,
        request: &EchoRequest,
        metadata: Option<Metadata>,
        callback: impl FnOnce(CallResult<EchoResponse>) + Send + 'static,
    ) -> CallResult<UnaryCall> {
        self.client
            .unary(&self.config, &self.unary, request, metadata, callback)
    }

    pub fn server_streaming_echo(
        &self,
        request: &EchoRequest,
        metadata: Option<Metadata>,
    ) -> CallResult<ServerStream<EchoCodec>> {
        self.client
            .server_streaming(&self.config, &self.server_streaming, request, metadata)
    }

    pub fn client_streaming_echo(
        &self,
        metadata: Option<Metadata>,
    ) -> CallResult<ClientStream<EchoCodec>> {
        self.client
            .client_streaming(&self.config, &self.client_streaming, metadata)
    }

    pub fn bidirectional_streaming_echo(
        &self,
        metadata: Option<Metadata>,
    ) -> CallResult<BidiStream<EchoCodec>> {
        self.client
            .bidi_streaming(&self.config, &self.bidirectional_streaming, metadata)
    }
}
