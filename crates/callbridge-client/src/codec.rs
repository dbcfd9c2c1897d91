//! Message codecs and typed method descriptors.

use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use bytes::Bytes;
use callbridge_core::{CallError, CallResult};

/// Converts application messages to and from wire bytes.
pub trait Codec: Send + Sync + 'static {
    type Request: Send + 'static;
    type Response: Send + 'static;

    fn encode(&self, request: &Self::Request) -> CallResult<Bytes>;

    fn decode(&self, bytes: &[u8]) -> CallResult<Self::Response>;
}

/// Protobuf codec for generated `prost` messages.
pub struct ProstCodec<Req, Resp> {
    _marker: PhantomData<fn() -> (Req, Resp)>,
}

impl<Req, Resp> ProstCodec<Req, Resp> {
    pub fn new() -> Self {
        Self {
            _marker: PhantomData,
        }
    }
}

impl<Req, Resp> Default for ProstCodec<Req, Resp> {
    fn default() -> Self {
        Self::new()
    }
}

impl<Req, Resp> Clone for ProstCodec<Req, Resp> {
    fn clone(&self) -> Self {
        Self::new()
    }
}

impl<Req, Resp> fmt::Debug for ProstCodec<Req, Resp> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ProstCodec")
    }
}

impl<Req, Resp> Codec for ProstCodec<Req, Resp>
where
    Req: prost::Message + Send + 'static,
    Resp: prost::Message + Default + Send + 'static,
{
    type Request = Req;
    type Response = Resp;

    fn encode(&self, request: &Req) -> CallResult<Bytes> {
        Ok(Bytes::from(request.encode_to_vec()))
    }

    fn decode(&self, bytes: &[u8]) -> CallResult<Resp> {
        Resp::decode(bytes).map_err(|e| CallError::Codec(e.to_string()))
    }
}

/// Pass-through codec for callers that handle encoding themselves.
#[derive(Debug, Default, Clone, Copy)]
pub struct BytesCodec;

impl Codec for BytesCodec {
    type Request = Bytes;
    type Response = Bytes;

    fn encode(&self, request: &Bytes) -> CallResult<Bytes> {
        Ok(request.clone())
    }

    fn decode(&self, bytes: &[u8]) -> CallResult<Bytes> {
        Ok(Bytes::copy_from_slice(bytes))
    }
}

/// A method path paired with the codec for its messages.
pub struct Method<C> {
    path: Arc<str>,
    codec: Arc<C>,
}

impl<C: Codec> Method<C> {
    pub fn new(path: impl Into<Arc<str>>, codec: C) -> Self {
        Self {
            path: path.into(),
            codec: Arc::new(codec),
        }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn codec(&self) -> &Arc<C> {
        &self.codec
    }
}

impl<C> Clone for Method<C> {
    fn clone(&self) -> Self {
        Self {
            path: Arc::clone(&self.path),
            codec: Arc::clone(&self.codec),
        }
    }
}

impl<C> fmt::Debug for Method<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Method").field("path", &self.path).finish()
    }
}
