//! Call handle: one started call, as seen by the application.

use std::fmt;
use std::future::{Future, IntoFuture};
use std::sync::{Arc, Weak};

use bytes::Bytes;
use callbridge_core::{CallId, CallResult, CompletedCall, Metadata, MethodType, codes};
use tracing::{debug, warn};

use crate::bridge::{BoxFuture, TransportBridge};
use crate::broadcast::BroadcastStream;
use crate::registry::CallState;
use crate::stream::ResponseStream;

struct CallInner {
    id: CallId,
    method: String,
    method_type: MethodType,
    request_headers: Metadata,
    state: CallState,
    bridge: Arc<dyn TransportBridge>,
}

/// A started call: its response futures and stream, plus the commands
/// that drive its request side.
///
/// Cloning is cheap and every clone controls the same call. Awaiting the
/// handle itself waits for both headers and trailers and yields a
/// [`CompletedCall`].
#[derive(Clone)]
pub struct CallHandle {
    inner: Arc<CallInner>,
}

impl CallHandle {
    pub(crate) fn new(
        id: CallId,
        method: String,
        method_type: MethodType,
        request_headers: Metadata,
        state: CallState,
        bridge: Arc<dyn TransportBridge>,
    ) -> Self {
        Self {
            inner: Arc::new(CallInner {
                id,
                method,
                method_type,
                request_headers,
                state,
                bridge,
            }),
        }
    }

    pub fn id(&self) -> CallId {
        self.inner.id
    }

    pub fn method(&self) -> &str {
        &self.inner.method
    }

    pub fn method_type(&self) -> MethodType {
        self.inner.method_type
    }

    pub fn request_headers(&self) -> &Metadata {
        &self.inner.request_headers
    }

    /// Response headers.
    pub async fn headers(&self) -> CallResult<Metadata> {
        self.inner.state.headers.wait().await
    }

    /// Response trailers. Rejects if the call fails or is cancelled.
    pub async fn trailers(&self) -> CallResult<Metadata> {
        self.inner.state.trailers.wait().await
    }

    /// The call's response chunks, for handler-style subscription.
    pub fn stream(&self) -> &BroadcastStream {
        &self.inner.state.stream
    }

    /// The call's response chunks as an async stream. Only chunks that
    /// arrive after this returns are yielded.
    pub fn responses(&self) -> ResponseStream {
        ResponseStream::new(&self.inner.state.stream)
    }

    pub fn is_cancelled(&self) -> bool {
        self.inner.state.flags.is_cancelled()
    }

    pub fn is_finished_sending(&self) -> bool {
        self.inner.state.flags.is_finished_sending()
    }

    /// Trailers or an error have settled the call.
    pub fn is_terminated(&self) -> bool {
        self.inner.state.trailers.is_settled()
    }

    /// Write one request message.
    ///
    /// Resolves `Ok(false)` without touching the bridge once the request
    /// side is finished or the call is cancelled.
    pub async fn send_message(&self, message: Bytes) -> CallResult<bool> {
        let flags = &self.inner.state.flags;
        if flags.is_finished_sending() || flags.is_cancelled() {
            debug!(call_id = %self.inner.id, "message after finish or cancel, not sent");
            return Ok(false);
        }
        self.inner.bridge.send_message(self.inner.id, message).await
    }

    /// Half-close the request side. Only the first call reaches the bridge.
    pub async fn finish_sending(&self) -> CallResult<()> {
        if !self.inner.state.flags.mark_finished_sending() {
            return Ok(());
        }
        debug!(call_id = %self.inner.id, "finishing request side");
        self.inner.bridge.finish_client_streaming(self.inner.id).await
    }

    /// Cancel the call.
    ///
    /// Rejects unsettled headers and trailers with
    /// [`CallError::Cancelled`](callbridge_core::CallError::Cancelled) and
    /// asks the bridge to abort. Whatever the bridge then reports still
    /// reaches the stream through the router. Returns `false` if the call
    /// had already ended or been cancelled.
    pub fn cancel(&self) -> bool {
        let state = &self.inner.state;
        if state.trailers.is_settled() || !state.flags.mark_cancelled() {
            return false;
        }
        debug!(call_id = %self.inner.id, method = %self.inner.method, "cancelling call");
        state.cancel.fire();

        let id = self.inner.id;
        let request = self.inner.bridge.cancel_call(id);
        spawn_background(id, "cancel", async move {
            match request.await {
                Ok(accepted) => debug!(call_id = %id, accepted, "bridge cancel returned"),
                Err(e) => warn!(call_id = %id, error = %e, "bridge cancel failed"),
            }
        });
        true
    }

    /// Wait for headers and trailers.
    pub async fn completed(&self) -> CallResult<CompletedCall> {
        let state = &self.inner.state;
        let (headers, trailers) = tokio::try_join!(state.headers.wait(), state.trailers.wait())?;
        Ok(CompletedCall {
            method: self.inner.method.clone(),
            request_headers: self.inner.request_headers.clone(),
            headers,
            trailers,
            status: codes::OK,
        })
    }

    pub fn downgrade(&self) -> WeakCallHandle {
        WeakCallHandle {
            inner: Arc::downgrade(&self.inner),
        }
    }

    /// Run `listener` when the call is cancelled locally.
    pub(crate) fn on_cancel(&self, listener: impl FnOnce() + Send + 'static) {
        self.inner.state.cancel.on_cancel(listener);
    }

    pub(crate) fn state(&self) -> &CallState {
        &self.inner.state
    }
}

impl IntoFuture for CallHandle {
    type Output = CallResult<CompletedCall>;
    type IntoFuture = BoxFuture<CallResult<CompletedCall>>;

    fn into_future(self) -> Self::IntoFuture {
        Box::pin(async move { self.completed().await })
    }
}

impl fmt::Debug for CallHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CallHandle")
            .field("id", &self.inner.id)
            .field("method", &self.inner.method)
            .field("method_type", &self.inner.method_type)
            .field("cancelled", &self.is_cancelled())
            .field("terminated", &self.is_terminated())
            .finish()
    }
}

/// Non-owning reference to a call, for closures the call itself stores.
#[derive(Clone)]
pub struct WeakCallHandle {
    inner: Weak<CallInner>,
}

impl WeakCallHandle {
    pub fn upgrade(&self) -> Option<CallHandle> {
        self.inner.upgrade().map(|inner| CallHandle { inner })
    }
}

impl fmt::Debug for WeakCallHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WeakCallHandle").finish_non_exhaustive()
    }
}

/// Run a bridge command without waiting for it.
pub(crate) fn spawn_background(id: CallId, what: &'static str, task: impl Future<Output = ()> + Send + 'static) {
    match tokio::runtime::Handle::try_current() {
        Ok(runtime) => {
            runtime.spawn(task);
        }
        Err(_) => warn!(call_id = %id, what, "no async runtime, bridge command dropped"),
    }
}
