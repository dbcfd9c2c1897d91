use std::sync::{Arc, Mutex};

use callbridge_core::{CallConfig, CallError, CallResult, Metadata, MethodType, codes};
use tracing::debug;

use crate::call::CallHandle;
use crate::client::Client;
use crate::codec::{Codec, Method};
use crate::facade::spawn_single_request;

type Callback<T> = Box<dyn FnOnce(CallResult<T>) + Send>;

/// One request, one response, one callback.
///
/// The callback runs exactly once: with the decoded response when the
/// call completes, or with the error that ended it. Cancelling runs it
/// with [`CallError::Cancelled`].
#[derive(Debug, Clone)]
pub struct UnaryCall {
    call: CallHandle,
}

impl UnaryCall {
    pub fn start<C: Codec>(
        client: &Client,
        config: &CallConfig,
        method: &Method<C>,
        request: &C::Request,
        metadata: Option<Metadata>,
        callback: impl FnOnce(CallResult<C::Response>) + Send + 'static,
    ) -> CallResult<Self> {
        let message = method.codec().encode(request)?;
        let callback: Arc<Mutex<Option<Callback<C::Response>>>> =
            Arc::new(Mutex::new(Some(Box::new(callback))));
        let response: Arc<Mutex<Option<CallResult<C::Response>>>> = Arc::new(Mutex::new(None));

        let call = client.start_attached(
            config,
            method.path(),
            metadata,
            Some(MethodType::Unary),
            |call| {
                let on_data = {
                    let codec = method.codec().clone();
                    let response = response.clone();
                    move |chunk: &bytes::Bytes| {
                        let mut slot = response.lock().expect("response lock");
                        if slot.is_none() {
                            *slot = Some(codec.decode(chunk));
                        } else {
                            debug!("extra unary response message ignored");
                        }
                    }
                };
                let on_complete = {
                    let callback = callback.clone();
                    let response = response.clone();
                    move || {
                        let outcome = response.lock().expect("response lock").take().unwrap_or_else(|| {
                            Err(CallError::transport(
                                "call completed without a response message",
                                Some(codes::INTERNAL),
                            ))
                        });
                        deliver(&callback, outcome);
                    }
                };
                let on_error = {
                    let callback = callback.clone();
                    move |err: &CallError| deliver(&callback, Err(err.clone()))
                };
                let _ = call.stream().subscribe(on_data, on_complete, on_error);

                let callback = callback.clone();
                call.on_cancel(move || deliver(&callback, Err(CallError::Cancelled)));
            },
        )?;

        spawn_single_request(call.clone(), message);
        Ok(Self { call })
    }

    /// Cancel the call. The callback receives [`CallError::Cancelled`]
    /// unless it already ran.
    pub fn cancel(&self) -> bool {
        self.call.cancel()
    }

    pub fn call(&self) -> &CallHandle {
        &self.call
    }
}

fn deliver<T>(callback: &Mutex<Option<Callback<T>>>, outcome: CallResult<T>) {
    let callback = callback.lock().expect("callback lock").take();
    if let Some(callback) = callback {
        callback(outcome);
    }
}

impl Client {
    /// Start a unary call. See [`UnaryCall`].
    pub fn unary<C: Codec>(
        &self,
        config: &CallConfig,
        method: &Method<C>,
        request: &C::Request,
        metadata: Option<Metadata>,
        callback: impl FnOnce(CallResult<C::Response>) + Send + 'static,
    ) -> CallResult<UnaryCall> {
        UnaryCall::start(self, config, method, request, metadata, callback)
    }
}
