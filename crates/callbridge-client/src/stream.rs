//! Pull-style view of a [`BroadcastStream`].
//!
//! [`ResponseStream`] attaches one subscriber and buffers what it
//! receives in an unbounded channel, so a consumer can `.next().await`
//! instead of registering handlers. It detaches when dropped.

use std::pin::Pin;
use std::task::{Context, Poll};

use bytes::Bytes;
use callbridge_core::CallError;
use futures_core::Stream;
use tokio::sync::mpsc;

use crate::broadcast::{BroadcastStream, Subscription, Terminal};

enum Item {
    Data(Bytes),
    End,
    Failed(CallError),
}

/// Response chunks as a `Stream<Item = Result<Bytes, CallError>>`.
///
/// Yields `Ok` per chunk, then ends after completion, or yields one
/// `Err` and ends after an error. Attached to a stream that has already
/// ended, it reports that ending immediately.
pub struct ResponseStream {
    rx: mpsc::UnboundedReceiver<Item>,
    subscription: Option<Subscription>,
    done: bool,
}

impl ResponseStream {
    pub fn new(source: &BroadcastStream) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();

        if let Some(terminal) = source.terminal() {
            let _ = tx.send(match terminal {
                Terminal::Complete => Item::End,
                Terminal::Error(err) => Item::Failed(err),
            });
            return Self {
                rx,
                subscription: None,
                done: false,
            };
        }

        let data_tx = tx.clone();
        let end_tx = tx.clone();
        let subscription = source.subscribe(
            move |chunk| {
                let _ = data_tx.send(Item::Data(chunk.clone()));
            },
            move || {
                let _ = end_tx.send(Item::End);
            },
            move |err| {
                let _ = tx.send(Item::Failed(err.clone()));
            },
        );

        Self {
            rx,
            subscription: Some(subscription),
            done: false,
        }
    }
}

impl Stream for ResponseStream {
    type Item = Result<Bytes, CallError>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        if this.done {
            return Poll::Ready(None);
        }
        match this.rx.poll_recv(cx) {
            Poll::Ready(Some(Item::Data(chunk))) => Poll::Ready(Some(Ok(chunk))),
            Poll::Ready(Some(Item::Failed(err))) => {
                this.done = true;
                Poll::Ready(Some(Err(err)))
            }
            Poll::Ready(Some(Item::End)) | Poll::Ready(None) => {
                this.done = true;
                Poll::Ready(None)
            }
            Poll::Pending => Poll::Pending,
        }
    }
}

impl Drop for ResponseStream {
    fn drop(&mut self) {
        if let Some(subscription) = self.subscription.take() {
            subscription.unsubscribe();
        }
    }
}
