//! Call multiplexing over a single transport bridge.
//!
//! A transport bridge reports everything that happens on every call
//! through one shared event channel, each event tagged with a call id.
//! This crate turns that channel back into per-call futures and streams:
//!
//! ```text
//!  application ─▶ façade ─▶ Client::start ─▶ CallRegistry + TransportBridge::start_call
//!                                                              │
//!  façade listeners ◀── OneShot / BroadcastStream ◀── EventRouter ◀── bridge events
//! ```
//!
//! # Primitives
//!
//! - [`CallIdAllocator`]: process-unique, monotonic call ids.
//! - [`OneShot`]: settles once, awaited many times; rejected by a
//!   [`CancelSignal`] if still pending when it fires.
//! - [`BroadcastStream`]: response chunks fanned out to subscribers, with
//!   one terminal complete or error.
//! - [`CallRegistry`] and [`EventRouter`]: live call state and the single
//!   dispatch point that settles it.
//!
//! # Calls
//!
//! [`Client::start`] returns a [`CallHandle`]; awaiting the handle yields
//! a [`CompletedCall`](callbridge_core::CompletedCall). The façades in
//! [`facade`] wrap a handle for each RPC shape.

mod bridge;
mod broadcast;
mod call;
mod client;
mod codec;
pub mod facade;
mod id;
mod oneshot;
mod registry;
mod router;
mod stream;

pub use bridge::{BoxFuture, EventReceiver, EventSender, StartCall, TransportBridge, UnlinkedBridge, event_channel};
pub use broadcast::{BroadcastStream, Subscription, Terminal};
pub use call::{CallHandle, WeakCallHandle};
pub use client::Client;
pub use codec::{BytesCodec, Codec, Method, ProstCodec};
pub use facade::{BidiStream, ClientStream, ServerStream, UnaryCall};
pub use id::CallIdAllocator;
pub use oneshot::{CancelSignal, OneShot};
pub use registry::{CallFlags, CallRegistry, CallState};
pub use router::{Dispatch, EventRouter};
pub use stream::ResponseStream;
