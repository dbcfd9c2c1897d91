//! callbridge-echo: the echo service over an in-process bridge.
//!
//! # Architecture
//!
//! ```text
//! EchoClient
//!   ├── unary_echo                     → UnaryCall
//!   ├── server_streaming_echo          → ServerStream
//!   ├── client_streaming_echo          → ClientStream
//!   └── bidirectional_streaming_echo   → BidiStream
//!         │
//!         ▼
//! callbridge Client ──commands──▶ EchoBridge
//!         ▲                          │
//!         └──── headers / response / trailers / error events
//! ```

pub mod bridge;
pub mod client;
pub mod proto;
pub mod service;

pub use bridge::EchoBridge;
pub use client::{EchoClient, EchoCodec};
pub use proto::{EchoRequest, EchoResponse};
pub use service::EchoMethod;
