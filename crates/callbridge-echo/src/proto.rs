//! Echo service messages.
//!
//! ```proto
//! package echo;
//!
//! service Echo {
//!   rpc UnaryEcho(EchoRequest) returns (EchoResponse);
//!   rpc ServerStreamingEcho(EchoRequest) returns (stream EchoResponse);
//!   rpc ClientStreamingEcho(stream EchoRequest) returns (EchoResponse);
//!   rpc BidirectionalStreamingEcho(stream EchoRequest) returns (stream EchoResponse);
//! }
//!
//! message EchoRequest  { string message = 1; }
//! message EchoResponse { string message = 1; }
//! ```

pub const UNARY_ECHO: &str = "/echo.Echo/UnaryEcho";
pub const SERVER_STREAMING_ECHO: &str = "/echo.Echo/ServerStreamingEcho";
pub const CLIENT_STREAMING_ECHO: &str = "/echo.Echo/ClientStreamingEcho";
pub const BIDIRECTIONAL_STREAMING_ECHO: &str = "/echo.Echo/BidirectionalStreamingEcho";

#[derive(Clone, PartialEq, prost::Message)]
pub struct EchoRequest {
    #[prost(string, tag = "1")]
    pub message: String,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct EchoResponse {
    #[prost(string, tag = "1")]
    pub message: String,
}

impl EchoRequest {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl EchoResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}
