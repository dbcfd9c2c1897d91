//! Shared types used across callbridge crates.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::CallError;
use crate::metadata::Metadata;

/// Status codes surfaced in [`Status`]. Values follow the gRPC code table.
pub mod codes {
    pub const OK: i32 = 0;
    pub const CANCELLED: i32 = 1;
    pub const UNKNOWN: i32 = 2;
    pub const UNIMPLEMENTED: i32 = 12;
    pub const INTERNAL: i32 = 13;
    pub const UNAVAILABLE: i32 = 14;
}

/// Identifies one logical call on the shared event channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CallId(u64);

impl CallId {
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for CallId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The four RPC shapes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum MethodType {
    Unary,
    ServerStreaming,
    ClientStreaming,
    /// Used when the caller does not say otherwise.
    #[default]
    BidiStreaming,
}

impl MethodType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MethodType::Unary => "unary",
            MethodType::ServerStreaming => "serverStreaming",
            MethodType::ClientStreaming => "clientStreaming",
            MethodType::BidiStreaming => "bidiStreaming",
        }
    }

    /// Shapes whose request side is exactly one message, finished
    /// automatically once the bridge accepts it.
    pub fn is_single_request(&self) -> bool {
        matches!(self, MethodType::Unary | MethodType::ServerStreaming)
    }
}

impl fmt::Display for MethodType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where the bridge should send a call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallConfig {
    pub host: String,
    #[serde(default)]
    pub insecure: bool,
}

impl CallConfig {
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            insecure: false,
        }
    }

    pub fn insecure(mut self, insecure: bool) -> Self {
        self.insecure = insecure;
        self
    }
}

/// Final outcome reported to streaming and client-streaming listeners.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Status {
    pub code: i32,
    pub details: String,
    pub metadata: Metadata,
}

impl Status {
    /// Successful completion carrying the call's trailers.
    pub fn ok(trailers: Metadata) -> Self {
        Self {
            code: codes::OK,
            details: String::new(),
            metadata: trailers,
        }
    }

    /// Failed completion carrying whatever response headers arrived.
    pub fn from_error(err: &CallError, headers: Metadata) -> Self {
        Self {
            code: err.status_code(),
            details: err.details(),
            metadata: headers,
        }
    }

    pub fn is_ok(&self) -> bool {
        self.code == codes::OK
    }
}

/// Result of awaiting a call handle as a whole.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletedCall {
    pub method: String,
    pub request_headers: Metadata,
    pub headers: Metadata,
    pub trailers: Metadata,
    pub status: i32,
}
