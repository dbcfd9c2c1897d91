//! Tagged events pushed by a transport bridge.
//!
//! Every piece of network activity reaches the client as a
//! [`BridgeEvent`]: a call id plus one of four kinds. Bridges that hand
//! over JSON records (`{"id": 3, "type": "response", "payload": "..."}`)
//! can use [`BridgeEvent::from_json`]; `response` payloads in that form
//! are base64 text.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::error::{CallError, CallResult};
use crate::metadata::Metadata;
use crate::types::CallId;

/// One event for one call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BridgeEvent {
    pub id: CallId,
    pub kind: EventKind,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventKind {
    /// Response headers arrived.
    Headers(Metadata),
    /// One response message arrived.
    Data(Payload),
    /// The call finished successfully. Terminal.
    Trailers(Metadata),
    /// The call failed. Terminal.
    Error { message: String, code: Option<i32> },
}

/// A response message as the bridge delivered it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Payload {
    Raw(Bytes),
    Base64(String),
}

impl Payload {
    /// Decode into raw message bytes.
    pub fn into_bytes(self) -> CallResult<Bytes> {
        match self {
            Payload::Raw(bytes) => Ok(bytes),
            Payload::Base64(text) => STANDARD
                .decode(text.as_bytes())
                .map(Bytes::from)
                .map_err(|e| CallError::transport(format!("malformed response payload: {e}"), None)),
        }
    }
}

impl BridgeEvent {
    pub fn headers(id: CallId, headers: Metadata) -> Self {
        Self {
            id,
            kind: EventKind::Headers(headers),
        }
    }

    pub fn data(id: CallId, bytes: impl Into<Bytes>) -> Self {
        Self {
            id,
            kind: EventKind::Data(Payload::Raw(bytes.into())),
        }
    }

    /// A data event whose payload is base64 text.
    pub fn data_base64(id: CallId, bytes: &[u8]) -> Self {
        Self {
            id,
            kind: EventKind::Data(Payload::Base64(STANDARD.encode(bytes))),
        }
    }

    pub fn trailers(id: CallId, trailers: Metadata) -> Self {
        Self {
            id,
            kind: EventKind::Trailers(trailers),
        }
    }

    pub fn error(id: CallId, message: impl Into<String>, code: Option<i32>) -> Self {
        Self {
            id,
            kind: EventKind::Error {
                message: message.into(),
                code,
            },
        }
    }

    /// Trailers and errors end a call.
    pub fn is_terminal(&self) -> bool {
        matches!(self.kind, EventKind::Trailers(_) | EventKind::Error { .. })
    }

    pub fn kind_name(&self) -> &'static str {
        match self.kind {
            EventKind::Headers(_) => "headers",
            EventKind::Data(_) => "data",
            EventKind::Trailers(_) => "trailers",
            EventKind::Error { .. } => "error",
        }
    }

    /// Parse a JSON wire record.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str::<WireEvent>(json).map(Into::into)
    }

    /// Render as a JSON wire record. Data payloads are base64 encoded.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(&WireEvent::from(self))
    }
}

// ── Wire form ───────────────────────────────────────────────────────

#[derive(Serialize, Deserialize)]
struct WireEvent {
    id: u64,
    #[serde(flatten)]
    kind: WireKind,
}

#[derive(Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
enum WireKind {
    Headers {
        #[serde(default)]
        payload: Metadata,
    },
    Response {
        payload: String,
    },
    Trailers {
        #[serde(default)]
        payload: Metadata,
    },
    Error {
        error: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        code: Option<i32>,
    },
}

impl From<WireEvent> for BridgeEvent {
    fn from(wire: WireEvent) -> Self {
        let kind = match wire.kind {
            WireKind::Headers { payload } => EventKind::Headers(payload),
            WireKind::Response { payload } => EventKind::Data(Payload::Base64(payload)),
            WireKind::Trailers { payload } => EventKind::Trailers(payload),
            WireKind::Error { error, code } => EventKind::Error {
                message: error,
                code,
            },
        };
        BridgeEvent {
            id: CallId::new(wire.id),
            kind,
        }
    }
}

impl From<&BridgeEvent> for WireEvent {
    fn from(event: &BridgeEvent) -> Self {
        let kind = match &event.kind {
            EventKind::Headers(md) => WireKind::Headers {
                payload: md.clone(),
            },
            EventKind::Data(Payload::Raw(bytes)) => WireKind::Response {
                payload: STANDARD.encode(bytes),
            },
            EventKind::Data(Payload::Base64(text)) => WireKind::Response {
                payload: text.clone(),
            },
            EventKind::Trailers(md) => WireKind::Trailers {
                payload: md.clone(),
            },
            EventKind::Error { message, code } => WireKind::Error {
                error: message.clone(),
                code: *code,
            },
        };
        WireEvent {
            id: event.id.get(),
            kind,
        }
    }
}
