//! callbridge-core: shared types for the callbridge client runtime.
//!
//! Everything that crosses a crate boundary lives here: call identifiers,
//! metadata maps, the tagged events a transport bridge pushes into the
//! client, status values surfaced to application code, the error
//! taxonomy, and TOML client configuration.
//!
//! No I/O and no async: the multiplexing machinery lives in
//! `callbridge-client`.

pub mod config;
pub mod error;
pub mod event;
pub mod metadata;
pub mod types;

pub use config::ClientConfig;
pub use error::{CallError, CallResult, ConfigError};
pub use event::{BridgeEvent, EventKind, Payload};
pub use metadata::Metadata;
pub use types::*;
