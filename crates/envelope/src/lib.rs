//! Envelope container format: data model, serializer, and parser.
//!
//! An envelope bundles a primary telemetry event with related items
//! (attachments, auxiliary measurement payloads, session data) into one
//! network payload. This crate owns the container layer only: structural
//! encode and decode with exact round-trip fidelity. It does not interpret
//! payload contents beyond what framing requires; semantic rewriting lives
//! in the normalization layer built on top.
//!
//! # Quick start
//!
//! ```rust
//! use envelope::{Envelope, Item, ItemHeaders, PayloadRef};
//! use serde_json::json;
//!
//! let mut envelope = Envelope::new();
//! envelope.headers.event_id = Some(uuid::Uuid::new_v4());
//! envelope.add_event(json!({"message": "Hello, World!"}));
//! envelope.add_item(Item::new(
//!     ItemHeaders::new("attachment"),
//!     PayloadRef::bytes(b"screenshot bytes".to_vec()),
//! ));
//!
//! let bytes = envelope.to_vec().unwrap();
//! let parsed = Envelope::from_slice(&bytes).unwrap();
//! assert_eq!(parsed.items.len(), 2);
//! ```
//!
//! # Guarantees
//!
//! - Parsing then serializing an accepted envelope reproduces it, including
//!   unknown header keys (in insertion order) and unknown item types.
//! - Serialized `length` headers always match the payload actually written.
//! - Framing errors ([`EnvelopeError::MalformedHeader`],
//!   [`EnvelopeError::TruncatedPayload`]) abort the parse; no partial
//!   envelope is ever returned.

mod codec;
mod config;
mod error;
mod payload;
mod timestamp;
mod types;

pub use config::{CodecConfig, ConfigError, CONFIG_VERSION};
pub use error::EnvelopeError;
pub use payload::PayloadRef;
pub use timestamp::{format_timestamp, parse_timestamp};
pub use types::{Envelope, EnvelopeHeaders, Item, ItemHeaders};
