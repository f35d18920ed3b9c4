//! Core data model: envelopes, items, and their header records.
//!
//! An envelope is an ordered container: envelope-level headers plus a
//! sequence of independently-typed items, each with its own header mapping
//! and payload. Order is semantically meaningful (the first matching item of
//! a type wins downstream), so the model preserves it exactly.
//!
//! Header mappings are open: the conventional keys (`event_id`, `sent_at`,
//! `type`, `length`, ...) get typed fields, everything else is carried
//! verbatim in insertion order and survives a round trip untouched. The item
//! `type` discriminator is an open string — unrecognized values are legal and
//! are forwarded unchanged; only the normalization layer switches behavior on
//! specific known values.
use std::io::Write;

use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::codec;
use crate::config::CodecConfig;
use crate::error::EnvelopeError;
use crate::payload::PayloadRef;
use crate::timestamp::{format_timestamp, parse_timestamp};

/// Envelope-level headers.
///
/// Conventional keys are typed; everything else rides along in `extra`,
/// order-preserved. An all-`None`, empty-`extra` value encodes as `{}`.
///
/// # Examples
///
/// ```rust
/// use envelope::EnvelopeHeaders;
/// use chrono::Utc;
/// use uuid::Uuid;
///
/// let mut headers = EnvelopeHeaders::default();
/// headers.event_id = Some(Uuid::new_v4());
/// headers.sent_at = Some(Utc::now());
/// headers
///     .extra
///     .insert("dsn".into(), "https://key@ingest.example.com/42".into());
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EnvelopeHeaders {
    /// Identifier of the primary event carried by this envelope.
    ///
    /// Accepted in hyphenated or simple form, always re-encoded simple
    /// (32 hex digits), matching what producers send.
    pub event_id: Option<Uuid>,

    /// When the producer handed the envelope to its transport.
    ///
    /// Encoded via [`format_timestamp`]; decode failures are envelope-fatal.
    pub sent_at: Option<DateTime<Utc>>,

    /// All other header keys, preserved verbatim in insertion order.
    ///
    /// The codec performs no validation beyond structural decoding: project
    /// routing, auth material, and whatever else producers attach pass
    /// through opaquely.
    pub extra: Map<String, Value>,
}

impl EnvelopeHeaders {
    /// Decodes headers from a parsed JSON object.
    pub(crate) fn from_map(map: Map<String, Value>) -> Result<Self, EnvelopeError> {
        let mut headers = EnvelopeHeaders::default();
        for (key, value) in map {
            match key.as_str() {
                "event_id" => {
                    let raw = value.as_str().ok_or_else(|| EnvelopeError::MalformedHeader {
                        offset: 0,
                        reason: "event_id must be a string".into(),
                    })?;
                    let id = Uuid::parse_str(raw).map_err(|err| EnvelopeError::MalformedHeader {
                        offset: 0,
                        reason: format!("event_id {raw:?} is not a valid uuid: {err}"),
                    })?;
                    headers.event_id = Some(id);
                }
                "sent_at" => {
                    let raw = value.as_str().ok_or_else(|| {
                        EnvelopeError::InvalidTimestamp("sent_at must be a string".into())
                    })?;
                    headers.sent_at = Some(parse_timestamp(raw)?);
                }
                _ => {
                    headers.extra.insert(key, value);
                }
            }
        }
        Ok(headers)
    }

    /// Encodes headers as a JSON object, conventional keys first.
    pub(crate) fn to_map(&self) -> Map<String, Value> {
        let mut map = Map::new();
        if let Some(event_id) = self.event_id {
            map.insert(
                "event_id".into(),
                Value::String(event_id.as_simple().to_string()),
            );
        }
        if let Some(sent_at) = self.sent_at {
            map.insert("sent_at".into(), Value::String(format_timestamp(sent_at)));
        }
        for (key, value) in &self.extra {
            map.insert(key.clone(), value.clone());
        }
        map
    }
}

/// Header record of one item.
///
/// `item_type` is the only required field and is deliberately an open
/// string: the codec has no closed type set. `length` is recomputed by the
/// serializer from the materialized payload — a caller-supplied value is
/// never trusted onto the wire.
#[derive(Debug, Clone, PartialEq)]
pub struct ItemHeaders {
    /// Open-string type discriminator (`event`, `transaction`, `measures`,
    /// attachments, or anything a future producer invents).
    pub item_type: String,

    /// Declared byte length of the payload.
    ///
    /// Required on the wire; on in-memory items it is advisory only and is
    /// overwritten at encode time.
    pub length: Option<usize>,

    /// Optional MIME type of the payload.
    pub content_type: Option<String>,

    /// Optional original filename, used by attachment items.
    pub filename: Option<String>,

    /// All other header keys, preserved verbatim in insertion order.
    pub extra: Map<String, Value>,
}

impl ItemHeaders {
    /// Creates headers with just a type discriminator.
    pub fn new(item_type: impl Into<String>) -> Self {
        Self {
            item_type: item_type.into(),
            length: None,
            content_type: None,
            filename: None,
            extra: Map::new(),
        }
    }

    /// Decodes item headers from a parsed JSON object. `index` identifies
    /// the item for error reporting.
    pub(crate) fn from_map(map: Map<String, Value>, index: usize) -> Result<Self, EnvelopeError> {
        let mut item_type = None;
        let mut headers = ItemHeaders::new("");
        for (key, value) in map {
            match key.as_str() {
                "type" => match value {
                    Value::String(ty) => item_type = Some(ty),
                    _ => {
                        return Err(EnvelopeError::MalformedHeader {
                            offset: 0,
                            reason: "item type must be a string".into(),
                        })
                    }
                },
                "length" => {
                    let declared = value
                        .as_u64()
                        .and_then(|raw| usize::try_from(raw).ok())
                        .ok_or_else(|| EnvelopeError::MalformedHeader {
                            offset: 0,
                            reason: "length must be a non-negative integer".into(),
                        })?;
                    headers.length = Some(declared);
                }
                "content_type" => {
                    headers.content_type = value.as_str().map(str::to_owned);
                }
                "filename" => {
                    headers.filename = value.as_str().map(str::to_owned);
                }
                _ => {
                    headers.extra.insert(key, value);
                }
            }
        }
        match item_type {
            Some(ty) => {
                headers.item_type = ty;
                Ok(headers)
            }
            None => Err(EnvelopeError::MissingItemType { index }),
        }
    }

    /// Encodes item headers as a JSON object, conventional keys first.
    pub(crate) fn to_map(&self) -> Map<String, Value> {
        let mut map = Map::new();
        map.insert("type".into(), Value::String(self.item_type.clone()));
        if let Some(length) = self.length {
            map.insert("length".into(), Value::Number((length as u64).into()));
        }
        if let Some(content_type) = &self.content_type {
            map.insert("content_type".into(), Value::String(content_type.clone()));
        }
        if let Some(filename) = &self.filename {
            map.insert("filename".into(), Value::String(filename.clone()));
        }
        for (key, value) in &self.extra {
            map.insert(key.clone(), value.clone());
        }
        map
    }
}

/// One named, typed unit inside an envelope.
///
/// Owned exclusively by its parent envelope; never shared across envelopes.
#[derive(Debug, Clone)]
pub struct Item {
    /// Header mapping, `type` discriminator included.
    pub headers: ItemHeaders,
    /// The item body.
    pub payload: PayloadRef,
}

impl Item {
    /// Creates an item from prepared headers and payload.
    pub fn new(headers: ItemHeaders, payload: PayloadRef) -> Self {
        Self { headers, payload }
    }

    /// Creates an item of the given type around a structured payload.
    ///
    /// # Example
    ///
    /// ```rust
    /// use envelope::Item;
    /// use serde_json::json;
    ///
    /// let item = Item::from_json("transaction", json!({"transaction": "/checkout"}));
    /// assert_eq!(item.item_type(), "transaction");
    /// ```
    pub fn from_json(item_type: impl Into<String>, value: Value) -> Self {
        Self::new(ItemHeaders::new(item_type), PayloadRef::json(value))
    }

    /// The item's type discriminator.
    pub fn item_type(&self) -> &str {
        &self.headers.item_type
    }
}

/// Ordered container of header metadata plus a sequence of typed items,
/// serialized as one network payload.
///
/// A zero-item envelope is valid (header-only). The envelope is built in
/// memory by a producer, serialized (a pure read), and parsed back losslessly
/// on the consumer side.
///
/// # Examples
///
/// ```rust
/// use envelope::Envelope;
/// use serde_json::json;
///
/// let mut outgoing = Envelope::new();
/// outgoing.add_event(json!({"message": "Hello, World!"}));
/// let bytes = outgoing.to_vec().unwrap();
///
/// let incoming = Envelope::from_slice(&bytes).unwrap();
/// assert_eq!(incoming.items.len(), 1);
/// assert_eq!(incoming.items[0].item_type(), "event");
/// ```
#[derive(Debug, Clone, Default)]
pub struct Envelope {
    /// Envelope-level headers.
    pub headers: EnvelopeHeaders,
    /// Items in wire order. Order is preserved exactly through a round trip.
    pub items: Vec<Item>,
}

impl Envelope {
    /// Creates an empty envelope with empty headers.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty envelope with the given headers.
    pub fn with_headers(headers: EnvelopeHeaders) -> Self {
        Self {
            headers,
            items: Vec::new(),
        }
    }

    /// Appends an item, keeping wire order.
    pub fn add_item(&mut self, item: Item) {
        self.items.push(item);
    }

    /// Convenience: appends an `event` item around a structured body.
    pub fn add_event(&mut self, body: Value) {
        self.add_item(Item::from_json("event", body));
    }

    /// Serializes the envelope into `writer`.
    ///
    /// Total for a well-formed in-memory envelope; payload materialization
    /// failures propagate as [`EnvelopeError::PayloadRead`] naming the item.
    pub fn serialize<W: Write>(&self, writer: &mut W) -> Result<(), EnvelopeError> {
        codec::serialize(self, writer)
    }

    /// Serializes the envelope to an owned byte vector.
    pub fn to_vec(&self) -> Result<Vec<u8>, EnvelopeError> {
        let mut out = Vec::new();
        self.serialize(&mut out)?;
        Ok(out)
    }

    /// Parses an envelope from a byte slice with the default codec config.
    pub fn from_slice(buf: &[u8]) -> Result<Self, EnvelopeError> {
        codec::parse(buf, &CodecConfig::default())
    }

    /// Parses an envelope from a byte slice, enforcing the given limits.
    pub fn from_slice_with(buf: &[u8], cfg: &CodecConfig) -> Result<Self, EnvelopeError> {
        codec::parse(buf, cfg)
    }
}
