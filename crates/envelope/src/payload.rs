//! Payload references: uniform access to an item's body.
//!
//! An item's body can arrive in three shapes — a structured value the
//! producer already holds, raw bytes, or a file that has not been read yet.
//! [`PayloadRef`] is a closed tagged union over those shapes with one
//! materialization contract:
//!
//! - [`as_bytes`](PayloadRef::as_bytes) — deterministic, idempotent, returns
//!   the exact wire representation.
//! - [`as_value`](PayloadRef::as_value) — parses the bytes as structured
//!   data, failing with [`EnvelopeError::PayloadDecode`] on malformed content.
//!
//! Materialization is cached with single-initialization cells: a structured
//! payload is encoded at most once, a file is read at most once, and raw
//! bytes are parsed at most once. Only successful materializations are
//! cached; a failed file read reports the failure on every attempt.
//!
//! Payload references are never shared across envelopes, so the cells are a
//! single-owner concern, not a concurrency one.
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use serde_json::Value;

use crate::error::EnvelopeError;

/// The three shapes an item body can arrive in.
#[derive(Debug, Clone)]
enum PayloadSource {
    /// In-memory structured value, e.g. an event body built by a producer.
    Json(Value),
    /// Opaque byte sequence of known length, e.g. a binary attachment or a
    /// pre-serialized payload.
    Bytes(Vec<u8>),
    /// Bytes not yet loaded, read lazily from disk on first materialization.
    File(PathBuf),
}

/// Reference to one item's body with lazy, cached materialization.
///
/// # Examples
///
/// ```rust
/// use envelope::PayloadRef;
/// use serde_json::json;
///
/// let payload = PayloadRef::json(json!({"message": "Hello, World!"}));
/// let bytes = payload.as_bytes().unwrap();
/// assert_eq!(bytes, br#"{"message":"Hello, World!"}"#);
///
/// let raw = PayloadRef::bytes(b"\x89PNG\r\n".to_vec());
/// assert!(raw.as_value().is_err()); // not structured data
/// ```
#[derive(Debug, Clone)]
pub struct PayloadRef {
    source: PayloadSource,
    bytes: OnceLock<Vec<u8>>,
    value: OnceLock<Value>,
}

impl PayloadRef {
    /// Wraps an in-memory structured value.
    pub fn json(value: Value) -> Self {
        Self::from_source(PayloadSource::Json(value))
    }

    /// Wraps raw bytes.
    pub fn bytes(bytes: Vec<u8>) -> Self {
        Self::from_source(PayloadSource::Bytes(bytes))
    }

    /// Wraps a file path; the file is read once, on first materialization.
    pub fn file(path: impl Into<PathBuf>) -> Self {
        Self::from_source(PayloadSource::File(path.into()))
    }

    fn from_source(source: PayloadSource) -> Self {
        Self {
            source,
            bytes: OnceLock::new(),
            value: OnceLock::new(),
        }
    }

    /// Returns the exact wire bytes of this payload.
    ///
    /// Structured values are encoded once and cached; file-backed payloads
    /// are read once and cached. Raw bytes are returned as-is.
    ///
    /// # Errors
    ///
    /// [`EnvelopeError::Io`] when encoding fails or the backing file cannot
    /// be read. The caller (the serializer) decorates the error with the item
    /// index.
    pub fn as_bytes(&self) -> Result<&[u8], EnvelopeError> {
        match &self.source {
            PayloadSource::Bytes(bytes) => Ok(bytes),
            PayloadSource::Json(value) => {
                if let Some(cached) = self.bytes.get() {
                    return Ok(cached);
                }
                let encoded =
                    serde_json::to_vec(value).map_err(|err| EnvelopeError::Io(err.to_string()))?;
                Ok(self.bytes.get_or_init(|| encoded))
            }
            PayloadSource::File(path) => {
                if let Some(cached) = self.bytes.get() {
                    return Ok(cached);
                }
                let read = std::fs::read(path)
                    .map_err(|err| EnvelopeError::Io(format!("{}: {err}", path.display())))?;
                Ok(self.bytes.get_or_init(|| read))
            }
        }
    }

    /// Returns the payload as a structured value.
    ///
    /// For a structured source this is the value itself. For byte and file
    /// sources the bytes are parsed as JSON once and the success is cached.
    ///
    /// # Errors
    ///
    /// [`EnvelopeError::PayloadDecode`] when the bytes are not well-formed
    /// structured data. This error is local to the item — the payload remains
    /// forwardable via [`as_bytes`](Self::as_bytes).
    pub fn as_value(&self) -> Result<&Value, EnvelopeError> {
        if let PayloadSource::Json(value) = &self.source {
            return Ok(value);
        }
        if let Some(cached) = self.value.get() {
            return Ok(cached);
        }
        let bytes = self.as_bytes()?;
        let parsed: Value = serde_json::from_slice(bytes)
            .map_err(|err| EnvelopeError::PayloadDecode(err.to_string()))?;
        Ok(self.value.get_or_init(|| parsed))
    }

    /// Returns true if the payload was constructed from a structured value.
    pub fn is_structured(&self) -> bool {
        matches!(self.source, PayloadSource::Json(_))
    }

    /// Returns the backing file path, if this payload is file-backed.
    pub fn file_path(&self) -> Option<&Path> {
        match &self.source {
            PayloadSource::File(path) => Some(path),
            _ => None,
        }
    }

    /// Payload shape as a static string, for structured logging.
    pub fn kind(&self) -> &'static str {
        match self.source {
            PayloadSource::Json(_) => "json",
            PayloadSource::Bytes(_) => "bytes",
            PayloadSource::File(_) => "file",
        }
    }
}
