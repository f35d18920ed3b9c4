//! Error types produced by the envelope crate.
//!
//! All errors are typed, cloneable, and comparable so callers can branch on
//! the exact failure and tests can assert on it. I/O failures are carried as
//! rendered strings to keep the enum `Clone + Eq`.
//!
//! # Error Categories
//!
//! | Error | Scope | Recoverable |
//! |-------|-------|-------------|
//! | [`MalformedHeader`](EnvelopeError::MalformedHeader) | whole envelope | no |
//! | [`TruncatedPayload`](EnvelopeError::TruncatedPayload) | whole envelope | no |
//! | [`InvalidTimestamp`](EnvelopeError::InvalidTimestamp) | whole envelope | no |
//! | [`MissingItemType`](EnvelopeError::MissingItemType) | whole envelope | no |
//! | [`TooManyItems`](EnvelopeError::TooManyItems) | whole envelope | no |
//! | [`PayloadTooLarge`](EnvelopeError::PayloadTooLarge) | whole envelope | no |
//! | [`PayloadDecode`](EnvelopeError::PayloadDecode) | single item | yes — forward raw |
//! | [`PayloadRead`](EnvelopeError::PayloadRead) | encode of one item | no |
//! | [`Io`](EnvelopeError::Io) | encode stream | no |
//!
//! Framing errors abort the whole parse: once a header line or a declared
//! length cannot be trusted, nothing after it can be either, so no partial
//! envelope is ever returned.
use thiserror::Error;

/// Errors that can occur while encoding or decoding an envelope.
///
/// The enum is marked `#[non_exhaustive]` to allow future additions without
/// breaking existing code. Callers should always include a catch-all arm when
/// matching.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum EnvelopeError {
    /// A header line is not a well-formed JSON object record.
    ///
    /// This covers undecodable JSON, a non-object top level, and malformed
    /// conventional fields (`event_id`, `length`). The byte offset points at
    /// the start of the offending line.
    #[error("malformed header at byte {offset}: {reason}")]
    MalformedHeader {
        /// Byte offset of the start of the offending header line.
        offset: usize,
        /// Human-readable description of what failed to decode.
        reason: String,
    },

    /// The stream ended before a payload's declared length was satisfied.
    #[error(
        "truncated payload at byte {offset}: header declares {expected} bytes, \
         only {available} remain"
    )]
    TruncatedPayload {
        /// Byte offset where the payload block begins.
        offset: usize,
        /// Byte count the item header declared.
        expected: usize,
        /// Bytes actually remaining in the stream.
        available: usize,
    },

    /// A header field typed as a timestamp failed to parse.
    ///
    /// Timestamps must be RFC3339, UTC, fractional seconds optional. Any
    /// header decode failure is envelope-fatal for predictability.
    #[error("invalid timestamp: {0}")]
    InvalidTimestamp(String),

    /// An item header record is missing its `type` discriminator.
    #[error("item {index} header is missing the required `type` field")]
    MissingItemType {
        /// Zero-based index of the item within the envelope.
        index: usize,
    },

    /// A payload could not be decoded as structured data.
    ///
    /// Local to the item: the item is still structurally valid and can be
    /// forwarded as raw bytes. Consumers must not fail the envelope on it.
    #[error("payload is not well-formed structured data: {0}")]
    PayloadDecode(String),

    /// A payload could not be materialized to bytes at encode time.
    ///
    /// Typically a file-backed payload whose backing resource is unreadable.
    /// The index identifies which item failed.
    #[error("failed to materialize payload for item {index}: {reason}")]
    PayloadRead {
        /// Zero-based index of the item whose payload failed to load.
        index: usize,
        /// Rendered cause of the failure.
        reason: String,
    },

    /// The envelope declares more items than the configured limit allows.
    #[error("envelope contains at least {count} items, limit is {limit}")]
    TooManyItems {
        /// Item count observed when the limit tripped.
        count: usize,
        /// Configured item limit.
        limit: usize,
    },

    /// An item header declares a payload larger than the configured limit.
    ///
    /// Checked against the declared length before any allocation happens, so
    /// a hostile stream cannot force a huge buffer.
    #[error("item payload declares {declared} bytes, limit is {limit}")]
    PayloadTooLarge {
        /// Declared payload length from the item header.
        declared: usize,
        /// Configured payload size limit.
        limit: usize,
    },

    /// An underlying stream or serialization failure, rendered as text.
    #[error("i/o failure: {0}")]
    Io(String),
}

impl EnvelopeError {
    /// Rewrites the byte offset of a `MalformedHeader`, leaving other
    /// variants untouched. Header decoding helpers report offset 0 and the
    /// parser patches in the real stream position.
    pub(crate) fn at_offset(self, offset: usize) -> Self {
        match self {
            EnvelopeError::MalformedHeader { reason, .. } => {
                EnvelopeError::MalformedHeader { offset, reason }
            }
            other => other,
        }
    }

    /// Returns true if the error is local to a single item rather than fatal
    /// for the whole envelope.
    ///
    /// # Example
    ///
    /// ```rust
    /// use envelope::EnvelopeError;
    ///
    /// assert!(EnvelopeError::PayloadDecode("bad json".into()).is_item_local());
    /// assert!(!EnvelopeError::TruncatedPayload { offset: 0, expected: 8, available: 2 }
    ///     .is_item_local());
    /// ```
    pub fn is_item_local(&self) -> bool {
        matches!(self, EnvelopeError::PayloadDecode(_))
    }
}
