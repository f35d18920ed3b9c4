//! Errors local to normalizing a single item.
//!
//! Every variant here is item-local by contract: the caller skips the item
//! and forwards it raw. Nothing in this crate can fail a whole envelope.
use thiserror::Error;

/// Why one item could not be normalized.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum NormalizeError {
    /// The payload is not well-formed structured data.
    #[error("payload could not be decoded as structured data: {0}")]
    PayloadDecode(String),

    /// The payload decoded, but its top level is not an object.
    #[error("`{item_type}` payload is not an object, nothing to normalize")]
    NotAnObject {
        /// Type discriminator of the offending item.
        item_type: String,
    },
}
