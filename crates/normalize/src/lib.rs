//! Item-type-conditional normalization of parsed envelope payloads.
//!
//! The codec forwards every item untouched; this crate is where item types
//! gain meaning. For items carrying a primary event body it rewrites the
//! structured payload into the form downstream consumers expect:
//!
//! - auxiliary `measures` items are folded into the primary event's
//!   measurement context and dropped from the envelope,
//! - measurement keys are case-folded to lowercase,
//! - the measurement context is stripped from anything that is not a
//!   transaction,
//! - a plain string `message` is rendered into `logentry`.
//!
//! Every rule has an explicit default of "leave unchanged": unknown item
//! types pass through verbatim, and a payload that fails structured decoding
//! is skipped with a warning and forwarded raw. Nothing here can fail a
//! whole envelope.
//!
//! Normalization replaces payloads wholesale with new structured values
//! rather than mutating cached ones, and is idempotent: a second pass over
//! already-normalized output changes nothing.
//!
//! ```rust
//! use envelope::Envelope;
//! use normalize::{normalize_envelope, NormalizeConfig};
//! use serde_json::json;
//!
//! let mut envelope = Envelope::new();
//! envelope.add_event(json!({"message": "Hello, World!"}));
//! normalize_envelope(&mut envelope, &NormalizeConfig::default());
//!
//! let body = envelope.items[0].payload.as_value().unwrap();
//! assert_eq!(body["logentry"], json!({"formatted": "Hello, World!"}));
//! ```
use std::time::Instant;

use envelope::{Envelope, EnvelopeError, Item, PayloadRef};
use serde_json::{Map, Value};

mod config;
mod error;
mod event;
mod measurements;

pub use config::{ConfigError, NormalizeConfig, CONFIG_VERSION};
pub use error::NormalizeError;

/// Item type carrying a plain event body.
pub const ITEM_TYPE_EVENT: &str = "event";
/// Item type carrying a performance/timing transaction body.
pub const ITEM_TYPE_TRANSACTION: &str = "transaction";
/// Auxiliary item type carrying measurement data for the primary event.
pub const ITEM_TYPE_MEASURES: &str = "measures";

/// Interpretation of an item's open-string type discriminator.
///
/// Only the normalizer classifies types; the codec never does. Anything not
/// recognized here is [`Other`](ItemKind::Other) and passes through
/// untouched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemKind {
    /// Plain event body, the envelope's primary payload.
    Event,
    /// Transaction body, the only kind allowed to keep a measures context.
    Transaction,
    /// Auxiliary measurement data, merged into the primary event.
    Measures,
    /// Everything else, forwarded verbatim.
    Other,
}

impl ItemKind {
    /// Classifies a type discriminator.
    pub fn from_type(item_type: &str) -> Self {
        match item_type {
            ITEM_TYPE_EVENT => ItemKind::Event,
            ITEM_TYPE_TRANSACTION => ItemKind::Transaction,
            ITEM_TYPE_MEASURES => ItemKind::Measures,
            _ => ItemKind::Other,
        }
    }

    /// Whether items of this kind carry the envelope's primary event body.
    pub fn is_primary(self) -> bool {
        matches!(self, ItemKind::Event | ItemKind::Transaction)
    }
}

/// Per-envelope tally of what normalization did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NormalizeOutcome {
    /// Items whose payload was rewritten.
    pub normalized_items: usize,
    /// Auxiliary measures items merged into the primary event and removed.
    pub merged_measure_items: usize,
    /// Items skipped because their payload could not be normalized; they
    /// remain in the envelope with their original raw payload.
    pub skipped_items: usize,
}

/// Normalizes every item of `envelope` in place.
///
/// First merges auxiliary measures items into the primary event item (the
/// first `event` or `transaction` item), removing them from the envelope,
/// then applies the per-item rules. Item-local failures are warn-logged and
/// tallied, never propagated.
pub fn normalize_envelope(envelope: &mut Envelope, cfg: &NormalizeConfig) -> NormalizeOutcome {
    let start = Instant::now();
    let span = tracing::debug_span!("normalize_envelope", items = envelope.items.len());
    let _guard = span.enter();

    let mut outcome = NormalizeOutcome::default();
    merge_measure_items(envelope, &mut outcome);

    for (index, item) in envelope.items.iter_mut().enumerate() {
        match normalize_item(item, cfg) {
            Ok(true) => outcome.normalized_items += 1,
            Ok(false) => {}
            Err(err) => {
                tracing::warn!(
                    index,
                    item_type = item.item_type(),
                    error = %err,
                    "skipping item that cannot be normalized, forwarding raw"
                );
                outcome.skipped_items += 1;
            }
        }
    }

    tracing::debug!(
        normalized = outcome.normalized_items,
        merged = outcome.merged_measure_items,
        skipped = outcome.skipped_items,
        elapsed_micros = start.elapsed().as_micros() as u64,
        "envelope normalized"
    );
    outcome
}

/// Applies the payload rules to one item.
///
/// Returns whether the payload was rewritten. Items that are not
/// event-kinded come back `Ok(false)` untouched. Errors are item-local by
/// contract; the caller forwards the item raw.
pub fn normalize_item(item: &mut Item, cfg: &NormalizeConfig) -> Result<bool, NormalizeError> {
    let kind = ItemKind::from_type(item.item_type());
    if !kind.is_primary() {
        return Ok(false);
    }

    let original = decode_object(item)?;
    let mut body = original;
    let mut changed = false;

    if cfg.derive_log_entry {
        changed |= event::derive_log_entry(&mut body);
    }

    // The payload's own `type` field can mark a transaction even when the
    // item header says `event`.
    let transaction_kinded = kind == ItemKind::Transaction
        || body.get("type").and_then(Value::as_str) == Some(ITEM_TYPE_TRANSACTION);

    if !transaction_kinded && cfg.strip_non_transaction_measures {
        changed |= measurements::strip_measures_context(&mut body);
    } else if cfg.fold_measurement_keys {
        changed |= measurements::fold_measurement_keys(&mut body);
    }

    if changed {
        item.payload = PayloadRef::json(Value::Object(body));
    }
    Ok(changed)
}

/// Folds every `measures` item into the primary event item and removes the
/// merged items. With no primary item, measures items pass through verbatim.
fn merge_measure_items(envelope: &mut Envelope, outcome: &mut NormalizeOutcome) {
    let Some(primary) = envelope
        .items
        .iter()
        .position(|item| ItemKind::from_type(item.item_type()).is_primary())
    else {
        return;
    };

    let mut base = match decode_object(&envelope.items[primary]) {
        Ok(body) => body,
        // The primary payload is undecodable; the per-item pass will warn
        // and tally it, measures items stay where they are.
        Err(_) => return,
    };

    let mut merged = Vec::new();
    for (index, item) in envelope.items.iter().enumerate() {
        if ItemKind::from_type(item.item_type()) != ItemKind::Measures {
            continue;
        }
        match decode_object(item) {
            Ok(source) => merged.push((index, source)),
            Err(err) => {
                tracing::warn!(
                    index,
                    error = %err,
                    "skipping measures item that cannot be decoded, forwarding raw"
                );
                outcome.skipped_items += 1;
            }
        }
    }
    if merged.is_empty() {
        return;
    }

    for (_, source) in &merged {
        measurements::merge_measures(&mut base, source);
    }
    envelope.items[primary].payload = PayloadRef::json(Value::Object(base));

    for &(index, _) in merged.iter().rev() {
        envelope.items.remove(index);
        outcome.merged_measure_items += 1;
    }
}

fn decode_object(item: &Item) -> Result<Map<String, Value>, NormalizeError> {
    let value = item.payload.as_value().map_err(|err| match err {
        EnvelopeError::PayloadDecode(reason) => NormalizeError::PayloadDecode(reason),
        other => NormalizeError::PayloadDecode(other.to_string()),
    })?;
    value
        .as_object()
        .cloned()
        .ok_or_else(|| NormalizeError::NotAnObject {
            item_type: item.item_type().to_owned(),
        })
}
