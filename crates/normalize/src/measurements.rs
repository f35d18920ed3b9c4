//! Measurement context rules: key case-folding, conditional stripping, and
//! measures-item merging.
//!
//! The measurement context lives at `contexts.measures.measurements` inside
//! an event payload: a map of named numeric measurements. Producers disagree
//! on key casing, so keys are folded to lowercase; only transaction payloads
//! may keep a measures context at all.
use serde_json::{Map, Value};

/// Lowercases every key of `contexts.measures.measurements`.
///
/// Colliding keys resolve last-write-wins in original iteration order, which
/// makes the fold deterministic and idempotent (a second pass sees only
/// lowercase keys and changes nothing). Returns whether anything changed.
pub(crate) fn fold_measurement_keys(payload: &mut Map<String, Value>) -> bool {
    let Some(measurements) = payload
        .get_mut("contexts")
        .and_then(|contexts| contexts.get_mut("measures"))
        .and_then(|measures| measures.get_mut("measurements"))
        .and_then(Value::as_object_mut)
    else {
        return false;
    };

    if measurements.keys().all(|key| is_lowercase(key)) {
        return false;
    }
    let entries = std::mem::take(measurements);
    for (key, value) in entries {
        measurements.insert(key.to_lowercase(), value);
    }
    true
}

fn is_lowercase(key: &str) -> bool {
    !key.chars().any(char::is_uppercase)
}

/// Removes `contexts.measures`, keeping the (possibly now empty) `contexts`
/// map in place. Returns whether the key was present.
pub(crate) fn strip_measures_context(payload: &mut Map<String, Value>) -> bool {
    payload
        .get_mut("contexts")
        .and_then(Value::as_object_mut)
        .map(|contexts| contexts.remove("measures").is_some())
        .unwrap_or(false)
}

/// Merges one measures-item payload into an event payload's
/// `contexts.measures`.
///
/// Top-level keys of `source` land under `contexts.measures`; when both
/// sides hold an object under the same key (the common `measurements` case)
/// the objects are merged one level deep, later entries overwriting earlier
/// ones. Creates `contexts` and `contexts.measures` as needed.
pub(crate) fn merge_measures(payload: &mut Map<String, Value>, source: &Map<String, Value>) {
    let contexts = payload
        .entry("contexts")
        .or_insert_with(|| Value::Object(Map::new()));
    let Some(contexts) = contexts.as_object_mut() else {
        return;
    };
    let measures = contexts
        .entry("measures")
        .or_insert_with(|| Value::Object(Map::new()));
    let Some(measures) = measures.as_object_mut() else {
        return;
    };

    for (key, value) in source {
        match (measures.get_mut(key), value.as_object()) {
            (Some(Value::Object(existing)), Some(incoming)) => {
                for (inner_key, inner_value) in incoming {
                    existing.insert(inner_key.clone(), inner_value.clone());
                }
            }
            _ => {
                measures.insert(key.clone(), value.clone());
            }
        }
    }
}
