//! Event payload rules that do not touch the measurement context.
use serde_json::{Map, Value};

/// Rewrites a top-level string `message` into `logentry: {"formatted": ...}`.
///
/// An existing `logentry` always wins: the raw `message` is left alone so no
/// producer-supplied rendering is overwritten. Non-string `message` values
/// (structured message interfaces) are also left untouched. Returns whether
/// anything changed.
pub(crate) fn derive_log_entry(payload: &mut Map<String, Value>) -> bool {
    if payload.contains_key("logentry") {
        return false;
    }
    let formatted = match payload.get("message") {
        Some(Value::String(message)) => message.clone(),
        _ => return false,
    };
    payload.remove("message");
    let mut logentry = Map::new();
    logentry.insert("formatted".into(), Value::String(formatted));
    payload.insert("logentry".into(), Value::Object(logentry));
    true
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn payload(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn message_becomes_logentry() {
        let mut body = payload(json!({"message": "Hello, World!"}));
        assert!(derive_log_entry(&mut body));
        assert_eq!(body["logentry"], json!({"formatted": "Hello, World!"}));
        assert!(body.get("message").is_none());
    }

    #[test]
    fn existing_logentry_is_never_overwritten() {
        let mut body = payload(json!({
            "message": "raw %s",
            "logentry": {"formatted": "raw interpolated"}
        }));
        assert!(!derive_log_entry(&mut body));
        assert_eq!(body["logentry"]["formatted"], "raw interpolated");
        assert_eq!(body["message"], "raw %s");
    }

    #[test]
    fn structured_message_is_left_alone() {
        let mut body = payload(json!({"message": {"params": [1, 2]}}));
        assert!(!derive_log_entry(&mut body));
        assert_eq!(body["message"], json!({"params": [1, 2]}));
    }

    #[test]
    fn derivation_is_idempotent() {
        let mut body = payload(json!({"message": "Hello, World!"}));
        derive_log_entry(&mut body);
        let once = body.clone();
        assert!(!derive_log_entry(&mut body));
        assert_eq!(body, once);
    }
}
