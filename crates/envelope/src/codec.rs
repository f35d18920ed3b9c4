//! Wire codec: line-delimited header records, length-prefixed payloads.
//!
//! The wire layout interleaves two framing regimes:
//!
//! ```text
//! <envelope header JSON>\n
//! <item header JSON>\n
//! <payload bytes, exactly `length` of them>\n
//! <item header JSON>\n
//! <payload bytes>\n
//! ...
//! ```
//!
//! Header records are single-line JSON objects, so a newline terminates
//! them. Payloads are opaque and may contain newlines, so they are framed by
//! the `length` declared in the preceding item header, never by scanning.
//! The newline after a payload is a separator, not part of the payload; the
//! final one is optional, and a missing trailing newline after the last
//! record is accepted.
//!
//! The serializer recomputes every `length` from the materialized payload,
//! so an envelope that serializes successfully always re-parses: declared
//! lengths on the wire are authoritative and honest.
use std::io::Write;
use std::time::Instant;

use serde_json::{Map, Value};

use crate::config::CodecConfig;
use crate::error::EnvelopeError;
use crate::payload::PayloadRef;
use crate::types::{Envelope, EnvelopeHeaders, Item, ItemHeaders};

/// Serializes `envelope` into `writer`, recomputing every payload length.
pub(crate) fn serialize<W: Write>(
    envelope: &Envelope,
    writer: &mut W,
) -> Result<(), EnvelopeError> {
    let start = Instant::now();
    let span = tracing::debug_span!("serialize_envelope", items = envelope.items.len());
    let _guard = span.enter();

    write_record(writer, &envelope.headers.to_map())?;
    for (index, item) in envelope.items.iter().enumerate() {
        let payload = item
            .payload
            .as_bytes()
            .map_err(|err| EnvelopeError::PayloadRead {
                index,
                reason: err.to_string(),
            })?;
        let mut headers = item.headers.clone();
        headers.length = Some(payload.len());
        write_record(writer, &headers.to_map())?;
        writer
            .write_all(payload)
            .and_then(|()| writer.write_all(b"\n"))
            .map_err(|err| EnvelopeError::Io(err.to_string()))?;
    }

    tracing::debug!(
        items = envelope.items.len(),
        elapsed_micros = start.elapsed().as_micros() as u64,
        "envelope serialized"
    );
    Ok(())
}

fn write_record<W: Write>(writer: &mut W, map: &Map<String, Value>) -> Result<(), EnvelopeError> {
    let line = serde_json::to_vec(map).map_err(|err| EnvelopeError::Io(err.to_string()))?;
    writer
        .write_all(&line)
        .and_then(|()| writer.write_all(b"\n"))
        .map_err(|err| EnvelopeError::Io(err.to_string()))
}

/// Parses an envelope from `buf`, enforcing the limits in `cfg`.
///
/// Framing errors abort the whole parse; no partial envelope is returned.
pub(crate) fn parse(buf: &[u8], cfg: &CodecConfig) -> Result<Envelope, EnvelopeError> {
    let start = Instant::now();
    let span = tracing::debug_span!("parse_envelope", bytes = buf.len());
    let _guard = span.enter();

    match parse_inner(buf, cfg) {
        Ok(envelope) => {
            tracing::debug!(
                items = envelope.items.len(),
                elapsed_micros = start.elapsed().as_micros() as u64,
                "envelope parsed"
            );
            Ok(envelope)
        }
        Err(err) => {
            tracing::warn!(error = %err, bytes = buf.len(), "envelope parse failed");
            Err(err)
        }
    }
}

/// Parser positions, advanced one record at a time.
enum ParseState {
    /// Nothing consumed yet; the next line is the envelope header.
    Start,
    /// Between records; the next line, if any, is an item header.
    ExpectItemHeaderOrEnd,
    /// An item header has been consumed; a payload of this declared length
    /// must follow.
    ExpectPayload { declared: usize },
}

fn parse_inner(buf: &[u8], cfg: &CodecConfig) -> Result<Envelope, EnvelopeError> {
    let mut cursor = Cursor::new(buf);
    let mut state = ParseState::Start;
    let mut headers = EnvelopeHeaders::default();
    let mut items = Vec::new();

    loop {
        match state {
            ParseState::Start => {
                let (offset, line) = cursor.read_line();
                if line.is_empty() {
                    return Err(EnvelopeError::MalformedHeader {
                        offset,
                        reason: "empty input, expected an envelope header record".into(),
                    });
                }
                headers = EnvelopeHeaders::from_map(decode_record(offset, line)?)
                    .map_err(|err| err.at_offset(offset))?;
                state = ParseState::ExpectItemHeaderOrEnd;
            }
            ParseState::ExpectItemHeaderOrEnd => {
                if cursor.is_eof() {
                    break;
                }
                let (offset, line) = cursor.read_line();
                // A bare trailing newline after the last record.
                if line.is_empty() && cursor.is_eof() {
                    break;
                }
                let item_headers =
                    ItemHeaders::from_map(decode_record(offset, line)?, items.len())
                        .map_err(|err| err.at_offset(offset))?;
                if let Some(limit) = cfg.max_items {
                    if items.len() >= limit {
                        return Err(EnvelopeError::TooManyItems {
                            count: items.len() + 1,
                            limit,
                        });
                    }
                }
                let declared = item_headers.length.ok_or(EnvelopeError::MalformedHeader {
                    offset,
                    reason: "item header is missing the required `length` field".into(),
                })?;
                if let Some(limit) = cfg.max_payload_bytes {
                    if declared > limit {
                        return Err(EnvelopeError::PayloadTooLarge { declared, limit });
                    }
                }
                items.push(Item::new(item_headers, PayloadRef::bytes(Vec::new())));
                state = ParseState::ExpectPayload { declared };
            }
            ParseState::ExpectPayload { declared } => {
                let offset = cursor.pos;
                let available = cursor.remaining();
                if available < declared {
                    return Err(EnvelopeError::TruncatedPayload {
                        offset,
                        expected: declared,
                        available,
                    });
                }
                let payload = cursor.take(declared).to_vec();
                cursor.eat_newline();
                // The item was pushed with a placeholder when its header was
                // accepted; fill in the real payload now.
                if let Some(item) = items.last_mut() {
                    item.payload = PayloadRef::bytes(payload);
                }
                state = ParseState::ExpectItemHeaderOrEnd;
            }
        }
    }

    Ok(Envelope { headers, items })
}

fn decode_record(offset: usize, line: &[u8]) -> Result<Map<String, Value>, EnvelopeError> {
    let value: Value =
        serde_json::from_slice(line).map_err(|err| EnvelopeError::MalformedHeader {
            offset,
            reason: format!("header line is not valid JSON: {err}"),
        })?;
    match value {
        Value::Object(map) => Ok(map),
        other => Err(EnvelopeError::MalformedHeader {
            offset,
            reason: format!("header record must be a JSON object, got {other}"),
        }),
    }
}

/// Byte-slice cursor tracking absolute offsets for error reporting.
struct Cursor<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    fn is_eof(&self) -> bool {
        self.pos >= self.buf.len()
    }

    fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    /// Consumes up to the next newline (or EOF) and returns the line without
    /// its terminator, along with the offset where it started.
    fn read_line(&mut self) -> (usize, &'a [u8]) {
        let start = self.pos;
        let rest = &self.buf[self.pos..];
        match rest.iter().position(|&b| b == b'\n') {
            Some(at) => {
                self.pos += at + 1;
                (start, &rest[..at])
            }
            None => {
                self.pos = self.buf.len();
                (start, rest)
            }
        }
    }

    /// Consumes exactly `n` bytes. Callers check `remaining()` first.
    fn take(&mut self, n: usize) -> &'a [u8] {
        let taken = &self.buf[self.pos..self.pos + n];
        self.pos += n;
        taken
    }

    /// Consumes a single payload-terminating newline, if present.
    fn eat_newline(&mut self) {
        if self.buf.get(self.pos) == Some(&b'\n') {
            self.pos += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn parse_default(buf: &[u8]) -> Result<Envelope, EnvelopeError> {
        parse(buf, &CodecConfig::default())
    }

    #[test]
    fn header_only_envelope_round_trips() {
        let envelope = Envelope::new();
        let bytes = envelope.to_vec().unwrap();
        assert_eq!(bytes, b"{}\n");
        let parsed = parse_default(&bytes).unwrap();
        assert!(parsed.items.is_empty());
    }

    #[test]
    fn header_without_trailing_newline_is_accepted() {
        let parsed = parse_default(b"{\"dsn\":\"https://ingest/1\"}").unwrap();
        assert_eq!(parsed.headers.extra["dsn"], "https://ingest/1");
        assert!(parsed.items.is_empty());
    }

    #[test]
    fn empty_input_is_malformed() {
        let res = parse_default(b"");
        assert!(matches!(
            res,
            Err(EnvelopeError::MalformedHeader { offset: 0, .. })
        ));
    }

    #[test]
    fn payload_containing_newlines_round_trips() {
        let mut envelope = Envelope::new();
        envelope.add_item(Item::new(
            ItemHeaders::new("attachment"),
            PayloadRef::bytes(b"line one\nline two\n\nline four".to_vec()),
        ));
        let bytes = envelope.to_vec().unwrap();

        let parsed = parse_default(&bytes).unwrap();
        assert_eq!(parsed.items.len(), 1);
        assert_eq!(
            parsed.items[0].payload.as_bytes().unwrap(),
            b"line one\nline two\n\nline four"
        );
    }

    #[test]
    fn serializer_overwrites_stale_lengths() {
        let mut headers = ItemHeaders::new("attachment");
        headers.length = Some(9999);
        let mut envelope = Envelope::new();
        envelope.add_item(Item::new(headers, PayloadRef::bytes(b"four".to_vec())));

        let bytes = envelope.to_vec().unwrap();
        let parsed = parse_default(&bytes).unwrap();
        assert_eq!(parsed.items[0].headers.length, Some(4));
    }

    #[test]
    fn unknown_item_types_are_forwarded_untouched() {
        let raw = b"{}\n{\"type\":\"profile_chunk\",\"length\":3,\"platform\":\"native\"}\nabc\n";
        let parsed = parse_default(raw).unwrap();
        assert_eq!(parsed.items[0].item_type(), "profile_chunk");
        assert_eq!(parsed.items[0].headers.extra["platform"], "native");
        assert_eq!(parsed.to_vec().unwrap(), raw);
    }

    #[test]
    fn truncated_payload_is_fatal() {
        let raw = b"{}\n{\"type\":\"event\",\"length\":50}\nshort";
        let res = parse_default(raw);
        assert!(matches!(
            res,
            Err(EnvelopeError::TruncatedPayload {
                expected: 50,
                available: 5,
                ..
            })
        ));
    }

    #[test]
    fn missing_length_is_malformed() {
        let raw = b"{}\n{\"type\":\"event\"}\n{}\n";
        let res = parse_default(raw);
        assert!(matches!(res, Err(EnvelopeError::MalformedHeader { .. })));
    }

    #[test]
    fn missing_item_type_is_fatal() {
        let raw = b"{}\n{\"length\":2}\nhi\n";
        let res = parse_default(raw);
        assert!(matches!(
            res,
            Err(EnvelopeError::MissingItemType { index: 0 })
        ));
    }

    #[test]
    fn malformed_item_header_reports_its_offset() {
        let raw = b"{}\nnot json at all\n";
        match parse_default(raw) {
            Err(EnvelopeError::MalformedHeader { offset, .. }) => assert_eq!(offset, 3),
            other => panic!("expected MalformedHeader, got {other:?}"),
        }
    }

    #[test]
    fn item_limit_is_enforced() {
        let raw = b"{}\n{\"type\":\"event\",\"length\":2}\nhi\n{\"type\":\"event\",\"length\":2}\nhi\n";
        let cfg = CodecConfig {
            max_items: Some(1),
            ..CodecConfig::default()
        };
        let res = Envelope::from_slice_with(raw, &cfg);
        assert!(matches!(
            res,
            Err(EnvelopeError::TooManyItems { count: 2, limit: 1 })
        ));
    }

    #[test]
    fn payload_size_limit_checked_before_reading() {
        let raw = b"{}\n{\"type\":\"attachment\",\"length\":1000000}\n";
        let cfg = CodecConfig {
            max_payload_bytes: Some(1024),
            ..CodecConfig::default()
        };
        let res = Envelope::from_slice_with(raw, &cfg);
        assert!(matches!(
            res,
            Err(EnvelopeError::PayloadTooLarge {
                declared: 1_000_000,
                limit: 1024
            })
        ));
    }

    #[test]
    fn multi_item_envelope_preserves_order() {
        let mut envelope = Envelope::new();
        envelope.add_event(json!({"message": "first"}));
        envelope.add_item(Item::from_json("measures", json!({"measurements": {}})));
        envelope.add_item(Item::new(
            ItemHeaders::new("attachment"),
            PayloadRef::bytes(vec![0, 159, 146, 150]),
        ));

        let parsed = parse_default(&envelope.to_vec().unwrap()).unwrap();
        let types: Vec<&str> = parsed.items.iter().map(Item::item_type).collect();
        assert_eq!(types, ["event", "measures", "attachment"]);
    }

    #[test]
    fn second_serialization_is_byte_identical() {
        let raw =
            b"{\"event_id\":\"9ec79c33ec9942ab8353589fcb2e04dc\"}\n{\"type\":\"event\",\"length\":25}\n{\"message\":\"hello world\"}\n";
        let parsed = parse_default(raw).unwrap();
        let first = parsed.to_vec().unwrap();
        assert_eq!(first, raw);
        let second = parse_default(&first).unwrap().to_vec().unwrap();
        assert_eq!(second, first);
    }
}
