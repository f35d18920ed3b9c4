//! Round-trip and length-honesty tests over the wire codec.

use chrono::{TimeZone, Utc};
use serde_json::json;
use tern::{Envelope, EnvelopeHeaders, Item, ItemHeaders, PayloadRef};
use uuid::Uuid;

fn assemble_envelope() -> Envelope {
    let mut headers = EnvelopeHeaders::default();
    headers.event_id = Some(Uuid::parse_str("d2132d31b39445f1938d7e21b6bf0ec4").unwrap());
    headers.sent_at = Some(Utc.with_ymd_and_hms(2020, 8, 21, 2, 19, 52).unwrap());
    headers
        .extra
        .insert("dsn".into(), "https://key@ingest.example.com/42".into());

    let mut envelope = Envelope::with_headers(headers);
    envelope.add_event(json!({"message": "Hello, World!"}));

    let mut attachment = ItemHeaders::new("attachment");
    attachment.content_type = Some("application/octet-stream".into());
    attachment.filename = Some("core.dmp".into());
    envelope.add_item(Item::new(
        attachment,
        PayloadRef::bytes(b"binary\nwith\nnewlines\x00\xff".to_vec()),
    ));
    envelope
}

#[test]
fn parse_of_serialize_reproduces_the_envelope() {
    let original = assemble_envelope();
    let bytes = original.to_vec().unwrap();
    let parsed = Envelope::from_slice(&bytes).unwrap();

    assert_eq!(parsed.headers, original.headers);
    assert_eq!(parsed.items.len(), original.items.len());
    for (parsed_item, original_item) in parsed.items.iter().zip(&original.items) {
        assert_eq!(parsed_item.item_type(), original_item.item_type());
        assert_eq!(
            parsed_item.payload.as_bytes().unwrap(),
            original_item.payload.as_bytes().unwrap()
        );
    }
}

#[test]
fn serialized_lengths_match_payload_blocks_exactly() {
    let bytes = assemble_envelope().to_vec().unwrap();
    let parsed = Envelope::from_slice(&bytes).unwrap();

    for item in &parsed.items {
        let declared = item.headers.length.expect("parser requires a length");
        assert_eq!(declared, item.payload.as_bytes().unwrap().len());
    }
}

#[test]
fn reserializing_a_parsed_envelope_is_byte_identical() {
    let bytes = assemble_envelope().to_vec().unwrap();
    let reserialized = Envelope::from_slice(&bytes).unwrap().to_vec().unwrap();
    assert_eq!(reserialized, bytes);
}

#[test]
fn event_id_and_sent_at_use_the_wire_forms() {
    let bytes = assemble_envelope().to_vec().unwrap();
    let header_line = bytes.split(|&b| b == b'\n').next().unwrap();
    let header: serde_json::Value = serde_json::from_slice(header_line).unwrap();

    assert_eq!(header["event_id"], "d2132d31b39445f1938d7e21b6bf0ec4");
    assert_eq!(header["sent_at"], "2020-08-21T02:19:52.000000Z");
}

#[test]
fn unknown_item_types_and_headers_survive_a_round_trip() {
    let raw = concat!(
        "{\"event_id\":\"9ec79c33ec9942ab8353589fcb2e04dc\",\"trace\":{\"trace_id\":\"ab\"}}\n",
        "{\"type\":\"replay_recording\",\"length\":11,\"segment_id\":4}\n",
        "not-json-at\n",
    )
    .as_bytes();

    let parsed = Envelope::from_slice(raw).unwrap();
    assert_eq!(parsed.items[0].item_type(), "replay_recording");
    assert_eq!(parsed.items[0].headers.extra["segment_id"], 4);
    assert_eq!(parsed.to_vec().unwrap(), raw);
}

#[test]
fn header_only_envelope_round_trips() {
    let envelope = Envelope::new();
    let bytes = envelope.to_vec().unwrap();
    let parsed = Envelope::from_slice(&bytes).unwrap();
    assert!(parsed.items.is_empty());
    assert_eq!(parsed.headers, EnvelopeHeaders::default());
}

#[test]
fn file_backed_payload_serializes_like_its_bytes() {
    use std::io::Write;

    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(b"file payload\nsecond line").unwrap();

    let mut envelope = Envelope::new();
    envelope.add_item(Item::new(
        ItemHeaders::new("attachment"),
        PayloadRef::file(file.path()),
    ));

    let bytes = envelope.to_vec().unwrap();
    let parsed = Envelope::from_slice(&bytes).unwrap();
    assert_eq!(
        parsed.items[0].payload.as_bytes().unwrap(),
        b"file payload\nsecond line"
    );
    assert_eq!(parsed.items[0].headers.length, Some(24));
}
