//! Tests for payload codecs.

use super::*;
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::BTreeMap;

#[derive(Debug, PartialEq, Serialize, Deserialize)]
struct Order {
    id: u64,
    tags: Vec<String>,
    notes: Option<String>,
    lines: BTreeMap<String, f64>,
}

fn sample_order() -> Order {
    let mut lines = BTreeMap::new();
    lines.insert("widget".to_string(), 2.5);
    lines.insert("gadget".to_string(), 1.0);
    Order {
        id: 42,
        tags: vec!["a".to_string(), "b".to_string()],
        notes: None,
        lines,
    }
}

#[test]
fn test_json_codec_preserves_nested_values() {
    let codec = JsonCodec;
    let payload = json!({
        "id": 42,
        "tags": ["a", "b"],
        "nested": { "deep": [1, {"x": null}], "flag": true },
        "text": "line\nbreak \"quoted\" <xml> & ünïcode"
    });

    let body = codec.encode(&payload).unwrap();
    let decoded: Value = codec.decode(&body).unwrap();
    assert_eq!(decoded, payload);
}

#[test]
fn test_json_codec_typed_payload() {
    let codec = JsonCodec;
    let body = codec.encode(&sample_order()).unwrap();
    let decoded: Order = codec.decode(&body).unwrap();
    assert_eq!(decoded, sample_order());
}

#[test]
fn test_json_codec_rejects_garbage() {
    let codec = JsonCodec;
    let result: Result<Value, _> = codec.decode("{not json");
    assert!(matches!(result, Err(SerializationError::Json(_))));
}

#[test]
fn test_base64_codec_body_is_plain_ascii() {
    let codec = Base64Codec::new(JsonCodec);
    let body = codec.encode(&json!({"text": "ünïcode \u{1}"})).unwrap();
    assert!(body
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '+' || c == '/' || c == '='));

    let decoded: Value = codec.decode(&body).unwrap();
    assert_eq!(decoded, json!({"text": "ünïcode \u{1}"}));
}

#[test]
fn test_base64_codec_rejects_invalid_input() {
    let codec = Base64Codec::<JsonCodec>::default();
    let result: Result<Value, _> = codec.decode("***");
    assert!(matches!(result, Err(SerializationError::Base64(_))));

    let not_utf8 = STANDARD.encode([0xff, 0xfe, 0xfd]);
    let result: Result<Value, _> = codec.decode(&not_utf8);
    assert!(matches!(result, Err(SerializationError::InvalidUtf8)));
}
