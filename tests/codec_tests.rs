// Decoding tests for the backend's tagged message protocol
//
// The codec must round every well-formed payload into a typed message with
// field presence matching the input, and must reject malformed payloads
// with an error rather than a panic.

use callshield::protocol::{decode, MessageKind};

#[test]
fn test_decode_partial_transcript() {
    let msg = decode(r#"{"kind":"partial","t":2.5,"text":"안녕하"}"#).unwrap();

    assert_eq!(msg.kind, MessageKind::Partial);
    assert_eq!(msg.timestamp, 2.5);
    assert_eq!(msg.text.as_deref(), Some("안녕하"));
    assert!(msg.immediate.is_none());
    assert!(msg.comprehensive.is_none());
}

#[test]
fn test_decode_final_transcript() {
    let msg = decode(r#"{"kind":"final","t":7.25,"text":"계좌 번호를 알려주세요"}"#).unwrap();

    assert_eq!(msg.kind, MessageKind::Final);
    assert_eq!(msg.text.as_deref(), Some("계좌 번호를 알려주세요"));
}

#[test]
fn test_decode_risk_with_both_blocks() {
    let json = r#"{
        "kind": "risk",
        "t": 12.0,
        "immediate": {
            "level": 2,
            "probability": 0.71,
            "phishing_type": "impersonation",
            "keywords": ["계좌", "검찰"],
            "method": "keyword"
        },
        "comprehensive": {
            "is_phishing": true,
            "confidence": 0.88,
            "method": "lm",
            "analyzed_length": 412
        }
    }"#;

    let msg = decode(json).unwrap();

    assert_eq!(msg.kind, MessageKind::Risk);
    let immediate = msg.immediate.expect("immediate block present");
    assert_eq!(immediate.level, 2);
    assert_eq!(immediate.probability, 0.71);
    assert_eq!(immediate.phishing_type.as_deref(), Some("impersonation"));
    assert_eq!(immediate.keywords.as_deref(), Some(&["계좌".to_string(), "검찰".to_string()][..]));
    assert_eq!(immediate.method.as_deref(), Some("keyword"));

    let comprehensive = msg.comprehensive.expect("comprehensive block present");
    assert!(comprehensive.is_phishing);
    assert_eq!(comprehensive.confidence, 0.88);
    assert_eq!(comprehensive.method.as_deref(), Some("lm"));
    assert_eq!(comprehensive.analyzed_length, Some(412));
}

#[test]
fn test_decode_state_without_payload() {
    let msg = decode(r#"{"kind":"state","t":0.0}"#).unwrap();

    assert_eq!(msg.kind, MessageKind::State);
    assert!(msg.text.is_none());
    assert!(msg.immediate.is_none());
    assert!(msg.comprehensive.is_none());
}

#[test]
fn test_absent_optional_fields_stay_absent() {
    // Absent fields must decode to "no value", never to a zero default
    let msg = decode(r#"{"kind":"risk","t":1.0,"immediate":{"level":1,"probability":0.2}}"#).unwrap();

    let immediate = msg.immediate.unwrap();
    assert!(immediate.phishing_type.is_none());
    assert!(immediate.keywords.is_none());
    assert!(immediate.method.is_none());
    assert!(msg.comprehensive.is_none());
    assert!(msg.text.is_none());
}

#[test]
fn test_unrecognized_kind_is_tolerated() {
    let msg = decode(r#"{"kind":"metrics","t":3.0}"#).unwrap();
    assert_eq!(msg.kind, MessageKind::Unknown);
}

#[test]
fn test_unknown_extra_fields_are_ignored() {
    let msg = decode(r#"{"kind":"final","t":9.9,"text":"done","debug_id":"x1","rev":7}"#).unwrap();
    assert_eq!(msg.kind, MessageKind::Final);
    assert_eq!(msg.text.as_deref(), Some("done"));
}

#[test]
fn test_missing_kind_is_an_error() {
    assert!(decode(r#"{"t":1.0,"text":"hello"}"#).is_err());
}

#[test]
fn test_malformed_payloads_error_without_panicking() {
    for payload in [
        "",
        "pong",
        "{",
        r#"{"kind":"risk","#,
        r#"[1,2,3]"#,
        r#"{"kind":42,"t":1.0}"#,
        r#"{"kind":"risk","t":"soon"}"#,
    ] {
        assert!(decode(payload).is_err(), "payload should not decode: {payload:?}");
    }
}
