// Tests for streaming-URL derivation

use callshield::transport::stream_url;

#[test]
fn test_https_becomes_wss_with_query() {
    let url = stream_url(
        "https://antiphishing.example.com/api/transcribe/ws",
        16000,
        Some("ko-KR"),
    )
    .unwrap();

    assert_eq!(
        url,
        "wss://antiphishing.example.com/api/transcribe/ws?sr=16000&lang=ko-KR"
    );
}

#[test]
fn test_http_becomes_ws_without_language() {
    let url = stream_url("http://localhost:8000/transcribe/ws", 16000, None).unwrap();
    assert_eq!(url, "ws://localhost:8000/transcribe/ws?sr=16000");
}

#[test]
fn test_ws_scheme_passes_through() {
    let url = stream_url("wss://host/ws", 8000, None).unwrap();
    assert_eq!(url, "wss://host/ws?sr=8000");
}

#[test]
fn test_appends_to_existing_query() {
    let url = stream_url("https://host/ws?token=abc", 16000, None).unwrap();
    assert_eq!(url, "wss://host/ws?token=abc&sr=16000");
}

#[test]
fn test_unknown_scheme_is_rejected() {
    assert!(stream_url("ftp://host/ws", 16000, None).is_err());
    assert!(stream_url("host/ws", 16000, None).is_err());
}
