// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Protocol unit tests

use super::*;

#[test]
fn query_request_wire_format() {
    let request = Request::Query {
        code: ErrorCode(111),
        from: NaiveDate::from_ymd_opt(2026, 10, 1),
        to: None,
    };

    let encoded = encode(&request).expect("encode failed");
    let json: serde_json::Value = serde_json::from_slice(&encoded).expect("valid JSON");
    assert_eq!(json["type"], "Query");
    assert_eq!(json["code"], 111);
    assert_eq!(json["from"], "2026-10-01");
    assert!(json.get("to").is_none());

    let decoded: Request = decode(&encoded).expect("decode failed");
    assert_eq!(request, decoded);
}

#[test]
fn query_bounds_are_optional_on_the_wire() {
    let decoded: Request = decode(br#"{"type":"Query","code":999}"#).expect("decode failed");
    assert_eq!(
        decoded,
        Request::Query {
            code: ErrorCode(999),
            from: None,
            to: None,
        }
    );
}

#[test]
fn raise_and_flush_decode_from_plain_json() {
    let raise: Request = decode(br#"{"type":"Raise","code":222}"#).expect("decode failed");
    assert_eq!(raise, Request::Raise { code: ErrorCode(222) });

    let flush: Request = decode(br#"{"type":"Flush"}"#).expect("decode failed");
    assert_eq!(flush, Request::Flush);
}

#[test]
fn unknown_request_type_is_rejected() {
    let result = decode::<Request>(br#"{"type":"Truncate"}"#);
    assert!(matches!(result, Err(ProtocolError::Json(_))));
}

#[test]
fn errors_response_lists_entries() {
    let response = Response::Errors {
        entries: vec![ErrorEntry {
            code: ErrorCode(49),
            name: "LOGICAL_ERROR".to_string(),
            total: 3,
            last_flushed: 2,
        }],
    };

    let encoded = encode(&response).expect("encode failed");
    let decoded: Response = decode(&encoded).expect("decode failed");
    assert_eq!(response, decoded);
}

#[tokio::test]
async fn read_write_message_roundtrip() {
    let original = b"hello world";

    let mut buffer = Vec::new();
    write_message(&mut buffer, original)
        .await
        .expect("write failed");

    // write_message adds 4-byte length prefix
    assert_eq!(buffer.len(), 4 + original.len());
    let len = u32::from_be_bytes([buffer[0], buffer[1], buffer[2], buffer[3]]) as usize;
    assert_eq!(len, original.len());

    let mut cursor = std::io::Cursor::new(buffer);
    let read_back = read_message(&mut cursor).await.expect("read failed");
    assert_eq!(read_back, original);
}

#[tokio::test]
async fn read_message_on_empty_stream_is_connection_closed() {
    let mut cursor = std::io::Cursor::new(Vec::<u8>::new());
    let result = read_message(&mut cursor).await;
    assert!(matches!(result, Err(ProtocolError::ConnectionClosed)));
}

#[tokio::test]
async fn oversized_length_prefix_is_rejected() {
    let mut buffer = ((MAX_MESSAGE_SIZE + 1) as u32).to_be_bytes().to_vec();
    buffer.extend_from_slice(b"{}");

    let mut cursor = std::io::Cursor::new(buffer);
    let result = read_message(&mut cursor).await;
    assert!(matches!(result, Err(ProtocolError::MessageTooLarge(_))));
}

#[tokio::test]
async fn request_and_response_over_a_duplex_stream() {
    let (mut client, mut server) = tokio::io::duplex(1024);

    let request = Request::Raise { code: ErrorCode(333) };
    write_message(&mut client, &encode(&request).expect("encode failed"))
        .await
        .expect("write failed");
    let received = read_request(&mut server, DEFAULT_TIMEOUT)
        .await
        .expect("read failed");
    assert_eq!(received, request);

    write_response(&mut server, &Response::Ok, DEFAULT_TIMEOUT)
        .await
        .expect("write failed");
    let reply: Response = decode(&read_message(&mut client).await.expect("read failed"))
        .expect("decode failed");
    assert_eq!(reply, Response::Ok);
}

#[tokio::test]
async fn read_request_times_out_on_silent_client() {
    let (_client, mut server) = tokio::io::duplex(64);
    let result = read_request(&mut server, Duration::from_millis(20)).await;
    assert!(matches!(result, Err(ProtocolError::Timeout)));
}
