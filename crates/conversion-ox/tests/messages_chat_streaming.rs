use std::collections::BTreeMap;

use bytes::Bytes;
use conversion_ox::{StreamReencoder, reencode_stream, sse_frames};
use futures_util::{StreamExt, stream};
use messages_ox::{ContentBlock, ContentBlockDelta, StopReason, StreamEvent};
use serde_json::json;

/// A realistic upstream body: text, two tool calls whose id, name and
/// argument fragments arrive separately, usage, then `[DONE]`.
fn upstream_body() -> String {
    let chunks = [
        json!({"id": "c", "choices": [{"index": 0, "delta": {"role": "assistant", "content": ""}}]}),
        json!({"id": "c", "choices": [{"index": 0, "delta": {"content": "Checking the "}}]}),
        json!({"id": "c", "choices": [{"index": 0, "delta": {"content": "weather ☀️ now."}}]}),
        json!({"id": "c", "choices": [{"index": 0, "delta": {"tool_calls": [
            {"index": 0, "id": "call_oslo", "type": "function", "function": {"name": "get_weather", "arguments": ""}}
        ]}}]}),
        json!({"id": "c", "choices": [{"index": 0, "delta": {"tool_calls": [
            {"index": 0, "function": {"arguments": "{\"city\":"}},
            {"index": 1, "id": "call_bergen"}
        ]}}]}),
        json!({"id": "c", "choices": [{"index": 0, "delta": {"tool_calls": [
            {"index": 1, "function": {"name": "get_weather", "arguments": "{\"city\":\"Bergen\"}"}}
        ]}}]}),
        json!({"id": "c", "choices": [{"index": 0, "delta": {"tool_calls": [
            {"index": 0, "function": {"arguments": "\"Oslo\"}"}}
        ]}}]}),
        json!({"id": "c", "choices": [{"index": 0, "delta": {}, "finish_reason": "tool_calls"}]}),
        json!({"id": "c", "choices": [], "usage": {"prompt_tokens": 40, "completion_tokens": 18, "total_tokens": 58}}),
    ];
    let mut body = String::from(": upstream keep-alive\n\n");
    for chunk in chunks {
        body.push_str(&format!("data: {chunk}\r\n\r\n"));
    }
    body.push_str("data: [DONE]\n\n");
    body
}

fn reencode_in_pieces(body: &[u8], cuts: &[usize]) -> Vec<StreamEvent> {
    let mut reencoder = StreamReencoder::new("msg_fixed", "gpt-4o");
    let mut events = reencoder.start();
    let mut last = 0;
    for &cut in cuts {
        events.extend(reencoder.push_bytes(&body[last..cut]));
        last = cut;
    }
    events.extend(reencoder.push_bytes(&body[last..]));
    events.extend(reencoder.finish());
    events
}

/// Every block index sees start, deltas, stop, and never overlaps another.
fn assert_block_lifecycles(events: &[StreamEvent]) {
    let mut open: Option<usize> = None;
    let mut seen: BTreeMap<usize, (usize, usize)> = BTreeMap::new();
    for event in events {
        match event {
            StreamEvent::ContentBlockStart { index, .. } => {
                assert!(open.is_none(), "block {index} started while {open:?} open");
                assert!(!seen.contains_key(index), "block {index} started twice");
                seen.insert(*index, (1, 0));
                open = Some(*index);
            }
            StreamEvent::ContentBlockDelta { index, .. } => {
                assert_eq!(open, Some(*index), "delta for block {index} outside its lifecycle");
            }
            StreamEvent::ContentBlockStop { index } => {
                assert_eq!(open, Some(*index), "stop for block {index} that is not open");
                if let Some(counts) = seen.get_mut(index) {
                    counts.1 += 1;
                }
                open = None;
            }
            _ => {}
        }
    }
    assert!(open.is_none(), "block {open:?} never stopped");
    assert!(seen.values().all(|&(starts, stops)| starts == 1 && stops == 1));
}

#[test]
fn test_expected_event_sequence() {
    let body = upstream_body();
    let events = reencode_in_pieces(body.as_bytes(), &[]);
    let shape: Vec<(&str, Option<usize>)> =
        events.iter().map(|e| (e.event_type(), e.index())).collect();
    assert_eq!(
        shape,
        vec![
            ("message_start", None),
            ("content_block_start", Some(0)),
            ("content_block_delta", Some(0)),
            ("content_block_delta", Some(0)),
            ("content_block_stop", Some(0)),
            ("content_block_start", Some(1)),
            ("content_block_delta", Some(1)),
            ("content_block_stop", Some(1)),
            ("content_block_start", Some(2)),
            ("content_block_delta", Some(2)),
            ("content_block_stop", Some(2)),
            ("message_delta", None),
            ("message_stop", None),
        ]
    );

    // position 1 completes first, so it takes the first tool index
    assert!(matches!(
        &events[5],
        StreamEvent::ContentBlockStart { content_block: ContentBlock::ToolUse { id, .. }, .. } if id == "call_bergen"
    ));
    match &events[9] {
        StreamEvent::ContentBlockDelta {
            delta: ContentBlockDelta::InputJsonDelta { partial_json },
            ..
        } => {
            let input: serde_json::Value = serde_json::from_str(partial_json).unwrap();
            assert_eq!(input, json!({"city": "Oslo"}));
        }
        other => panic!("expected input_json_delta, got {other:?}"),
    }
    match &events[11] {
        StreamEvent::MessageDelta { delta, usage } => {
            assert_eq!(delta.stop_reason, Some(StopReason::ToolUse));
            let usage = usage.as_ref().unwrap();
            assert_eq!(usage.input_tokens, Some(40));
            assert_eq!(usage.output_tokens, Some(18));
        }
        other => panic!("expected message_delta, got {other:?}"),
    }
    assert_block_lifecycles(&events);
}

#[test]
fn test_output_independent_of_chunk_boundaries() {
    let body = upstream_body();
    let bytes = body.as_bytes();
    let reference = reencode_in_pieces(bytes, &[]);

    // every single split point, including ones inside multi-byte characters
    for cut in 1..bytes.len() {
        assert_eq!(reencode_in_pieces(bytes, &[cut]), reference, "split at {cut}");
    }

    // byte-at-a-time delivery
    let every_byte: Vec<usize> = (1..bytes.len()).collect();
    assert_eq!(reencode_in_pieces(bytes, &every_byte), reference);

    // a few irregular multi-way splits
    for step in [3, 7, 64, 129] {
        let cuts: Vec<usize> = (step..bytes.len()).step_by(step).collect();
        assert_eq!(reencode_in_pieces(bytes, &cuts), reference, "step {step}");
    }
}

#[test]
fn test_text_only_stream_without_finish_or_done() {
    let body = "data: {\"choices\":[{\"delta\":{\"content\":\"Hello\"}}]}\n\ndata: {\"choices\":[{\"delta\":{\"content\":\" world\"}}]}";
    let events = reencode_in_pieces(body.as_bytes(), &[10]);
    let types: Vec<&str> = events.iter().map(StreamEvent::event_type).collect();
    assert_eq!(
        types,
        vec![
            "message_start",
            "content_block_start",
            "content_block_delta",
            "content_block_delta",
            "content_block_stop",
            "message_delta",
            "message_stop"
        ]
    );
    assert_block_lifecycles(&events);
}

#[tokio::test]
async fn test_reencode_stream_over_byte_stream() {
    let body = upstream_body().into_bytes();
    let pieces: Vec<Result<Bytes, std::io::Error>> = body
        .chunks(37)
        .map(|piece| Ok(Bytes::copy_from_slice(piece)))
        .collect();

    let events: Vec<StreamEvent> = reencode_stream(
        stream::iter(pieces),
        "msg_fixed".to_string(),
        "gpt-4o".to_string(),
    )
    .collect()
    .await;

    assert_eq!(events, reencode_in_pieces(&body, &[]));
}

#[tokio::test]
async fn test_mid_stream_failure_emits_error_and_ends() {
    let pieces: Vec<Result<Bytes, std::io::Error>> = vec![
        Ok(Bytes::from_static(b"data: {\"choices\":[{\"delta\":{\"content\":\"Hi\"}}]}\n")),
        Err(std::io::Error::new(std::io::ErrorKind::ConnectionReset, "reset by peer")),
        Ok(Bytes::from_static(b"data: {\"choices\":[{\"delta\":{\"content\":\"never\"}}]}\n")),
    ];
    let events: Vec<StreamEvent> =
        reencode_stream(stream::iter(pieces), "msg_x".to_string(), "m".to_string())
            .collect()
            .await;
    let types: Vec<&str> = events.iter().map(StreamEvent::event_type).collect();
    assert_eq!(
        types,
        vec![
            "message_start",
            "content_block_start",
            "content_block_delta",
            "content_block_stop",
            "error"
        ]
    );
    match events.last() {
        Some(StreamEvent::Error { error }) => {
            assert_eq!(error.r#type, "api_error");
            assert!(error.message.contains("reset by peer"));
        }
        other => panic!("expected error event, got {other:?}"),
    }
}

#[tokio::test]
async fn test_sse_frames_layout() {
    let pieces: Vec<Result<Bytes, std::io::Error>> =
        vec![Ok(Bytes::from_static(b"data: [DONE]\n"))];
    let frames: Vec<Bytes> = sse_frames(reencode_stream(
        stream::iter(pieces),
        "msg_empty".to_string(),
        "gpt-4o".to_string(),
    ))
    .collect()
    .await;

    assert_eq!(frames.len(), 3);
    let first = std::str::from_utf8(&frames[0]).unwrap();
    assert!(first.starts_with("event: message_start\ndata: {"));
    assert!(first.ends_with("}\n\n"));
    assert!(first.contains("\"id\":\"msg_empty\""));
    let last = std::str::from_utf8(&frames[2]).unwrap();
    assert_eq!(last, "event: message_stop\ndata: {\"type\":\"message_stop\"}\n\n");
}
