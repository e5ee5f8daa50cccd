//! Streaming re-encoding of Chat chunks as Messages events
//!
//! Upstream chunks fragment everything: text arrives a few tokens at a time,
//! and a single tool call's id, name and argument string may each come in
//! different chunks keyed only by the call's position. The state here
//! reassembles those fragments and emits Messages lifecycle events with
//! sequentially allocated block indices.

use std::collections::BTreeMap;

use async_stream::stream;
use bytes::Bytes;
use chat_ox::{ChatCompletionChunk, FinishReason, ToolCallDelta, Usage as ChatUsage};
use futures_util::{Stream, StreamExt, stream::BoxStream};
use messages_ox::{ContentBlock, ContentBlockDelta, MessageDelta, StreamEvent, StreamMessage};
use relay_ox_common::SseLineDecoder;

use super::{
    constants::STREAM_ERROR_TYPE,
    response::{convert_usage, stop_reason},
};

/// Fragments of one upstream tool call collected so far.
#[derive(Debug, Default)]
struct ToolCallBuffer {
    id: Option<String>,
    name: Option<String>,
    /// Concatenation of every argument fragment, in arrival order.
    arguments: String,
}

impl ToolCallBuffer {
    fn absorb(&mut self, delta: &ToolCallDelta) {
        if self.id.is_none() {
            self.id = delta.id.clone().filter(|id| !id.is_empty());
        }
        if self.name.is_none() {
            self.name = delta.name().filter(|name| !name.is_empty()).map(str::to_string);
        }
        if let Some(fragment) = delta.arguments() {
            self.arguments.push_str(fragment);
        }
    }

    /// The call's id, name and parsed arguments once all three are usable.
    fn complete(&self) -> Option<(String, String, serde_json::Value)> {
        let id = self.id.as_ref()?;
        let name = self.name.as_ref()?;
        if self.arguments.trim().is_empty() {
            return None;
        }
        match serde_json::from_str(&self.arguments) {
            Ok(input) => Some((id.clone(), name.clone(), input)),
            Err(_) => {
                log::debug!(
                    "Arguments for tool call {id} incomplete after {} bytes, buffering",
                    self.arguments.len()
                );
                None
            }
        }
    }
}

/// Per-stream translation state. One instance per stream, never shared.
#[derive(Debug, Default)]
pub struct StreamState {
    /// Index of the next block to open.
    next_index: usize,
    /// Whether a text block is currently open.
    text_block_open: bool,
    /// Index of the open text block, meaningful while `text_block_open`.
    text_index: usize,
    /// Pending tool calls keyed by upstream position. A buffer is removed
    /// as soon as its call is emitted.
    tool_buffers: BTreeMap<usize, ToolCallBuffer>,
    /// Number of `tool_use` blocks emitted so far.
    emitted_tools: usize,
    finish_reason: Option<FinishReason>,
    usage: Option<ChatUsage>,
}

impl StreamState {
    pub fn new() -> Self {
        Self::default()
    }

    fn allocate_index(&mut self) -> usize {
        let index = self.next_index;
        self.next_index += 1;
        index
    }

    fn close_text_block(&mut self, events: &mut Vec<StreamEvent>) {
        if self.text_block_open {
            self.text_block_open = false;
            events.push(StreamEvent::ContentBlockStop {
                index: self.text_index,
            });
        }
    }

    /// Whether any `tool_use` block has been emitted on this stream.
    pub fn has_tool_use(&self) -> bool {
        self.emitted_tools > 0
    }

    /// Translate one upstream chunk into the events it completes.
    pub fn apply(&mut self, chunk: &ChatCompletionChunk) -> Vec<StreamEvent> {
        let mut events = Vec::new();

        if let Some(usage) = &chunk.usage {
            self.usage = Some(usage.clone());
        }

        let Some(choice) = chunk.first_choice() else {
            return events;
        };

        if let Some(text) = choice.delta.content.as_deref().filter(|text| !text.is_empty()) {
            if !self.text_block_open {
                self.text_index = self.allocate_index();
                self.text_block_open = true;
                events.push(StreamEvent::ContentBlockStart {
                    index: self.text_index,
                    content_block: ContentBlock::Text {
                        text: String::new(),
                    },
                });
            }
            events.push(StreamEvent::ContentBlockDelta {
                index: self.text_index,
                delta: ContentBlockDelta::TextDelta {
                    text: text.to_string(),
                },
            });
        }

        for delta in choice.delta.tool_calls.iter().flatten() {
            self.apply_tool_delta(delta, &mut events);
        }

        if let Some(reason) = choice.finish_reason {
            self.finish_reason = Some(reason);
            self.close_text_block(&mut events);
        }

        events
    }

    fn apply_tool_delta(&mut self, delta: &ToolCallDelta, events: &mut Vec<StreamEvent>) {
        let position = delta.index;
        let buffer = self.tool_buffers.entry(position).or_default();
        buffer.absorb(delta);
        let Some((id, name, input)) = buffer.complete() else {
            return;
        };
        self.tool_buffers.remove(&position);
        self.emitted_tools += 1;

        // lifecycles never interleave: the open text block closes first
        self.close_text_block(events);
        let index = self.allocate_index();
        events.push(StreamEvent::ContentBlockStart {
            index,
            content_block: ContentBlock::ToolUse {
                id,
                name,
                input: serde_json::Value::Object(serde_json::Map::new()),
            },
        });
        events.push(StreamEvent::ContentBlockDelta {
            index,
            delta: ContentBlockDelta::InputJsonDelta {
                partial_json: input.to_string(),
            },
        });
        events.push(StreamEvent::ContentBlockStop { index });
    }

    /// Close the stream: drop unfinished tool calls, close an open text
    /// block, then emit `message_delta` and `message_stop`.
    pub fn finish(&mut self) -> Vec<StreamEvent> {
        let mut events = Vec::new();

        for (position, buffer) in std::mem::take(&mut self.tool_buffers) {
            log::debug!(
                "Dropping tool call at position {position} (id {:?}): arguments never became valid JSON",
                buffer.id
            );
        }

        self.close_text_block(&mut events);
        events.push(StreamEvent::MessageDelta {
            delta: MessageDelta {
                stop_reason: Some(stop_reason(self.has_tool_use(), self.finish_reason)),
                stop_sequence: None,
            },
            usage: self.usage.as_ref().map(convert_usage),
        });
        events.push(StreamEvent::MessageStop);
        events
    }
}

/// Byte-level re-encoder for one upstream stream.
///
/// Wraps the line decoder and [`StreamState`]. Output depends only on the
/// byte sequence, never on how it was split across reads.
#[derive(Debug)]
pub struct StreamReencoder {
    decoder: SseLineDecoder,
    state: StreamState,
    message_id: String,
    model: String,
    started: bool,
    finished: bool,
}

impl StreamReencoder {
    pub fn new(message_id: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            decoder: SseLineDecoder::new(),
            state: StreamState::new(),
            message_id: message_id.into(),
            model: model.into(),
            started: false,
            finished: false,
        }
    }

    /// `message_start`, the first time it is called.
    pub fn start(&mut self) -> Vec<StreamEvent> {
        if self.started {
            return Vec::new();
        }
        self.started = true;
        vec![StreamEvent::MessageStart {
            message: StreamMessage::empty(self.message_id.clone(), self.model.clone()),
        }]
    }

    /// Feed one network read.
    pub fn push_bytes(&mut self, chunk: &[u8]) -> Vec<StreamEvent> {
        let mut events = self.start();
        if self.finished {
            return events;
        }
        for payload in self.decoder.push(chunk) {
            self.apply_payload(&payload, &mut events);
        }
        events
    }

    /// Whether the upstream sent its `[DONE]` sentinel.
    pub fn upstream_done(&self) -> bool {
        self.decoder.is_done()
    }

    /// Flush the trailing partial line and close the message. Only the
    /// first call emits anything.
    pub fn finish(&mut self) -> Vec<StreamEvent> {
        let mut events = self.start();
        if self.finished {
            return events;
        }
        if let Some(payload) = self.decoder.finish() {
            self.apply_payload(&payload, &mut events);
        }
        self.finished = true;
        events.extend(self.state.finish());
        events
    }

    /// Abort after an upstream read failure: close any open text block and
    /// emit an `error` event. Nothing is emitted afterwards.
    pub fn fail(&mut self, message: impl Into<String>) -> Vec<StreamEvent> {
        let mut events = self.start();
        if self.finished {
            return events;
        }
        self.finished = true;
        self.state.close_text_block(&mut events);
        events.push(StreamEvent::error(STREAM_ERROR_TYPE, message));
        events
    }

    fn apply_payload(&mut self, payload: &str, events: &mut Vec<StreamEvent>) {
        match serde_json::from_str::<ChatCompletionChunk>(payload) {
            Ok(chunk) => events.extend(self.state.apply(&chunk)),
            Err(e) => log::warn!("Skipping undecodable stream chunk: {e}; payload: {payload}"),
        }
    }
}

/// Re-encode an upstream byte stream as Messages events
///
/// Reading stops at `[DONE]` or when the upstream ends. A read error ends
/// the stream with an `error` event. The upstream is dropped on every exit
/// path, including when the consumer drops the returned stream.
pub fn reencode_stream<S, E>(
    upstream: S,
    message_id: String,
    model: String,
) -> BoxStream<'static, StreamEvent>
where
    S: Stream<Item = Result<Bytes, E>> + Send + 'static,
    E: std::fmt::Display + Send + 'static,
{
    stream! {
        let mut upstream = Box::pin(upstream);
        let mut reencoder = StreamReencoder::new(message_id, model);

        for event in reencoder.start() {
            yield event;
        }

        while let Some(read) = upstream.next().await {
            let events = match read {
                Ok(bytes) => reencoder.push_bytes(&bytes),
                Err(e) => {
                    log::error!("Upstream stream failed mid-read: {e}");
                    reencoder.fail(format!("upstream stream failed: {e}"))
                }
            };
            for event in events {
                yield event;
            }
            if reencoder.finished || reencoder.upstream_done() {
                break;
            }
        }
        drop(upstream);

        for event in reencoder.finish() {
            yield event;
        }
    }
    .boxed()
}

/// Frame events as SSE `event:`/`data:` records.
pub fn sse_frames(events: BoxStream<'static, StreamEvent>) -> BoxStream<'static, Bytes> {
    events
        .filter_map(|event| async move {
            match event.to_sse_frame() {
                Ok(frame) => Some(Bytes::from(frame)),
                Err(e) => {
                    log::warn!("Dropping {} event that failed to serialize: {e}", event.event_type());
                    None
                }
            }
        })
        .boxed()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn chunk(value: serde_json::Value) -> ChatCompletionChunk {
        serde_json::from_value(value).unwrap()
    }

    fn tool_chunk(call: serde_json::Value) -> ChatCompletionChunk {
        chunk(json!({"choices": [{"index": 0, "delta": {"tool_calls": [call]}}]}))
    }

    #[test]
    fn test_first_text_delta_opens_block_zero() {
        let mut state = StreamState::new();
        let events = state.apply(&chunk(json!({"choices": [{"delta": {"content": "Hel"}}]})));
        assert_eq!(events.len(), 2);
        assert!(matches!(
            &events[0],
            StreamEvent::ContentBlockStart { index: 0, content_block: ContentBlock::Text { text } } if text.is_empty()
        ));
        let events = state.apply(&chunk(json!({"choices": [{"delta": {"content": "lo"}}]})));
        assert_eq!(
            events,
            vec![StreamEvent::ContentBlockDelta {
                index: 0,
                delta: ContentBlockDelta::TextDelta { text: "lo".to_string() }
            }]
        );
    }

    #[test]
    fn test_empty_text_delta_opens_nothing() {
        let mut state = StreamState::new();
        let events =
            state.apply(&chunk(json!({"choices": [{"delta": {"role": "assistant", "content": ""}}]})));
        assert!(events.is_empty());
    }

    #[test]
    fn test_arguments_accumulate_until_valid() {
        let mut state = StreamState::new();
        assert!(state.apply(&tool_chunk(json!({"index": 0, "id": "call_1"}))).is_empty());
        assert!(state.apply(&tool_chunk(json!({"index": 0, "function": {"name": "f"}}))).is_empty());
        assert!(
            state
                .apply(&tool_chunk(json!({"index": 0, "function": {"arguments": "{\"a\":"}})))
                .is_empty()
        );
        let events = state.apply(&tool_chunk(json!({"index": 0, "function": {"arguments": "1}"}})));
        assert_eq!(
            events,
            vec![
                StreamEvent::ContentBlockStart {
                    index: 0,
                    content_block: ContentBlock::ToolUse {
                        id: "call_1".to_string(),
                        name: "f".to_string(),
                        input: json!({})
                    }
                },
                StreamEvent::ContentBlockDelta {
                    index: 0,
                    delta: ContentBlockDelta::InputJsonDelta {
                        partial_json: "{\"a\":1}".to_string()
                    }
                },
                StreamEvent::ContentBlockStop { index: 0 },
            ]
        );
        assert!(state.has_tool_use());
        // a stray fragment carries no id, so the emitted call cannot fire again
        assert!(state.apply(&tool_chunk(json!({"index": 0, "function": {"arguments": " "}}))).is_empty());
    }

    #[test]
    fn test_calls_reusing_a_position_each_fire() {
        let mut state = StreamState::new();
        let first = state.apply(&tool_chunk(json!({
            "index": 0, "id": "call_a", "function": {"name": "f", "arguments": "{\"q\":1}"}
        })));
        let second = state.apply(&tool_chunk(json!({
            "index": 0, "id": "call_b", "function": {"name": "g", "arguments": "{\"q\":2}"}
        })));

        let starts: Vec<(usize, String)> = first
            .iter()
            .chain(&second)
            .filter_map(|event| match event {
                StreamEvent::ContentBlockStart {
                    index,
                    content_block: ContentBlock::ToolUse { id, .. },
                } => Some((*index, id.clone())),
                _ => None,
            })
            .collect();
        assert_eq!(starts, vec![(0, "call_a".to_string()), (1, "call_b".to_string())]);

        let events = state.finish();
        assert!(matches!(
            &events[0],
            StreamEvent::MessageDelta { delta: MessageDelta { stop_reason: Some(messages_ox::StopReason::ToolUse), .. }, .. }
        ));
    }

    #[test]
    fn test_tool_after_text_closes_text_and_takes_next_index() {
        let mut state = StreamState::new();
        state.apply(&chunk(json!({"choices": [{"delta": {"content": "Let me check."}}]})));
        let events = state.apply(&tool_chunk(json!({
            "index": 0, "id": "call_1", "type": "function",
            "function": {"name": "lookup", "arguments": "{}"}
        })));
        let shape: Vec<(&str, Option<usize>)> =
            events.iter().map(|e| (e.event_type(), e.index())).collect();
        assert_eq!(
            shape,
            vec![
                ("content_block_stop", Some(0)),
                ("content_block_start", Some(1)),
                ("content_block_delta", Some(1)),
                ("content_block_stop", Some(1)),
            ]
        );
        // the finish signal has no text block left to close
        let events = state.apply(&chunk(json!({"choices": [{"delta": {}, "finish_reason": "tool_calls"}]})));
        assert!(events.is_empty());
    }

    #[test]
    fn test_text_after_tool_opens_new_block() {
        let mut state = StreamState::new();
        state.apply(&tool_chunk(json!({
            "index": 0, "id": "call_1", "function": {"name": "a", "arguments": "{}"}
        })));
        let events = state.apply(&chunk(json!({"choices": [{"delta": {"content": "done"}}]})));
        assert_eq!(events[0].event_type(), "content_block_start");
        assert_eq!(events[0].index(), Some(1));
    }

    #[test]
    fn test_finish_closes_text_once() {
        let mut state = StreamState::new();
        state.apply(&chunk(json!({"choices": [{"delta": {"content": "Hi"}}]})));
        let events = state.apply(&chunk(json!({"choices": [{"delta": {}, "finish_reason": "length"}]})));
        assert_eq!(events, vec![StreamEvent::ContentBlockStop { index: 0 }]);
        let events = state.finish();
        assert_eq!(events.len(), 2);
        assert!(matches!(
            &events[0],
            StreamEvent::MessageDelta { delta: MessageDelta { stop_reason: Some(messages_ox::StopReason::MaxTokens), .. }, usage: None }
        ));
        assert_eq!(events[1], StreamEvent::MessageStop);
    }

    #[test]
    fn test_safety_net_close_and_usage() {
        let mut state = StreamState::new();
        state.apply(&chunk(json!({"choices": [{"delta": {"content": "Hi"}}]})));
        state.apply(&chunk(json!({"choices": [], "usage": {"prompt_tokens": 9, "completion_tokens": 1}})));
        let events = state.finish();
        assert_eq!(events[0], StreamEvent::ContentBlockStop { index: 0 });
        assert!(matches!(
            &events[1],
            StreamEvent::MessageDelta {
                delta: MessageDelta { stop_reason: Some(messages_ox::StopReason::EndTurn), .. },
                usage: Some(messages_ox::Usage { input_tokens: Some(9), output_tokens: Some(1) })
            }
        ));
    }

    #[test]
    fn test_never_valid_arguments_are_dropped() {
        let mut state = StreamState::new();
        state.apply(&tool_chunk(json!({
            "index": 0, "id": "call_1", "function": {"name": "f", "arguments": "{\"a\": tru"}
        })));
        let events = state.finish();
        let types: Vec<&str> = events.iter().map(StreamEvent::event_type).collect();
        assert_eq!(types, vec!["message_delta", "message_stop"]);
        assert!(matches!(
            &events[0],
            StreamEvent::MessageDelta { delta: MessageDelta { stop_reason: Some(messages_ox::StopReason::EndTurn), .. }, .. }
        ));
    }

    #[test]
    fn test_reencoder_skips_bad_chunks_and_flushes_tail() {
        let mut reencoder = StreamReencoder::new("msg_test", "gpt-4o");
        let mut events = reencoder.push_bytes(b"data: {not json}\n\ndata: {\"choices\":[{\"delta\":{\"content\":\"ok\"}}]}");
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event_type(), "message_start");
        events.extend(reencoder.finish());
        let types: Vec<&str> = events.iter().map(StreamEvent::event_type).collect();
        assert_eq!(
            types,
            vec![
                "message_start",
                "content_block_start",
                "content_block_delta",
                "content_block_stop",
                "message_delta",
                "message_stop"
            ]
        );
        assert!(reencoder.finish().is_empty());
    }

    #[test]
    fn test_fail_closes_text_and_emits_error() {
        let mut reencoder = StreamReencoder::new("msg_test", "gpt-4o");
        reencoder.push_bytes(b"data: {\"choices\":[{\"delta\":{\"content\":\"par\"}}]}\n");
        let events = reencoder.fail("connection reset");
        assert_eq!(events[0], StreamEvent::ContentBlockStop { index: 0 });
        assert_eq!(events[1], StreamEvent::error("api_error", "connection reset"));
        assert!(reencoder.finish().is_empty());
    }
}
