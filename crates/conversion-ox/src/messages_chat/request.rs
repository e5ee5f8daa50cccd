//! Validation and translation of inbound Messages requests.

use chat_ox::{ChatMessage, ChatRequest, Tool as ChatTool, ToolChoice as ChatToolChoice, ToolChoiceMode};
use messages_ox::{MessagesRequest, Tool, ToolChoice, ToolChoiceMode as MessagesToolChoiceMode};
use serde_json::Value;

use super::{content::message_to_chat, schema::clean_schema};
use crate::ConversionError;

/// Block kinds a message may carry.
const CONTENT_BLOCK_TYPES: [&str; 4] = ["text", "image", "tool_use", "tool_result"];

fn invalid(message: impl Into<String>) -> ConversionError {
    ConversionError::InvalidRequest(message.into())
}

/// Validate a raw Messages request body before any decoding
///
/// Checks that `model` is a non-empty string, `max_tokens` is a positive
/// integer, and `messages` is a non-empty array whose entries have a `user`
/// or `assistant` role, non-null content, and only known block kinds.
pub fn validate_messages_request(body: &Value) -> Result<(), ConversionError> {
    let obj = body
        .as_object()
        .ok_or_else(|| invalid("request body must be a JSON object"))?;

    match obj.get("model").and_then(Value::as_str) {
        Some(model) if !model.trim().is_empty() => {}
        _ => return Err(invalid("model is required and must be a non-empty string")),
    }

    match obj.get("max_tokens").and_then(Value::as_u64) {
        Some(tokens) if tokens > 0 && u32::try_from(tokens).is_ok() => {}
        _ => return Err(invalid("max_tokens is required and must be a positive integer")),
    }

    let messages = match obj.get("messages").and_then(Value::as_array) {
        Some(messages) if !messages.is_empty() => messages,
        _ => return Err(invalid("messages is required and must be a non-empty array")),
    };

    for (i, message) in messages.iter().enumerate() {
        match message.get("role").and_then(Value::as_str) {
            Some("user" | "assistant") => {}
            Some(role) => {
                return Err(invalid(format!(
                    "messages[{i}].role must be \"user\" or \"assistant\", got \"{role}\""
                )));
            }
            None => return Err(invalid(format!("messages[{i}].role is required"))),
        }

        match message.get("content") {
            None | Some(Value::Null) => {
                return Err(invalid(format!("messages[{i}].content is required")));
            }
            Some(Value::Array(blocks)) => validate_blocks(i, blocks)?,
            Some(_) => {}
        }
    }

    Ok(())
}

fn validate_blocks(message_index: usize, blocks: &[Value]) -> Result<(), ConversionError> {
    for (j, block) in blocks.iter().enumerate() {
        let kind = block.get("type").and_then(Value::as_str).ok_or_else(|| {
            invalid(format!("messages[{message_index}].content[{j}].type is required"))
        })?;
        if !CONTENT_BLOCK_TYPES.contains(&kind) {
            return Err(invalid(format!(
                "messages[{message_index}].content[{j}] has unsupported block type \"{kind}\""
            )));
        }
    }
    Ok(())
}

/// Validate then decode a raw Messages request body.
pub fn parse_messages_request(body: Value) -> Result<MessagesRequest, ConversionError> {
    validate_messages_request(&body)?;
    serde_json::from_value(body).map_err(|e| invalid(format!("malformed request: {e}")))
}

/// Convert a Messages request into a Chat request
///
/// The system prompt, flattened to its text blocks, is prepended as a
/// `system` message when it is not blank. Tools get their schemas cleaned
/// and the tool choice is only carried when tools are present. Sampling
/// parameters are copied under their Chat names; absent ones stay absent.
pub fn messages_to_chat_request(request: MessagesRequest) -> Result<ChatRequest, ConversionError> {
    let mut messages = Vec::with_capacity(request.messages.len() + 1);

    if let Some(system) = &request.system {
        let text = system.flatten_text();
        if !text.trim().is_empty() {
            messages.push(ChatMessage::system(text));
        }
    }

    for message in request.messages {
        messages.extend(message_to_chat(message)?);
    }

    if messages.is_empty() {
        return Err(invalid("no messages left after conversion"));
    }

    let tools: Vec<ChatTool> = request
        .tools
        .iter()
        .flatten()
        .map(convert_tool)
        .collect();
    let tool_choice = if tools.is_empty() {
        None
    } else {
        request.tool_choice.as_ref().map(convert_tool_choice)
    };

    Ok(ChatRequest::builder()
        .model(request.model)
        .messages(messages)
        .tools(tools)
        .max_tokens(request.max_tokens)
        .maybe_temperature(request.temperature)
        .maybe_top_p(request.top_p)
        .maybe_stop(request.stop_sequences)
        .maybe_stream(request.stream)
        .maybe_tool_choice(tool_choice)
        .build())
}

fn convert_tool(tool: &Tool) -> ChatTool {
    ChatTool::function(
        tool.name.clone(),
        tool.description.clone(),
        clean_schema(&tool.input_schema),
    )
}

/// `any` has no Chat counterpart and degrades to `auto`.
fn convert_tool_choice(choice: &ToolChoice) -> ChatToolChoice {
    if let Some(name) = choice.tool_name() {
        return ChatToolChoice::function(name);
    }
    match choice.mode() {
        Some(MessagesToolChoiceMode::None) => ToolChoiceMode::None.into(),
        Some(MessagesToolChoiceMode::Auto | MessagesToolChoiceMode::Any) | None => {
            ToolChoiceMode::Auto.into()
        }
    }
}
