use chat_ox::{ChatResponse, FinishReason, Usage as ChatUsage};
use messages_ox::{Content, MessagesResponse, Role, StopReason, ToolUse, Usage};

use super::constants::{MESSAGE_ID_PREFIX, MESSAGE_TYPE};
use crate::ConversionError;

/// Fresh envelope id, `msg_` followed by a simple-format v4 UUID.
pub fn new_message_id() -> String {
    format!("{MESSAGE_ID_PREFIX}{}", uuid::Uuid::new_v4().simple())
}

/// Decode an upstream success body.
pub fn parse_chat_response(body: &[u8]) -> Result<ChatResponse, ConversionError> {
    serde_json::from_slice(body).map_err(|e| {
        ConversionError::MalformedResponse(format!("upstream body is not a chat completion: {e}"))
    })
}

/// Tool calls dominate; otherwise a length cut-off maps to `max_tokens`.
pub(crate) fn stop_reason(has_tool_use: bool, finish_reason: Option<FinishReason>) -> StopReason {
    if has_tool_use {
        StopReason::ToolUse
    } else if finish_reason.is_some_and(FinishReason::is_length) {
        StopReason::MaxTokens
    } else {
        StopReason::EndTurn
    }
}

pub(crate) fn convert_usage(usage: &ChatUsage) -> Usage {
    Usage {
        input_tokens: usage.prompt_tokens,
        output_tokens: usage.completion_tokens,
    }
}

/// Convert a complete Chat response into a Messages response
///
/// Only the first choice is translated. Its text becomes one text block and
/// each tool call one `tool_use` block whose arguments must parse as JSON.
/// `model` falls back to `fallback_model` when the upstream leaves it empty.
pub fn chat_to_messages_response(
    response: ChatResponse,
    fallback_model: &str,
) -> Result<MessagesResponse, ConversionError> {
    let ChatResponse {
        model,
        choices,
        usage,
        ..
    } = response;

    let choice = choices.into_iter().next().ok_or_else(|| {
        ConversionError::MalformedResponse("no choices in upstream response".to_string())
    })?;

    let mut content = Vec::new();
    if let Some(text) = choice.message.text().filter(|text| !text.is_empty()) {
        content.push(Content::text(text));
    }

    for call in choice.message.tool_calls() {
        let input = serde_json::from_str(&call.function.arguments).map_err(|e| {
            ConversionError::MalformedToolArguments {
                tool_call_id: call.id.clone(),
                message: e.to_string(),
            }
        })?;
        content.push(Content::ToolUse(ToolUse::new(
            call.id.clone(),
            call.function.name.clone(),
            input,
        )));
    }

    let has_tool_use = !choice.message.tool_calls().is_empty();

    Ok(MessagesResponse {
        id: new_message_id(),
        r#type: MESSAGE_TYPE.to_string(),
        role: Role::Assistant,
        content,
        model: if model.is_empty() {
            fallback_model.to_string()
        } else {
            model
        },
        stop_reason: Some(stop_reason(has_tool_use, choice.finish_reason)),
        stop_sequence: None,
        usage: usage.as_ref().map(convert_usage),
    })
}
