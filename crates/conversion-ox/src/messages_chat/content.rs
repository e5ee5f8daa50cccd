//! Per-message content normalization between the two dialects.

use base64::Engine as _;
use chat_ox::{ChatMessage, ContentPart, MessageContent, MessageRole, ToolCall};
use messages_ox::{Content, Image, ImageSource, Message, Role, ToolResult, ToolUse};

use crate::ConversionError;

/// Converts one Messages-dialect message into Chat messages.
///
/// `tool_use` blocks are hoisted into `tool_calls`, and every `tool_result`
/// block becomes its own `tool` message. Tool messages follow the message
/// that carries the matching calls; in a user turn answering the previous
/// assistant turn they come before the user's remaining content, so they
/// stay adjacent to the assistant message that issued the calls. A message
/// left with neither content nor tool calls is dropped, tool messages never
/// are.
pub fn message_to_chat(message: Message) -> Result<Vec<ChatMessage>, ConversionError> {
    let role = match message.role {
        Role::User => MessageRole::User,
        Role::Assistant => MessageRole::Assistant,
    };

    let mut parts = Vec::new();
    let mut texts = Vec::new();
    let mut multimodal = false;
    let mut tool_calls = Vec::new();
    let mut tool_messages = Vec::new();

    for content in message.content.into_contents() {
        match content {
            Content::Text(text) if text.text.is_empty() => {}
            Content::Text(text) => {
                parts.push(ContentPart::text(text.text.clone()));
                texts.push(text.text);
            }
            Content::Image(image) => {
                multimodal = true;
                parts.push(ContentPart::image_url(image.source.to_data_uri()));
            }
            Content::ToolUse(tool_use) => tool_calls.push(tool_use_to_call(tool_use)?),
            Content::ToolResult(result) => tool_messages.push(tool_result_to_message(&result)),
        }
    }

    let content = if multimodal {
        Some(MessageContent::Parts(parts))
    } else if texts.is_empty() {
        None
    } else {
        Some(MessageContent::Text(texts.join("\n")))
    };

    let has_calls = !tool_calls.is_empty();
    let main = (content.is_some() || has_calls)
        .then(|| ChatMessage::new(role, content).with_tool_calls(tool_calls));

    let mut out = Vec::with_capacity(tool_messages.len() + 1);
    if has_calls {
        out.extend(main);
        out.extend(tool_messages);
    } else {
        out.extend(tool_messages);
        out.extend(main);
    }
    Ok(out)
}

fn tool_use_to_call(tool_use: ToolUse) -> Result<ToolCall, ConversionError> {
    let arguments = serde_json::to_string(&tool_use.input).map_err(|e| {
        ConversionError::InvalidRequest(format!(
            "tool_use {} input cannot be serialized: {e}",
            tool_use.id
        ))
    })?;
    Ok(ToolCall::function(tool_use.id, tool_use.name, arguments))
}

fn tool_result_to_message(result: &ToolResult) -> ChatMessage {
    ChatMessage::tool(result.tool_use_id.clone(), result.content.to_text())
}

/// Splits a `data:<media_type>;base64,<data>` URI into a base64 image source.
pub fn parse_data_uri(uri: &str) -> Result<ImageSource, ConversionError> {
    let rest = uri.strip_prefix("data:").ok_or_else(|| {
        ConversionError::UnsupportedContent(format!(
            "image URL is not a data URI and cannot be inlined: {uri}"
        ))
    })?;
    let (meta, data) = rest.split_once(',').ok_or_else(|| {
        ConversionError::UnsupportedContent("data URI has no payload separator".to_string())
    })?;
    let media_type = meta.strip_suffix(";base64").ok_or_else(|| {
        ConversionError::UnsupportedContent(format!("data URI is not base64 encoded: {meta}"))
    })?;
    if media_type.is_empty() {
        return Err(ConversionError::UnsupportedContent(
            "data URI has no media type".to_string(),
        ));
    }
    base64::engine::general_purpose::STANDARD
        .decode(data)
        .map_err(|e| ConversionError::UnsupportedContent(format!("invalid base64 image data: {e}")))?;
    Ok(ImageSource::base64(media_type, data))
}

/// Converts Chat content back into Messages content blocks.
pub fn chat_content_to_blocks(content: &MessageContent) -> Result<Vec<Content>, ConversionError> {
    match content {
        MessageContent::Text(text) if text.is_empty() => Ok(Vec::new()),
        MessageContent::Text(text) => Ok(vec![Content::text(text.clone())]),
        MessageContent::Parts(parts) => parts
            .iter()
            .map(|part| match part {
                ContentPart::Text { text } => Ok(Content::text(text.clone())),
                ContentPart::ImageUrl { image_url } => {
                    parse_data_uri(&image_url.url).map(|source| Content::Image(Image::new(source)))
                }
            })
            .collect(),
    }
}

/// Converts one Chat message back into a Messages message.
///
/// Tool messages become a user turn holding a single `tool_result`; tool
/// calls are parsed back into `tool_use` blocks after any text. System
/// messages have no inline representation and are rejected. Returns
/// `Ok(None)` for a message with nothing to carry.
pub fn chat_to_message(message: &ChatMessage) -> Result<Option<Message>, ConversionError> {
    let role = match message.role {
        MessageRole::User => Role::User,
        MessageRole::Assistant => Role::Assistant,
        MessageRole::Tool => {
            let tool_use_id = message.tool_call_id.clone().ok_or_else(|| {
                ConversionError::InvalidRequest("tool message without tool_call_id".to_string())
            })?;
            let text = match &message.content {
                Some(MessageContent::Text(text)) => text.clone(),
                Some(parts @ MessageContent::Parts(_)) => chat_content_to_blocks(parts)?
                    .iter()
                    .filter_map(|block| block.as_text().map(|text| text.text.clone()))
                    .collect::<Vec<_>>()
                    .join("\n"),
                None => String::new(),
            };
            return Ok(Some(Message::user(vec![Content::ToolResult(ToolResult::new(
                tool_use_id,
                text,
            ))])));
        }
        MessageRole::System => {
            return Err(ConversionError::UnsupportedContent(
                "system messages belong in the dedicated system field".to_string(),
            ));
        }
    };

    let mut blocks = match &message.content {
        Some(content) => chat_content_to_blocks(content)?,
        None => Vec::new(),
    };
    for call in message.tool_calls.iter().flatten() {
        let input = serde_json::from_str(&call.function.arguments).map_err(|e| {
            ConversionError::MalformedToolArguments {
                tool_call_id: call.id.clone(),
                message: e.to_string(),
            }
        })?;
        blocks.push(Content::ToolUse(ToolUse::new(
            call.id.clone(),
            call.function.name.clone(),
            input,
        )));
    }

    if blocks.is_empty() {
        return Ok(None);
    }
    Ok(Some(Message::new(role, blocks)))
}
