#![cfg_attr(not(test), deny(unsafe_code))]
#![warn(
    clippy::pedantic,
    clippy::unwrap_used,
    clippy::missing_docs_in_private_items
)]

//! Wire types for the Chat Completions dialect.
//!
//! Messages form one flat list in which the system prompt is just another
//! message, tool invocations hang off assistant messages as `tool_calls`, and
//! each tool result is its own `tool`-role message. Streaming responses are a
//! sequence of `chat.completion.chunk` objects carried in `data:` lines.

pub mod chunk;
pub mod message;
pub mod request;
pub mod response;

/// `type` tag of function tools, tool calls and forced tool choices.
pub const FUNCTION_TYPE: &str = "function";

pub use chunk::{ChatCompletionChunk, ChunkChoice, ChunkDelta, FunctionCallDelta, ToolCallDelta};
pub use message::{
    ChatMessage, ContentPart, FunctionCall, ImageUrl, MessageContent, MessageRole, ToolCall,
};
pub use request::{ChatRequest, FunctionDefinition, FunctionName, Tool, ToolChoice, ToolChoiceMode};
pub use response::{ChatResponse, Choice, FinishReason, ResponseMessage, Usage};
