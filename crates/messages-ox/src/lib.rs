#![cfg_attr(not(test), deny(unsafe_code))]
#![warn(
    clippy::pedantic,
    clippy::unwrap_used,
    clippy::missing_docs_in_private_items
)]

//! Wire types for the Messages dialect.
//!
//! A request carries its system prompt in a dedicated field and every message
//! is either a plain string or an ordered list of typed content blocks. Tool
//! invocations and their results travel inline as `tool_use` / `tool_result`
//! blocks. Streaming responses are a sequence of lifecycle events
//! (`message_start`, `content_block_*`, `message_delta`, `message_stop`).

pub mod message;
pub mod request;
pub mod response;
pub mod stream;
pub mod tool;

pub use message::{Content, Image, ImageSource, Message, Role, StringOrContents, Text};
pub use request::{MessagesRequest, SystemBlock, SystemPrompt};
pub use response::{MessagesResponse, StopReason, Usage};
pub use stream::{
    ContentBlock, ContentBlockDelta, ErrorInfo, MessageDelta, StreamEvent, StreamMessage,
};
pub use tool::{
    Tool, ToolChoice, ToolChoiceMode, ToolChoiceSpec, ToolResult, ToolResultContent, ToolUse,
};
