//! Conversions between the Messages and Chat Completions wire dialects
//!
//! The Messages dialect keeps the system prompt in its own field and carries
//! tool invocations inline as typed content blocks; the Chat Completions
//! dialect flattens everything into one message list. This crate translates
//! Messages requests into Chat requests, turns complete Chat responses back
//! into Messages responses, and re-encodes a live Chat chunk stream as a
//! Messages event stream.

#![cfg_attr(not(test), deny(unsafe_code))]
#![warn(
    clippy::pedantic,
    clippy::unwrap_used,
    clippy::missing_docs_in_private_items
)]

use relay_ox_common::RelayError;

/// Error types for conversion failures
#[derive(Debug, thiserror::Error)]
pub enum ConversionError {
    /// Inbound request is missing a required field or has the wrong shape
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
    /// A complete tool call whose arguments are not valid JSON
    #[error("Malformed arguments for tool call {tool_call_id}: {message}")]
    MalformedToolArguments {
        /// Upstream id of the offending call
        tool_call_id: String,
        /// Parser message
        message: String,
    },
    /// Upstream payload lacks data the target dialect requires
    #[error("Malformed response: {0}")]
    MalformedResponse(String),
    /// Content that has no representation in the target dialect
    #[error("Unsupported content: {0}")]
    UnsupportedContent(String),
}

impl From<ConversionError> for RelayError {
    fn from(err: ConversionError) -> Self {
        match err {
            ConversionError::InvalidRequest(message) => Self::InvalidRequest(message),
            ConversionError::MalformedToolArguments {
                tool_call_id,
                message,
            } => Self::MalformedToolArguments {
                tool_call_id,
                message,
            },
            ConversionError::MalformedResponse(message)
            | ConversionError::UnsupportedContent(message) => Self::MalformedResponse(message),
        }
    }
}

/// Messages ↔ Chat Completions conversions
pub mod messages_chat;

pub use messages_chat::{
    StreamReencoder, StreamState, chat_to_messages_response, clean_schema,
    messages_to_chat_request, parse_messages_request, reencode_stream, sse_frames,
    validate_messages_request,
};
