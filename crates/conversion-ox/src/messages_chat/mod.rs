//! Direct conversions between the Messages and Chat Completions formats
//!
//! ## Supported Conversions
//!
//! - `validate_messages_request()` / `parse_messages_request()` - check and decode a raw Messages body
//! - `messages_to_chat_request()` - MessagesRequest → ChatRequest
//! - `chat_to_messages_response()` - ChatResponse → MessagesResponse
//! - `StreamReencoder` / `reencode_stream()` - Chat chunk stream → Messages event stream
//! - `clean_schema()` - strip tool-schema keys the Chat dialect rejects
//!
//! ## Lossy mappings
//!
//! - `tool_choice: "any"` becomes `"auto"`; the Chat dialect cannot force "some tool".
//! - Streamed tool arguments are re-emitted as one `input_json_delta` carrying
//!   the complete object, not as incremental fragments.
//! - `top_k` and `metadata` have no Chat equivalent and are dropped.

mod constants;
pub mod content;
pub mod request;
pub mod response;
pub mod schema;
pub mod streaming;

pub use content::{chat_to_message, message_to_chat, parse_data_uri};
pub use request::{messages_to_chat_request, parse_messages_request, validate_messages_request};
pub use response::{chat_to_messages_response, new_message_id, parse_chat_response};
pub use schema::clean_schema;
pub use streaming::{StreamReencoder, StreamState, reencode_stream, sse_frames};
