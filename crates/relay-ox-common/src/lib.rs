#![cfg_attr(not(test), deny(unsafe_code))]
#![warn(
    clippy::pedantic,
    clippy::unwrap_used,
    clippy::missing_docs_in_private_items
)]

//! Shared plumbing for the relay crates
//!
//! Holds the error taxonomy surfaced to the boundary layer and the
//! chunk-boundary-safe SSE line decoder used when reading upstream streams.

pub mod error;
pub mod streaming;

pub use error::{ErrorKind, RelayError, extract_error_message};
pub use streaming::SseLineDecoder;
