#![cfg_attr(not(test), deny(unsafe_code))]
#![warn(
    clippy::pedantic,
    clippy::unwrap_used,
    clippy::missing_docs_in_private_items
)]

//! Messages-dialect front for Chat Completions providers
//!
//! A request names its upstream as `<provider>/<model>`. The relay validates
//! and translates the body, forwards it to the provider's chat completions
//! endpoint, and translates the reply back, either as one JSON response or
//! as a re-encoded SSE stream. Errors come back as [`RelayError`] values;
//! shaping them into HTTP envelopes is left to the embedding server.
//!
//! ```no_run
//! use relay_ox::{Provider, ProviderConfig, Relay, RelayResponse};
//!
//! # async fn run() -> Result<(), relay_ox::RelayError> {
//! let relay = Relay::builder()
//!     .provider(Provider::OpenAI, ProviderConfig::builder().api_key("sk-...").build())
//!     .build();
//!
//! let body = serde_json::json!({
//!     "model": "openai/gpt-4o",
//!     "max_tokens": 512,
//!     "messages": [{"role": "user", "content": "Hello"}]
//! });
//! if let RelayResponse::Json(response) = relay.handle_messages(body).await? {
//!     println!("{response}");
//! }
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod provider;
pub mod relay;

pub use config::{AuthScheme, AzureDeployment, ConfigError, ProviderConfig};
pub use provider::{ModelRoute, Provider};
pub use relay::{Relay, RelayResponse, SSE_HEADERS};
pub use relay_ox_common::{ErrorKind, RelayError};
