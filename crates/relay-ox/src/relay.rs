use std::collections::BTreeMap;

use bon::Builder;
use bytes::Bytes;
use conversion_ox::{
    chat_to_messages_response, messages_chat::new_message_id, messages_chat::parse_chat_response,
    messages_to_chat_request, parse_messages_request, reencode_stream, sse_frames,
};
use futures_util::stream::BoxStream;
use messages_ox::MessagesResponse;
use relay_ox_common::RelayError;
use strum::IntoEnumIterator;

use crate::{
    config::{AuthScheme, ProviderConfig},
    provider::{ModelRoute, Provider},
};

/// Fixed headers for a streamed response body.
pub const SSE_HEADERS: [(&str, &str); 3] = [
    ("Content-Type", "text/event-stream"),
    ("Cache-Control", "no-cache"),
    ("Connection", "keep-alive"),
];

/// What the boundary layer sends back to the caller.
pub enum RelayResponse {
    /// A complete Messages response, serialized as JSON.
    Json(MessagesResponse),
    /// SSE frames to be written as they arrive, with [`SSE_HEADERS`].
    Stream(BoxStream<'static, Bytes>),
}

impl std::fmt::Debug for RelayResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Json(response) => f.debug_tuple("Json").field(response).finish(),
            Self::Stream(_) => f.write_str("Stream(..)"),
        }
    }
}

impl RelayResponse {
    pub fn is_stream(&self) -> bool {
        matches!(self, Self::Stream(_))
    }
}

/// Accepts Messages requests and serves them through Chat Completions
/// providers.
#[derive(Debug, Clone, Builder)]
#[builder(builder_type(vis = "pub"), state_mod(vis = "pub"))]
pub struct Relay {
    #[builder(field)]
    providers: BTreeMap<Provider, ProviderConfig>,

    #[builder(default)]
    client: reqwest::Client,
}

impl<S: relay_builder::State> RelayBuilder<S> {
    pub fn provider(mut self, provider: Provider, config: ProviderConfig) -> Self {
        self.providers.insert(provider, config);
        self
    }
}

impl Relay {
    /// Every provider whose environment configuration is complete.
    pub fn from_env() -> Self {
        let mut builder = Self::builder();
        for provider in Provider::iter() {
            match ProviderConfig::from_env(provider) {
                Ok(config) => builder = builder.provider(provider, config),
                Err(e) => log::debug!("Provider {provider} not configured: {e}"),
            }
        }
        builder.build()
    }

    pub fn is_configured(&self, provider: Provider) -> bool {
        self.providers.contains_key(&provider)
    }

    /// Resolve a `<provider>/<model>` identifier to a configured provider.
    pub fn route(&self, model: &str) -> Result<(ModelRoute, &ProviderConfig), RelayError> {
        let route = ModelRoute::parse(model)?;
        let config = self.providers.get(&route.provider).ok_or_else(|| {
            RelayError::UnsupportedProvider(format!("{} is not configured", route.provider))
        })?;
        Ok((route, config))
    }

    /// Handle one raw Messages request body
    ///
    /// Validation, routing and translation all happen before the provider is
    /// contacted, so client faults never cost an upstream call. Streaming
    /// requests resolve to SSE frames as soon as the upstream answers with a
    /// success status.
    pub async fn handle_messages(&self, body: serde_json::Value) -> Result<RelayResponse, RelayError> {
        let request = parse_messages_request(body)?;
        let (route, config) = self.route(&request.model)?;
        let requested_model = request.model.clone();
        let streaming = request.is_streaming();

        let mut chat = messages_to_chat_request(request)?;
        chat.model.clone_from(&route.model);
        let url = config.endpoint(route.provider)?;

        log::debug!(
            "Routing {requested_model} to {} as {} (stream: {streaming})",
            route.provider,
            route.model
        );

        let builder = self.client.post(url).json(&chat);
        let builder = match config.auth_scheme(route.provider) {
            AuthScheme::Bearer => builder.bearer_auth(&config.api_key),
            AuthScheme::ApiKeyHeader => builder.header("api-key", &config.api_key),
        };
        let response = builder.send().await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.bytes().await?;
            return Err(RelayError::upstream(route.provider.as_str(), status.as_u16(), &body));
        }

        if streaming {
            let events = reencode_stream(response.bytes_stream(), new_message_id(), requested_model);
            return Ok(RelayResponse::Stream(sse_frames(events)));
        }

        let body = response.bytes().await?;
        let chat_response = parse_chat_response(&body)?;
        Ok(RelayResponse::Json(chat_to_messages_response(
            chat_response,
            &route.model,
        )?))
    }
}
