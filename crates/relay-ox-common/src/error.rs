use serde::Serialize;
use strum::{Display, IntoStaticStr};
use thiserror::Error;

/// Machine-readable tag carried alongside every surfaced error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Display, IntoStaticStr)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ErrorKind {
    InvalidRequest,
    UnsupportedProvider,
    MalformedToolArguments,
    UpstreamUnavailable,
    UpstreamError,
    MalformedResponse,
}

impl ErrorKind {
    pub fn as_str(self) -> &'static str {
        self.into()
    }
}

/// Errors handed back to the boundary layer, which owns envelope shaping.
#[derive(Error, Debug)]
pub enum RelayError {
    /// Missing or malformed field in the inbound request.
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// The model's provider prefix is unknown or not configured.
    #[error("Unsupported provider: {0}")]
    UnsupportedProvider(String),

    /// A complete upstream tool call whose arguments are not JSON.
    #[error("Malformed arguments for tool call {tool_call_id}: {message}")]
    MalformedToolArguments {
        tool_call_id: String,
        message: String,
    },

    /// Transport-level failure reaching the provider.
    #[error("Upstream unavailable: {0}")]
    UpstreamUnavailable(String),

    /// The provider answered with a non-success status.
    #[error("{provider}: {message}")]
    UpstreamError {
        provider: String,
        status: u16,
        message: String,
    },

    /// A success body that does not decode as a chat completion.
    #[error("Malformed upstream response: {0}")]
    MalformedResponse(String),
}

impl RelayError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidRequest(_) => ErrorKind::InvalidRequest,
            Self::UnsupportedProvider(_) => ErrorKind::UnsupportedProvider,
            Self::MalformedToolArguments { .. } => ErrorKind::MalformedToolArguments,
            Self::UpstreamUnavailable(_) => ErrorKind::UpstreamUnavailable,
            Self::UpstreamError { .. } => ErrorKind::UpstreamError,
            Self::MalformedResponse(_) => ErrorKind::MalformedResponse,
        }
    }

    /// HTTP-status equivalent for the boundary layer.
    pub fn status_code(&self) -> u16 {
        match self {
            Self::InvalidRequest(_) | Self::UnsupportedProvider(_) => 400,
            Self::MalformedToolArguments { .. } | Self::MalformedResponse(_) => 502,
            Self::UpstreamUnavailable(_) => 503,
            Self::UpstreamError { status, .. } => *status,
        }
    }

    /// Client faults are never worth retrying.
    pub fn is_client_error(&self) -> bool {
        matches!(self.kind(), ErrorKind::InvalidRequest | ErrorKind::UnsupportedProvider)
    }

    /// Wrap a provider's non-success response, pulling the message out of
    /// the usual JSON error shapes and falling back to the raw body.
    pub fn upstream(provider: impl Into<String>, status: u16, body: &[u8]) -> Self {
        let message = serde_json::from_slice::<serde_json::Value>(body)
            .ok()
            .and_then(|json| extract_error_message(&json))
            .unwrap_or_else(|| String::from_utf8_lossy(body).trim().to_string());
        Self::UpstreamError {
            provider: provider.into(),
            status,
            message,
        }
    }
}

impl From<reqwest::Error> for RelayError {
    fn from(err: reqwest::Error) -> Self {
        Self::UpstreamUnavailable(err.to_string())
    }
}

/// Extract error message from the JSON error bodies providers return.
pub fn extract_error_message(json: &serde_json::Value) -> Option<String> {
    // {"error": {"message": "..."}} (OpenAI, Groq, Mistral, Gemini)
    if let Some(message) = json
        .get("error")
        .and_then(|error| error.get("message"))
        .and_then(serde_json::Value::as_str)
    {
        return Some(message.to_string());
    }

    // {"error": "..."}
    if let Some(message) = json.get("error").and_then(serde_json::Value::as_str) {
        return Some(message.to_string());
    }

    json.get("message")
        .and_then(serde_json::Value::as_str)
        .map(ToString::to_string)
}
