use relay_ox_common::RelayError;
use strum::{Display, EnumIter, EnumString, IntoStaticStr};

/// Upstream providers speaking the Chat Completions dialect.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Display, EnumString, EnumIter, IntoStaticStr,
)]
#[strum(serialize_all = "lowercase")]
pub enum Provider {
    OpenAI,
    OpenRouter,
    Groq,
    Mistral,
    Gemini,
    Azure,
}

impl Provider {
    pub fn as_str(self) -> &'static str {
        self.into()
    }

    /// Base URL used when the configuration does not override it. Azure
    /// URLs depend on the resource name, so it has none.
    pub fn default_base_url(self) -> Option<&'static str> {
        match self {
            Self::OpenAI => Some("https://api.openai.com/v1"),
            Self::OpenRouter => Some("https://openrouter.ai/api/v1"),
            Self::Groq => Some("https://api.groq.com/openai/v1"),
            Self::Mistral => Some("https://api.mistral.ai/v1"),
            Self::Gemini => Some("https://generativelanguage.googleapis.com/v1beta/openai"),
            Self::Azure => None,
        }
    }

    /// Prefix of the provider's environment variables.
    pub fn env_prefix(self) -> &'static str {
        match self {
            Self::OpenAI => "OPENAI",
            Self::OpenRouter => "OPENROUTER",
            Self::Groq => "GROQ",
            Self::Mistral => "MISTRAL",
            Self::Gemini => "GEMINI",
            Self::Azure => "AZURE_OPENAI",
        }
    }
}

/// A `<provider>/<model>` identifier split into its parts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelRoute {
    pub provider: Provider,
    /// Model name sent upstream; may itself contain `/`.
    pub model: String,
}

impl ModelRoute {
    /// Split on the first `/`.
    pub fn parse(model: &str) -> Result<Self, RelayError> {
        let Some((provider, upstream_model)) = model.split_once('/') else {
            return Err(RelayError::InvalidRequest(format!(
                "model \"{model}\" must have the form <provider>/<model>"
            )));
        };
        if provider.is_empty() || upstream_model.is_empty() {
            return Err(RelayError::InvalidRequest(format!(
                "model \"{model}\" has an empty provider or model name"
            )));
        }
        let provider = provider
            .parse::<Provider>()
            .map_err(|_| RelayError::UnsupportedProvider(provider.to_string()))?;
        Ok(Self {
            provider,
            model: upstream_model.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use relay_ox_common::ErrorKind;
    use strum::IntoEnumIterator;

    #[test]
    fn test_parse_routes() {
        let route = ModelRoute::parse("openai/gpt-4o").unwrap();
        assert_eq!(route.provider, Provider::OpenAI);
        assert_eq!(route.model, "gpt-4o");

        let route = ModelRoute::parse("openrouter/anthropic/claude-3.5-sonnet").unwrap();
        assert_eq!(route.provider, Provider::OpenRouter);
        assert_eq!(route.model, "anthropic/claude-3.5-sonnet");
    }

    #[test]
    fn test_parse_rejections() {
        for model in ["gpt-4o", "/gpt-4o", "openai/", ""] {
            let err = ModelRoute::parse(model).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::InvalidRequest, "{model}");
        }
        let err = ModelRoute::parse("cohere/command-r").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnsupportedProvider);
        assert_eq!(err.to_string(), "Unsupported provider: cohere");
    }

    #[test]
    fn test_names_round_trip() {
        for provider in Provider::iter() {
            assert_eq!(provider.as_str().parse::<Provider>().unwrap(), provider);
            assert_eq!(provider.default_base_url().is_none(), provider == Provider::Azure);
        }
        assert_eq!(Provider::OpenRouter.to_string(), "openrouter");
    }
}
