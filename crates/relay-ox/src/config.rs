use bon::Builder;
use relay_ox_common::RelayError;
use thiserror::Error;
use url::Url;

use crate::provider::Provider;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnv(String),
}

/// Resource/deployment pair addressing one Azure OpenAI deployment.
#[derive(Debug, Clone, PartialEq, Eq, Builder)]
pub struct AzureDeployment {
    #[builder(into)]
    pub resource: String,
    #[builder(into)]
    pub deployment: String,
    #[builder(into)]
    pub api_version: String,
}

/// How the credential travels to the provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthScheme {
    /// `Authorization: Bearer <key>`
    Bearer,
    /// `api-key: <key>`
    ApiKeyHeader,
}

#[derive(Debug, Clone, PartialEq, Eq, Builder)]
pub struct ProviderConfig {
    /// Passed through to the provider unchanged.
    #[builder(into)]
    pub api_key: String,
    /// Overrides the provider's default base URL.
    #[builder(into)]
    pub base_url: Option<String>,
    /// Required for Azure, ignored elsewhere.
    pub azure: Option<AzureDeployment>,
}

impl ProviderConfig {
    /// Load `<PREFIX>_API_KEY` and the optional `<PREFIX>_BASE_URL`; Azure
    /// additionally needs `AZURE_OPENAI_RESOURCE`, `AZURE_OPENAI_DEPLOYMENT`
    /// and `AZURE_OPENAI_API_VERSION`.
    pub fn from_env(provider: Provider) -> Result<Self, ConfigError> {
        Self::from_lookup(provider, |name| std::env::var(name).ok())
    }

    /// [`Self::from_env`] over an arbitrary variable source.
    pub fn from_lookup(
        provider: Provider,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        let prefix = provider.env_prefix();
        let require = |suffix: &str| {
            let name = format!("{prefix}_{suffix}");
            lookup(&name)
                .filter(|value| !value.is_empty())
                .ok_or(ConfigError::MissingEnv(name))
        };

        let api_key = require("API_KEY")?;
        let base_url = lookup(&format!("{prefix}_BASE_URL")).filter(|url| !url.is_empty());
        let azure = if provider == Provider::Azure {
            Some(AzureDeployment {
                resource: require("RESOURCE")?,
                deployment: require("DEPLOYMENT")?,
                api_version: require("API_VERSION")?,
            })
        } else {
            None
        };

        Ok(Self {
            api_key,
            base_url,
            azure,
        })
    }

    pub fn auth_scheme(&self, provider: Provider) -> AuthScheme {
        match provider {
            Provider::Azure => AuthScheme::ApiKeyHeader,
            _ => AuthScheme::Bearer,
        }
    }

    /// The chat completions URL for `provider`.
    pub fn endpoint(&self, provider: Provider) -> Result<Url, RelayError> {
        let invalid = |reason: String| {
            RelayError::UnsupportedProvider(format!("{provider}: {reason}"))
        };

        let raw = if provider == Provider::Azure {
            let azure = self
                .azure
                .as_ref()
                .ok_or_else(|| invalid("missing Azure resource/deployment configuration".to_string()))?;
            let base = self
                .base_url
                .clone()
                .unwrap_or_else(|| format!("https://{}.openai.azure.com", azure.resource));
            format!(
                "{}/openai/deployments/{}/chat/completions",
                base.trim_end_matches('/'),
                azure.deployment
            )
        } else {
            let base = self
                .base_url
                .as_deref()
                .or(provider.default_base_url())
                .ok_or_else(|| invalid("no base URL configured".to_string()))?;
            format!("{}/chat/completions", base.trim_end_matches('/'))
        };

        let mut url = Url::parse(&raw).map_err(|e| invalid(format!("invalid endpoint {raw}: {e}")))?;
        if let (Provider::Azure, Some(azure)) = (provider, &self.azure) {
            url.query_pairs_mut()
                .append_pair("api-version", &azure.api_version);
        }
        Ok(url)
    }
}
