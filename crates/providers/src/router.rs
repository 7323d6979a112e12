//! Provider selection: builds the transport for the configured `ApiProvider`.

use std::sync::Arc;

use deskpilot_config::{AppConfig, ProviderConfig};
use deskpilot_core::error::ProviderError;
use deskpilot_core::provider::{ApiProvider, Provider};
use tracing::debug;

use crate::anthropic::AnthropicProvider;

/// Region used for Vertex when the config does not name one.
const DEFAULT_VERTEX_REGION: &str = "us-east5";

/// Build the provider selected by `config.provider`.
///
/// Credentials come from `[providers.<name>]` first, then the top-level
/// `api_key`. Bedrock is only reachable through an `api_url` proxy.
pub fn build_from_config(config: &AppConfig) -> Result<Arc<dyn Provider>, ProviderError> {
    let empty = ProviderConfig::default();
    let settings = config.provider_settings().unwrap_or(&empty);

    let api_key = settings
        .api_key
        .clone()
        .or_else(|| config.api_key.clone())
        .filter(|k| !k.is_empty());

    let provider: Arc<dyn Provider> = match config.provider {
        ApiProvider::Anthropic => {
            let api_key = api_key.ok_or_else(|| {
                ProviderError::NotConfigured(
                    "no API key: set ANTHROPIC_API_KEY or api_key in config.toml".into(),
                )
            })?;
            let mut provider = AnthropicProvider::new(api_key);
            if let Some(url) = settings.api_url.as_deref() {
                provider = provider.with_base_url(url);
            }
            Arc::new(provider)
        }
        ApiProvider::Vertex => {
            let project = settings.vertex_project.clone().ok_or_else(|| {
                ProviderError::NotConfigured("providers.vertex.vertex_project is required".into())
            })?;
            let region = settings
                .vertex_region
                .clone()
                .unwrap_or_else(|| DEFAULT_VERTEX_REGION.to_string());
            let token = api_key.ok_or_else(|| {
                ProviderError::NotConfigured(
                    "no access token for Vertex: set providers.vertex.api_key".into(),
                )
            })?;
            Arc::new(AnthropicProvider::vertex(project, region, token))
        }
        ApiProvider::Bedrock => {
            let url = settings.api_url.as_deref().ok_or_else(|| {
                ProviderError::NotConfigured(
                    "bedrock requires providers.bedrock.api_url (a Messages API proxy)".into(),
                )
            })?;
            Arc::new(
                AnthropicProvider::new(api_key.unwrap_or_default())
                    .with_base_url(url)
                    .with_name("bedrock"),
            )
        }
    };

    debug!(provider = provider.name(), "Provider built");
    Ok(provider)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config_with(provider: ApiProvider, name: &str, settings: ProviderConfig) -> AppConfig {
        let mut config = AppConfig {
            provider,
            ..AppConfig::default()
        };
        config.providers.insert(name.into(), settings);
        config
    }

    #[test]
    fn anthropic_from_top_level_key() {
        let config = AppConfig {
            api_key: Some("sk-ant-test".into()),
            ..AppConfig::default()
        };
        let provider = build_from_config(&config).unwrap();
        assert_eq!(provider.name(), "anthropic");
    }

    #[test]
    fn anthropic_without_key_is_not_configured() {
        let err = build_from_config(&AppConfig::default()).err().unwrap();
        assert!(matches!(err, ProviderError::NotConfigured(_)));
    }

    #[test]
    fn empty_key_counts_as_missing() {
        let config = AppConfig {
            api_key: Some(String::new()),
            ..AppConfig::default()
        };
        assert!(build_from_config(&config).is_err());
    }

    #[test]
    fn vertex_requires_project() {
        let config = config_with(
            ApiProvider::Vertex,
            "vertex",
            ProviderConfig {
                api_key: Some("ya29.token".into()),
                ..ProviderConfig::default()
            },
        );
        assert!(matches!(
            build_from_config(&config).err().unwrap(),
            ProviderError::NotConfigured(_)
        ));
    }

    #[test]
    fn vertex_with_project_and_token() {
        let config = config_with(
            ApiProvider::Vertex,
            "vertex",
            ProviderConfig {
                api_key: Some("ya29.token".into()),
                vertex_project: Some("my-project".into()),
                ..ProviderConfig::default()
            },
        );
        assert_eq!(build_from_config(&config).unwrap().name(), "vertex");
    }

    #[test]
    fn bedrock_needs_proxy_url() {
        let bare = AppConfig {
            provider: ApiProvider::Bedrock,
            ..AppConfig::default()
        };
        assert!(build_from_config(&bare).is_err());

        let proxied = config_with(
            ApiProvider::Bedrock,
            "bedrock",
            ProviderConfig {
                api_url: Some("http://localhost:4000".into()),
                ..ProviderConfig::default()
            },
        );
        assert_eq!(build_from_config(&proxied).unwrap().name(), "bedrock");
    }
}
