use std::sync::Arc;

use build_provider::{BuildProvider, ProviderInitError};
use build_provider_http::{HttpProvider, HttpProviderConfig, HTTP_PROVIDER_ID};
use build_provider_mock::{MockProvider, MOCK_PROVIDER_ID};

use crate::config::EnvConfig;

pub const DEFAULT_PROVIDER_ID: &str = MOCK_PROVIDER_ID;

pub fn provider_from_config(config: &EnvConfig) -> Result<Arc<dyn BuildProvider>, ProviderInitError> {
    provider_for_id(&config.provider, config)
}

pub fn provider_for_id(
    provider_id: &str,
    config: &EnvConfig,
) -> Result<Arc<dyn BuildProvider>, ProviderInitError> {
    match provider_id {
        MOCK_PROVIDER_ID => Ok(Arc::new(MockProvider::default())),
        HTTP_PROVIDER_ID => {
            let mut http_config = HttpProviderConfig::new();
            if let Some(base_url) = &config.backend_url {
                http_config = http_config.with_base_url(base_url.clone());
            }
            if let Some(timeout) = config.request_timeout {
                http_config = http_config.with_timeout(timeout);
            }
            Ok(Arc::new(HttpProvider::new(http_config)?))
        }
        unknown => Err(ProviderInitError::new(format!(
            "Unsupported provider '{unknown}'. Available providers: {MOCK_PROVIDER_ID}, {HTTP_PROVIDER_ID}"
        ))),
    }
}
