use crate::core::models::{RemoteSettings, ResourceKey, SettingsPatch};
use crate::core::settings::BackendSettings;
use crate::sources::{ConfigSource, DataSource, SourceError};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use std::time::Duration;

const SETTINGS_PATH: &str = "/api/settings";

/// Talks to the dashboard backend over HTTP for both resources and settings.
pub struct BackendClient {
    client: reqwest::Client,
    base_url: String,
}

impl BackendClient {
    pub fn new(settings: &BackendSettings) -> Result<Self, SourceError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs))
            .build()?;

        Ok(Self {
            client,
            base_url: settings.base_url.trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn send(
        request: reqwest::RequestBuilder,
        url: &str,
    ) -> Result<reqwest::Response, SourceError> {
        request.send().await.map_err(|e| {
            if e.is_connect() || e.is_timeout() {
                SourceError::Unavailable(format!("{url}: {e}"))
            } else {
                SourceError::Http(e)
            }
        })
    }

    async fn decode<T: DeserializeOwned>(
        response: reqwest::Response,
        url: &str,
    ) -> Result<T, SourceError> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SourceError::Status {
                status: status.as_u16(),
                url: url.to_string(),
                body,
            });
        }

        let bytes = response.bytes().await?;
        Ok(serde_json::from_slice(&bytes)?)
    }
}

#[async_trait]
impl DataSource<serde_json::Value> for BackendClient {
    async fn fetch(&self, key: &ResourceKey) -> Result<serde_json::Value, SourceError> {
        let url = self.url(&key.api_path());
        tracing::debug!(resource = %key, %url, "Fetching resource");
        let response = Self::send(self.client.get(&url), &url).await?;
        Self::decode(response, &url).await
    }
}

#[async_trait]
impl ConfigSource for BackendClient {
    async fn load_config(&self) -> Result<RemoteSettings, SourceError> {
        let url = self.url(SETTINGS_PATH);
        let response = Self::send(self.client.get(&url), &url).await?;
        Self::decode(response, &url).await
    }

    async fn update_config(&self, patch: &SettingsPatch) -> Result<RemoteSettings, SourceError> {
        let url = self.url(SETTINGS_PATH);
        let response = Self::send(self.client.patch(&url).json(patch), &url).await?;
        Self::decode(response, &url).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_url_joins_without_double_slash() {
        let client = BackendClient::new(&BackendSettings {
            base_url: "http://localhost:8000/".to_string(),
            timeout_secs: 5,
        })
        .unwrap();
        assert_eq!(
            client.url(&ResourceKey::Site("42".into()).api_path()),
            "http://localhost:8000/api/sites/42"
        );
        assert_eq!(client.url(SETTINGS_PATH), "http://localhost:8000/api/settings");
    }
}
