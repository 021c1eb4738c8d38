mod http;

use crate::core::models::{RemoteSettings, ResourceKey, SettingsPatch};
use async_trait::async_trait;
use thiserror::Error;

pub use http::BackendClient;

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("backend returned {status} for {url}: {body}")]
    Status {
        status: u16,
        url: String,
        body: String,
    },

    #[error("failed to decode response: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("source unavailable: {0}")]
    Unavailable(String),
}

/// Produces the current value of a resource.
#[async_trait]
pub trait DataSource<T>: Send + Sync {
    async fn fetch(&self, key: &ResourceKey) -> Result<T, SourceError>;
}

/// Supplies and accepts polling configuration.
#[async_trait]
pub trait ConfigSource: Send + Sync {
    async fn load_config(&self) -> Result<RemoteSettings, SourceError>;
    async fn update_config(&self, patch: &SettingsPatch) -> Result<RemoteSettings, SourceError>;
}
