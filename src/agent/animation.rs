use async_trait::async_trait;
use reqwest::StatusCode;
use serde_json::Value;
use tracing::{error, warn};

use crate::errors::AppError;

pub const DEFAULT_LOTTIE_URL: &str =
    "https://assets5.lottiefiles.com/packages/lf20_jcikwtux.json";

/// Fetches the Lottie animation shown in the page header.
#[async_trait]
pub trait AnimationFetcher: Send + Sync {
    /// Returns `None` when the server answers with anything but 200.
    async fn fetch(&self, url: &str) -> Result<Option<Value>, AppError>;
}

#[derive(Clone, Default)]
pub struct HttpAnimationFetcher {
    client: reqwest::Client,
}

impl HttpAnimationFetcher {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl AnimationFetcher for HttpAnimationFetcher {
    async fn fetch(&self, url: &str) -> Result<Option<Value>, AppError> {
        let failed = |e: reqwest::Error| {
            error!("Animation fetch from {url} failed: {e}");
            AppError::AnimationFetchFailed { url: url.to_string(), message: e.to_string() }
        };

        let response = self.client.get(url).send().await.map_err(failed)?;
        if response.status() != StatusCode::OK {
            warn!("Animation fetch from {url} returned {}", response.status());
            return Ok(None);
        }
        response.json::<Value>().await.map(Some).map_err(failed)
    }
}

#[cfg(test)]
pub mod testing {
    use super::*;

    /// Fetcher that always returns the same document.
    pub struct StaticFetcher(pub Option<Value>);

    #[async_trait]
    impl AnimationFetcher for StaticFetcher {
        async fn fetch(&self, _url: &str) -> Result<Option<Value>, AppError> {
            Ok(self.0.clone())
        }
    }
}
