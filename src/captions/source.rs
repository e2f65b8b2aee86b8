use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;
use tracing::debug;

use crate::config::Settings;
use crate::discovery::DiscoveryError;

/// Source of raw timed-text caption markup
#[async_trait]
pub trait CaptionSource: Send + Sync {
    /// Fetch captions for a video in the given language.
    /// `Ok(None)` means the video has no captions in that language.
    async fn fetch(&self, video_id: &str, language: &str) -> Result<Option<String>, DiscoveryError>;
}

/// Timed-text endpoint client
pub struct TimedTextClient {
    client: Client,
    endpoint: String,
}

impl TimedTextClient {
    pub fn new(settings: &Settings) -> Result<Self, DiscoveryError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(settings.http.timeout_seconds))
            .user_agent(settings.http.user_agent.clone())
            .build()?;

        Ok(Self {
            client,
            endpoint: settings.youtube.captions_endpoint.clone(),
        })
    }
}

#[async_trait]
impl CaptionSource for TimedTextClient {
    async fn fetch(&self, video_id: &str, language: &str) -> Result<Option<String>, DiscoveryError> {
        debug!("Fetching {} captions for {}", language, video_id);

        let response = self
            .client
            .get(&self.endpoint)
            .query(&[("lang", language), ("v", video_id)])
            .send()
            .await?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !response.status().is_success() {
            let status = response.status();
            let message = response.text().await.unwrap_or_default();
            return Err(DiscoveryError::Api {
                status: status.as_u16(),
                message,
            });
        }

        // The endpoint answers 200 with an empty body when no track exists.
        let body = response.text().await?;
        if body.trim().is_empty() {
            Ok(None)
        } else {
            Ok(Some(body))
        }
    }
}
