use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

use super::{ChannelInfo, ChannelLookup, DiscoveredVideo, Discovery, DiscoveryError, VideoDetails};
use crate::config::Settings;

/// YouTube Data API v3 client
pub struct YouTubeClient {
    client: Client,
    api_base: String,
    api_key: String,
    max_results: u32,
}

#[derive(Debug, Deserialize)]
struct ListResponse<T> {
    #[serde(default = "Vec::new")]
    items: Vec<T>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SearchItem {
    id: SearchItemId,
    snippet: SearchSnippet,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SearchItemId {
    video_id: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SearchSnippet {
    title: String,
    published_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct VideoItem {
    snippet: VideoSnippet,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct VideoSnippet {
    title: String,
    channel_id: String,
}

#[derive(Debug, Deserialize)]
struct ChannelItem {
    id: String,
    snippet: ChannelSnippet,
}

#[derive(Debug, Deserialize)]
struct ChannelSnippet {
    title: String,
}

impl YouTubeClient {
    pub fn new(settings: &Settings, api_key: impl Into<String>) -> Result<Self, DiscoveryError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(settings.http.timeout_seconds))
            .build()?;

        Ok(Self {
            client,
            api_base: settings.youtube.api_base.trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            max_results: settings.youtube.max_results,
        })
    }

    async fn list<T: DeserializeOwned>(
        &self,
        resource: &str,
        params: &[(&str, String)],
    ) -> Result<Vec<T>, DiscoveryError> {
        let url = format!("{}/{}", self.api_base, resource);
        debug!("GET {} {:?}", url, params);

        let response = self
            .client
            .get(&url)
            .query(params)
            .query(&[("key", self.api_key.as_str())])
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let message = response.text().await.unwrap_or_default();
            return Err(DiscoveryError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let list: ListResponse<T> = response.json().await?;
        Ok(list.items)
    }
}

#[async_trait]
impl Discovery for YouTubeClient {
    async fn search(
        &self,
        channel_id: &str,
        after: DateTime<Utc>,
    ) -> Result<Vec<DiscoveredVideo>, DiscoveryError> {
        let items: Vec<SearchItem> = self
            .list(
                "search",
                &[
                    ("part", "id,snippet".to_string()),
                    ("type", "video".to_string()),
                    ("channelId", channel_id.to_string()),
                    ("publishedAfter", after.to_rfc3339_opts(SecondsFormat::Secs, true)),
                    ("maxResults", self.max_results.to_string()),
                ],
            )
            .await?;

        Ok(items
            .into_iter()
            .filter_map(|item| {
                item.id.video_id.map(|id| DiscoveredVideo {
                    id,
                    title: item.snippet.title,
                    published_at: item.snippet.published_at,
                })
            })
            .collect())
    }

    async fn get(&self, video_id: &str) -> Result<VideoDetails, DiscoveryError> {
        let items: Vec<VideoItem> = self
            .list(
                "videos",
                &[("part", "snippet".to_string()), ("id", video_id.to_string())],
            )
            .await?;

        let item = items
            .into_iter()
            .next()
            .ok_or_else(|| DiscoveryError::NotFound(format!("video {}", video_id)))?;

        Ok(VideoDetails {
            title: item.snippet.title,
            channel_id: item.snippet.channel_id,
        })
    }

    async fn get_channel(&self, lookup: &ChannelLookup) -> Result<ChannelInfo, DiscoveryError> {
        let key = match lookup {
            ChannelLookup::Id(id) => ("id", id.clone()),
            ChannelLookup::Username(name) => ("forUsername", name.clone()),
        };

        let items: Vec<ChannelItem> = self
            .list("channels", &[("part", "snippet".to_string()), key])
            .await?;

        let item = items
            .into_iter()
            .next()
            .ok_or_else(|| DiscoveryError::NotFound(lookup.to_string()))?;

        Ok(ChannelInfo {
            id: item.id,
            title: item.snippet.title,
        })
    }
}
