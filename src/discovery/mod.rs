/// Video catalog discovery
///
/// The orchestrator only talks to the [`Discovery`] trait; [`YouTubeClient`]
/// is the YouTube Data API implementation used by the binary.
pub mod youtube;

pub use youtube::YouTubeClient;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A video returned by a channel search
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiscoveredVideo {
    pub id: String,
    pub title: String,
    pub published_at: DateTime<Utc>,
}

/// Details of a single video
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoDetails {
    pub title: String,
    pub channel_id: String,
}

/// Canonical channel identity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelInfo {
    pub id: String,
    pub title: String,
}

/// How to look a channel up
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelLookup {
    Id(String),
    Username(String),
}

impl std::fmt::Display for ChannelLookup {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ChannelLookup::Id(id) => write!(f, "channel id {}", id),
            ChannelLookup::Username(name) => write!(f, "username {}", name),
        }
    }
}

#[derive(Error, Debug)]
pub enum DiscoveryError {
    #[error("API error {status}: {message}")]
    Api { status: u16, message: String },

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Unexpected response: {0}")]
    Decode(String),
}

impl DiscoveryError {
    /// Connection-level failures (unreachable host, timeout)
    pub fn is_transport(&self) -> bool {
        matches!(self, DiscoveryError::Transport(_))
    }
}

impl From<reqwest::Error> for DiscoveryError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            DiscoveryError::Decode(e.to_string())
        } else if let Some(status) = e.status() {
            DiscoveryError::Api {
                status: status.as_u16(),
                message: e.to_string(),
            }
        } else {
            DiscoveryError::Transport(e.to_string())
        }
    }
}

/// Video catalog operations used by sync and the manual queue
#[async_trait]
pub trait Discovery: Send + Sync {
    /// Videos of `channel_id` published strictly after `after`
    async fn search(
        &self,
        channel_id: &str,
        after: DateTime<Utc>,
    ) -> Result<Vec<DiscoveredVideo>, DiscoveryError>;

    async fn get(&self, video_id: &str) -> Result<VideoDetails, DiscoveryError>;

    async fn get_channel(&self, lookup: &ChannelLookup) -> Result<ChannelInfo, DiscoveryError>;
}
