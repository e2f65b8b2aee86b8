//! Manually requested work: extra videos and new channels.

use chrono::{DateTime, SubsecRound, Utc};
use regex::Regex;
use std::sync::OnceLock;
use tracing::{info, warn};

use crate::discovery::{ChannelLookup, Discovery};
use crate::error::{Result, SyncError};
use crate::state::{Channel, QueuedVideo, SyncState};

fn compiled(cell: &'static OnceLock<Option<Regex>>, pattern: &str) -> Option<&'static Regex> {
    cell.get_or_init(|| Regex::new(pattern).ok()).as_ref()
}

fn video_id_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    compiled(&PATTERN, r"(?:youtube\.com/watch\?v=|youtu\.be/)(.{11})")
}

fn channel_id_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    compiled(&PATTERN, r"youtube\.com/channel/(.{24})")
}

fn username_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    compiled(&PATTERN, r"youtube\.com/user/([^/?#]+)")
}

/// Extract the 11-character video id from a watch or short URL
pub fn extract_video_id(url: &str) -> Option<String> {
    video_id_pattern()?
        .captures(url)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

/// Work out how to look up the channel behind a channel or user URL
pub fn parse_channel_url(url: &str) -> Option<ChannelLookup> {
    if let Some(caps) = channel_id_pattern().and_then(|re| re.captures(url)) {
        return caps.get(1).map(|m| ChannelLookup::Id(m.as_str().to_string()));
    }
    username_pattern()?
        .captures(url)
        .and_then(|caps| caps.get(1))
        .map(|m| ChannelLookup::Username(m.as_str().to_string()))
}

/// Adds user-requested videos and channels to the sync state
pub struct ManualQueueManager<'a> {
    discovery: &'a dyn Discovery,
}

impl<'a> ManualQueueManager<'a> {
    pub fn new(discovery: &'a dyn Discovery) -> Self {
        Self { discovery }
    }

    /// Queue videos by URL.
    ///
    /// The batch is all-or-nothing: every URL is validated before any is
    /// resolved, and nothing is appended unless every video resolves.
    pub async fn enqueue_videos(&self, urls: &[String], state: &mut SyncState) -> Result<usize> {
        let mut ids = Vec::with_capacity(urls.len());
        for url in urls {
            let id = extract_video_id(url).ok_or_else(|| SyncError::InvalidUrl(url.clone()))?;
            ids.push(id);
        }

        let mut resolved = Vec::with_capacity(ids.len());
        for id in ids {
            let details = self.discovery.get(&id).await?;
            let channel = self
                .discovery
                .get_channel(&ChannelLookup::Id(details.channel_id.clone()))
                .await?;

            info!("➕ Queued {} ({}) from {}", details.title, id, channel.title);
            resolved.push(QueuedVideo::new(id, details.title, channel.title));
        }

        let added = resolved.len();
        state.queue.extend(resolved);
        Ok(added)
    }

    /// Register channels by URL, starting their watermark at `now`.
    ///
    /// Unrecognised URLs and failed lookups are skipped with a warning;
    /// only transport failures stop the batch.
    pub async fn register_channels(
        &self,
        urls: &[String],
        state: &mut SyncState,
        now: DateTime<Utc>,
    ) -> Result<usize> {
        let mut added = 0;

        for url in urls {
            let Some(lookup) = parse_channel_url(url) else {
                warn!("Not valid channel URL: {}", url);
                continue;
            };

            let info = match self.discovery.get_channel(&lookup).await {
                Ok(info) => info,
                Err(e) if e.is_transport() => return Err(e.into()),
                Err(e) => {
                    warn!("Cannot resolve channel {}: {}", url, e);
                    continue;
                }
            };

            if state.has_channel(&info.id) {
                warn!("Channel \"{}\" is already registered", info.title);
                continue;
            }

            info!("📺 Registered channel \"{}\" ({})", info.title, info.id);
            state
                .channels
                .push(Channel::new(info.id, info.title, now.trunc_subsecs(0)));
            added += 1;
        }

        Ok(added)
    }
}
