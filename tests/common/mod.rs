//! In-memory collaborators for integration tests.
#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use leo_sync::config::Settings;
use leo_sync::orchestrator::UploadOrchestrator;
use leo_sync::state::{Channel, Credentials, SyncState};
use leo_sync::discovery::{
    ChannelInfo, ChannelLookup, DiscoveredVideo, Discovery, DiscoveryError, VideoDetails,
};
use leo_sync::upload::{AutomationError, FormAutomator};
use leo_sync::CaptionSource;

pub const EMAIL: &str = "me@example.com";
pub const PASSWORD: &str = "secret";

pub fn at(day: u32, h: u32, m: u32, s: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2017, 7, day, h, m, s).unwrap()
}

pub fn video(id: &str, title: &str, published_at: DateTime<Utc>) -> DiscoveredVideo {
    DiscoveredVideo {
        id: id.to_string(),
        title: title.to_string(),
        published_at,
    }
}

/// Settings with no waiting between publish attempts
pub fn test_settings() -> Settings {
    let mut settings = Settings::default();
    settings.publish.max_attempts = 3;
    settings.publish.retry_delay_seconds = 0;
    settings.publish.timeout_seconds = 5;
    settings
}

/// State with valid credentials and the given channels
pub fn state_with(channels: Vec<Channel>) -> SyncState {
    let mut credentials = Credentials::new();
    credentials.insert("email", EMAIL);
    credentials.insert("password", PASSWORD);
    credentials.insert("api_key", "KEY");
    SyncState {
        credentials,
        channels,
        queue: Vec::new(),
    }
}

pub fn orchestrator_with(
    settings: Settings,
    discovery: FakeDiscovery,
    captions: FakeCaptions,
    site: FakeSite,
    work_dir: &tempfile::TempDir,
) -> UploadOrchestrator {
    UploadOrchestrator::new(Box::new(discovery), Box::new(captions), Box::new(site), settings)
        .with_work_dir(work_dir.path().to_path_buf())
}

pub const CAPTIONS: &str = r#"<?xml version="1.0" encoding="utf-8" ?><transcript><text start="1" dur="2.5">Hello</text></transcript>"#;

pub enum SearchFailure {
    Api,
    Transport,
}

/// Catalog answering from fixed data.
/// `search` honours the watermark the way the real API does.
#[derive(Default)]
pub struct FakeDiscovery {
    pub videos: HashMap<String, Vec<DiscoveredVideo>>,
    pub failures: HashMap<String, SearchFailure>,
    pub details: HashMap<String, VideoDetails>,
    pub channels: Vec<ChannelInfo>,
    pub usernames: HashMap<String, String>,
    pub offline: bool,
}

impl FakeDiscovery {
    pub fn with_channel(mut self, channel_id: &str, videos: Vec<DiscoveredVideo>) -> Self {
        self.videos.insert(channel_id.to_string(), videos);
        self
    }

    pub fn with_failure(mut self, channel_id: &str, failure: SearchFailure) -> Self {
        self.failures.insert(channel_id.to_string(), failure);
        self
    }

    pub fn with_video(mut self, id: &str, title: &str, channel_id: &str) -> Self {
        self.details.insert(
            id.to_string(),
            VideoDetails {
                title: title.to_string(),
                channel_id: channel_id.to_string(),
            },
        );
        self
    }

    pub fn with_channel_info(mut self, id: &str, title: &str, username: Option<&str>) -> Self {
        self.channels.push(ChannelInfo {
            id: id.to_string(),
            title: title.to_string(),
        });
        if let Some(name) = username {
            self.usernames.insert(name.to_string(), id.to_string());
        }
        self
    }
}

#[async_trait]
impl Discovery for FakeDiscovery {
    async fn search(
        &self,
        channel_id: &str,
        after: DateTime<Utc>,
    ) -> Result<Vec<DiscoveredVideo>, DiscoveryError> {
        if self.offline {
            return Err(DiscoveryError::Transport("connection refused".to_string()));
        }
        match self.failures.get(channel_id) {
            Some(SearchFailure::Api) => {
                return Err(DiscoveryError::Api {
                    status: 403,
                    message: "quota exceeded".to_string(),
                })
            }
            Some(SearchFailure::Transport) => {
                return Err(DiscoveryError::Transport("connection reset".to_string()))
            }
            None => {}
        }

        Ok(self
            .videos
            .get(channel_id)
            .map(|videos| {
                videos
                    .iter()
                    .filter(|v| v.published_at > after)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn get(&self, video_id: &str) -> Result<VideoDetails, DiscoveryError> {
        if self.offline {
            return Err(DiscoveryError::Transport("connection refused".to_string()));
        }
        self.details
            .get(video_id)
            .cloned()
            .ok_or_else(|| DiscoveryError::NotFound(video_id.to_string()))
    }

    async fn get_channel(&self, lookup: &ChannelLookup) -> Result<ChannelInfo, DiscoveryError> {
        if self.offline {
            return Err(DiscoveryError::Transport("connection refused".to_string()));
        }
        let id = match lookup {
            ChannelLookup::Id(id) => id.clone(),
            ChannelLookup::Username(name) => self
                .usernames
                .get(name)
                .cloned()
                .ok_or_else(|| DiscoveryError::NotFound(name.clone()))?,
        };
        self.channels
            .iter()
            .find(|c| c.id == id)
            .cloned()
            .ok_or_else(|| DiscoveryError::NotFound(id))
    }
}

/// Captions keyed by video id; unknown ids have none
#[derive(Default)]
pub struct FakeCaptions {
    pub markup: HashMap<String, String>,
    pub unreachable: HashSet<String>,
}

impl FakeCaptions {
    pub fn with(mut self, video_id: &str, markup: &str) -> Self {
        self.markup.insert(video_id.to_string(), markup.to_string());
        self
    }

    pub fn unreachable_for(mut self, video_id: &str) -> Self {
        self.unreachable.insert(video_id.to_string());
        self
    }
}

#[async_trait]
impl CaptionSource for FakeCaptions {
    async fn fetch(&self, video_id: &str, language: &str) -> Result<Option<String>, DiscoveryError> {
        assert_eq!(language, "en");
        if self.unreachable.contains(video_id) {
            return Err(DiscoveryError::Transport("timed out".to_string()));
        }
        Ok(self.markup.get(video_id).cloned())
    }
}

/// A form submission as the site received it
#[derive(Debug, Clone)]
pub struct Submission {
    pub link: String,
    pub title: String,
    pub subtitles: String,
    pub genre_selected: bool,
}

/// What the simulated site saw, shared with the test after the session
/// has been handed to the orchestrator.
#[derive(Debug, Default)]
pub struct SiteLog {
    pub submissions: Vec<Submission>,
    pub published: Vec<String>,
    pub sign_in_attempts: usize,
    pub subtitle_paths: Vec<String>,
    pub refreshes: usize,
}

/// How the site reacts once a form for a given title is submitted
#[derive(Debug, Clone, Copy)]
pub enum PublishBehavior {
    /// Publish button present right away
    Ready,
    /// Publish button appears after this many refreshes
    AfterRefreshes(usize),
    /// Processing never finishes
    Never,
    /// Form rejected; the page stays on the add form
    Rejected,
    /// Publish control exists but only works from a script
    ScriptOnly,
}

/// Page-level simulation of the intake site
pub struct FakeSite {
    base: String,
    settings: Settings,
    url: String,
    staged: HashMap<String, String>,
    genre_selected: bool,
    refreshes: usize,
    current_behavior: PublishBehavior,
    behaviors: HashMap<String, PublishBehavior>,
    pub log: Arc<Mutex<SiteLog>>,
    pub offline_on_submit: bool,
}

impl FakeSite {
    pub fn new(settings: &Settings) -> Self {
        Self {
            base: settings.site.base_url.clone(),
            settings: settings.clone(),
            url: "about:blank".to_string(),
            staged: HashMap::new(),
            genre_selected: false,
            refreshes: 0,
            current_behavior: PublishBehavior::Ready,
            behaviors: HashMap::new(),
            log: Arc::new(Mutex::new(SiteLog::default())),
            offline_on_submit: false,
        }
    }

    /// Behaviour for a composed title (default is [`PublishBehavior::Ready`])
    pub fn behave(mut self, title: &str, behavior: PublishBehavior) -> Self {
        self.behaviors.insert(title.to_string(), behavior);
        self
    }

    pub fn log(&self) -> Arc<Mutex<SiteLog>> {
        Arc::clone(&self.log)
    }

    fn on(&self, path: &str) -> bool {
        self.url == format!("{}{}", self.base, path)
    }

    fn publish_ready(&self) -> bool {
        match self.current_behavior {
            PublishBehavior::Ready => true,
            PublishBehavior::AfterRefreshes(n) => self.refreshes >= n,
            PublishBehavior::Never | PublishBehavior::Rejected | PublishBehavior::ScriptOnly => false,
        }
    }
}

#[async_trait]
impl FormAutomator for FakeSite {
    async fn navigate(&mut self, url: &str) -> Result<(), AutomationError> {
        self.url = url.to_string();
        self.staged.clear();
        self.genre_selected = false;
        Ok(())
    }

    async fn fill_field(&mut self, name: &str, value: &str) -> Result<(), AutomationError> {
        self.staged.insert(name.to_string(), value.to_string());
        Ok(())
    }

    async fn click(&mut self, selector: &str) -> Result<(), AutomationError> {
        let site = &self.settings.site;
        if selector == site.genre_selector && self.on(&site.add_content_path) {
            self.genre_selected = true;
            return Ok(());
        }
        if selector == site.publish_selector
            && self.url.contains("/ru/jungle/content/")
            && matches!(self.current_behavior, PublishBehavior::ScriptOnly)
        {
            return Err(AutomationError::NotActionable(selector.to_string()));
        }
        if selector == site.publish_selector && self.url.contains("/ru/jungle/content/") && self.publish_ready() {
            self.log.lock().unwrap().published.push(self.url.clone());
            self.url = format!("{}/published", self.url);
            return Ok(());
        }
        Err(AutomationError::ElementNotFound(selector.to_string()))
    }

    async fn submit(&mut self, selector: &str) -> Result<(), AutomationError> {
        if self.offline_on_submit {
            return Err(AutomationError::Transport("connection reset".to_string()));
        }
        let site = self.settings.site.clone();

        if self.on(&site.login_path) {
            self.log.lock().unwrap().sign_in_attempts += 1;
            let ok = self.staged.get(&site.email_field).map(String::as_str) == Some(EMAIL)
                && self.staged.get(&site.password_field).map(String::as_str) == Some(PASSWORD);
            if ok {
                self.url = format!("{}/ru/dashboard", self.base);
            }
            return Ok(());
        }

        if self.on(&site.add_content_path) && selector == site.form_selector {
            let title = self.staged.get(&site.title_field).cloned().unwrap_or_default();
            let path = self.staged.get(&site.subtitles_field).cloned().unwrap_or_default();
            let subtitles = std::fs::read_to_string(&path)?;

            let mut log = self.log.lock().unwrap();
            log.subtitle_paths.push(path);
            log.submissions.push(Submission {
                link: self.staged.get(&site.link_field).cloned().unwrap_or_default(),
                title: title.clone(),
                subtitles,
                genre_selected: self.genre_selected,
            });

            self.current_behavior = self
                .behaviors
                .get(&title)
                .copied()
                .unwrap_or(PublishBehavior::Ready);
            self.refreshes = 0;
            if !matches!(self.current_behavior, PublishBehavior::Rejected) {
                self.url = format!("{}/ru/jungle/content/{}", self.base, log.submissions.len());
            }
            return Ok(());
        }

        Err(AutomationError::ElementNotFound(selector.to_string()))
    }

    fn current_url(&self) -> String {
        self.url.clone()
    }

    async fn refresh(&mut self) -> Result<(), AutomationError> {
        self.refreshes += 1;
        self.log.lock().unwrap().refreshes += 1;
        Ok(())
    }
}
