use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Runtime settings for leo-sync.
///
/// These describe where things live and how patient to be. Channels,
/// queue and credentials are not settings; they live in the state file
/// (see [`crate::state`]).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Content-intake site
    pub site: SiteConfig,

    /// YouTube endpoints
    pub youtube: YouTubeConfig,

    /// Publish polling bounds
    pub publish: PublishConfig,

    /// HTTP client settings
    pub http: HttpConfig,

    /// Log filter used when RUST_LOG is unset
    pub log_level: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SiteConfig {
    /// Base URL, e.g. http://lingualeo.com
    pub base_url: String,

    /// Login page path
    pub login_path: String,

    /// "Add content" form path
    pub add_content_path: String,

    /// Form field receiving the video link
    pub link_field: String,

    /// Form field receiving the title
    pub title_field: String,

    /// File field receiving the subtitles
    pub subtitles_field: String,

    /// Option selected as the genre
    pub genre_selector: String,

    /// Add-content form
    pub form_selector: String,

    /// Publish button shown once the upload is processed
    pub publish_selector: String,

    /// Login form fields
    pub email_field: String,
    pub password_field: String,
    pub login_form_selector: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct YouTubeConfig {
    /// Data API base URL
    pub api_base: String,

    /// Timed-text endpoint
    pub captions_endpoint: String,

    /// Caption language code
    pub caption_language: String,

    /// Maximum search results per channel
    pub max_results: u32,

    /// Watch URL prefix used for the form's link field
    pub watch_prefix: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PublishConfig {
    /// Attempts at clicking the publish button
    pub max_attempts: u32,

    /// Delay between attempts (seconds)
    pub retry_delay_seconds: u64,

    /// Overall limit on the poll (seconds)
    pub timeout_seconds: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    /// Request timeout in seconds
    pub timeout_seconds: u64,

    pub user_agent: String,
}

impl SiteConfig {
    pub fn login_url(&self) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), self.login_path)
    }

    pub fn add_content_url(&self) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), self.add_content_path)
    }
}

impl PublishConfig {
    pub fn retry_delay(&self) -> Duration {
        Duration::from_secs(self.retry_delay_seconds)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }
}

impl Settings {
    /// Load settings, trying an explicit path first and then the usual
    /// locations. Falls back to defaults when nothing is found.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            let content = std::fs::read_to_string(path)
                .map_err(|e| anyhow!("Failed to read settings {}: {}", path.display(), e))?;
            let settings: Settings = toml::from_str(&content)
                .map_err(|e| anyhow!("Failed to parse settings {}: {}", path.display(), e))?;
            tracing::info!("📄 Loaded settings from: {}", path.display());
            return Ok(settings.with_env_overrides());
        }

        let settings_paths = ["leo-sync.toml", "config/leo-sync.toml"];

        for path in &settings_paths {
            if let Ok(content) = std::fs::read_to_string(path) {
                match toml::from_str::<Settings>(&content) {
                    Ok(settings) => {
                        tracing::info!("📄 Loaded settings from: {}", path);
                        return Ok(settings.with_env_overrides());
                    }
                    Err(e) => {
                        tracing::warn!("Failed to parse settings file {}: {}", path, e);
                    }
                }
            }
        }

        Ok(Self::default().with_env_overrides())
    }

    /// Apply environment variable overrides
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(base_url) = std::env::var("LEO_SYNC_BASE_URL") {
            self.site.base_url = base_url;
        }

        if let Ok(log_level) = std::env::var("LEO_SYNC_LOG_LEVEL") {
            self.log_level = log_level;
        }

        if let Ok(attempts) = std::env::var("LEO_SYNC_PUBLISH_ATTEMPTS") {
            match attempts.parse() {
                Ok(attempts) => self.publish.max_attempts = attempts,
                Err(_) => tracing::warn!("Ignoring invalid LEO_SYNC_PUBLISH_ATTEMPTS: {}", attempts),
            }
        }

        self
    }

    /// Validate settings
    pub fn validate(&self) -> Result<()> {
        url::Url::parse(&self.site.base_url)
            .map_err(|e| anyhow!("Invalid site base_url {:?}: {}", self.site.base_url, e))?;
        url::Url::parse(&self.youtube.api_base)
            .map_err(|e| anyhow!("Invalid youtube api_base {:?}: {}", self.youtube.api_base, e))?;

        if self.publish.max_attempts == 0 {
            return Err(anyhow!("publish.max_attempts must be greater than 0"));
        }

        if self.publish.timeout_seconds == 0 {
            return Err(anyhow!("publish.timeout_seconds must be greater than 0"));
        }

        if self.http.timeout_seconds == 0 {
            return Err(anyhow!("http.timeout_seconds must be greater than 0"));
        }

        if self.youtube.caption_language.is_empty() {
            return Err(anyhow!("youtube.caption_language must not be empty"));
        }

        Ok(())
    }

    /// Get runtime settings summary
    pub fn summary(&self) -> String {
        format!(
            "leo-sync settings:\n\
            - Site: {}\n\
            - Caption language: {}\n\
            - Publish attempts: {} (every {}s, at most {}s)\n\
            - HTTP timeout: {}s",
            self.site.base_url,
            self.youtube.caption_language,
            self.publish.max_attempts,
            self.publish.retry_delay_seconds,
            self.publish.timeout_seconds,
            self.http.timeout_seconds
        )
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            site: SiteConfig::default(),
            youtube: YouTubeConfig::default(),
            publish: PublishConfig::default(),
            http: HttpConfig::default(),
            log_level: "leo_sync=info".to_string(),
        }
    }
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            base_url: "http://lingualeo.com".to_string(),
            login_path: "/ru/login".to_string(),
            add_content_path: "/ru/jungle/add".to_string(),
            link_field: "content_embed".to_string(),
            title_field: "content_name".to_string(),
            subtitles_field: "content_srt".to_string(),
            genre_selector: "#genre_id > option[value=\"10\"]".to_string(),
            form_selector: "#addContentForm".to_string(),
            publish_selector: "#publicContentBtn".to_string(),
            email_field: "email".to_string(),
            password_field: "password".to_string(),
            login_form_selector: "form".to_string(),
        }
    }
}

impl Default for YouTubeConfig {
    fn default() -> Self {
        Self {
            api_base: "https://www.googleapis.com/youtube/v3".to_string(),
            captions_endpoint: "http://video.google.com/timedtext".to_string(),
            caption_language: "en".to_string(),
            max_results: 50,
            watch_prefix: "https://www.youtube.com/watch?v=".to_string(),
        }
    }
}

impl Default for PublishConfig {
    fn default() -> Self {
        Self {
            max_attempts: 20,
            retry_delay_seconds: 5,
            timeout_seconds: 180, // processing usually finishes within a minute
        }
    }
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_seconds: 30,
            user_agent: "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36".to_string(),
        }
    }
}
