use chrono::{DateTime, Duration, SubsecRound, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::error::{Result, SyncError};

/// A monitored channel and its discovery watermark
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Channel {
    /// Channel id
    #[serde(alias = "channel_id")]
    pub id: String,

    /// Display name, also used as the title alias
    #[serde(alias = "channel_title")]
    pub name: String,

    /// Exclusive lower bound for the next discovery query
    #[serde(alias = "last_refresh", alias = "current_time")]
    pub watermark: DateTime<Utc>,
}

impl Channel {
    pub fn new(id: impl Into<String>, name: impl Into<String>, watermark: DateTime<Utc>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            watermark,
        }
    }

    /// Move the watermark past a video published at `published_at`.
    ///
    /// The new watermark is the publish time truncated to the second plus
    /// one second. It never moves backwards.
    pub fn advance_past(&mut self, published_at: DateTime<Utc>) {
        let next = watermark_after(published_at);
        if next > self.watermark {
            self.watermark = next;
        }
    }
}

/// Watermark that excludes a video published at `published_at`
pub fn watermark_after(published_at: DateTime<Utc>) -> DateTime<Utc> {
    published_at.trunc_subsecs(0) + Duration::seconds(1)
}

/// A video waiting for upload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueuedVideo {
    pub id: String,
    pub title: String,
    #[serde(rename = "channelName", alias = "channel_name")]
    pub channel_name: String,
}

impl QueuedVideo {
    pub fn new(id: impl Into<String>, title: impl Into<String>, channel_name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            channel_name: channel_name.into(),
        }
    }
}

/// Credentials are passed through untouched; the core never inspects them
/// beyond reading named string fields.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Credentials(Map<String, Value>);

impl Credentials {
    pub fn new() -> Self {
        Self(Map::new())
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(Value::as_str)
    }

    /// Read a required string field
    pub fn require(&self, key: &str) -> Result<&str> {
        self.get(key)
            .filter(|v| !v.is_empty())
            .ok_or_else(|| SyncError::Config(format!("credentials.{} is missing", key)))
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.0.insert(key.into(), Value::String(value.into()));
    }
}

/// Everything persisted between runs
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SyncState {
    #[serde(default)]
    pub credentials: Credentials,

    #[serde(default)]
    pub channels: Vec<Channel>,

    #[serde(default, alias = "extra_videos")]
    pub queue: Vec<QueuedVideo>,
}

impl SyncState {
    pub fn channel_mut(&mut self, id: &str) -> Option<&mut Channel> {
        self.channels.iter_mut().find(|c| c.id == id)
    }

    pub fn has_channel(&self, id: &str) -> bool {
        self.channels.iter().any(|c| c.id == id)
    }
}

/// Legacy state files kept credentials at the top level.
const LEGACY_CREDENTIAL_KEYS: [&str; 3] = ["email", "password", "api_key"];

/// Bring an older state document into the canonical shape.
///
/// Field renames inside channels and queue entries are handled by serde
/// aliases; this only moves top-level credential fields.
pub fn migrate_legacy(mut doc: Value) -> Value {
    if let Some(root) = doc.as_object_mut() {
        let mut moved = Map::new();
        for key in LEGACY_CREDENTIAL_KEYS {
            if let Some(value) = root.remove(key) {
                moved.insert(key.to_string(), value);
            }
        }

        if !moved.is_empty() {
            debug!("Migrating {} top-level credential field(s)", moved.len());
            let credentials = root
                .entry("credentials")
                .or_insert_with(|| Value::Object(Map::new()));
            if let Some(existing) = credentials.as_object_mut() {
                for (key, value) in moved {
                    existing.entry(key).or_insert(value);
                }
            }
        }
    }

    doc
}

/// Loads and saves [`SyncState`]; the only component touching the state file.
#[derive(Debug, Clone)]
pub struct StateStore {
    path: PathBuf,
}

impl StateStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the state. Any I/O, JSON or schema problem is a config error.
    pub fn load(&self) -> Result<SyncState> {
        let content = std::fs::read_to_string(&self.path).map_err(|e| {
            SyncError::Config(format!("cannot read {}: {}", self.path.display(), e))
        })?;

        let doc: Value = serde_json::from_str(&content).map_err(|e| {
            SyncError::Config(format!("{} is not valid JSON: {}", self.path.display(), e))
        })?;

        let state: SyncState = serde_json::from_value(migrate_legacy(doc)).map_err(|e| {
            SyncError::Config(format!("{} has an invalid layout: {}", self.path.display(), e))
        })?;

        debug!(
            "📁 Loaded state: {} channel(s), {} queued video(s)",
            state.channels.len(),
            state.queue.len()
        );
        Ok(state)
    }

    /// Overwrite the state file with `state`.
    ///
    /// Writes a sibling file first and renames it into place.
    pub fn save(&self, state: &SyncState) -> Result<()> {
        let json_content = serde_json::to_string_pretty(state)?;

        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        let mut tmp = tempfile::NamedTempFile::new_in(&dir)?;
        std::io::Write::write_all(&mut tmp, json_content.as_bytes())?;
        tmp.persist(&self.path).map_err(|e| SyncError::State(e.to_string()))?;

        debug!("💾 Saved state to: {}", self.path.display());
        Ok(())
    }

    /// Create a fresh state file holding only credentials.
    pub fn init(&self, credentials: Credentials) -> Result<SyncState> {
        if self.path.exists() {
            return Err(SyncError::Config(format!(
                "{} already exists",
                self.path.display()
            )));
        }

        let state = SyncState {
            credentials,
            ..SyncState::default()
        };
        self.save(&state)?;
        info!("🆕 Created state file: {}", self.path.display());
        Ok(state)
    }

    /// Empty the queue, returning how many entries were dropped.
    pub fn clear_queue(&self) -> Result<usize> {
        let mut state = self.load()?;
        let cleared = state.queue.len();
        state.queue.clear();
        self.save(&state)?;
        info!("🧹 Cleared {} video(s)", cleared);
        Ok(cleared)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use tempfile::TempDir;

    fn at(h: u32, m: u32, s: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2017, 7, 9, h, m, s).unwrap()
    }

    #[test]
    fn test_watermark_after_truncates_and_adds_second() {
        let published = at(12, 0, 0) + Duration::milliseconds(750);
        assert_eq!(watermark_after(published), at(12, 0, 1));
        assert_eq!(watermark_after(at(23, 59, 59)), Utc.with_ymd_and_hms(2017, 7, 10, 0, 0, 0).unwrap());
    }

    #[test]
    fn test_advance_never_moves_backwards() {
        let mut channel = Channel::new("UC1", "ACME", at(15, 0, 0));
        channel.advance_past(at(10, 0, 0));
        assert_eq!(channel.watermark, at(15, 0, 0));

        channel.advance_past(at(16, 30, 0));
        assert_eq!(channel.watermark, at(16, 30, 1));
    }

    #[test]
    fn test_canonical_serialization() {
        let state = SyncState {
            credentials: Credentials::new(),
            channels: vec![Channel::new("UC1", "ACME", at(12, 0, 1))],
            queue: vec![QueuedVideo::new("dQw4w9WgXcQ", "Foo", "ACME")],
        };

        let json = serde_json::to_value(&state).unwrap();
        assert_eq!(json["channels"][0]["watermark"], "2017-07-09T12:00:01Z");
        assert_eq!(json["queue"][0]["channelName"], "ACME");

        let text = serde_json::to_string(&state).unwrap();
        let creds = text.find("\"credentials\"").unwrap();
        let channels = text.find("\"channels\"").unwrap();
        let queue = text.find("\"queue\"").unwrap();
        assert!(creds < channels && channels < queue);
    }

    #[test]
    fn test_legacy_layout_is_migrated() {
        let legacy = serde_json::json!({
            "api_key": "KEY",
            "email": "me@example.com",
            "password": "secret",
            "channels": [
                {"id": "UC1", "name": "ACME", "last_refresh": "2017-07-09T12:00:00Z"},
                {"channel_id": "UC2", "channel_title": "TEDEd", "current_time": "2017-07-10T08:00:00Z"}
            ],
            "extra_videos": [
                {"id": "dQw4w9WgXcQ", "title": "Foo", "channel_name": "ACME"}
            ]
        });

        let state: SyncState = serde_json::from_value(migrate_legacy(legacy)).unwrap();

        assert_eq!(state.credentials.get("api_key"), Some("KEY"));
        assert_eq!(state.credentials.get("email"), Some("me@example.com"));
        assert_eq!(state.channels[0].watermark, at(12, 0, 0));
        assert_eq!(state.channels[1].id, "UC2");
        assert_eq!(state.channels[1].name, "TEDEd");
        assert_eq!(state.queue, vec![QueuedVideo::new("dQw4w9WgXcQ", "Foo", "ACME")]);
    }

    #[test]
    fn test_store_round_trip_and_clear() {
        let dir = TempDir::new().unwrap();
        let store = StateStore::new(dir.path().join("data.json"));

        let mut credentials = Credentials::new();
        credentials.insert("api_key", "KEY");
        let mut state = store.init(credentials).unwrap();
        assert!(store.init(Credentials::new()).is_err());

        state.channels.push(Channel::new("UC1", "ACME", at(12, 0, 0)));
        state.queue.push(QueuedVideo::new("a", "A", "ACME"));
        state.queue.push(QueuedVideo::new("a", "A", "ACME"));
        store.save(&state).unwrap();

        let loaded = store.load().unwrap();
        assert_eq!(loaded, state);

        assert_eq!(store.clear_queue().unwrap(), 2);
        let cleared = store.load().unwrap();
        assert!(cleared.queue.is_empty());
        assert_eq!(cleared.channels, state.channels);
    }

    #[test]
    fn test_load_errors_are_config_errors() {
        let dir = TempDir::new().unwrap();
        let missing = StateStore::new(dir.path().join("missing.json"));
        assert!(matches!(missing.load(), Err(SyncError::Config(_))));

        let path = dir.path().join("broken.json");
        std::fs::write(&path, "{not json").unwrap();
        assert!(matches!(StateStore::new(&path).load(), Err(SyncError::Config(_))));

        let path = dir.path().join("bad_channel.json");
        std::fs::write(&path, r#"{"channels": [{"id": "UC1"}]}"#).unwrap();
        assert!(matches!(StateStore::new(&path).load(), Err(SyncError::Config(_))));
    }

    #[test]
    fn test_require_credentials() {
        let mut credentials = Credentials::new();
        credentials.insert("email", "");
        assert!(credentials.require("email").is_err());
        assert!(credentials.require("password").is_err());
        credentials.insert("password", "pw");
        assert_eq!(credentials.require("password").unwrap(), "pw");
    }
}
