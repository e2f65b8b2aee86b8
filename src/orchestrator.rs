//! Channel sync and upload orchestration.
//!
//! Every video goes through the same stages:
//!
//! ```text
//! Discovered -> CaptionsFetched -> FormFilled -> Submitted -> PublishPending
//!     -> Published | NeedsPublish | Failed(reason)
//! ```
//!
//! Per-video failures are recorded and queued, never propagated. Only
//! run-level problems (lost network) come back as `Err`, after all state
//! changes made so far have been applied to the [`SyncState`], so the
//! caller can still persist them.

use serde::Serialize;
use std::io::Write;
use std::path::PathBuf;
use tracing::{debug, error, info, warn};

use crate::captions::{markup_to_srt, CaptionSource};
use crate::config::Settings;
use crate::discovery::{DiscoveredVideo, Discovery};
use crate::error::{Result, SyncError};
use crate::state::{Channel, Credentials, QueuedVideo, StateStore, SyncState};
use crate::upload::{same_page, sign_in, AutomationError, FormAutomator};

/// Genre applied to every uploaded item. The option picked by
/// `site.genre_selector` carries this label.
pub const GENRE_TAG: &str = "Educational video";

/// Alias meaning "use the bare video title"
pub const NO_PREFIX_ALIAS: &str = "-";

/// Channel whose titles end with a " - Speaker Name" suffix
pub const SPEAKER_SUFFIX_ALIAS: &str = "TEDEd";

/// Stages a single upload goes through before an outcome is known
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum UploadStage {
    Discovered,
    CaptionsFetched,
    FormFilled,
    Submitted,
    PublishPending,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum FailureReason {
    /// No captions in the requested language
    NoCaptions,
    /// Captions could not be fetched or parsed
    BadCaptions(String),
    /// The intake form rejected the input, usually an invalid title
    InvalidForm,
    /// An expected page element was missing
    Automation { stage: UploadStage, message: String },
}

impl std::fmt::Display for FailureReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FailureReason::NoCaptions => write!(f, "English subtitles not found"),
            FailureReason::BadCaptions(msg) => write!(f, "unusable subtitles: {}", msg),
            FailureReason::InvalidForm => write!(f, "cannot submit form, probably the name is incorrect"),
            FailureReason::Automation { stage, message } => {
                write!(f, "page automation failed after {:?}: {}", stage, message)
            }
        }
    }
}

/// Result of one upload attempt
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum UploadOutcome {
    Published { url: String },
    /// Uploaded, but the publish button never showed up in time
    NeedsPublish { url: String },
    Failed(FailureReason),
}

impl UploadOutcome {
    pub fn is_failed(&self) -> bool {
        matches!(self, UploadOutcome::Failed(_))
    }
}

/// Per-video line of the run report
#[derive(Debug, Clone, Serialize)]
pub struct VideoResult {
    pub id: String,
    pub title: String,
    pub channel: String,
    pub outcome: UploadOutcome,
}

/// Summary of a run
#[derive(Debug, Clone, Default, Serialize)]
pub struct SyncReport {
    pub published: usize,
    pub needs_publish: usize,
    pub failed: usize,
    pub skipped_channels: Vec<String>,
    pub results: Vec<VideoResult>,
}

impl SyncReport {
    fn record(&mut self, id: &str, title: &str, channel: &str, outcome: UploadOutcome) {
        match outcome {
            UploadOutcome::Published { .. } => self.published += 1,
            UploadOutcome::NeedsPublish { .. } => self.needs_publish += 1,
            UploadOutcome::Failed(_) => self.failed += 1,
        }
        self.results.push(VideoResult {
            id: id.to_string(),
            title: title.to_string(),
            channel: channel.to_string(),
            outcome,
        });
    }

    pub fn attempted(&self) -> usize {
        self.results.len()
    }
}

/// New videos found for one channel, oldest first
#[derive(Debug, Clone)]
pub struct ChannelPlan {
    pub channel_id: String,
    pub alias: String,
    pub videos: Vec<DiscoveredVideo>,
}

/// Outcome of the discovery pass. Building it mutates nothing.
#[derive(Debug, Clone, Default)]
pub struct DiscoveryPlan {
    pub channels: Vec<ChannelPlan>,
    pub skipped: Vec<String>,
}

impl DiscoveryPlan {
    pub fn video_count(&self) -> usize {
        self.channels.iter().map(|c| c.videos.len()).sum()
    }

    pub fn has_work(&self) -> bool {
        self.video_count() > 0
    }
}

/// Compose the title shown on the intake site
pub fn compose_title(alias: &str, title: &str) -> String {
    match alias {
        NO_PREFIX_ALIAS => title.to_string(),
        SPEAKER_SUFFIX_ALIAS => match title.rsplit_once(" - ") {
            Some((head, _speaker)) => head.to_string(),
            None => title.to_string(),
        },
        _ => format!("{} - {}", alias, title),
    }
}

enum PollResult {
    Published(String),
    InvalidForm,
    Exhausted,
}

/// Drives discovery, caption conversion and form uploads, one video at a time
pub struct UploadOrchestrator {
    discovery: Box<dyn Discovery>,
    captions: Box<dyn CaptionSource>,
    automator: Box<dyn FormAutomator>,
    settings: Settings,
    work_dir: Option<PathBuf>,
    report: SyncReport,
}

impl UploadOrchestrator {
    pub fn new(
        discovery: Box<dyn Discovery>,
        captions: Box<dyn CaptionSource>,
        automator: Box<dyn FormAutomator>,
        settings: Settings,
    ) -> Self {
        Self {
            discovery,
            captions,
            automator,
            settings,
            work_dir: None,
            report: SyncReport::default(),
        }
    }

    /// Directory for temporary subtitle files (system temp dir by default)
    pub fn with_work_dir(mut self, dir: PathBuf) -> Self {
        self.work_dir = Some(dir);
        self
    }

    pub fn report(&self) -> &SyncReport {
        &self.report
    }

    pub fn discovery(&self) -> &dyn Discovery {
        self.discovery.as_ref()
    }

    /// Sign in to the intake site; must happen before any upload
    pub async fn sign_in(&mut self, credentials: &Credentials) -> Result<()> {
        sign_in(self.automator.as_mut(), &self.settings.site, credentials).await
    }

    /// Look for new videos on every channel without touching state.
    ///
    /// A channel whose search fails is skipped for this run. Transport
    /// failures abort the whole pass.
    pub async fn discover(&mut self, channels: &[Channel]) -> Result<DiscoveryPlan> {
        let mut plan = DiscoveryPlan::default();

        for channel in channels {
            match self.discovery.search(&channel.id, channel.watermark).await {
                Ok(mut videos) => {
                    // stable: equal publish times keep discovery order
                    videos.sort_by_key(|v| v.published_at);
                    plan.channels.push(ChannelPlan {
                        channel_id: channel.id.clone(),
                        alias: channel.name.clone(),
                        videos,
                    });
                }
                Err(e) if e.is_transport() => return Err(e.into()),
                Err(e) => {
                    warn!("Cannot get videos from channel \"{}\": {}", channel.name, e);
                    plan.skipped.push(channel.name.clone());
                }
            }
        }

        self.report.skipped_channels.extend(plan.skipped.iter().cloned());
        Ok(plan)
    }

    /// Upload discovered videos, channel by channel, oldest first.
    ///
    /// Every finished attempt advances the channel watermark; failures are
    /// appended to the queue.
    pub async fn process_plan(&mut self, plan: DiscoveryPlan, state: &mut SyncState) -> Result<()> {
        for channel in plan.channels {
            info!("🔍 Checking {}...", channel.alias);
            if channel.videos.is_empty() {
                info!("  No new videos");
                continue;
            }
            info!("  Found {} new video(s)", channel.videos.len());

            for video in channel.videos {
                let outcome = self.process_video(&video.id, &video.title, &channel.alias).await?;

                if outcome.is_failed() {
                    state
                        .queue
                        .push(QueuedVideo::new(&video.id, &video.title, &channel.alias));
                }

                match state.channel_mut(&channel.channel_id) {
                    Some(entry) => entry.advance_past(video.published_at),
                    None => warn!("Channel {} vanished from state", channel.channel_id),
                }

                self.report
                    .record(&video.id, &video.title, &channel.alias, outcome);
            }
        }

        Ok(())
    }

    /// Discover and upload new videos for every channel in `state`
    pub async fn sync(&mut self, state: &mut SyncState) -> Result<()> {
        let plan = self.discover(&state.channels).await?;
        self.process_plan(plan, state).await
    }

    /// Retry every queued video. Entries that fail again stay queued.
    pub async fn replay_queue(&mut self, state: &mut SyncState) -> Result<()> {
        let backlog = std::mem::take(&mut state.queue);
        self.replay_entries(backlog, state).await
    }

    async fn replay_entries(&mut self, backlog: Vec<QueuedVideo>, state: &mut SyncState) -> Result<()> {
        info!("📋 Checking extra videos...");
        if backlog.is_empty() {
            info!("  No extra videos");
            return Ok(());
        }
        info!("  Found {} video(s)", backlog.len());

        let mut pending = backlog.into_iter();
        while let Some(entry) = pending.next() {
            let outcome = match self
                .process_video(&entry.id, &entry.title, &entry.channel_name)
                .await
            {
                Ok(outcome) => outcome,
                Err(e) => {
                    // not attempted: keep it and everything after it
                    state.queue.push(entry);
                    state.queue.extend(pending);
                    return Err(e);
                }
            };

            if outcome.is_failed() {
                state.queue.push(entry.clone());
            }
            self.report
                .record(&entry.id, &entry.title, &entry.channel_name, outcome);
        }

        Ok(())
    }

    /// Upload a discovery plan, then replay the queue as it was before
    /// this run.
    pub async fn upload(&mut self, plan: DiscoveryPlan, state: &mut SyncState) -> Result<()> {
        let backlog = std::mem::take(&mut state.queue);

        if let Err(e) = self.process_plan(plan, state).await {
            state.queue.extend(backlog);
            return Err(e);
        }

        self.replay_entries(backlog, state).await
    }

    /// Full run without sign-in: discovery, uploads, queue replay
    pub async fn run(&mut self, state: &mut SyncState) -> Result<()> {
        let plan = self.discover(&state.channels).await?;
        self.upload(plan, state).await
    }

    /// Discover, sign in if there is anything to upload, then upload.
    pub async fn sign_in_and_run(&mut self, state: &mut SyncState) -> Result<()> {
        let plan = self.discover(&state.channels).await?;

        if !plan.has_work() && state.queue.is_empty() {
            info!("📭 Nothing to upload");
            return Ok(());
        }

        self.sign_in(&state.credentials).await?;
        self.upload(plan, state).await
    }

    /// Run and save the result to `store`.
    ///
    /// State is saved even when the run was cut short, except after
    /// credential or config errors, which stop a run before it changes
    /// anything.
    pub async fn run_and_persist(&mut self, store: &StateStore, state: &mut SyncState) -> Result<()> {
        let result = self.sign_in_and_run(state).await;

        let flush = result.as_ref().err().map_or(true, SyncError::needs_flush);
        if !flush {
            return result;
        }
        if let Err(e) = &result {
            error!("❌ Run aborted: {}", e);
        }

        store.save(state)?;
        result
    }

    /// Take one video through the upload stages.
    ///
    /// Returns `Err` only for run-level failures; anything specific to this
    /// video is reported through the outcome.
    pub async fn process_video(&mut self, id: &str, title: &str, alias: &str) -> Result<UploadOutcome> {
        let outcome = self.attempt_upload(id, title, alias).await?;

        let link = format!("{}{}", self.settings.youtube.watch_prefix, id);
        match &outcome {
            UploadOutcome::Published { url } => info!("  ✅ Successfully uploaded: {}", url),
            UploadOutcome::NeedsPublish { url } => {
                warn!("  ⚠️ Uploaded {} but could not publish, publish manually: {}", link, url)
            }
            UploadOutcome::Failed(reason) => warn!("  ❌ Unable to upload: {} ({})", link, reason),
        }

        Ok(outcome)
    }

    async fn attempt_upload(&mut self, id: &str, title: &str, alias: &str) -> Result<UploadOutcome> {
        let language = self.settings.youtube.caption_language.clone();

        let markup = match self.captions.fetch(id, &language).await {
            Ok(Some(markup)) => markup,
            Ok(None) => return Ok(UploadOutcome::Failed(FailureReason::NoCaptions)),
            Err(e) if e.is_transport() => return Err(e.into()),
            Err(e) => return Ok(UploadOutcome::Failed(FailureReason::BadCaptions(e.to_string()))),
        };

        let srt = match markup_to_srt(&markup) {
            Ok(srt) => srt,
            Err(e) => return Ok(UploadOutcome::Failed(FailureReason::BadCaptions(e.to_string()))),
        };

        let subtitles = self.write_subtitles(id, &srt)?;
        let mut stage = UploadStage::CaptionsFetched;
        debug!("📝 Subtitles for {} written to {}", id, subtitles.path().display());

        let full_title = compose_title(alias, title);
        let submitted = self
            .fill_and_submit(id, &full_title, &subtitles.path().to_string_lossy(), &mut stage)
            .await;
        // subtitles are not needed once the form is sent
        drop(subtitles);

        if let Err(e) = submitted {
            return automation_failure(e, stage);
        }

        match self.poll_publish().await {
            Ok(outcome) => Ok(outcome),
            Err(e) => automation_failure(e, UploadStage::PublishPending),
        }
    }

    fn write_subtitles(&self, id: &str, srt: &str) -> Result<tempfile::NamedTempFile> {
        let mut builder = tempfile::Builder::new();
        let prefix = format!("{}-", id);
        builder.prefix(&prefix).suffix(".srt");

        let mut file = match &self.work_dir {
            Some(dir) => builder.tempfile_in(dir)?,
            None => builder.tempfile()?,
        };
        file.write_all(srt.as_bytes())?;
        file.flush()?;
        Ok(file)
    }

    async fn fill_and_submit(
        &mut self,
        id: &str,
        title: &str,
        subtitles_path: &str,
        stage: &mut UploadStage,
    ) -> std::result::Result<(), AutomationError> {
        let site = &self.settings.site;
        let link = format!("{}{}", self.settings.youtube.watch_prefix, id);

        self.automator.navigate(&site.add_content_url()).await?;
        self.automator.fill_field(&site.link_field, &link).await?;
        self.automator.fill_field(&site.title_field, title).await?;
        self.automator.fill_field(&site.subtitles_field, subtitles_path).await?;
        debug!("Selecting genre \"{}\"", GENRE_TAG);
        self.automator.click(&site.genre_selector).await?;
        *stage = UploadStage::FormFilled;

        self.automator.submit(&site.form_selector).await?;
        *stage = UploadStage::Submitted;
        Ok(())
    }

    /// Click the publish button, waiting for processing to finish.
    ///
    /// Bounded by `publish.max_attempts` and `publish.timeout_seconds`.
    async fn poll_publish(&mut self) -> std::result::Result<UploadOutcome, AutomationError> {
        let publish = &self.settings.publish;
        let max_attempts = publish.max_attempts.max(1);
        let delay = publish.retry_delay();
        let selector = self.settings.site.publish_selector.clone();
        let add_url = self.settings.site.add_content_url();
        let automator = &mut self.automator;

        let poll = async {
            for attempt in 1..=max_attempts {
                match automator.click(&selector).await {
                    Ok(()) => return Ok(PollResult::Published(automator.current_url())),
                    Err(AutomationError::ElementNotFound(_)) => {
                        let url = automator.current_url();
                        if same_page(&url, &add_url) {
                            return Ok(PollResult::InvalidForm);
                        }
                        info!("  Trying to publish ({}/{}): {}", attempt, max_attempts, url);
                        if attempt < max_attempts {
                            tokio::time::sleep(delay).await;
                            automator.refresh().await?;
                        }
                    }
                    Err(AutomationError::NotActionable(control)) => {
                        warn!("  Publish control {} cannot be clicked here", control);
                        return Ok(PollResult::Exhausted);
                    }
                    Err(e) => return Err(e),
                }
            }
            Ok(PollResult::Exhausted)
        };

        let result = match tokio::time::timeout(publish.timeout(), poll).await {
            Ok(result) => result?,
            Err(_) => {
                debug!("Publish poll timed out after {:?}", publish.timeout());
                PollResult::Exhausted
            }
        };

        Ok(match result {
            PollResult::Published(url) => UploadOutcome::Published { url },
            PollResult::InvalidForm => UploadOutcome::Failed(FailureReason::InvalidForm),
            PollResult::Exhausted => UploadOutcome::NeedsPublish {
                url: self.automator.current_url(),
            },
        })
    }
}

fn automation_failure(e: AutomationError, stage: UploadStage) -> Result<UploadOutcome> {
    if e.is_transport() {
        return Err(SyncError::from(e));
    }
    Ok(UploadOutcome::Failed(FailureReason::Automation {
        stage,
        message: e.to_string(),
    }))
}
