/// leo-sync - YouTube to LinguaLeo uploader
///
/// Watches YouTube channels for new videos, converts their English captions
/// to SRT and submits them to the LinguaLeo content-intake form. Videos that
/// fail are queued and retried on the next run.

pub mod captions;
pub mod config;
pub mod discovery;
pub mod error;
pub mod manual;
pub mod orchestrator;
pub mod state;
pub mod upload;

// Re-export main types for easy access
pub use crate::captions::{markup_to_srt, CaptionCue, CaptionSource, TimedTextClient};
pub use crate::config::Settings;
pub use crate::discovery::{Discovery, YouTubeClient};
pub use crate::error::{Result, SyncError};
pub use crate::manual::ManualQueueManager;
pub use crate::orchestrator::{SyncReport, UploadOrchestrator, UploadOutcome};
pub use crate::state::{Channel, QueuedVideo, StateStore, SyncState};
pub use crate::upload::{FormAutomator, HttpFormSession};
