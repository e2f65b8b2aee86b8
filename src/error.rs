use thiserror::Error;

use crate::discovery::DiscoveryError;
use crate::upload::AutomationError;

/// Result type for run-level operations
pub type Result<T> = std::result::Result<T, SyncError>;

/// Errors that stop a run or a manual queue operation.
///
/// Per-video failures never show up here; they are reported through
/// [`crate::orchestrator::UploadOutcome`] instead.
#[derive(Error, Debug)]
pub enum SyncError {
    #[error("Discovery error: {0}")]
    Discovery(DiscoveryError),

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("Invalid credentials: {0}")]
    Credentials(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Config error: {0}")]
    Config(String),

    #[error("State file error: {0}")]
    State(String),

    #[error("Form automation error: {0}")]
    Automation(AutomationError),
}

impl SyncError {
    /// Whether state should still be saved after this error.
    /// Bad credentials or config stop a run before anything changes.
    pub fn needs_flush(&self) -> bool {
        !matches!(
            self,
            SyncError::Credentials(_) | SyncError::Config(_) | SyncError::InvalidUrl(_)
        )
    }
}

// Transport failures from any collaborator abort the run.
impl From<DiscoveryError> for SyncError {
    fn from(e: DiscoveryError) -> Self {
        if e.is_transport() {
            SyncError::Network(e.to_string())
        } else {
            SyncError::Discovery(e)
        }
    }
}

impl From<AutomationError> for SyncError {
    fn from(e: AutomationError) -> Self {
        if e.is_transport() {
            SyncError::Network(e.to_string())
        } else {
            SyncError::Automation(e)
        }
    }
}

impl From<std::io::Error> for SyncError {
    fn from(e: std::io::Error) -> Self {
        SyncError::State(e.to_string())
    }
}

impl From<serde_json::Error> for SyncError {
    fn from(e: serde_json::Error) -> Self {
        SyncError::State(e.to_string())
    }
}
