//! Worker error types.

use reelstamp_drive::{DriveError, RetryError};
use reelstamp_media::MediaError;
use thiserror::Error;

pub type WorkerResult<T> = Result<T, WorkerError>;

#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Root folder unavailable: {0}")]
    RootUnavailable(String),

    #[error("Prompt is empty: {0}")]
    EmptyPrompt(String),

    #[error("Drive error: {0}")]
    Drive(#[from] RetryError<DriveError>),

    #[error("Drive client error: {0}")]
    DriveClient(#[from] DriveError),

    #[error("Media error: {0}")]
    Media(#[from] MediaError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl WorkerError {
    pub fn config_error(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub fn root_unavailable(msg: impl Into<String>) -> Self {
        Self::RootUnavailable(msg.into())
    }

    pub fn empty_prompt(name: impl Into<String>) -> Self {
        Self::EmptyPrompt(name.into())
    }

    /// Errors that end the whole run rather than one pair.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            WorkerError::Config(_) | WorkerError::RootUnavailable(_) | WorkerError::DriveClient(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retry_error_converts() {
        let err: WorkerError = RetryError::Exhausted {
            attempts: 5,
            last: DriveError::ServerError(503, "backend".into()),
        }
        .into();

        assert!(!err.is_fatal());
        assert_eq!(
            err.to_string(),
            "Drive error: gave up after 5 attempts: Server error (503): backend"
        );
    }

    #[test]
    fn test_fatal_classification() {
        assert!(WorkerError::config_error("DRIVE_ROOT_FOLDER not set").is_fatal());
        assert!(WorkerError::root_unavailable("gone").is_fatal());
        assert!(!WorkerError::empty_prompt("prompt.txt").is_fatal());
        assert!(!WorkerError::from(MediaError::Timeout(30)).is_fatal());
    }
}
