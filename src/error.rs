use std::path::PathBuf;

/// Error taxonomy for the recording/transcription engine.
///
/// Every variant is a stable kind the caller can match on, with a
/// human-readable detail string for display. The only place failures are
/// converted instead of surfaced is the pipeline health check, which
/// reports all failure modes as `false`.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("audio device unavailable: {0}")]
    DeviceUnavailable(String),

    #[error("storage directory unavailable: {0}")]
    StorageUnavailable(String),

    #[error("file not found: {0}")]
    FileNotFound(PathBuf),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("session not found: {0}")]
    NotFound(String),

    #[error("session already processing: {0}")]
    Busy(String),

    #[error("remote call timed out: {0}")]
    Timeout(String),

    #[error("remote service unreachable: {0}")]
    Unreachable(String),

    #[error("unexpected response from remote service: {0}")]
    BadResponse(String),

    #[error("operation cancelled")]
    Cancelled,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("audio encoding error: {0}")]
    Audio(#[from] hound::Error),

    #[error("storage encoding error: {0}")]
    Storage(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
