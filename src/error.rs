use thiserror::Error;

/// Failures a session intent can end in.
///
/// Every variant is recovered where it happens: the owning session is reset
/// to idle and the error is logged before it is handed back to the caller.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    #[error("microphone permission denied")]
    PermissionDenied,

    #[error("a recording is already in progress")]
    AlreadyRecording,

    #[error("no recording in progress")]
    NotRecording,

    #[error("failed to open capture stream: {0}")]
    CaptureFailed(String),

    #[error("failed to finalize recording: {0}")]
    FinalizeFailed(String),

    #[error("clip handle cannot be resolved")]
    InvalidHandle,

    #[error("playback failed: {0}")]
    PlaybackBackendError(String),

    #[error("persisted clip list is corrupt: {0}")]
    CorruptPersistedState(String),

    #[error("storage I/O failed: {0}")]
    StorageIOError(String),

    #[error("session manager is not running")]
    ManagerClosed,
}

/// Render an `anyhow` chain on one line for the string-carrying variants.
pub(crate) fn describe(err: &anyhow::Error) -> String {
    format!("{err:#}")
}
