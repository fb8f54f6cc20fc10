use crate::clip::ClipHandle;
use crate::error::SessionError;
use anyhow::Result;
use std::path::PathBuf;
use tokio::sync::oneshot;

/// Commands for the Recorder service
pub enum RecorderCommand {
    Start {
        path: PathBuf,
        reply: oneshot::Sender<Result<()>>,
    },
    Stop(oneshot::Sender<Result<PathBuf>>),
}

/// A user request to change session state
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Intent {
    StartRecording,
    StopRecording,
    PlayClip(ClipHandle),
    StopPlayback,
    ClearAll,
}

/// What a completed intent hands back to the UI
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IntentOutcome {
    Done,
    Saved(ClipHandle),
}

/// An intent queued for the SessionManager, with its reply slot
pub struct SessionCommand {
    pub intent: Intent,
    pub reply: oneshot::Sender<Result<IntentOutcome, SessionError>>,
}
