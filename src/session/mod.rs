pub mod backend;
pub mod capture;
pub mod playback;

pub use backend::{CaptureBackend, Permission, PlaybackBackend};
pub use capture::{CaptureSession, CaptureStatus, RecordingToken};
pub use playback::{PlaybackSession, PlaybackStatus};

use crate::clip::{ClipHandle, ClipList};
use crate::error::SessionError;
use crate::messages::{Intent, IntentOutcome, SessionCommand};
use crate::store::{ClipStore, KeyValueStore};
use std::time::Duration;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::time::MissedTickBehavior;

/// Read side of the session state, for rendering.
#[derive(Clone)]
pub struct SessionObserver {
    pub capture: watch::Receiver<CaptureStatus>,
    pub playback: watch::Receiver<PlaybackStatus>,
    pub clips: watch::Receiver<ClipList>,
}

/// Composes capture, playback and the clip store behind one intent queue
///
/// This service:
/// - Rejects a second recording while one is outstanding
/// - Persists every finished recording before publishing the new clip list
/// - Keeps at most one sound playing
/// - Logs and recovers from every failure, leaving sessions idle
///
/// Note: the device backends are !Send, so `run` must be spawned on a
/// LocalSet using tokio::task::spawn_local.
pub struct SessionManager<C: CaptureBackend, P: PlaybackBackend, S: KeyValueStore> {
    capture: CaptureSession<C>,
    playback: PlaybackSession<P>,
    store: ClipStore<S>,
    clips: watch::Sender<ClipList>,
    recording: Option<RecordingToken>,
}

impl<C, P, S> SessionManager<C, P, S>
where
    C: CaptureBackend + 'static,
    P: PlaybackBackend + 'static,
    S: KeyValueStore + 'static,
{
    pub fn new(capture: C, playback: P, store: ClipStore<S>) -> Self {
        let (clips, _) = watch::channel(ClipList::new());
        Self {
            capture: CaptureSession::new(capture),
            playback: PlaybackSession::new(playback),
            store,
            clips,
            recording: None,
        }
    }

    pub fn observe(&self) -> SessionObserver {
        SessionObserver {
            capture: self.capture.subscribe(),
            playback: self.playback.subscribe(),
            clips: self.clips.subscribe(),
        }
    }

    #[cfg(test)]
    pub fn clip_list(&self) -> ClipList {
        self.clips.borrow().clone()
    }

    #[cfg(test)]
    pub fn capture_status(&self) -> CaptureStatus {
        self.capture.status()
    }

    #[cfg(test)]
    pub fn playback_status(&self) -> PlaybackStatus {
        self.playback.status()
    }

    /// Load the saved clips. A missing or unreadable list starts empty.
    pub async fn restore(&mut self) {
        let clips = match self.store.load().await {
            Ok(clips) => {
                tracing::info!("Loaded {} saved recordings", clips.len());
                clips
            }
            Err(e) => {
                tracing::error!("Failed to load recordings: {}", e);
                ClipList::new()
            }
        };
        self.clips.send_replace(clips);
    }

    pub async fn start_recording(&mut self) -> Result<(), SessionError> {
        if self.recording.is_some() || !self.capture.is_idle() {
            return Err(SessionError::AlreadyRecording);
        }

        tracing::info!("Starting recording...");
        let token = self.capture.begin().await?;
        self.recording = Some(token);
        Ok(())
    }

    /// Finish the recording and persist it. The clip list is only published
    /// once the store has accepted the new entry.
    pub async fn stop_recording(&mut self) -> Result<ClipHandle, SessionError> {
        let token = self.recording.take().ok_or(SessionError::NotRecording)?;

        let handle = self.capture.end(token).await?;
        tracing::info!("Recording stopped and stored at {}", handle);

        let clips = self.store.append(handle.clone()).await?;
        self.clips.send_replace(clips);
        tracing::info!("Recording saved.");

        Ok(handle)
    }

    pub async fn play_clip(&mut self, handle: ClipHandle) -> Result<(), SessionError> {
        self.playback.play(handle).await
    }

    pub async fn stop_playback(&mut self) {
        self.playback.stop().await;
    }

    pub async fn clear_all(&mut self) -> Result<(), SessionError> {
        self.store.clear().await?;
        self.clips.send_replace(ClipList::new());
        tracing::info!("Recordings cleared.");
        Ok(())
    }

    /// Apply one intent. Failures are logged here; the caller only decides
    /// whether to show them.
    pub async fn handle(&mut self, intent: Intent) -> Result<IntentOutcome, SessionError> {
        tracing::debug!("Handling intent {:?}", intent);

        let result = match intent.clone() {
            Intent::StartRecording => self.start_recording().await.map(|_| IntentOutcome::Done),
            Intent::StopRecording => self.stop_recording().await.map(IntentOutcome::Saved),
            Intent::PlayClip(handle) => self.play_clip(handle).await.map(|_| IntentOutcome::Done),
            Intent::StopPlayback => {
                self.stop_playback().await;
                Ok(IntentOutcome::Done)
            }
            Intent::ClearAll => self.clear_all().await.map(|_| IntentOutcome::Done),
        };

        match &result {
            Err(e @ (SessionError::AlreadyRecording | SessionError::NotRecording)) => {
                tracing::warn!("Ignoring {:?}: {}", intent, e);
            }
            Err(e) => tracing::error!("Failed to handle {:?}: {}", intent, e),
            Ok(_) => {}
        }

        result
    }

    /// Drain the intent queue until every handle is dropped.
    pub async fn run(mut self, mut cmd_rx: mpsc::Receiver<SessionCommand>, poll: Duration) {
        let mut ticker = tokio::time::interval(poll);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                cmd = cmd_rx.recv() => {
                    let Some(SessionCommand { intent, reply }) = cmd else {
                        break;
                    };
                    let result = self.handle(intent).await;
                    let _ = reply.send(result);
                }

                _ = ticker.tick() => {
                    self.playback.reap_finished().await;
                }
            }
        }

        self.shutdown().await;
    }

    async fn shutdown(&mut self) {
        self.playback.stop().await;

        if self.recording.is_some() {
            tracing::info!("Saving the recording in progress before shutdown");
            if let Err(e) = self.stop_recording().await {
                tracing::error!("Failed to save recording on shutdown: {}", e);
            }
        }

        tracing::info!("Session manager stopped");
    }
}

/// Handle for queueing intents on the SessionManager
#[derive(Clone)]
pub struct SessionHandle {
    tx: mpsc::Sender<SessionCommand>,
}

impl SessionHandle {
    pub fn new(tx: mpsc::Sender<SessionCommand>) -> Self {
        Self { tx }
    }

    pub async fn submit(&self, intent: Intent) -> Result<IntentOutcome, SessionError> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(SessionCommand { intent, reply })
            .await
            .map_err(|_| SessionError::ManagerClosed)?;

        rx.await.map_err(|_| SessionError::ManagerClosed)?
    }

    pub async fn start_recording(&self) -> Result<(), SessionError> {
        self.submit(Intent::StartRecording).await.map(|_| ())
    }

    pub async fn stop_recording(&self) -> Result<ClipHandle, SessionError> {
        match self.submit(Intent::StopRecording).await? {
            IntentOutcome::Saved(handle) => Ok(handle),
            IntentOutcome::Done => Err(SessionError::NotRecording),
        }
    }

    pub async fn play_clip(&self, handle: ClipHandle) -> Result<(), SessionError> {
        self.submit(Intent::PlayClip(handle)).await.map(|_| ())
    }

    pub async fn stop_playback(&self) -> Result<(), SessionError> {
        self.submit(Intent::StopPlayback).await.map(|_| ())
    }

    pub async fn clear_all(&self) -> Result<(), SessionError> {
        self.submit(Intent::ClearAll).await.map(|_| ())
    }
}
