use super::backend::{CaptureBackend, Permission};
use crate::clip::ClipHandle;
use crate::error::{SessionError, describe};
use tokio::sync::watch;

/// Cached result of the last permission request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PermissionState {
    Unknown,
    Granted,
    Denied,
}

/// Observable capture state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureStatus {
    Idle,
    RequestingPermission,
    Recording,
}

enum CaptureState<S> {
    Idle,
    RequestingPermission,
    Recording { id: u64, stream: S },
}

/// Proof of an outstanding recording. Consumed exactly once by `end`.
#[derive(Debug, PartialEq, Eq)]
pub struct RecordingToken {
    id: u64,
}

/// Lifecycle of the single in-progress recording.
///
/// `Idle --begin--> Recording --end--> Idle`. Every failure lands on `Idle`
/// so the microphone is never left open.
pub struct CaptureSession<B: CaptureBackend> {
    backend: B,
    state: CaptureState<B::Stream>,
    permission: PermissionState,
    next_id: u64,
    status: watch::Sender<CaptureStatus>,
}

impl<B: CaptureBackend> CaptureSession<B> {
    pub fn new(backend: B) -> Self {
        let (status, _) = watch::channel(CaptureStatus::Idle);
        Self {
            backend,
            state: CaptureState::Idle,
            permission: PermissionState::Unknown,
            next_id: 0,
            status,
        }
    }

    pub fn status(&self) -> CaptureStatus {
        match self.state {
            CaptureState::Idle => CaptureStatus::Idle,
            CaptureState::RequestingPermission => CaptureStatus::RequestingPermission,
            CaptureState::Recording { .. } => CaptureStatus::Recording,
        }
    }

    #[cfg(test)]
    pub fn permission(&self) -> PermissionState {
        self.permission
    }

    pub fn subscribe(&self) -> watch::Receiver<CaptureStatus> {
        self.status.subscribe()
    }

    pub fn is_idle(&self) -> bool {
        matches!(self.state, CaptureState::Idle)
    }

    pub async fn begin(&mut self) -> Result<RecordingToken, SessionError> {
        if !self.is_idle() {
            return Err(SessionError::AlreadyRecording);
        }

        if self.permission != PermissionState::Granted {
            self.set_state(CaptureState::RequestingPermission);
            tracing::info!("Requesting microphone permission");

            self.permission = match self.backend.request_permission().await {
                Permission::Granted => PermissionState::Granted,
                Permission::Denied => PermissionState::Denied,
            };
            tracing::info!("Permission is {:?}", self.permission);

            if self.permission == PermissionState::Denied {
                self.set_state(CaptureState::Idle);
                return Err(SessionError::PermissionDenied);
            }
        }

        if let Err(e) = self.backend.configure_for_recording().await {
            self.set_state(CaptureState::Idle);
            return Err(SessionError::CaptureFailed(describe(&e)));
        }

        let stream = match self.backend.open().await {
            Ok(stream) => stream,
            Err(e) => {
                self.set_state(CaptureState::Idle);
                return Err(SessionError::CaptureFailed(describe(&e)));
            }
        };

        self.next_id += 1;
        let id = self.next_id;
        self.set_state(CaptureState::Recording { id, stream });
        tracing::info!("...recording");

        Ok(RecordingToken { id })
    }

    pub async fn end(&mut self, token: RecordingToken) -> Result<ClipHandle, SessionError> {
        // A stale token must not close someone else's recording.
        match &self.state {
            CaptureState::Recording { id, .. } if *id == token.id => {}
            _ => return Err(SessionError::NotRecording),
        }

        let CaptureState::Recording { stream, .. } =
            std::mem::replace(&mut self.state, CaptureState::Idle)
        else {
            return Err(SessionError::NotRecording);
        };
        self.publish();

        self.backend
            .finalize(stream)
            .await
            .map_err(|e| SessionError::FinalizeFailed(describe(&e)))
    }

    fn set_state(&mut self, state: CaptureState<B::Stream>) {
        self.state = state;
        self.publish();
    }

    fn publish(&self) {
        self.status.send_replace(self.status());
    }
}
