use super::backend::PlaybackBackend;
use crate::clip::ClipHandle;
use crate::error::{SessionError, describe};
use tokio::sync::watch;

/// Observable playback state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlaybackStatus {
    Idle,
    Loading(ClipHandle),
    Playing(ClipHandle),
}

enum PlaybackState<R> {
    Idle,
    Loading(ClipHandle),
    Playing { target: ClipHandle, resource: R },
}

/// Lifecycle of the single active playback.
///
/// At most one resource is held at a time: starting a new clip stops and
/// unloads the current one before the new one is loaded.
pub struct PlaybackSession<B: PlaybackBackend> {
    backend: B,
    state: PlaybackState<B::Resource>,
    status: watch::Sender<PlaybackStatus>,
}

impl<B: PlaybackBackend> PlaybackSession<B> {
    pub fn new(backend: B) -> Self {
        let (status, _) = watch::channel(PlaybackStatus::Idle);
        Self {
            backend,
            state: PlaybackState::Idle,
            status,
        }
    }

    pub fn status(&self) -> PlaybackStatus {
        match &self.state {
            PlaybackState::Idle => PlaybackStatus::Idle,
            PlaybackState::Loading(target) => PlaybackStatus::Loading(target.clone()),
            PlaybackState::Playing { target, .. } => PlaybackStatus::Playing(target.clone()),
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<PlaybackStatus> {
        self.status.subscribe()
    }

    pub async fn play(&mut self, handle: ClipHandle) -> Result<(), SessionError> {
        if !handle.is_resolvable() {
            return Err(SessionError::InvalidHandle);
        }

        self.stop().await;

        self.set_state(PlaybackState::Loading(handle.clone()));

        let mut resource = match self.backend.load(&handle).await {
            Ok(resource) => resource,
            Err(e) => {
                self.set_state(PlaybackState::Idle);
                return Err(SessionError::PlaybackBackendError(describe(&e)));
            }
        };

        if let Err(e) = self.backend.play(&mut resource).await {
            self.backend.unload(resource).await;
            self.set_state(PlaybackState::Idle);
            return Err(SessionError::PlaybackBackendError(describe(&e)));
        }

        tracing::info!("Playing recorded sound from {}", handle);
        self.set_state(PlaybackState::Playing {
            target: handle,
            resource,
        });
        Ok(())
    }

    /// Release the held resource, if any. Idempotent.
    pub async fn stop(&mut self) {
        match std::mem::replace(&mut self.state, PlaybackState::Idle) {
            PlaybackState::Idle => {}
            PlaybackState::Loading(_) => self.publish(),
            PlaybackState::Playing {
                target,
                mut resource,
            } => {
                self.publish();
                self.backend.stop(&mut resource).await;
                self.backend.unload(resource).await;
                tracing::info!("Stopped playback of {}", target);
            }
        }
    }

    /// Release the resource once it has played out. Returns true if the
    /// session went back to idle.
    pub async fn reap_finished(&mut self) -> bool {
        let finished = match &self.state {
            PlaybackState::Playing { resource, .. } => self.backend.is_finished(resource),
            _ => false,
        };

        if finished {
            tracing::debug!("Playback reached the end of the clip");
            self.stop().await;
        }

        finished
    }

    fn set_state(&mut self, state: PlaybackState<B::Resource>) {
        self.state = state;
        self.publish();
    }

    fn publish(&self) {
        self.status.send_replace(self.status());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FakePlayback, Log};

    fn session(log: &Log) -> PlaybackSession<FakePlayback> {
        PlaybackSession::new(FakePlayback::new(log.clone()))
    }

    #[tokio::test]
    async fn test_play_loads_then_plays() {
        let log = Log::default();
        let mut session = session(&log);

        session.play(ClipHandle::new("clip-1")).await.unwrap();

        assert_eq!(session.status(), PlaybackStatus::Playing(ClipHandle::new("clip-1")));
        assert_eq!(log.take(), vec!["load clip-1", "play clip-1"]);
    }

    #[tokio::test]
    async fn test_replacing_playback_releases_previous_first() {
        let log = Log::default();
        let mut session = session(&log);

        session.play(ClipHandle::new("clip-1")).await.unwrap();
        session.play(ClipHandle::new("clip-2")).await.unwrap();

        assert_eq!(session.status(), PlaybackStatus::Playing(ClipHandle::new("clip-2")));
        assert_eq!(
            log.take(),
            vec![
                "load clip-1",
                "play clip-1",
                "stop clip-1",
                "unload clip-1",
                "load clip-2",
                "play clip-2",
            ]
        );
        assert_eq!(session.backend.live(), 1);
    }

    #[tokio::test]
    async fn test_invalid_handle_leaves_idle() {
        let log = Log::default();
        let mut session = session(&log);

        assert_eq!(
            session.play(ClipHandle::new("")).await,
            Err(SessionError::InvalidHandle)
        );
        assert_eq!(session.status(), PlaybackStatus::Idle);
        assert!(log.take().is_empty());
    }

    #[tokio::test]
    async fn test_load_failure_resets_to_idle() {
        let log = Log::default();
        let mut session = session(&log);
        session.backend.missing.push(ClipHandle::new("gone"));

        let result = session.play(ClipHandle::new("gone")).await;

        assert!(matches!(result, Err(SessionError::PlaybackBackendError(_))));
        assert_eq!(session.status(), PlaybackStatus::Idle);
        assert_eq!(session.backend.live(), 0);
    }

    #[tokio::test]
    async fn test_play_failure_unloads_resource() {
        let log = Log::default();
        let mut session = session(&log);
        session.backend.fail_play = true;

        let result = session.play(ClipHandle::new("clip-1")).await;

        assert!(matches!(result, Err(SessionError::PlaybackBackendError(_))));
        assert_eq!(session.status(), PlaybackStatus::Idle);
        assert_eq!(log.take(), vec!["load clip-1", "play clip-1", "unload clip-1"]);
    }

    #[tokio::test]
    async fn test_stop_is_idempotent() {
        let log = Log::default();
        let mut session = session(&log);

        session.stop().await;
        session.play(ClipHandle::new("clip-1")).await.unwrap();
        session.stop().await;
        session.stop().await;

        assert_eq!(session.status(), PlaybackStatus::Idle);
        assert_eq!(
            log.take(),
            vec!["load clip-1", "play clip-1", "stop clip-1", "unload clip-1"]
        );
    }

    #[tokio::test]
    async fn test_finished_playback_is_reaped() {
        let log = Log::default();
        let mut session = session(&log);

        session.play(ClipHandle::new("clip-1")).await.unwrap();
        assert!(!session.reap_finished().await);

        session.backend.finish_all();
        assert!(session.reap_finished().await);
        assert_eq!(session.status(), PlaybackStatus::Idle);
    }
}
