use crate::config::Config;
use crate::console;
use crate::services::{RecorderHandle, RodioPlayer};
use crate::session::{SessionHandle, SessionManager, SessionObserver};
use crate::store::{ClipStore, JsonFileStore};

use anyhow::Result;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

pub struct App {
    session: SessionHandle,
    observer: SessionObserver,
    manager_task: JoinHandle<()>,
}

impl App {
    /// Build the device backends and start the session manager.
    /// Must be called inside a LocalSet.
    pub async fn new(config: Config) -> Result<Self> {
        let recorder = RecorderHandle::spawn(config.audio_format(), config.clips_dir());
        let player = RodioPlayer::new();
        let store = ClipStore::new(
            JsonFileStore::new(config.store_dir()),
            config.storage_key.clone(),
        );

        let mut manager = SessionManager::new(recorder, player, store);
        manager.restore().await;
        let observer = manager.observe();

        // Using spawn_local because the device backends are !Send
        let (session_tx, session_rx) = mpsc::channel(config.command_queue);
        let manager_task = tokio::task::spawn_local(manager.run(session_rx, config.playback_poll()));

        tracing::info!("Ready! Press enter to start/stop recording, 'q' to quit");

        Ok(Self {
            session: SessionHandle::new(session_tx),
            observer,
            manager_task,
        })
    }

    pub async fn run(self) -> Result<()> {
        let Self {
            session,
            observer,
            manager_task,
        } = self;

        tokio::select! {
            result = console::run_console(session, observer) => {
                if let Err(e) = result {
                    tracing::error!("Console input failed: {}", e);
                }
            }
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Received Ctrl+C, shutting down");
            }
        }

        // The console owned the last SessionHandle; with the queue closed the
        // manager releases the devices and saves any open recording.
        manager_task.await?;
        Ok(())
    }
}
