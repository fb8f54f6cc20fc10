use crate::audio::{AudioCapture, AudioFormat, AudioSink, LiveCapture, WavSink};
use crate::clip::ClipHandle;
use crate::messages::RecorderCommand;
use crate::session::{CaptureBackend, Permission};
use anyhow::{Context, Result};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};
use tokio::sync::{mpsc, oneshot};

/// Coordinates audio capture and encoding
///
/// This service:
/// - Manages AudioCapture lifecycle
/// - Receives audio chunks via channel
/// - Streams chunks to a WavSink for encoding
/// - Handles start/stop commands
///
/// Note: This service holds a cpal::Stream (via LiveCapture) which is !Send, so it must be spawned
/// on a LocalSet using tokio::task::spawn_local.
pub struct Recorder {
    format: AudioFormat,
    cmd_rx: mpsc::Receiver<RecorderCommand>,
    audio_rx: mpsc::Receiver<Vec<f32>>,
    audio_tx: mpsc::Sender<Vec<f32>>,
    sink: Option<Box<dyn AudioSink>>,
    capture: Option<LiveCapture>,
}

impl Recorder {
    pub fn new(format: AudioFormat, cmd_rx: mpsc::Receiver<RecorderCommand>) -> Self {
        let (audio_tx, audio_rx) = mpsc::channel(100);
        Self {
            format,
            cmd_rx,
            audio_rx,
            audio_tx,
            sink: None,
            capture: None,
        }
    }

    pub async fn run(mut self) {
        loop {
            tokio::select! {
                // Handle commands from the capture session
                Some(cmd) = self.cmd_rx.recv() => {
                    self.handle_command(cmd).await;
                }

                // Receive and process audio chunks (only when recording)
                Some(chunk) = self.audio_rx.recv(), if self.sink.is_some() => {
                    self.write_chunk(chunk);
                }

                else => break,
            }
        }

        if self.sink.is_some() {
            tracing::warn!("Recorder shut down with a capture still open");
        }
    }

    fn write_chunk(&mut self, chunk: Vec<f32>) {
        if let Some(sink) = self.sink.as_mut() {
            // Stream chunk to sink (Vec is moved, no copy)
            if let Err(e) = sink.write_chunk(chunk) {
                tracing::error!("Failed to write audio chunk: {}", e);
            }
        }
    }

    async fn handle_command(&mut self, cmd: RecorderCommand) {
        match cmd {
            RecorderCommand::Start { path, reply } => {
                let _ = reply.send(self.start(&path));
            }

            RecorderCommand::Stop(reply) => {
                let result = self.stop().await;
                let _ = reply.send(result);
                tracing::info!("Recording stopped");
            }
        }
    }

    fn start(&mut self, path: &Path) -> Result<()> {
        if self.sink.is_some() {
            anyhow::bail!("Capture already running");
        }

        let sink: Box<dyn AudioSink> = Box::new(WavSink::create(path.to_path_buf(), self.format)?);

        let capture = match AudioCapture::start(self.format, self.audio_tx.clone()) {
            Ok(capture) => capture,
            Err(e) => {
                // No audio will ever reach this file
                drop(sink);
                if let Err(remove_err) = std::fs::remove_file(path) {
                    tracing::warn!("Failed to remove {:?}: {}", path, remove_err);
                }
                return Err(e);
            }
        };

        self.sink = Some(sink);
        self.capture = Some(capture);
        tracing::info!("Recording started into {:?}", path);
        Ok(())
    }

    async fn stop(&mut self) -> Result<PathBuf> {
        let mut sink = self.sink.take().context("No capture is running")?;

        // Replace audio channel with a fresh one for next recording. The
        // bridge task then holds the only sender of the old channel.
        let (new_audio_tx, new_audio_rx) = mpsc::channel(100);
        self.audio_tx = new_audio_tx;
        let mut audio_rx = std::mem::replace(&mut self.audio_rx, new_audio_rx);

        // Stop the device; the bridge forwards what is left in the ring
        // buffer and exits, closing the old channel
        if let Some(capture) = self.capture.take() {
            capture.finish();
        }

        while let Some(chunk) = audio_rx.recv().await {
            if let Err(e) = sink.write_chunk(chunk) {
                tracing::error!("Failed to write audio chunk during drain: {}", e);
                break;
            }
        }

        sink.finalize().await
    }
}

/// A capture opened through RecorderHandle, waiting to be finalized
#[derive(Debug)]
pub struct ActiveCapture {
    path: PathBuf,
}

/// Handle for communicating with the Recorder; the device CaptureBackend
#[derive(Clone)]
pub struct RecorderHandle {
    tx: mpsc::Sender<RecorderCommand>,
    format: AudioFormat,
    clips_dir: PathBuf,
}

impl RecorderHandle {
    pub fn new(tx: mpsc::Sender<RecorderCommand>, format: AudioFormat, clips_dir: PathBuf) -> Self {
        Self {
            tx,
            format,
            clips_dir,
        }
    }

    /// Spawn a Recorder on the current LocalSet and return its handle.
    pub fn spawn(format: AudioFormat, clips_dir: PathBuf) -> Self {
        let (tx, rx) = mpsc::channel(10);
        tokio::task::spawn_local(Recorder::new(format, rx).run());
        Self::new(tx, format, clips_dir)
    }

    fn next_clip_path(&self) -> PathBuf {
        let millis = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis())
            .unwrap_or_default();
        self.clips_dir.join(format!("clip-{}.wav", millis))
    }
}

#[async_trait(?Send)]
impl CaptureBackend for RecorderHandle {
    type Stream = ActiveCapture;

    async fn request_permission(&mut self) -> Permission {
        match tokio::task::spawn_blocking(AudioCapture::input_available).await {
            Ok(true) => Permission::Granted,
            Ok(false) => Permission::Denied,
            Err(e) => {
                tracing::error!("Input device check panicked: {}", e);
                Permission::Denied
            }
        }
    }

    async fn configure_for_recording(&mut self) -> Result<()> {
        tokio::fs::create_dir_all(&self.clips_dir)
            .await
            .with_context(|| format!("Failed to create clip directory: {:?}", self.clips_dir))?;

        let format = self.format;
        let device = tokio::task::spawn_blocking(move || AudioCapture::check_device(format))
            .await
            .context("Input device check panicked")??;
        tracing::debug!("Recording from input device {}", device);
        Ok(())
    }

    async fn open(&mut self) -> Result<ActiveCapture> {
        let path = self.next_clip_path();
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(RecorderCommand::Start {
                path: path.clone(),
                reply,
            })
            .await
            .map_err(|e| anyhow::anyhow!("Failed to send start command: {}", e))?;

        rx.await
            .map_err(|e| anyhow::anyhow!("Failed to receive start response: {}", e))??;

        Ok(ActiveCapture { path })
    }

    async fn finalize(&mut self, stream: ActiveCapture) -> Result<ClipHandle> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(RecorderCommand::Stop(reply))
            .await
            .map_err(|e| anyhow::anyhow!("Failed to send stop command: {}", e))?;

        let path = rx
            .await
            .map_err(|e| anyhow::anyhow!("Failed to receive stop response: {}", e))??;

        if path != stream.path {
            tracing::warn!("Recorder finalized {:?}, expected {:?}", path, stream.path);
        }

        Ok(ClipHandle::from(path.as_path()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_stop_without_start_fails() {
        let local = tokio::task::LocalSet::new();
        local
            .run_until(async {
                let dir = tempfile::tempdir().unwrap();
                let mut handle = RecorderHandle::spawn(AudioFormat::default(), dir.path().into());

                let result = handle
                    .finalize(ActiveCapture {
                        path: dir.path().join("never.wav"),
                    })
                    .await;

                assert!(result.is_err());
            })
            .await;
    }

    #[test]
    fn test_clip_paths_live_in_clip_dir() {
        let (tx, _rx) = mpsc::channel(1);
        let handle = RecorderHandle::new(tx, AudioFormat::default(), PathBuf::from("/data/clips"));

        let path = handle.next_clip_path();

        assert_eq!(path.parent(), Some(Path::new("/data/clips")));
        let name = path.file_name().unwrap().to_str().unwrap();
        assert!(name.starts_with("clip-") && name.ends_with(".wav"));
    }
}
