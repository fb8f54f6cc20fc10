use crate::clip::ClipHandle;
use crate::session::PlaybackBackend;
use anyhow::{Context, Result};
use async_trait::async_trait;
use rodio::{Decoder, OutputStream, OutputStreamBuilder, Sink};
use std::fs::File;
use std::io::BufReader;

/// Plays clips through the default output device
///
/// The output stream is opened on first use and kept for the life of the
/// player; it is !Send, so the player lives on the LocalSet with the session.
#[derive(Default)]
pub struct RodioPlayer {
    output: Option<OutputStream>,
}

impl RodioPlayer {
    pub fn new() -> Self {
        Self::default()
    }

    fn output(&mut self) -> Result<&OutputStream> {
        if self.output.is_none() {
            let mut stream =
                OutputStreamBuilder::open_default_stream().context("Failed to open audio output")?;
            // Stderr belongs to the log; the drop notice is noise at shutdown
            stream.log_on_drop(false);
            tracing::debug!("Opened default audio output");
            self.output = Some(stream);
        }

        self.output
            .as_ref()
            .context("Audio output unavailable")
    }
}

fn decode(handle: &ClipHandle) -> Result<Decoder<BufReader<File>>> {
    let path = handle.to_path();
    let file = File::open(&path).with_context(|| format!("Failed to open clip {:?}", path))?;
    Decoder::new(BufReader::new(file)).with_context(|| format!("Failed to decode clip {:?}", path))
}

#[async_trait(?Send)]
impl PlaybackBackend for RodioPlayer {
    type Resource = Sink;

    async fn load(&mut self, handle: &ClipHandle) -> Result<Sink> {
        let target = handle.clone();
        let source = tokio::task::spawn_blocking(move || decode(&target))
            .await
            .context("Clip decoder panicked")??;

        let sink = Sink::connect_new(self.output()?.mixer());
        sink.pause();
        sink.append(source);
        Ok(sink)
    }

    async fn play(&mut self, resource: &mut Sink) -> Result<()> {
        resource.play();
        Ok(())
    }

    async fn stop(&mut self, resource: &mut Sink) {
        resource.stop();
    }

    async fn unload(&mut self, resource: Sink) {
        resource.clear();
        drop(resource);
    }

    fn is_finished(&self, resource: &Sink) -> bool {
        resource.empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_clip_fails_to_decode() {
        let dir = tempfile::tempdir().unwrap();
        let handle = ClipHandle::from(dir.path().join("missing.wav").as_path());

        assert!(decode(&handle).is_err());
    }

    #[test]
    fn test_recorded_wav_decodes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("clip.wav");
        let format = crate::audio::AudioFormat::new(8000, 1);
        let mut writer = hound::WavWriter::create(&path, format.wav_spec()).unwrap();
        for _ in 0..800 {
            writer.write_sample(0i16).unwrap();
        }
        writer.finalize().unwrap();

        assert!(decode(&ClipHandle::from(path.as_path())).is_ok());
    }
}
