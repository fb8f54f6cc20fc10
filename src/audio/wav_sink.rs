use super::format::AudioFormat;
use super::sink::AudioSink;
use anyhow::{Context, Result};
use async_trait::async_trait;
use hound::WavWriter;
use std::path::PathBuf;
use tokio::sync::{mpsc, oneshot};

enum WavCommand {
    WriteChunk(Vec<f32>),
    Finalize {
        reply: oneshot::Sender<Result<u64>>,
    },
}

/// WAV encoder using a dedicated blocking thread for I/O
///
/// Chunks are handed to the writer thread over a channel so the capture
/// loop never blocks on the filesystem.
pub struct WavSink {
    path: PathBuf,
    format: AudioFormat,
    tx: mpsc::UnboundedSender<WavCommand>,
}

impl WavSink {
    pub fn create(path: PathBuf, format: AudioFormat) -> Result<Self> {
        let mut writer = WavWriter::create(&path, format.wav_spec())
            .with_context(|| format!("Failed to create WAV writer at {:?}", path))?;

        let (tx, mut rx) = mpsc::unbounded_channel();

        std::thread::spawn(move || {
            let mut written: u64 = 0;
            let mut failed = None;

            while let Some(cmd) = rx.blocking_recv() {
                match cmd {
                    WavCommand::WriteChunk(samples) => {
                        if failed.is_some() {
                            continue;
                        }
                        for sample in samples {
                            // Convert f32 (-1.0 to 1.0) to i16
                            let amplitude = (sample.clamp(-1.0, 1.0) * i16::MAX as f32) as i16;
                            if let Err(e) = writer.write_sample(amplitude) {
                                tracing::error!("Failed to write sample: {}", e);
                                failed = Some(e.to_string());
                                break;
                            }
                            written += 1;
                        }
                    }
                    WavCommand::Finalize { reply } => {
                        let result = match failed.take() {
                            Some(e) => Err(anyhow::anyhow!("WAV writer failed earlier: {}", e)),
                            None => writer
                                .finalize()
                                .map(|_| written)
                                .context("Failed to finalize WAV"),
                        };
                        let _ = reply.send(result);
                        break;
                    }
                }
            }
        });

        Ok(Self { path, format, tx })
    }
}

#[async_trait]
impl AudioSink for WavSink {
    fn write_chunk(&mut self, samples: Vec<f32>) -> Result<()> {
        self.tx
            .send(WavCommand::WriteChunk(samples))
            .map_err(|e| anyhow::anyhow!("Failed to send write command: {}", e))
    }

    async fn finalize(self: Box<Self>) -> Result<PathBuf> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(WavCommand::Finalize { reply })
            .map_err(|e| anyhow::anyhow!("Failed to send finalize command: {}", e))?;

        let written = rx
            .await
            .map_err(|e| anyhow::anyhow!("Failed to receive finalize response: {}", e))??;

        tracing::info!(
            "Wrote {:.1}s of audio to {:?}",
            self.format.duration_of(written).as_secs_f32(),
            self.path
        );
        Ok(self.path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_writes_readable_wav() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("clip.wav");
        let format = AudioFormat::new(8000, 1);

        let mut sink: Box<dyn AudioSink> = Box::new(WavSink::create(path.clone(), format).unwrap());
        sink.write_chunk(vec![0.0, 0.5, -0.5, 2.0]).unwrap();
        sink.write_chunk(vec![-2.0]).unwrap();
        let finished = sink.finalize().await.unwrap();

        assert_eq!(finished, path);
        let mut reader = hound::WavReader::open(&path).unwrap();
        assert_eq!(reader.spec(), format.wav_spec());
        let samples: Vec<i16> = reader.samples::<i16>().map(|s| s.unwrap()).collect();
        assert_eq!(samples, vec![0, 16383, -16383, i16::MAX, -i16::MAX]);
    }
}
