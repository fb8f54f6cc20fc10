use super::format::AudioFormat;
use anyhow::{Context, Result};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{BufferSize, SampleRate, StreamConfig};
use ringbuf::{HeapRb, traits::*};
use std::sync::Arc;
use tokio::sync::{Notify, mpsc, oneshot};

/// Seconds of audio the ring buffer can hold before the bridge falls behind.
const RING_SECONDS: f32 = 30.0;

/// Seconds of audio per chunk forwarded to the sink.
const CHUNK_SECONDS: f32 = 0.25;

pub struct AudioCapture;

/// A running input stream and the bridge forwarding its samples.
///
/// Must be ended with `finish` so the bridge forwards the samples still
/// sitting in the ring buffer before it closes its sender.
pub struct LiveCapture {
    stream: cpal::Stream,
    flush: oneshot::Sender<()>,
}

impl LiveCapture {
    /// Stop the device, then have the bridge forward everything captured.
    pub fn finish(self) {
        drop(self.stream);
        let _ = self.flush.send(());
    }
}

impl AudioCapture {
    /// Whether the platform exposes a microphone at all. Desktop hosts have no
    /// permission prompt, so this doubles as the permission check.
    pub fn input_available() -> bool {
        cpal::default_host().default_input_device().is_some()
    }

    /// Check the default input device and describe what it offers.
    pub fn check_device(format: AudioFormat) -> Result<String> {
        let device = cpal::default_host()
            .default_input_device()
            .context("No input audio device available")?;
        let name = device.name().unwrap_or_else(|_| "unknown".to_string());

        let supported = device
            .supported_input_configs()
            .context("Failed to query input configurations")?
            .any(|range| {
                range.channels() >= format.channels
                    && range.min_sample_rate().0 <= format.sample_rate
                    && range.max_sample_rate().0 >= format.sample_rate
            });

        if !supported {
            tracing::warn!(
                "Input device {} does not advertise {} Hz x{}; the host may resample",
                name,
                format.sample_rate,
                format.channels
            );
        }

        Ok(name)
    }

    /// Start audio capture
    ///
    /// Returns the capture which must be kept alive for audio capture to continue.
    /// Audio chunks are sent via chunk_tx; the bridge drops its sender once the
    /// capture is finished and the tail has been forwarded.
    pub fn start(format: AudioFormat, chunk_tx: mpsc::Sender<Vec<f32>>) -> Result<LiveCapture> {
        let ring = HeapRb::<f32>::new(format.samples_for_duration(RING_SECONDS));
        let (mut producer, consumer) = ring.split();

        let host = cpal::default_host();
        let device = host
            .default_input_device()
            .context("No input audio device available")?;

        let config = StreamConfig {
            channels: format.channels,
            sample_rate: SampleRate(format.sample_rate),
            buffer_size: BufferSize::Default,
        };

        let notify = Arc::new(Notify::new());
        let notify_callback = notify.clone();

        let stream = device
            .build_input_stream(
                &config,
                move |data: &[f32], _info: &cpal::InputCallbackInfo| {
                    producer.push_slice(data);
                    notify_callback.notify_one();
                },
                move |err| {
                    tracing::error!("Audio stream error: {}", err);
                },
                None,
            )
            .context("Failed to build input stream")?;

        stream.play().context("Failed to start audio stream")?;

        let chunk_size = format.samples_for_duration(CHUNK_SECONDS);
        let (flush, flush_rx) = oneshot::channel();
        tokio::task::spawn_local(Self::bridge_task(
            consumer, chunk_tx, chunk_size, notify, flush_rx,
        ));

        tracing::info!(
            "Audio capture started on {} at {} Hz",
            device.name().unwrap_or_else(|_| "unknown".to_string()),
            format.sample_rate
        );
        Ok(LiveCapture { stream, flush })
    }

    async fn bridge_task(
        mut consumer: impl Consumer<Item = f32>,
        tx: mpsc::Sender<Vec<f32>>,
        chunk_size: usize,
        notify: Arc<Notify>,
        mut flush: oneshot::Receiver<()>,
    ) {
        loop {
            tokio::select! {
                _ = notify.notified() => {}
                // Sent or dropped, either way no more samples are coming
                _ = &mut flush => break,
                _ = tx.closed() => return,
            }

            while consumer.occupied_len() >= chunk_size {
                if !Self::forward(&mut consumer, &tx, chunk_size).await {
                    return;
                }
            }
        }

        while consumer.occupied_len() > 0 {
            if !Self::forward(&mut consumer, &tx, chunk_size).await {
                return;
            }
        }
    }

    /// Pop up to `chunk_size` samples and send them. False once the
    /// receiver is gone.
    async fn forward(
        consumer: &mut impl Consumer<Item = f32>,
        tx: &mpsc::Sender<Vec<f32>>,
        chunk_size: usize,
    ) -> bool {
        let mut chunk = vec![0.0f32; chunk_size.min(consumer.occupied_len())];
        let n = consumer.pop_slice(&mut chunk);
        chunk.truncate(n);

        tx.send(chunk).await.is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn run_bridge(samples: &[f32], chunk_size: usize) -> Vec<Vec<f32>> {
        let (mut producer, consumer) = HeapRb::<f32>::new(64).split();
        producer.push_slice(samples);

        let (tx, mut rx) = mpsc::channel(16);
        let (flush, flush_rx) = oneshot::channel();
        flush.send(()).unwrap();

        AudioCapture::bridge_task(consumer, tx, chunk_size, Arc::new(Notify::new()), flush_rx)
            .await;

        let mut chunks = Vec::new();
        while let Some(chunk) = rx.recv().await {
            chunks.push(chunk);
        }
        chunks
    }

    #[tokio::test]
    async fn test_partial_chunk_is_forwarded_on_finish() {
        let chunks = run_bridge(&[0.1, 0.2, 0.3], 8).await;

        assert_eq!(chunks, vec![vec![0.1, 0.2, 0.3]]);
    }

    #[tokio::test]
    async fn test_backlog_is_forwarded_in_chunks_on_finish() {
        let samples: Vec<f32> = (0..20).map(|i| i as f32 / 20.0).collect();

        let chunks = run_bridge(&samples, 8).await;

        assert_eq!(
            chunks.iter().map(Vec::len).collect::<Vec<_>>(),
            vec![8, 8, 4]
        );
        assert_eq!(chunks.concat(), samples);
    }

    #[tokio::test]
    async fn test_full_chunks_flow_while_recording() {
        let (mut producer, consumer) = HeapRb::<f32>::new(64).split();
        let (tx, mut rx) = mpsc::channel(16);
        let (flush, flush_rx) = oneshot::channel();
        let notify = Arc::new(Notify::new());

        let local = tokio::task::LocalSet::new();
        local
            .run_until(async {
                let bridge = tokio::task::spawn_local(AudioCapture::bridge_task(
                    consumer,
                    tx,
                    4,
                    notify.clone(),
                    flush_rx,
                ));

                producer.push_slice(&[1.0; 6]);
                notify.notify_one();
                assert_eq!(rx.recv().await, Some(vec![1.0; 4]));

                flush.send(()).unwrap();
                assert_eq!(rx.recv().await, Some(vec![1.0; 2]));
                assert_eq!(rx.recv().await, None);
                bridge.await.unwrap();
            })
            .await;
    }
}
