use anyhow::Result;
use async_trait::async_trait;
use std::path::PathBuf;

/// Trait for streaming audio encoding
///
/// Samples are written as they arrive rather than buffered for the whole
/// recording; `finalize` flushes framing and yields the finished file.
#[async_trait]
pub trait AudioSink: Send {
    /// Write audio samples (streaming, called repeatedly during recording)
    /// The Vec is moved to avoid copying
    fn write_chunk(&mut self, samples: Vec<f32>) -> Result<()>;

    /// Finalize and close the sink, returning the path of the written clip
    async fn finalize(self: Box<Self>) -> Result<PathBuf>;
}
