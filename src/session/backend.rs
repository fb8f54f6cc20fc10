use crate::clip::ClipHandle;
use anyhow::Result;
use async_trait::async_trait;

/// Outcome of asking the platform for microphone access.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Permission {
    Granted,
    Denied,
}

/// Microphone capability surface.
///
/// Device handles are not `Send`, so implementations run on a `LocalSet`.
#[async_trait(?Send)]
pub trait CaptureBackend {
    /// A live capture stream, consumed by `finalize`.
    type Stream;

    async fn request_permission(&mut self) -> Permission;

    /// Put the device into a recording-capable mode.
    async fn configure_for_recording(&mut self) -> Result<()>;

    async fn open(&mut self) -> Result<Self::Stream>;

    /// Close the stream and turn it into a durable, resolvable resource.
    async fn finalize(&mut self, stream: Self::Stream) -> Result<ClipHandle>;
}

/// Speaker capability surface.
#[async_trait(?Send)]
pub trait PlaybackBackend {
    /// A loaded, not yet playing, sound.
    type Resource;

    async fn load(&mut self, handle: &ClipHandle) -> Result<Self::Resource>;

    async fn play(&mut self, resource: &mut Self::Resource) -> Result<()>;

    async fn stop(&mut self, resource: &mut Self::Resource);

    async fn unload(&mut self, resource: Self::Resource);

    /// True once the resource has played to its end.
    fn is_finished(&self, resource: &Self::Resource) -> bool;
}
