//! Playback seam between the controller and the audio subsystem

use async_trait::async_trait;

use crate::Result;
use crate::service::AudioPayload;

/// Plays assistant speech
///
/// `play` resolves when playback has finished. The runtime turns that into the
/// controller's playback-completion event, whether playback succeeded or not.
#[async_trait]
pub trait PlaybackSink: Send + Sync {
    /// Play encoded audio to completion
    ///
    /// # Errors
    ///
    /// Returns error if the audio cannot be decoded or played
    async fn play(&self, audio: AudioPayload) -> Result<()>;
}

/// Discards audio; completion is immediate
#[derive(Debug, Clone, Copy, Default)]
pub struct SilentSink;

#[async_trait]
impl PlaybackSink for SilentSink {
    async fn play(&self, audio: AudioPayload) -> Result<()> {
        tracing::debug!(bytes = audio.len(), "playback muted");
        Ok(())
    }
}
