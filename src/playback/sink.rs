//! Playback device abstraction.

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::oneshot;

use crate::backend::AudioClip;

/// Failures of the playback device.
#[derive(Debug, Error)]
pub enum PlaybackError {
    /// Could not stage or launch the audio.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    /// The player gave up on the clip.
    #[error("player exited with status {0:?}")]
    PlayerExited(Option<i32>),
    /// Clip had no audio data.
    #[error("audio clip is empty")]
    EmptyClip,
}

/// A live playback owned by the controller.
///
/// Dropping the handle releases the underlying resource; ownership makes the
/// release happen exactly once whichever way the playback ends.
pub trait PlaybackHandle: Send {
    /// Pause output.
    fn pause(&mut self);
    /// Move the position back to the start.
    fn rewind(&mut self);
}

/// Resolution of a playback: `Ok` on natural end, `Err` on device failure.
pub type PlaybackEnd = Result<(), PlaybackError>;

/// A started playback plus its completion signal.
pub struct ActivePlayback {
    /// Resource handle.
    pub handle: Box<dyn PlaybackHandle>,
    /// Fires once when playback ends on its own.
    pub finished: oneshot::Receiver<PlaybackEnd>,
}

/// Something that can play an [`AudioClip`].
#[async_trait]
pub trait AudioSink: Send + Sync {
    /// Begin playing `clip`.
    ///
    /// # Errors
    /// Returns an error if the device cannot take the clip.
    async fn start(&self, clip: AudioClip) -> Result<ActivePlayback, PlaybackError>;
}
