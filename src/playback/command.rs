//! Playback through an external player program (`ffplay`, `aplay`, `afplay`, ...).
//!
//! Each clip is staged as a file under the configured audio directory and handed
//! to a freshly spawned player. The staged file is the transient resource: it is
//! removed when the [`PlaybackHandle`] is dropped.

use std::path::PathBuf;
use std::process::Stdio;

use async_trait::async_trait;
use tokio::process::Command;
use tokio::sync::oneshot;
use uuid::Uuid;

use super::sink::{ActivePlayback, AudioSink, PlaybackEnd, PlaybackError, PlaybackHandle};
use crate::backend::AudioClip;
use crate::config::PlayerConfig;

/// Sink that plays clips with an external command.
pub struct CommandSink {
    player: PlayerConfig,
    audio_dir: PathBuf,
}

impl CommandSink {
    /// Create a sink staging files under `audio_dir`.
    #[must_use]
    pub fn new(player: PlayerConfig, audio_dir: impl Into<PathBuf>) -> Self {
        Self {
            player,
            audio_dir: audio_dir.into(),
        }
    }
}

#[async_trait]
impl AudioSink for CommandSink {
    async fn start(&self, clip: AudioClip) -> Result<ActivePlayback, PlaybackError> {
        if clip.is_empty() {
            return Err(PlaybackError::EmptyClip);
        }

        tokio::fs::create_dir_all(&self.audio_dir).await?;
        let staged = StagedFile(
            self.audio_dir
                .join(format!("{}.{}", Uuid::new_v4(), clip.extension())),
        );
        tokio::fs::write(&staged.0, &clip.bytes).await?;

        // On spawn failure `staged` is dropped here, removing the file.
        let mut child = Command::new(&self.player.program)
            .args(&self.player.args)
            .arg(&staged.0)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()?;

        tracing::debug!(
            player = %self.player.program,
            file = %staged.0.display(),
            bytes = clip.len(),
            "Player started"
        );

        let (stop_tx, stop_rx) = oneshot::channel::<()>();
        let (finished_tx, finished) = oneshot::channel::<PlaybackEnd>();

        tokio::spawn(async move {
            tokio::select! {
                status = child.wait() => {
                    let end = match status {
                        Ok(status) if status.success() => Ok(()),
                        Ok(status) => Err(PlaybackError::PlayerExited(status.code())),
                        Err(err) => Err(PlaybackError::Io(err)),
                    };
                    let _ = finished_tx.send(end);
                }
                _ = stop_rx => {
                    if let Err(err) = child.kill().await {
                        tracing::debug!(?err, "Player already gone");
                    }
                }
            }
        });

        Ok(ActivePlayback {
            handle: Box::new(CommandHandle {
                stop: Some(stop_tx),
                _staged: staged,
            }),
            finished,
        })
    }
}

/// Clip file on disk, removed on drop.
struct StagedFile(PathBuf);

impl Drop for StagedFile {
    fn drop(&mut self) {
        if let Err(err) = std::fs::remove_file(&self.0) {
            tracing::debug!(?err, file = %self.0.display(), "Could not remove staged clip");
        }
    }
}

struct CommandHandle {
    stop: Option<oneshot::Sender<()>>,
    _staged: StagedFile,
}

impl CommandHandle {
    fn kill_player(&mut self) {
        if let Some(stop) = self.stop.take() {
            let _ = stop.send(());
        }
    }
}

impl PlaybackHandle for CommandHandle {
    // External players cannot be suspended portably; pausing ends the process.
    fn pause(&mut self) {
        self.kill_player();
    }

    // A new player process always starts from zero.
    fn rewind(&mut self) {}
}

impl Drop for CommandHandle {
    fn drop(&mut self) {
        self.kill_player();
    }
}
