//! Single-flight synthesis and playback of assistant messages.
//!
//! States: `Idle`, `Synthesizing { message_id }`, `Playing { message_id }`.
//! At most one message is in a non-idle state at a time. A ticket counter
//! identifies each attempt so that late completions of a superseded attempt
//! never touch the current state.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::sync::watch;
use tracing::{debug, info, warn};

use super::sink::{ActivePlayback, AudioSink, PlaybackHandle};
use crate::backend::VoiceBackend;
use crate::conversation::{Message, MessageId};
use crate::error::BackendError;

/// Observable playback state.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum PlaybackState {
    /// Nothing pending or playing.
    #[default]
    Idle,
    /// Waiting for the backend to synthesize audio.
    Synthesizing {
        /// Target message.
        message_id: MessageId,
    },
    /// Audio is playing.
    Playing {
        /// Message being played.
        message_id: MessageId,
    },
}

impl PlaybackState {
    /// Whether nothing is pending or playing.
    #[must_use]
    pub const fn is_idle(&self) -> bool {
        matches!(self, Self::Idle)
    }

    /// Id of the message currently playing, if any.
    #[must_use]
    pub const fn playing(&self) -> Option<&MessageId> {
        match self {
            Self::Playing { message_id } => Some(message_id),
            _ => None,
        }
    }
}

/// Result of [`PlaybackController::play`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayOutcome {
    /// Message had no text to speak.
    Skipped,
    /// Another synthesis request is still pending.
    Busy,
    /// Audio is now playing.
    Started,
    /// `stop` was called while synthesis was pending; the audio was discarded.
    Withdrawn,
    /// The backend failed or timed out.
    SynthesisFailed,
    /// The playback device refused the audio.
    DeviceFailed,
}

/// Result of [`PlaybackController::stop`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopOutcome {
    /// Nothing to stop.
    Idle,
    /// A pending synthesis was withdrawn.
    Withdrawn,
    /// A playback was halted and released.
    Stopped,
}

enum Phase {
    Idle,
    Synthesizing {
        message_id: MessageId,
    },
    Playing {
        message_id: MessageId,
        handle: Box<dyn PlaybackHandle>,
    },
}

impl Phase {
    fn snapshot(&self) -> PlaybackState {
        match self {
            Self::Idle => PlaybackState::Idle,
            Self::Synthesizing { message_id } => PlaybackState::Synthesizing {
                message_id: message_id.clone(),
            },
            Self::Playing { message_id, .. } => PlaybackState::Playing {
                message_id: message_id.clone(),
            },
        }
    }
}

struct Slot {
    ticket: u64,
    phase: Phase,
}

struct Shared {
    slot: Mutex<Slot>,
    state_tx: watch::Sender<PlaybackState>,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, Slot> {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn publish(&self, slot: &Slot) {
        self.state_tx.send_replace(slot.phase.snapshot());
    }

    /// Return to idle if `ticket` is still the current attempt. The released
    /// phase is handed back so the caller drops it outside the lock.
    fn settle_idle(&self, ticket: u64) -> Option<Phase> {
        let mut slot = self.lock();
        if slot.ticket != ticket {
            return None;
        }
        let previous = std::mem::replace(&mut slot.phase, Phase::Idle);
        self.publish(&slot);
        drop(slot);
        Some(previous)
    }
}

/// Drives synthesis and playback for one session.
pub struct PlaybackController {
    backend: Arc<dyn VoiceBackend>,
    sink: Arc<dyn AudioSink>,
    synthesis_timeout: Duration,
    shared: Arc<Shared>,
}

impl PlaybackController {
    /// Create an idle controller.
    #[must_use]
    pub fn new(
        backend: Arc<dyn VoiceBackend>,
        sink: Arc<dyn AudioSink>,
        synthesis_timeout: Duration,
    ) -> Self {
        let (state_tx, _) = watch::channel(PlaybackState::Idle);
        Self {
            backend,
            sink,
            synthesis_timeout,
            shared: Arc::new(Shared {
                slot: Mutex::new(Slot {
                    ticket: 0,
                    phase: Phase::Idle,
                }),
                state_tx,
            }),
        }
    }

    /// Current state.
    #[must_use]
    pub fn state(&self) -> PlaybackState {
        self.shared.lock().phase.snapshot()
    }

    /// Watch state changes.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<PlaybackState> {
        self.shared.state_tx.subscribe()
    }

    /// Whether `id` is the message currently playing.
    #[must_use]
    pub fn is_playing(&self, id: &MessageId) -> bool {
        let slot = self.shared.lock();
        matches!(&slot.phase, Phase::Playing { message_id, .. } if message_id == id)
    }

    /// Whether a synthesis request is pending.
    #[must_use]
    pub fn is_busy(&self) -> bool {
        let slot = self.shared.lock();
        matches!(slot.phase, Phase::Synthesizing { .. })
    }

    /// Synthesize and play `message`.
    ///
    /// Any playback already running is stopped first. Returns once synthesis has
    /// settled and playback (if any) has started; completion of the audio itself
    /// is tracked in the background.
    pub async fn play(&self, message: &Message) -> PlayOutcome {
        if message.content().trim().is_empty() {
            return PlayOutcome::Skipped;
        }

        let message_id = message.id().clone();
        let (ticket, superseded) = {
            let mut slot = self.shared.lock();
            if matches!(slot.phase, Phase::Synthesizing { .. }) {
                return PlayOutcome::Busy;
            }
            slot.ticket += 1;
            let superseded = std::mem::replace(
                &mut slot.phase,
                Phase::Synthesizing {
                    message_id: message_id.clone(),
                },
            );
            self.shared.publish(&slot);
            (slot.ticket, superseded)
        };
        halt(superseded);

        info!(%message_id, "Requesting speech synthesis");
        let synthesize = self.backend.synthesize(message.content());
        let synthesized = tokio::time::timeout(self.synthesis_timeout, synthesize)
            .await
            .unwrap_or(Err(BackendError::Timeout));

        let clip = match synthesized {
            Ok(clip) => clip,
            Err(err) => {
                warn!(%message_id, %err, "Speech synthesis failed");
                drop(self.shared.settle_idle(ticket));
                return PlayOutcome::SynthesisFailed;
            }
        };

        if !self.is_pending(ticket) {
            debug!(%message_id, "Synthesis finished after stop; discarding audio");
            return PlayOutcome::Withdrawn;
        }

        let bytes = clip.len();
        let ActivePlayback { handle, finished } = match self.sink.start(clip).await {
            Ok(playback) => playback,
            Err(err) => {
                warn!(%message_id, %err, "Audio playback could not start");
                drop(self.shared.settle_idle(ticket));
                return PlayOutcome::DeviceFailed;
            }
        };

        {
            let mut slot = self.shared.lock();
            if slot.ticket != ticket || !matches!(slot.phase, Phase::Synthesizing { .. }) {
                drop(slot);
                debug!(%message_id, "Playback started after stop; releasing");
                drop(handle);
                return PlayOutcome::Withdrawn;
            }
            slot.phase = Phase::Playing {
                message_id: message_id.clone(),
                handle,
            };
            self.shared.publish(&slot);
        }
        info!(%message_id, bytes, "Playback started");

        let shared = Arc::clone(&self.shared);
        tokio::spawn(async move {
            match finished.await {
                Ok(Ok(())) => debug!(%message_id, "Playback ended"),
                Ok(Err(err)) => warn!(%message_id, %err, "Audio playback failed"),
                // Sender dropped: playback was halted by `stop` or superseded.
                Err(_) => {}
            }
            drop(shared.settle_idle(ticket));
        });

        PlayOutcome::Started
    }

    /// Stop the current playback or withdraw a pending synthesis.
    #[must_use = "the outcome tells whether anything was halted"]
    pub fn stop(&self) -> StopOutcome {
        let previous = {
            let mut slot = self.shared.lock();
            if matches!(slot.phase, Phase::Idle) {
                return StopOutcome::Idle;
            }
            // Invalidate the current attempt so late completions are ignored.
            slot.ticket += 1;
            let previous = std::mem::replace(&mut slot.phase, Phase::Idle);
            self.shared.publish(&slot);
            drop(slot);
            previous
        };

        match previous {
            Phase::Synthesizing { message_id } => {
                debug!(%message_id, "Pending synthesis withdrawn");
                StopOutcome::Withdrawn
            }
            Phase::Playing { message_id, handle } => {
                info!(%message_id, "Playback stopped");
                halt(Phase::Playing { message_id, handle });
                StopOutcome::Stopped
            }
            Phase::Idle => StopOutcome::Idle,
        }
    }

    fn is_pending(&self, ticket: u64) -> bool {
        let slot = self.shared.lock();
        slot.ticket == ticket && matches!(slot.phase, Phase::Synthesizing { .. })
    }
}

/// Pause, rewind and release a playback taken out of the slot.
fn halt(phase: Phase) {
    if let Phase::Playing { mut handle, .. } = phase {
        handle.pause();
        handle.rewind();
    }
}
