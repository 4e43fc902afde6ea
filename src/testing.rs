//! In-process fakes for the backend and the playback device.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::{Notify, oneshot};

use crate::backend::{AudioClip, VoiceBackend};
use crate::error::{BackendError, BackendResult};
use crate::playback::{ActivePlayback, AudioSink, PlaybackEnd, PlaybackError, PlaybackHandle};

/// Scripted backend. Chat replies are served in order; once exhausted every
/// chat call answers HTTP 503.
#[derive(Default)]
pub struct FakeBackend {
    replies: Mutex<VecDeque<BackendResult<String>>>,
    received: Mutex<Vec<String>>,
    chat_gate: Option<Notify>,
    synthesis_gate: Option<Notify>,
    synthesis_fails: bool,
    synthesis_hangs: bool,
    synthesis_calls: AtomicUsize,
}

impl FakeBackend {
    pub fn with_replies(mut self, replies: Vec<BackendResult<String>>) -> Self {
        self.replies = Mutex::new(replies.into());
        self
    }

    pub fn gate_chat(mut self) -> Self {
        self.chat_gate = Some(Notify::new());
        self
    }

    pub fn gate_synthesis(mut self) -> Self {
        self.synthesis_gate = Some(Notify::new());
        self
    }

    pub const fn failing_synthesis(mut self) -> Self {
        self.synthesis_fails = true;
        self
    }

    pub const fn hanging_synthesis(mut self) -> Self {
        self.synthesis_hangs = true;
        self
    }

    pub fn open_chat_gate(&self) {
        if let Some(gate) = &self.chat_gate {
            gate.notify_one();
        }
    }

    pub fn open_synthesis_gate(&self) {
        if let Some(gate) = &self.synthesis_gate {
            gate.notify_one();
        }
    }

    pub fn received(&self) -> Vec<String> {
        self.received.lock().unwrap().clone()
    }

    pub fn synthesis_calls(&self) -> usize {
        self.synthesis_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl VoiceBackend for FakeBackend {
    async fn chat(&self, message: &str) -> BackendResult<String> {
        self.received.lock().unwrap().push(message.to_string());
        if let Some(gate) = &self.chat_gate {
            gate.notified().await;
        }
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Err(BackendError::Status(503)))
    }

    async fn synthesize(&self, text: &str) -> BackendResult<AudioClip> {
        self.synthesis_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(gate) = &self.synthesis_gate {
            gate.notified().await;
        }
        if self.synthesis_hangs {
            std::future::pending::<()>().await;
        }
        if self.synthesis_fails {
            return Err(BackendError::Status(500));
        }
        Ok(AudioClip::new(
            text.as_bytes().to_vec(),
            Some("audio/wav".to_string()),
        ))
    }
}

/// Call counters shared between a [`FakeSink`] and its handles.
#[derive(Default)]
pub struct Counters {
    pub started: AtomicUsize,
    pub paused: AtomicUsize,
    pub rewound: AtomicUsize,
    pub released: AtomicUsize,
}

struct FakeHandle(Arc<Counters>);

impl PlaybackHandle for FakeHandle {
    fn pause(&mut self) {
        self.0.paused.fetch_add(1, Ordering::SeqCst);
    }

    fn rewind(&mut self) {
        self.0.rewound.fetch_add(1, Ordering::SeqCst);
    }
}

impl Drop for FakeHandle {
    fn drop(&mut self) {
        self.0.released.fetch_add(1, Ordering::SeqCst);
    }
}

/// Playback device whose playbacks end only when the test says so.
#[derive(Default)]
pub struct FakeSink {
    pub counters: Arc<Counters>,
    endings: Mutex<Vec<oneshot::Sender<PlaybackEnd>>>,
    start_gate: Option<Notify>,
    refuse: bool,
}

impl FakeSink {
    pub fn refusing() -> Self {
        Self {
            refuse: true,
            ..Self::default()
        }
    }

    /// Hold every `start` call until [`FakeSink::open_start_gate`].
    pub fn gate_start(mut self) -> Self {
        self.start_gate = Some(Notify::new());
        self
    }

    pub fn open_start_gate(&self) {
        if let Some(gate) = &self.start_gate {
            gate.notify_one();
        }
    }

    /// End the most recently started playback.
    pub fn end_latest(&self, end: PlaybackEnd) {
        let sender = self.endings.lock().unwrap().pop().unwrap();
        let _ = sender.send(end);
    }

    /// End the oldest playback still tracked.
    pub fn end_oldest(&self, end: PlaybackEnd) {
        let sender = self.endings.lock().unwrap().remove(0);
        let _ = sender.send(end);
    }

    pub fn started(&self) -> usize {
        self.counters.started.load(Ordering::SeqCst)
    }

    pub fn paused(&self) -> usize {
        self.counters.paused.load(Ordering::SeqCst)
    }

    pub fn rewound(&self) -> usize {
        self.counters.rewound.load(Ordering::SeqCst)
    }

    pub fn released(&self) -> usize {
        self.counters.released.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AudioSink for FakeSink {
    async fn start(&self, _clip: AudioClip) -> Result<ActivePlayback, PlaybackError> {
        if let Some(gate) = &self.start_gate {
            gate.notified().await;
        }
        if self.refuse {
            return Err(PlaybackError::PlayerExited(Some(1)));
        }
        self.counters.started.fetch_add(1, Ordering::SeqCst);
        let (tx, finished) = oneshot::channel();
        self.endings.lock().unwrap().push(tx);
        Ok(ActivePlayback {
            handle: Box::new(FakeHandle(Arc::clone(&self.counters))),
            finished,
        })
    }
}
