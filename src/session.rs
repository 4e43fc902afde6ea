//! One chat session: the conversation log plus its playback controller.

use std::sync::Arc;

use crate::backend::{HttpBackend, VoiceBackend};
use crate::config::ClientConfig;
use crate::conversation::{ConversationStore, Message, MessageId, Role, SubmitOutcome};
use crate::error::BackendResult;
use crate::playback::{AudioSink, CommandSink, PlayOutcome, PlaybackController, StopOutcome};

/// Starter questions offered while the log holds only the welcome message.
pub const SUGGESTED_QUESTIONS: [&str; 8] = [
    "福州的历史文化有哪些特色？",
    "泉州海上丝绸之路的故事",
    "妈祖文化的起源和发展",
    "朱子故里有哪些文化遗产？",
    "龙岩的红色历史文化",
    "福建茶文化介绍",
    "福建传统建筑特色",
    "闽剧的发展历程",
];

/// Result of [`ChatSession::toggle_playback`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToggleOutcome {
    /// The message was playing and has been stopped.
    Stopped,
    /// Playback was requested.
    Play(PlayOutcome),
    /// The message offers no playback (user turn or welcome message).
    NotPlayable,
    /// No message with that id.
    UnknownMessage,
}

/// Session state owned by the presentation layer.
pub struct ChatSession {
    store: ConversationStore,
    playback: PlaybackController,
}

impl ChatSession {
    /// Create a session seeded with the welcome message.
    #[must_use]
    pub fn new(backend: Arc<dyn VoiceBackend>, sink: Arc<dyn AudioSink>, config: &ClientConfig) -> Self {
        let store = ConversationStore::new(Arc::clone(&backend));
        store.initialize();
        let playback = PlaybackController::new(backend, sink, config.synthesis_timeout);
        Self { store, playback }
    }

    /// Wire a session to the HTTP backend and the external player from `config`.
    ///
    /// The backend is returned as well for calls outside the session, such as
    /// health checks.
    ///
    /// # Errors
    /// Returns an error if the HTTP client cannot be built.
    pub fn connect(config: &ClientConfig) -> BackendResult<(Self, Arc<HttpBackend>)> {
        let backend = Arc::new(HttpBackend::new(config)?);
        let sink = Arc::new(CommandSink::new(config.player.clone(), &config.audio_dir));
        let session = Self::new(Arc::clone(&backend) as Arc<dyn VoiceBackend>, sink, config);
        Ok((session, backend))
    }

    /// Conversation log.
    #[must_use]
    pub const fn store(&self) -> &ConversationStore {
        &self.store
    }

    /// Playback controller.
    #[must_use]
    pub const fn playback(&self) -> &PlaybackController {
        &self.playback
    }

    /// Snapshot of the log.
    #[must_use]
    pub fn messages(&self) -> Vec<Message> {
        self.store.messages()
    }

    /// Whether any request is pending; the UI disables its controls meanwhile.
    #[must_use]
    pub fn is_busy(&self) -> bool {
        self.store.is_in_flight() || self.playback.is_busy()
    }

    /// Submit typed text.
    pub async fn submit(&self, text: &str) -> SubmitOutcome {
        self.store.submit(text).await
    }

    /// Suggested questions to display right now.
    #[must_use]
    pub fn suggestions(&self) -> &'static [&'static str] {
        if self.store.len() == 1 {
            &SUGGESTED_QUESTIONS
        } else {
            &[]
        }
    }

    /// Submit suggested question `index`. `None` if no such suggestion is shown.
    pub async fn ask_suggested(&self, index: usize) -> Option<SubmitOutcome> {
        let question = self.suggestions().get(index)?;
        Some(self.store.submit(question).await)
    }

    /// Whether `message` offers a playback control.
    #[must_use]
    pub fn can_play(message: &Message) -> bool {
        message.role() == Role::Assistant && !message.id().is_welcome()
    }

    /// Play `id`, or stop it when it is the message currently playing.
    pub async fn toggle_playback(&self, id: &MessageId) -> ToggleOutcome {
        let Some(message) = self.store.get(id) else {
            return ToggleOutcome::UnknownMessage;
        };
        if !Self::can_play(&message) {
            return ToggleOutcome::NotPlayable;
        }
        if self.playback.is_playing(id) {
            let _ = self.playback.stop();
            return ToggleOutcome::Stopped;
        }
        ToggleOutcome::Play(self.playback.play(&message).await)
    }

    /// Stop whatever is playing.
    #[must_use = "the outcome tells whether anything was halted"]
    pub fn stop_playback(&self) -> StopOutcome {
        self.playback.stop()
    }
}
