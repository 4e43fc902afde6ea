//! Client side of the voice backend.
//!
//! The backend is an opaque HTTP service exposing two endpoints:
//! - `POST /api/voice/chat` for dialogue
//! - `POST /api/voice/synthesize` for text-to-speech
//!
//! [`VoiceBackend`] is the seam the session components depend on;
//! [`HttpBackend`] is the production implementation.

pub mod http;

pub use http::{BackendHealth, HttpBackend};

use async_trait::async_trait;
use bytes::Bytes;

use crate::error::BackendResult;

/// Synthesized audio as returned by the backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioClip {
    /// Raw encoded audio.
    pub bytes: Bytes,
    /// `Content-Type` reported by the backend, if any.
    pub content_type: Option<String>,
}

impl AudioClip {
    /// Wrap raw bytes.
    #[must_use]
    pub fn new(bytes: impl Into<Bytes>, content_type: Option<String>) -> Self {
        Self {
            bytes: bytes.into(),
            content_type,
        }
    }

    /// Size in bytes.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Whether the clip carries no data.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// File extension matching the content type. Unknown types are assumed WAV,
    /// which is what the backend produces.
    #[must_use]
    pub fn extension(&self) -> &'static str {
        let essence = self
            .content_type
            .as_deref()
            .and_then(|ct| ct.split(';').next())
            .map_or("", str::trim);

        match essence {
            "audio/mpeg" | "audio/mp3" => "mp3",
            "audio/ogg" | "audio/opus" => "ogg",
            "audio/flac" | "audio/x-flac" => "flac",
            _ => "wav",
        }
    }
}

/// Dialogue and synthesis operations offered by the backend.
#[async_trait]
pub trait VoiceBackend: Send + Sync {
    /// Send one user message and return the assistant's reply text.
    ///
    /// # Errors
    /// Returns an error on transport failure, a non-success status or a reply
    /// without text.
    async fn chat(&self, message: &str) -> BackendResult<String>;

    /// Synthesize speech for `text`.
    ///
    /// # Errors
    /// Returns an error on transport failure, timeout or a non-success status.
    async fn synthesize(&self, text: &str) -> BackendResult<AudioClip>;
}
