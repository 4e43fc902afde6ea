//! Message records held by the conversation log.

use core::fmt;

use chrono::{DateTime, Local, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Generate an ID with good ordering locality.
///
/// With feature `uuid_v7` enabled, this uses `Uuid::now_v7()`.
/// Otherwise it falls back to `Uuid::new_v4()`.
#[inline]
#[must_use]
fn uuid_time_ordered() -> Uuid {
    #[cfg(feature = "uuid_v7")]
    {
        Uuid::now_v7()
    }
    #[cfg(not(feature = "uuid_v7"))]
    {
        Uuid::new_v4()
    }
}

/// Identifier of one message within a session.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[repr(transparent)]
#[serde(transparent)]
pub struct MessageId(String);

impl MessageId {
    /// Sentinel id of the seeded welcome message.
    pub const WELCOME: &'static str = "welcome";

    /// Create a fresh identifier.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self(uuid_time_ordered().to_string())
    }

    /// Identifier of the seeded welcome message.
    #[inline]
    #[must_use]
    pub fn welcome() -> Self {
        Self(Self::WELCOME.to_string())
    }

    /// Whether this is the welcome sentinel.
    #[inline]
    #[must_use]
    pub fn is_welcome(&self) -> bool {
        self.0 == Self::WELCOME
    }

    /// Borrow as `&str`.
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for MessageId {
    #[inline]
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl AsRef<str> for MessageId {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

/// Author of a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Typed by the person using the page.
    User,
    /// Produced by the backend (or the fixed welcome/apology text).
    Assistant,
}

impl Role {
    /// Wire/display name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One conversational turn.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    id: MessageId,
    role: Role,
    content: String,
    timestamp: DateTime<Utc>,
}

impl Message {
    /// Create a message stamped with the current time.
    #[must_use]
    pub fn new(id: MessageId, role: Role, content: impl Into<String>) -> Self {
        Self {
            id,
            role,
            content: content.into(),
            timestamp: Utc::now(),
        }
    }

    /// User turn with a fresh id.
    #[must_use]
    pub fn user(content: impl Into<String>) -> Self {
        Self::new(MessageId::new(), Role::User, content)
    }

    /// Assistant turn with a fresh id.
    #[must_use]
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(MessageId::new(), Role::Assistant, content)
    }

    /// Message identifier.
    #[must_use]
    pub const fn id(&self) -> &MessageId {
        &self.id
    }

    /// Author role.
    #[must_use]
    pub const fn role(&self) -> Role {
        self.role
    }

    /// Raw text.
    #[must_use]
    pub fn content(&self) -> &str {
        &self.content
    }

    /// Creation time.
    #[must_use]
    pub const fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    /// Lines of the content; each renders as its own paragraph.
    #[must_use]
    pub fn paragraphs(&self) -> impl Iterator<Item = &str> {
        self.content.split('\n')
    }

    /// Local `HH:MM` time label.
    #[must_use]
    pub fn display_time(&self) -> String {
        self.timestamp
            .with_timezone(&Local)
            .format("%H:%M")
            .to_string()
    }
}
