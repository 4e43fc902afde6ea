//! Conversation log: message records and the store that owns them.

pub mod message;
pub mod store;

pub use message::{Message, MessageId, Role};
pub use store::{
    APOLOGY_TEXT, ConversationStore, DialogueState, RejectReason, SubmitOutcome, WELCOME_TEXT,
};
