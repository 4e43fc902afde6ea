//! Chat and text-to-speech client for the Minzai (闽仔) voice demo backend.

// Interdiction stricte de pratiques dangereuses ou non idiomatiques
#![deny(warnings)] // Tous les warnings sont traités comme des erreurs
#![deny(unsafe_code)] // Le code unsafe est interdit
#![deny(missing_docs)] // Toute fonction, struct, enum ou module public doit être documenté
#![deny(dead_code)] // Le code inutilisé est interdit
#![deny(non_camel_case_types)]
// Options supplémentaires pour ne rien laisser passer
#![deny(unused_imports)]
#![deny(unused_variables)]
#![deny(unused_must_use)] // Oblige à gérer explicitement les Result et Option
#![deny(non_snake_case)]
#![deny(non_upper_case_globals)]
#![deny(nonstandard_style)]
#![forbid(unsafe_op_in_unsafe_fn)]
// Clippy pour stricte discipline
#![deny(clippy::all)]
#![deny(clippy::pedantic)]
#![deny(clippy::nursery)]
#![deny(clippy::unwrap_used)] // Interdit unwrap()
#![deny(clippy::expect_used)] // Interdit expect()
#![deny(clippy::panic)] // Interdit panic!()
#![deny(clippy::print_stdout)] // Interdit println!() en production
#![deny(clippy::todo)]
#![deny(clippy::unimplemented)]
#![deny(clippy::missing_const_for_fn)] // Force const lorsque possible
#![deny(clippy::unwrap_in_result)]
#![deny(clippy::module_inception)]
#![deny(clippy::redundant_clone)]
#![deny(clippy::shadow_unrelated)]
#![deny(clippy::too_many_arguments)]
#![deny(clippy::cognitive_complexity)]
#![cfg_attr(
    test,
    allow(clippy::unwrap_used, clippy::expect_used, clippy::panic, clippy::unwrap_in_result)
)]
// Lints pour sécurité et robustesse
#![deny(overflowing_literals)]

/// Backend wire client.
pub mod backend;
/// Terminal front end.
pub mod cli;
/// Client configuration.
pub mod config;
/// Conversation log.
pub mod conversation;
/// Backend error types.
pub mod error;
/// Synthesis and playback.
pub mod playback;
/// Session facade for the presentation layer.
pub mod session;

#[cfg(test)]
mod testing;

pub use backend::{AudioClip, HttpBackend, VoiceBackend};
pub use config::{ClientConfig, ConfigError, PlayerConfig};
pub use conversation::{ConversationStore, Message, MessageId, Role, SubmitOutcome};
pub use error::{BackendError, BackendResult};
pub use playback::{PlayOutcome, PlaybackController, PlaybackState, StopOutcome};
pub use session::{ChatSession, SUGGESTED_QUESTIONS, ToggleOutcome};
