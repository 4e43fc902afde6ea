//! Text-to-speech playback for assistant messages.

pub mod command;
pub mod controller;
pub mod sink;

pub use command::CommandSink;
pub use controller::{PlayOutcome, PlaybackController, PlaybackState, StopOutcome};
pub use sink::{ActivePlayback, AudioSink, PlaybackEnd, PlaybackError, PlaybackHandle};
