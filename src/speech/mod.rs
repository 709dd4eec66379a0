//! Spoken output.

pub mod queue;
pub mod synthesizer;

pub use queue::{RecordingSpeaker, Speaker, SpeechHandle, SpeechQueue};
pub use synthesizer::{PiperSynthesizer, RecordingSynthesizer, SpeechSynthesizer};
