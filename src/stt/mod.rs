//! Speech-to-text.

pub mod transcriber;
pub mod whisper;

pub use transcriber::{MockTranscriber, Transcriber, Transcript, WordTiming, normalize};
pub use whisper::{WhisperConfig, WhisperTranscriber};
