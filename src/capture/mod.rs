//! Utterance capture after a wake trigger.

pub mod utterance;

pub use utterance::{CaptureEnd, CaptureLimits, CaptureOutcome, Utterance, capture_utterance};
