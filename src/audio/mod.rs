//! Microphone frames and the per-frame classifiers that gate them.

#[cfg(feature = "cpal-audio")]
pub mod capture;
pub mod clock;
pub mod frame;
pub mod vad;
pub mod wake;
pub mod wav;

pub use clock::{Clock, MockClock, SystemClock};
pub use frame::{Frame, FrameAssembler, FrameSource, MockFrameSource};
pub use vad::{RmsVoiceActivity, ScriptedVad, VoiceActivityClassifier, calculate_rms};
pub use wake::{ScriptedWakeGate, TranscribingWakeGate, WakeWordGate};
pub use wav::WavFrameSource;
