//! buddy - Offline voice assistant for single-board computers
//!
//! Wake word, utterance capture, intent or generated reply, spoken output.

// Enforce error handling discipline
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]
#![warn(clippy::let_underscore_must_use)]

pub mod app;
pub mod audio;
pub mod capture;
#[cfg(feature = "cli")]
pub mod cli;
pub mod config;
pub mod conversation;
pub mod defaults;
pub mod devices;
pub mod error;
pub mod intent;
pub mod llm;
pub mod logging;
pub mod speech;
pub mod stt;
pub mod sys;

// Core capability traits
pub use audio::{Clock, FrameSource, VoiceActivityClassifier, WakeWordGate};
pub use devices::{DisplayCapability, LedCapability, SensorCapability};
pub use intent::IntentEngine;
pub use llm::ResponseGenerator;
pub use speech::{Speaker, SpeechSynthesizer};
pub use stt::Transcriber;

// Conversation loop
pub use conversation::{
    Components, ConversationSettings, ConversationStateMachine, Exchange, Phase, Step,
};

// Error handling
pub use error::{BuddyError, Result, SensorError};

// Config
pub use config::Config;

/// Build version string with optional git commit hash.
///
/// Returns `"0.1.0+abc1234"` when git hash is available, `"0.1.0"` otherwise.
pub fn version_string() -> String {
    let version = env!("CARGO_PKG_VERSION");
    match option_env!("GIT_HASH") {
        Some(hash) if !hash.is_empty() => format!("{}+{}", version, hash),
        _ => version.to_string(),
    }
}
