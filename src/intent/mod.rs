//! Intent recognition and dispatch.

pub mod dispatcher;
pub mod grammar;
pub mod inference;
pub mod matcher;
pub mod palette;

pub use dispatcher::{DispatchOutcome, IntentActionDispatcher};
pub use grammar::{Endpointing, Grammar, GrammarIntentEngine};
pub use inference::{Inference, Intent, SensorQuery, Slots};
pub use matcher::{IntentEngine, MockIntentEngine, match_utterance};
pub use palette::{Colour, Rgb, Shade};
