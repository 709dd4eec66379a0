//! Conversation orchestration.

pub mod machine;
pub mod state;

pub use machine::{
    Components, ConversationSettings, ConversationStateMachine, Exchange, RunStats, Step,
};
pub use state::{ConversationState, Phase};
