//! Idle/Active conversation state.

use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Active,
}

/// Whether a conversation is open and when its window closes.
///
/// The expiry only exists while active.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ConversationState {
    expires_at: Option<Instant>,
}

impl ConversationState {
    pub fn idle() -> Self {
        Self::default()
    }

    pub fn phase(&self) -> Phase {
        if self.expires_at.is_some() {
            Phase::Active
        } else {
            Phase::Idle
        }
    }

    pub fn is_active(&self) -> bool {
        self.phase() == Phase::Active
    }

    pub fn expires_at(&self) -> Option<Instant> {
        self.expires_at
    }

    pub fn activate(&mut self, now: Instant, cooldown: Duration) {
        self.expires_at = Some(now + cooldown);
    }

    pub fn deactivate(&mut self) {
        self.expires_at = None;
    }

    /// Active with the window already closed.
    pub fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|at| now > at)
    }
}
