use std::collections::VecDeque;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{CoreError, Result};
use crate::ids::SessionId;
use crate::prompt::PromptEvent;

pub const CONVERSATION_BINDING_TTL_HOURS: i64 = 4;
pub const MAX_QUEUED_PROMPTS: usize = 32;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConversationState {
    Idle,
    Running,
    Streaming,
    AwaitingInput,
    Stopped,
}

impl ConversationState {
    /// The transition graph from spec.md §3 — `Stopped` is a sink, every other
    /// state may return to any other non-`Stopped` state except itself directly
    /// jumping back to `Idle` (only `running`/`streaming`/`awaiting_input` settle there).
    pub fn can_transition_to(self, next: ConversationState) -> bool {
        use ConversationState::*;
        match (self, next) {
            (Idle, Running | Stopped) => true,
            (Running, Streaming | AwaitingInput | Stopped) => true,
            (Streaming, Running | AwaitingInput | Stopped) => true,
            (AwaitingInput, Running | Streaming | Stopped) => true,
            _ => false,
        }
    }
}

/// Maps `(channel_name, thread_id)` to a session, with its own short-lived
/// state machine on top of the session's own (longer-lived) lifecycle status.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationBinding {
    pub channel_name: String,
    pub thread_id: String,
    pub session_id: SessionId,
    pub state: ConversationState,
    pub last_activity: DateTime<Utc>,
    pub queued: VecDeque<PromptEvent>,
}

impl ConversationBinding {
    pub fn new(channel_name: impl Into<String>, thread_id: impl Into<String>, session_id: SessionId) -> Self {
        Self {
            channel_name: channel_name.into(),
            thread_id: thread_id.into(),
            session_id,
            state: ConversationState::Idle,
            last_activity: Utc::now(),
            queued: VecDeque::new(),
        }
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now - self.last_activity >= Duration::hours(CONVERSATION_BINDING_TTL_HOURS)
    }

    pub fn transition(&mut self, next: ConversationState) -> Result<()> {
        if self.state == ConversationState::Stopped {
            return Err(CoreError::InvalidTransition {
                from: "stopped".to_string(),
                to: format!("{next:?}"),
            });
        }
        if !self.state.can_transition_to(next) {
            return Err(CoreError::InvalidTransition {
                from: format!("{:?}", self.state),
                to: format!("{next:?}"),
            });
        }
        self.state = next;
        self.last_activity = Utc::now();
        Ok(())
    }

    pub fn enqueue(&mut self, event: PromptEvent) -> Result<()> {
        if self.queued.len() >= MAX_QUEUED_PROMPTS {
            return Err(CoreError::Internal(
                "conversation queue full, dropping oldest prompt is not permitted".to_string(),
            ));
        }
        self.queued.push_back(event);
        Ok(())
    }

    pub fn dequeue_next(&mut self) -> Option<PromptEvent> {
        self.queued.pop_front()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stopped_is_a_sink() {
        let mut binding = ConversationBinding::new("telegram", "thread-1", SessionId::new());
        binding.transition(ConversationState::Running).unwrap();
        binding.transition(ConversationState::Stopped).unwrap();
        assert!(binding.transition(ConversationState::Running).is_err());
    }

    #[test]
    fn ttl_expiry_is_time_based() {
        let binding = ConversationBinding::new("telegram", "thread-1", SessionId::new());
        assert!(!binding.is_expired(binding.last_activity));
        assert!(binding.is_expired(binding.last_activity + Duration::hours(5)));
    }

    #[test]
    fn idle_cannot_jump_to_streaming_directly() {
        let binding = ConversationBinding::new("telegram", "thread-1", SessionId::new());
        assert!(!binding
            .state
            .can_transition_to(ConversationState::Streaming));
    }
}
