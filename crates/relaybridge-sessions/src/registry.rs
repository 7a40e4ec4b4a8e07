use std::collections::HashMap;
use std::sync::Mutex;

use chrono::Utc;

use relaybridge_core::conversation::{ConversationBinding, ConversationState};
use relaybridge_core::ids::SessionId;
use relaybridge_core::prompt::PromptEvent;

use crate::error::{Result, SessionsError};

/// In-memory `(channel_name, thread_id) -> session` bindings.
///
/// Not persisted: a restart loses in-flight conversation routing, same as
/// the supervised child processes themselves do not survive a restart.
/// Expiry is checked lazily on `resolve`/`bind`, not by a background sweep.
pub struct ConversationRegistry {
    bindings: Mutex<HashMap<(String, String), ConversationBinding>>,
}

impl Default for ConversationRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ConversationRegistry {
    pub fn new() -> Self {
        Self {
            bindings: Mutex::new(HashMap::new()),
        }
    }

    fn key(channel_name: &str, thread_id: &str) -> (String, String) {
        (channel_name.to_string(), thread_id.to_string())
    }

    /// Create or replace the binding for `(channel_name, thread_id)`.
    pub fn bind(&self, channel_name: &str, thread_id: &str, session_id: SessionId) {
        let mut bindings = self.bindings.lock().unwrap_or_else(|p| p.into_inner());
        bindings.insert(
            Self::key(channel_name, thread_id),
            ConversationBinding::new(channel_name, thread_id, session_id),
        );
    }

    /// Look up the session bound to `(channel_name, thread_id)`, pruning it
    /// first if its TTL has lapsed.
    pub fn resolve(&self, channel_name: &str, thread_id: &str) -> Option<SessionId> {
        let mut bindings = self.bindings.lock().unwrap_or_else(|p| p.into_inner());
        let key = Self::key(channel_name, thread_id);
        let expired = bindings
            .get(&key)
            .map(|b| b.is_expired(Utc::now()))
            .unwrap_or(false);
        if expired {
            bindings.remove(&key);
            return None;
        }
        bindings.get(&key).map(|b| b.session_id.clone())
    }

    pub fn unbind(&self, channel_name: &str, thread_id: &str) {
        let mut bindings = self.bindings.lock().unwrap_or_else(|p| p.into_inner());
        bindings.remove(&Self::key(channel_name, thread_id));
    }

    /// Drive the conversation's own short-lived state machine (separate from
    /// the session's longer-lived lifecycle status).
    pub fn transition(&self, channel_name: &str, thread_id: &str, next: ConversationState) -> Result<()> {
        let mut bindings = self.bindings.lock().unwrap_or_else(|p| p.into_inner());
        let key = Self::key(channel_name, thread_id);
        let binding = bindings.get_mut(&key).ok_or_else(|| SessionsError::NotFound {
            session_id: format!("{channel_name}/{thread_id}"),
        })?;
        binding.transition(next).map_err(|_| SessionsError::NotFound {
            session_id: format!("{channel_name}/{thread_id}"),
        })
    }

    /// The conversation's current state, if a binding exists for this thread.
    pub fn state(&self, channel_name: &str, thread_id: &str) -> Option<ConversationState> {
        let bindings = self.bindings.lock().unwrap_or_else(|p| p.into_inner());
        bindings.get(&Self::key(channel_name, thread_id)).map(|b| b.state)
    }

    /// Queue a detected prompt against its conversation's backlog.
    pub fn enqueue_prompt(&self, channel_name: &str, thread_id: &str, event: PromptEvent) -> Result<()> {
        let mut bindings = self.bindings.lock().unwrap_or_else(|p| p.into_inner());
        let key = Self::key(channel_name, thread_id);
        let binding = bindings.get_mut(&key).ok_or_else(|| SessionsError::NotFound {
            session_id: format!("{channel_name}/{thread_id}"),
        })?;
        binding.enqueue(event).map_err(|_| SessionsError::QueueFull {
            channel_name: channel_name.to_string(),
            thread_id: thread_id.to_string(),
        })
    }

    pub fn dequeue_prompt(&self, channel_name: &str, thread_id: &str) -> Option<PromptEvent> {
        let mut bindings = self.bindings.lock().unwrap_or_else(|p| p.into_inner());
        bindings
            .get_mut(&Self::key(channel_name, thread_id))
            .and_then(|b| b.dequeue_next())
    }

    /// Drop every binding whose TTL has lapsed. Intended to run on a slow
    /// interval tick so memory does not grow unbounded for abandoned threads.
    pub fn sweep_expired(&self) -> usize {
        let mut bindings = self.bindings.lock().unwrap_or_else(|p| p.into_inner());
        let now = Utc::now();
        let before = bindings.len();
        bindings.retain(|_, b| !b.is_expired(now));
        before - bindings.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use relaybridge_core::prompt::{Confidence, PromptType};

    #[test]
    fn bind_then_resolve_roundtrips() {
        let registry = ConversationRegistry::new();
        let session_id = SessionId::new();
        registry.bind("telegram", "thread-1", session_id.clone());
        assert_eq!(registry.resolve("telegram", "thread-1"), Some(session_id));
    }

    #[test]
    fn resolve_unknown_thread_is_none() {
        let registry = ConversationRegistry::new();
        assert!(registry.resolve("telegram", "unknown").is_none());
    }

    #[test]
    fn enqueue_against_unbound_thread_errors() {
        let registry = ConversationRegistry::new();
        let event = PromptEvent::new(SessionId::new(), PromptType::YesNo, Confidence::High, "ok?", None, 60);
        assert!(registry.enqueue_prompt("telegram", "thread-1", event).is_err());
    }

    #[test]
    fn enqueue_then_dequeue_roundtrips() {
        let registry = ConversationRegistry::new();
        let session_id = SessionId::new();
        registry.bind("telegram", "thread-1", session_id.clone());
        let event = PromptEvent::new(session_id, PromptType::YesNo, Confidence::High, "ok?", None, 60);
        registry.enqueue_prompt("telegram", "thread-1", event).unwrap();
        assert!(registry.dequeue_prompt("telegram", "thread-1").is_some());
        assert!(registry.dequeue_prompt("telegram", "thread-1").is_none());
    }

    #[test]
    fn transition_drives_the_bound_conversation_state() {
        let registry = ConversationRegistry::new();
        registry.bind("telegram", "thread-1", SessionId::new());
        assert_eq!(registry.state("telegram", "thread-1"), Some(ConversationState::Idle));
        registry.transition("telegram", "thread-1", ConversationState::Running).unwrap();
        assert_eq!(registry.state("telegram", "thread-1"), Some(ConversationState::Running));
    }

    #[test]
    fn transition_against_unbound_thread_errors() {
        let registry = ConversationRegistry::new();
        assert!(registry.transition("telegram", "thread-1", ConversationState::Running).is_err());
    }
}
