use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::{ChannelIdentity, Nonce, PromptId, SessionId};

/// A human's answer to a [`crate::prompt::PromptEvent`], or a free chat turn
/// when `prompt_id` is `None`. Immutable once received.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Reply {
    pub prompt_id: Option<PromptId>,
    pub session_id: SessionId,
    pub value: String,
    pub nonce: Nonce,
    pub channel_identity: ChannelIdentity,
    pub timestamp: DateTime<Utc>,
    pub thread_id: Option<String>,
}

impl Reply {
    pub fn new_for_prompt(
        prompt_id: PromptId,
        session_id: SessionId,
        value: impl Into<String>,
        channel_identity: ChannelIdentity,
        thread_id: Option<String>,
    ) -> Self {
        Self {
            prompt_id: Some(prompt_id),
            session_id,
            value: value.into(),
            nonce: Nonce::new(),
            channel_identity,
            timestamp: Utc::now(),
            thread_id,
        }
    }

    pub fn new_chat_turn(
        session_id: SessionId,
        value: impl Into<String>,
        channel_identity: ChannelIdentity,
        thread_id: Option<String>,
    ) -> Self {
        Self {
            prompt_id: None,
            session_id,
            value: value.into(),
            nonce: Nonce::new(),
            channel_identity,
            timestamp: Utc::now(),
            thread_id,
        }
    }

    pub fn is_chat_turn(&self) -> bool {
        self.prompt_id.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chat_turn_has_no_prompt_id() {
        let identity = ChannelIdentity::new("telegram", "42");
        let reply = Reply::new_chat_turn(SessionId::new(), "hello", identity, None);
        assert!(reply.is_chat_turn());
    }

    #[test]
    fn each_reply_gets_a_fresh_nonce() {
        let identity = ChannelIdentity::new("telegram", "42");
        let a = Reply::new_chat_turn(SessionId::new(), "a", identity.clone(), None);
        let b = Reply::new_chat_turn(SessionId::new(), "b", identity, None);
        assert_ne!(a.nonce, b.nonce);
    }
}
