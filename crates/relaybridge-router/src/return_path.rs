//! Return path: an inbound [`Reply`] is validated against the prompt it
//! answers, then carried through to resolution.
//!
//! Split into two steps because the actual PTY write lives outside this
//! crate (the session-owning task drives its own `InteractionExecutor`):
//! [`accept_reply`] validates and claims the reply before anything is
//! injected; [`finalize_reply`] runs only once that injection has actually
//! happened, and is the step that can fail-safe back to a queued retry if
//! the caller chooses not to call it.

use chrono::Utc;

use relaybridge_channels::{Channel, SentMessageRef};
use relaybridge_core::conversation::ConversationState;
use relaybridge_core::prompt::{PromptEvent, PromptStateMachine, PromptStatus};
use relaybridge_core::reply::Reply;
use relaybridge_core::session::Session;
use relaybridge_sessions::{ConversationRegistry, SessionManager};

use crate::error::{Result, RouterError};
use crate::nonce::NonceStore;

/// A reply that has passed every return-path check and is safe to inject.
pub struct AcceptedReply {
    pub value: String,
}

/// Validates `reply` against `prompt` and transitions the prompt's state
/// machine `awaiting_reply -> reply_received`. Checks run in the order
/// spec'd: expiry, session match, identity allowlist, then single-use nonce
/// — the nonce is claimed last so a rejected reply never burns it.
pub fn accept_reply(
    reply: &Reply,
    prompt: &PromptEvent,
    state_machine: &mut PromptStateMachine,
    channel: &dyn Channel,
    channel_name: &str,
    nonces: &NonceStore,
) -> Result<AcceptedReply> {
    if prompt.is_expired(Utc::now()) {
        return Err(RouterError::PromptExpired);
    }
    if reply.session_id != prompt.session_id {
        return Err(RouterError::SessionMismatch);
    }

    let (identity_channel, user_id) = reply.channel_identity.split().ok_or(RouterError::MalformedIdentity)?;
    if identity_channel != channel_name || !channel.is_allowed(user_id) {
        return Err(RouterError::NotAllowlisted);
    }

    if !nonces.claim(&reply.nonce) {
        return Err(RouterError::NonceReused);
    }

    state_machine.transition(PromptStatus::ReplyReceived)?;
    Ok(AcceptedReply { value: reply.value.clone() })
}

/// Completes the return path once `accept_reply`'s value has actually been
/// injected: transitions `reply_received -> injected -> resolved`, edits the
/// channel message to show the final value, clears the session's active
/// prompt, and drains the next queued prompt for this thread.
///
/// `display_value` is `"[REDACTED]"` for password prompts — the channel and
/// audit trail must never show the real value (spec invariant D/E).
#[allow(clippy::too_many_arguments)]
pub async fn finalize_reply(
    state_machine: &mut PromptStateMachine,
    session: &mut Session,
    message_ref: &SentMessageRef,
    display_value: &str,
    channel: &dyn Channel,
    channel_name: &str,
    thread_id: &str,
    sessions: &SessionManager,
    conversations: &ConversationRegistry,
) -> Result<Option<PromptEvent>> {
    state_machine.transition(PromptStatus::Injected)?;
    state_machine.transition(PromptStatus::Resolved)?;

    channel.edit_prompt_message(message_ref, display_value).await?;

    session.clear_active_prompt();
    sessions.save(session)?;

    let next_queued = conversations.dequeue_prompt(channel_name, thread_id);
    if next_queued.is_none() {
        let _ = conversations.transition(channel_name, thread_id, ConversationState::Idle);
    }

    Ok(next_queued)
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;
    use rusqlite::Connection;

    use relaybridge_channels::{ChannelStatus, Notification, OutputChunk};
    use relaybridge_core::ids::{ChannelIdentity, PromptId, SessionId};
    use relaybridge_core::prompt::{Confidence, PromptType};
    use relaybridge_channels::PromptDelivery;

    use super::*;

    struct FakeChannel {
        edits: Mutex<Vec<String>>,
        allowed: Vec<String>,
    }

    #[async_trait]
    impl Channel for FakeChannel {
        fn name(&self) -> &str {
            "telegram"
        }
        async fn connect(&mut self) -> std::result::Result<(), relaybridge_channels::ChannelError> {
            Ok(())
        }
        async fn disconnect(&mut self) -> std::result::Result<(), relaybridge_channels::ChannelError> {
            Ok(())
        }
        async fn send_prompt(&self, _: &PromptDelivery) -> std::result::Result<SentMessageRef, relaybridge_channels::ChannelError> {
            unreachable!("not exercised on the return path")
        }
        async fn edit_prompt_message(&self, _: &SentMessageRef, text: &str) -> std::result::Result<(), relaybridge_channels::ChannelError> {
            self.edits.lock().unwrap_or_else(|p| p.into_inner()).push(text.to_string());
            Ok(())
        }
        async fn send_output(&self, _: &OutputChunk) -> std::result::Result<(), relaybridge_channels::ChannelError> {
            Ok(())
        }
        async fn notify(&self, _: &Notification) -> std::result::Result<(), relaybridge_channels::ChannelError> {
            Ok(())
        }
        async fn receive_replies(&self) -> std::result::Result<Vec<Reply>, relaybridge_channels::ChannelError> {
            Ok(vec![])
        }
        fn is_allowed(&self, identity: &str) -> bool {
            self.allowed.iter().any(|a| a == identity)
        }
        fn status(&self) -> ChannelStatus {
            ChannelStatus::Connected
        }
    }

    fn prompt(session_id: SessionId) -> PromptEvent {
        PromptEvent::new(session_id, PromptType::YesNo, Confidence::High, "Proceed? [y/n]", None, 60)
    }

    #[test]
    fn expired_prompt_is_rejected() {
        let session_id = SessionId::new();
        let event = prompt(session_id.clone());
        let mut sm = PromptStateMachine::new(event.prompt_id.clone());
        sm.transition(PromptStatus::Routed).unwrap();
        sm.transition(PromptStatus::AwaitingReply).unwrap();
        let mut expired = event;
        expired.expires_at = Utc::now() - chrono::Duration::seconds(1);

        let identity = ChannelIdentity::new("telegram", "7");
        let reply = Reply::new_for_prompt(expired.prompt_id.clone(), session_id, "y", identity, Some("t1".into()));
        let channel = FakeChannel { edits: Mutex::new(vec![]), allowed: vec!["7".to_string()] };
        let nonces = NonceStore::new();

        let result = accept_reply(&reply, &expired, &mut sm, &channel, "telegram", &nonces);
        assert!(matches!(result, Err(RouterError::PromptExpired)));
    }

    #[test]
    fn mismatched_session_is_rejected() {
        let event = prompt(SessionId::new());
        let mut sm = PromptStateMachine::new(event.prompt_id.clone());
        sm.transition(PromptStatus::Routed).unwrap();
        sm.transition(PromptStatus::AwaitingReply).unwrap();

        let identity = ChannelIdentity::new("telegram", "7");
        let reply = Reply::new_for_prompt(event.prompt_id.clone(), SessionId::new(), "y", identity, Some("t1".into()));
        let channel = FakeChannel { edits: Mutex::new(vec![]), allowed: vec!["7".to_string()] };
        let nonces = NonceStore::new();

        let result = accept_reply(&reply, &event, &mut sm, &channel, "telegram", &nonces);
        assert!(matches!(result, Err(RouterError::SessionMismatch)));
    }

    #[test]
    fn identity_not_on_allowlist_is_rejected() {
        let session_id = SessionId::new();
        let event = prompt(session_id.clone());
        let mut sm = PromptStateMachine::new(event.prompt_id.clone());
        sm.transition(PromptStatus::Routed).unwrap();
        sm.transition(PromptStatus::AwaitingReply).unwrap();

        let identity = ChannelIdentity::new("telegram", "intruder");
        let reply = Reply::new_for_prompt(event.prompt_id.clone(), session_id, "y", identity, Some("t1".into()));
        let channel = FakeChannel { edits: Mutex::new(vec![]), allowed: vec!["7".to_string()] };
        let nonces = NonceStore::new();

        let result = accept_reply(&reply, &event, &mut sm, &channel, "telegram", &nonces);
        assert!(matches!(result, Err(RouterError::NotAllowlisted)));
    }

    #[test]
    fn reused_nonce_is_rejected_on_second_attempt() {
        let session_id = SessionId::new();
        let event = prompt(session_id.clone());
        let mut sm = PromptStateMachine::new(event.prompt_id.clone());
        sm.transition(PromptStatus::Routed).unwrap();
        sm.transition(PromptStatus::AwaitingReply).unwrap();

        let identity = ChannelIdentity::new("telegram", "7");
        let reply = Reply::new_for_prompt(event.prompt_id.clone(), session_id, "y", identity, Some("t1".into()));
        let channel = FakeChannel { edits: Mutex::new(vec![]), allowed: vec!["7".to_string()] };
        let nonces = NonceStore::new();

        assert!(accept_reply(&reply, &event, &mut sm, &channel, "telegram", &nonces).is_ok());
        let mut sm2 = PromptStateMachine::new(event.prompt_id.clone());
        sm2.status = PromptStatus::AwaitingReply;
        let result = accept_reply(&reply, &event, &mut sm2, &channel, "telegram", &nonces);
        assert!(matches!(result, Err(RouterError::NonceReused)));
    }

    #[tokio::test]
    async fn finalize_edits_channel_and_drains_queue() {
        let mgr = SessionManager::new(Connection::open_in_memory().unwrap()).unwrap();
        let mut session = Session::new("claude", vec!["claude".into()], "/tmp");
        let prompt_id = PromptId::new();
        session.bind_prompt(prompt_id.clone()).unwrap();
        mgr.create(&session).unwrap();

        let conversations = ConversationRegistry::new();
        conversations.bind("telegram", "t1", session.session_id.clone());
        let queued = prompt(session.session_id.clone());
        conversations.enqueue_prompt("telegram", "t1", queued.clone()).unwrap();

        let mut sm = PromptStateMachine::new(prompt_id);
        sm.transition(PromptStatus::Routed).unwrap();
        sm.transition(PromptStatus::AwaitingReply).unwrap();
        sm.transition(PromptStatus::ReplyReceived).unwrap();

        let channel = FakeChannel { edits: Mutex::new(vec![]), allowed: vec!["7".to_string()] };
        let message_ref = SentMessageRef {
            channel: "telegram".to_string(),
            message_id: "42".to_string(),
            thread_id: Some("t1".to_string()),
        };

        let next = finalize_reply(
            &mut sm,
            &mut session,
            &message_ref,
            "y",
            &channel,
            "telegram",
            "t1",
            &mgr,
            &conversations,
        )
        .await
        .unwrap();

        assert_eq!(sm.status, PromptStatus::Resolved);
        assert!(session.active_prompt_id.is_none());
        assert_eq!(channel.edits.lock().unwrap().as_slice(), ["y".to_string()]);
        assert_eq!(next.unwrap().session_id, queued.session_id);
    }
}
