//! Forward path: a detected [`PromptEvent`] becomes either an autopilot
//! action or a channel dispatch.
//!
//! `auto_reply`/`notify_only`/`deny` never touch a channel — they are
//! decided and acted on entirely by policy. Only `require_human` reaches a
//! human, either by dispatching immediately or queuing behind the session's
//! current outstanding prompt.

use async_trait::async_trait;

use relaybridge_channels::{Channel, PromptDelivery};
use relaybridge_core::conversation::ConversationState;
use relaybridge_core::ids::SessionId;
use relaybridge_core::prompt::PromptEvent;
use relaybridge_core::session::{Session, SessionStatus};
use relaybridge_policy::{evaluate, EvalEvent, Policy, PolicyAction};
use relaybridge_sessions::{ConversationRegistry, SessionManager};

use crate::error::{Result, RouterError};

/// Executes a policy decision that never reaches a channel. Implemented by
/// whatever owns the live session (the autopilot handler holds the actual
/// PTY injection machinery; this crate only decides whether to call it).
#[async_trait]
pub trait AutopilotSink: Send + Sync {
    /// Injects `value` as if a human had answered, suppressing nothing.
    async fn auto_reply(&self, session_id: &SessionId, value: &str) -> std::result::Result<(), String>;

    /// Records a notice with no expectation of a reply.
    async fn notify(&self, session_id: &SessionId, message: &str);

    /// Records that a prompt was denied outright; no value is ever injected.
    async fn deny(&self, session_id: &SessionId, reason: &str);
}

/// What happened to a [`PromptEvent`] on the forward path.
#[derive(Debug, Clone, PartialEq)]
pub enum ForwardOutcome {
    AutoReplied { value: String },
    NotifiedOnly,
    Denied { reason: String },
    Dispatched { message_id: String },
    Queued,
}

/// Routes one detected prompt per spec.md's forward path.
///
/// `session` is mutated (bound prompt, status, channel message id) and must
/// be persisted by the caller — this function calls `sessions.save` itself
/// only on the dispatch branch, since `AutoReply`/`NotifyOnly`/`Deny` never
/// touch session state.
#[allow(clippy::too_many_arguments)]
pub async fn route_prompt(
    policy: &Policy,
    event: &EvalEvent<'_>,
    prompt: PromptEvent,
    session: &mut Session,
    channel: &dyn Channel,
    channel_name: &str,
    thread_id: &str,
    sessions: &SessionManager,
    conversations: &ConversationRegistry,
    autopilot: &dyn AutopilotSink,
) -> Result<ForwardOutcome> {
    let decision = evaluate(policy, event)?;

    match decision.action {
        PolicyAction::AutoReply { value } => {
            autopilot
                .auto_reply(&session.session_id, &value)
                .await
                .map_err(RouterError::Autopilot)?;
            Ok(ForwardOutcome::AutoReplied { value })
        }
        PolicyAction::NotifyOnly { message } => {
            let text = message.unwrap_or_else(|| prompt.excerpt.clone());
            autopilot.notify(&session.session_id, &text).await;
            Ok(ForwardOutcome::NotifiedOnly)
        }
        PolicyAction::Deny { reason } => {
            let text = reason.unwrap_or_else(|| "denied by policy".to_string());
            autopilot.deny(&session.session_id, &text).await;
            Ok(ForwardOutcome::Denied { reason: text })
        }
        PolicyAction::RequireHuman { .. } => {
            if session.active_prompt_id.is_some() {
                conversations.enqueue_prompt(channel_name, thread_id, prompt)?;
                return Ok(ForwardOutcome::Queued);
            }

            let delivery = PromptDelivery {
                session_id: session.session_id.clone(),
                channel: channel_name.to_string(),
                thread_id: Some(thread_id.to_string()),
                prompt: prompt.clone(),
            };
            let sent = channel.send_prompt(&delivery).await?;

            session.bind_prompt(prompt.prompt_id.clone())?;
            session.transition(SessionStatus::AwaitingReply)?;
            session
                .channel_message_ids
                .insert(prompt.prompt_id.as_str().to_string(), sent.message_id.clone());
            sessions.save(session)?;

            conversations.transition(channel_name, thread_id, ConversationState::AwaitingInput)?;

            Ok(ForwardOutcome::Dispatched { message_id: sent.message_id })
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;
    use rusqlite::Connection;

    use relaybridge_channels::{ChannelStatus, Notification, OutputChunk, SentMessageRef};
    use relaybridge_core::ids::SessionId;
    use relaybridge_core::prompt::{Confidence, PromptType};
    use relaybridge_core::reply::Reply;

    use super::*;

    struct FakeChannel {
        sent: Mutex<Vec<PromptDelivery>>,
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
        async fn send_prompt(&self, prompt: &PromptDelivery) -> std::result::Result<SentMessageRef, relaybridge_channels::ChannelError> {
            self.sent.lock().unwrap_or_else(|p| p.into_inner()).push(prompt.clone());
            Ok(SentMessageRef {
                channel: "telegram".to_string(),
                message_id: "42".to_string(),
                thread_id: prompt.thread_id.clone(),
            })
        }
        async fn edit_prompt_message(&self, _: &SentMessageRef, _: &str) -> std::result::Result<(), relaybridge_channels::ChannelError> {
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
        fn is_allowed(&self, _: &str) -> bool {
            true
        }
        fn status(&self) -> ChannelStatus {
            ChannelStatus::Connected
        }
    }

    #[derive(Default)]
    struct FakeAutopilot {
        replied: Mutex<Vec<String>>,
        notified: Mutex<Vec<String>>,
        denied: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl AutopilotSink for FakeAutopilot {
        async fn auto_reply(&self, _: &SessionId, value: &str) -> std::result::Result<(), String> {
            self.replied.lock().unwrap_or_else(|p| p.into_inner()).push(value.to_string());
            Ok(())
        }
        async fn notify(&self, _: &SessionId, message: &str) {
            self.notified.lock().unwrap_or_else(|p| p.into_inner()).push(message.to_string());
        }
        async fn deny(&self, _: &SessionId, reason: &str) {
            self.denied.lock().unwrap_or_else(|p| p.into_inner()).push(reason.to_string());
        }
    }

    fn prompt(session_id: SessionId) -> PromptEvent {
        PromptEvent::new(session_id, PromptType::YesNo, Confidence::High, "Proceed? [y/n]", None, 60)
    }

    fn event<'a>() -> EvalEvent<'a> {
        EvalEvent {
            tool_id: "claude",
            cwd: "/home/user/project",
            prompt_type: PromptType::YesNo,
            confidence: Confidence::High,
            excerpt: "Proceed? [y/n]",
            session_tag: None,
            session_state: None,
            channel_message: true,
            environment: None,
        }
    }

    #[tokio::test]
    async fn auto_reply_never_touches_the_channel() {
        let policy_yaml = r#"
policy_version: "1"
name: test
rules:
  - id: yes
    match: {tool_id: claude}
    action: {type: auto_reply, value: "y"}
"#;
        let policy = relaybridge_policy::parse_policy(policy_yaml, "<string>").unwrap();
        let mut session = Session::new("claude", vec!["claude".into()], "/tmp");
        let channel = FakeChannel { sent: Mutex::new(vec![]) };
        let autopilot = FakeAutopilot::default();
        let sessions = SessionManager::new(Connection::open_in_memory().unwrap()).unwrap();
        sessions.create(&session).unwrap();
        let conversations = ConversationRegistry::new();
        conversations.bind("telegram", "t1", session.session_id.clone());

        let outcome = route_prompt(
            &policy,
            &event(),
            prompt(session.session_id.clone()),
            &mut session,
            &channel,
            "telegram",
            "t1",
            &sessions,
            &conversations,
            &autopilot,
        )
        .await
        .unwrap();

        assert_eq!(outcome, ForwardOutcome::AutoReplied { value: "y".to_string() });
        assert!(channel.sent.lock().unwrap().is_empty());
        assert_eq!(autopilot.replied.lock().unwrap().as_slice(), ["y".to_string()]);
    }

    #[tokio::test]
    async fn require_human_dispatches_and_binds_prompt() {
        let policy = relaybridge_policy::default_policy();
        let mut session = Session::new("claude", vec!["claude".into()], "/tmp");
        let channel = FakeChannel { sent: Mutex::new(vec![]) };
        let autopilot = FakeAutopilot::default();
        let sessions = SessionManager::new(Connection::open_in_memory().unwrap()).unwrap();
        sessions.create(&session).unwrap();
        let conversations = ConversationRegistry::new();
        conversations.bind("telegram", "t1", session.session_id.clone());

        let outcome = route_prompt(
            &policy,
            &event(),
            prompt(session.session_id.clone()),
            &mut session,
            &channel,
            "telegram",
            "t1",
            &sessions,
            &conversations,
            &autopilot,
        )
        .await
        .unwrap();

        assert_eq!(outcome, ForwardOutcome::Dispatched { message_id: "42".to_string() });
        assert_eq!(session.status, SessionStatus::AwaitingReply);
        assert!(session.active_prompt_id.is_some());
        assert_eq!(conversations.state("telegram", "t1"), Some(ConversationState::AwaitingInput));
    }

    #[tokio::test]
    async fn second_prompt_queues_behind_the_first() {
        let policy = relaybridge_policy::default_policy();
        let mut session = Session::new("claude", vec!["claude".into()], "/tmp");
        let channel = FakeChannel { sent: Mutex::new(vec![]) };
        let autopilot = FakeAutopilot::default();
        let sessions = SessionManager::new(Connection::open_in_memory().unwrap()).unwrap();
        sessions.create(&session).unwrap();
        let conversations = ConversationRegistry::new();
        conversations.bind("telegram", "t1", session.session_id.clone());

        route_prompt(
            &policy,
            &event(),
            prompt(session.session_id.clone()),
            &mut session,
            &channel,
            "telegram",
            "t1",
            &sessions,
            &conversations,
            &autopilot,
        )
        .await
        .unwrap();

        let outcome = route_prompt(
            &policy,
            &event(),
            prompt(session.session_id.clone()),
            &mut session,
            &channel,
            "telegram",
            "t1",
            &sessions,
            &conversations,
            &autopilot,
        )
        .await
        .unwrap();

        assert_eq!(outcome, ForwardOutcome::Queued);
        assert_eq!(channel.sent.lock().unwrap().len(), 1);
    }
}
