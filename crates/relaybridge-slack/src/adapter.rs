//! Slack channel adapter.
//!
//! Wraps a `slack-morphism` client + Socket Mode listener and drives the
//! event loop in a background task. Replies received while listening are
//! queued and drained by [`relaybridge_channels::Channel::receive_replies`].

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use slack_morphism::prelude::*;
use tracing::{info, warn};

use relaybridge_core::config::SlackConfig;
use relaybridge_core::ids::{ChannelIdentity, PromptId, SessionId};
use relaybridge_core::reply::Reply;

use relaybridge_channels::{
    Channel, ChannelError, ChannelStatus, Notification, NotifyLevel, OutputChunk, PromptDelivery, SentMessageRef,
};

use crate::allow;
use crate::error::SlackError;
use crate::send;

type HttpConnector = SlackClientHyperConnector;

/// Tracks which session (and, while a prompt is outstanding, which prompt)
/// owns a given Slack channel, so an incoming message can be turned into the
/// right kind of [`Reply`].
#[derive(Clone)]
struct ChannelBinding {
    session_id: SessionId,
    prompt_id: Option<PromptId>,
}

struct Inner {
    client: Arc<SlackClient<HttpConnector>>,
    bot_token: SlackApiToken,
    app_token: SlackApiToken,
    allow_users: Vec<String>,
    status: Mutex<ChannelStatus>,
    bindings: Mutex<HashMap<String, ChannelBinding>>,
    inbox: Mutex<VecDeque<Reply>>,
}

/// Slack implementation of [`Channel`]. A reference into a given channel (and,
/// when replying inside a thread, its thread) is encoded as `"{channel_id}"`
/// or `"{channel_id}:{thread_ts}"` in `thread_id` — the same `channel:value`
/// convention [`ChannelIdentity`] uses elsewhere.
pub struct SlackChannel {
    inner: Arc<Inner>,
    listener_handle: Mutex<Option<tokio::task::JoinHandle<()>>>,
}

impl SlackChannel {
    pub fn new(config: &SlackConfig) -> Self {
        let connector = SlackClientHyperConnector::new();
        let client = Arc::new(SlackClient::new(connector));
        Self {
            inner: Arc::new(Inner {
                client,
                bot_token: SlackApiToken::new(SlackApiTokenValue(config.bot_token.clone())),
                app_token: SlackApiToken::new(SlackApiTokenValue(config.app_token.clone())),
                allow_users: config.allowed_user_ids.clone(),
                status: Mutex::new(ChannelStatus::Disconnected),
                bindings: Mutex::new(HashMap::new()),
                inbox: Mutex::new(VecDeque::new()),
            }),
            listener_handle: Mutex::new(None),
        }
    }

    fn set_status(&self, status: ChannelStatus) {
        *self.inner.status.lock().unwrap_or_else(|p| p.into_inner()) = status;
    }

    fn parse_thread_ref(thread_id: &Option<String>) -> Result<(SlackChannelId, Option<SlackTs>), SlackError> {
        let raw = thread_id.as_deref().ok_or_else(|| SlackError::InvalidThreadId(thread_id.clone()))?;
        match raw.split_once(':') {
            Some((channel, ts)) => Ok((SlackChannelId(channel.to_string()), Some(SlackTs(ts.to_string())))),
            None => Ok((SlackChannelId(raw.to_string()), None)),
        }
    }

    fn channel_key(channel: &SlackChannelId) -> String {
        channel.to_string()
    }
}

#[async_trait]
impl Channel for SlackChannel {
    fn name(&self) -> &str {
        "slack"
    }

    async fn connect(&mut self) -> Result<(), ChannelError> {
        info!("slack: starting socket mode listener");
        let inner = Arc::clone(&self.inner);

        let callbacks = SlackSocketModeListenerCallbacks::new().with_push_events(move |event, _client, _states| {
            let inner = Arc::clone(&inner);
            async move {
                handle_push_event(event, inner).await;
                Ok(())
            }
        });

        let listener_environment = Arc::new(
            SlackClientEventsListenerEnvironment::new(Arc::clone(&self.inner.client))
                .with_error_handler(|err, _client| {
                    warn!(%err, "slack: socket mode error");
                }),
        );
        let listener = SlackClientSocketModeListener::new(
            &SlackClientSocketModeConfig::new(),
            listener_environment,
            callbacks,
        );

        listener
            .listen_for(&self.inner.app_token)
            .await
            .map_err(|e| ChannelError::from(SlackError::SocketMode(e.to_string())))?;

        let handle = tokio::spawn(async move {
            listener.serve().await;
        });

        *self.listener_handle.lock().unwrap_or_else(|p| p.into_inner()) = Some(handle);
        self.set_status(ChannelStatus::Connected);
        Ok(())
    }

    async fn disconnect(&mut self) -> Result<(), ChannelError> {
        if let Some(handle) = self.listener_handle.lock().unwrap_or_else(|p| p.into_inner()).take() {
            handle.abort();
        }
        self.set_status(ChannelStatus::Disconnected);
        Ok(())
    }

    async fn send_prompt(&self, prompt: &PromptDelivery) -> Result<SentMessageRef, ChannelError> {
        let (channel, thread_ts) = SlackChannel::parse_thread_ref(&prompt.thread_id)?;
        let text = render_prompt(&prompt.prompt.excerpt, prompt.prompt.choices.as_deref());
        let session = self.inner.client.open_session(&self.inner.bot_token);
        let ts = send::send_response(&session, &channel, thread_ts.as_ref(), &text)
            .await
            .map_err(ChannelError::from)?;

        self.inner.bindings.lock().unwrap_or_else(|p| p.into_inner()).insert(
            SlackChannel::channel_key(&channel),
            ChannelBinding {
                session_id: prompt.session_id.clone(),
                prompt_id: Some(prompt.prompt.prompt_id.clone()),
            },
        );

        Ok(SentMessageRef {
            channel: "slack".to_string(),
            message_id: ts.to_string(),
            thread_id: Some(format!("{}:{}", channel, ts)),
        })
    }

    async fn edit_prompt_message(&self, message_ref: &SentMessageRef, text: &str) -> Result<(), ChannelError> {
        let (channel, thread_ts) = SlackChannel::parse_thread_ref(&message_ref.thread_id)?;
        let ts = thread_ts.unwrap_or_else(|| SlackTs(message_ref.message_id.clone()));
        let session = self.inner.client.open_session(&self.inner.bot_token);
        send::edit_message(&session, &channel, &ts, text).await.map_err(ChannelError::from)
    }

    async fn send_output(&self, chunk: &OutputChunk) -> Result<(), ChannelError> {
        let (channel, thread_ts) = SlackChannel::parse_thread_ref(&chunk.thread_id)?;
        let session = self.inner.client.open_session(&self.inner.bot_token);
        send::send_response(&session, &channel, thread_ts.as_ref(), &chunk.text)
            .await
            .map_err(ChannelError::from)?;
        Ok(())
    }

    async fn notify(&self, notification: &Notification) -> Result<(), ChannelError> {
        let (channel, thread_ts) = SlackChannel::parse_thread_ref(&notification.thread_id)?;
        let prefix = match notification.level {
            NotifyLevel::Info => "",
            NotifyLevel::Warning => "\u{26a0}\u{fe0f} ",
            NotifyLevel::Error => "\u{1f6ab} ",
        };
        let text = format!("{prefix}{}", notification.text);
        let session = self.inner.client.open_session(&self.inner.bot_token);
        send::send_response(&session, &channel, thread_ts.as_ref(), &text)
            .await
            .map_err(ChannelError::from)?;
        Ok(())
    }

    async fn receive_replies(&self) -> Result<Vec<Reply>, ChannelError> {
        let mut inbox = self.inner.inbox.lock().unwrap_or_else(|p| p.into_inner());
        Ok(inbox.drain(..).collect())
    }

    fn is_allowed(&self, identity: &str) -> bool {
        allow::is_allowed(&self.inner.allow_users, identity)
    }

    fn status(&self) -> ChannelStatus {
        self.inner.status.lock().unwrap_or_else(|p| p.into_inner()).clone()
    }
}

fn render_prompt(excerpt: &str, choices: Option<&[String]>) -> String {
    match choices {
        Some(options) if !options.is_empty() => format!("{excerpt}\n\nOptions: {}", options.join(", ")),
        _ => excerpt.to_string(),
    }
}

/// Registered with the Socket Mode listener. Resolves an incoming message to
/// a [`Reply`] against whatever session/prompt is currently bound to its
/// channel, then queues it for [`Channel::receive_replies`] to drain.
async fn handle_push_event(event: SlackPushEventCallback, inner: Arc<Inner>) {
    let SlackEventCallbackBody::Message(message_event) = event.event else {
        return;
    };
    if message_event.sender.bot_id.is_some() {
        return;
    }
    let Some(user_id) = message_event.sender.user.as_ref().map(|u| u.to_string()) else {
        return;
    };
    if !allow::is_allowed(&inner.allow_users, &user_id) {
        return;
    }
    let Some(text) = message_event.content.and_then(|c| c.text) else {
        return;
    };
    let Some(channel) = message_event.origin.channel else {
        return;
    };

    let channel_key = SlackChannel::channel_key(&channel);
    let binding = inner.bindings.lock().unwrap_or_else(|p| p.into_inner()).get(&channel_key).cloned();
    let Some(binding) = binding else {
        warn!(channel = %channel, "slack: message from unbound channel, dropping");
        return;
    };

    let identity = ChannelIdentity::new("slack", &user_id);
    let thread_id = Some(channel_key);
    let reply = match binding.prompt_id {
        Some(prompt_id) => Reply::new_for_prompt(prompt_id, binding.session_id, text, identity, thread_id),
        None => Reply::new_chat_turn(binding.session_id, text, identity, thread_id),
    };

    inner.inbox.lock().unwrap_or_else(|p| p.into_inner()).push_back(reply);
}
