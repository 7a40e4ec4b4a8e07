//! Telegram channel adapter.
//!
//! Wraps a teloxide `Bot` + `Dispatcher` and drives the long-polling event
//! loop in a background task. Replies received while polling are queued and
//! drained by [`relaybridge_channels::Channel::receive_replies`].

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use teloxide::prelude::*;
use tracing::{info, warn};

use relaybridge_core::config::TelegramConfig;
use relaybridge_core::ids::{ChannelIdentity, PromptId, SessionId};
use relaybridge_core::reply::Reply;

use relaybridge_channels::{
    Channel, ChannelError, ChannelStatus, Notification, NotifyLevel, OutputChunk, PromptDelivery, SentMessageRef,
};

use crate::allow;
use crate::error::TelegramError;
use crate::send;

/// Tracks which session (and, while a prompt is outstanding, which prompt)
/// owns a given chat, so an incoming text message can be turned into the
/// right kind of [`Reply`].
#[derive(Clone)]
struct ChatBinding {
    session_id: SessionId,
    prompt_id: Option<PromptId>,
}

struct Inner {
    bot: Bot,
    allow_users: Vec<String>,
    status: Mutex<ChannelStatus>,
    bindings: Mutex<HashMap<i64, ChatBinding>>,
    inbox: Mutex<VecDeque<Reply>>,
}

/// Telegram implementation of [`Channel`]. A chat's numeric id doubles as
/// its `thread_id` for [`relaybridge_core::conversation::ConversationBinding`]
/// purposes — Telegram has no separate thread concept outside forum topics.
pub struct TelegramChannel {
    inner: Arc<Inner>,
    dispatcher_handle: Mutex<Option<tokio::task::JoinHandle<()>>>,
}

impl TelegramChannel {
    pub fn new(config: &TelegramConfig) -> Self {
        let allow_users: Vec<String> = config.allowed_user_ids.iter().map(|id| id.to_string()).collect();
        Self {
            inner: Arc::new(Inner {
                bot: Bot::new(&config.bot_token),
                allow_users,
                status: Mutex::new(ChannelStatus::Disconnected),
                bindings: Mutex::new(HashMap::new()),
                inbox: Mutex::new(VecDeque::new()),
            }),
            dispatcher_handle: Mutex::new(None),
        }
    }

    fn set_status(&self, status: ChannelStatus) {
        *self.inner.status.lock().unwrap_or_else(|p| p.into_inner()) = status;
    }

    fn parse_chat_id(thread_id: &Option<String>) -> Result<ChatId, TelegramError> {
        thread_id
            .as_deref()
            .and_then(|s| s.parse::<i64>().ok())
            .map(ChatId)
            .ok_or_else(|| TelegramError::InvalidThreadId(thread_id.clone()))
    }
}

#[async_trait]
impl Channel for TelegramChannel {
    fn name(&self) -> &str {
        "telegram"
    }

    async fn connect(&mut self) -> Result<(), ChannelError> {
        info!("telegram: starting long-polling dispatcher");
        let inner = Arc::clone(&self.inner);
        let bot = inner.bot.clone();
        let handler = Update::filter_message().endpoint(handle_update);

        let handle = tokio::spawn(async move {
            Dispatcher::builder(bot, handler)
                .dependencies(dptree::deps![inner])
                .default_handler(|_upd| async {})
                .build()
                .dispatch()
                .await;
        });

        *self.dispatcher_handle.lock().unwrap_or_else(|p| p.into_inner()) = Some(handle);
        self.set_status(ChannelStatus::Connected);
        Ok(())
    }

    async fn disconnect(&mut self) -> Result<(), ChannelError> {
        if let Some(handle) = self.dispatcher_handle.lock().unwrap_or_else(|p| p.into_inner()).take() {
            handle.abort();
        }
        self.set_status(ChannelStatus::Disconnected);
        Ok(())
    }

    async fn send_prompt(&self, prompt: &PromptDelivery) -> Result<SentMessageRef, ChannelError> {
        let chat_id = TelegramChannel::parse_chat_id(&prompt.thread_id)?;
        let text = render_prompt(&prompt.prompt.excerpt, prompt.prompt.choices.as_deref());
        let message_id = send::send_response(&self.inner.bot, chat_id, &text).await?;

        self.inner.bindings.lock().unwrap_or_else(|p| p.into_inner()).insert(
            chat_id.0,
            ChatBinding {
                session_id: prompt.session_id.clone(),
                prompt_id: Some(prompt.prompt.prompt_id.clone()),
            },
        );

        Ok(SentMessageRef {
            channel: "telegram".to_string(),
            message_id: message_id.0.to_string(),
            thread_id: prompt.thread_id.clone(),
        })
    }

    async fn edit_prompt_message(&self, message_ref: &SentMessageRef, text: &str) -> Result<(), ChannelError> {
        let chat_id = TelegramChannel::parse_chat_id(&message_ref.thread_id)?;
        let message_id = message_ref
            .message_id
            .parse::<i32>()
            .map_err(|_| TelegramError::InvalidThreadId(Some(message_ref.message_id.clone())))?;
        send::edit_message(&self.inner.bot, chat_id, teloxide::types::MessageId(message_id), text)
            .await
            .map_err(ChannelError::from)
    }

    async fn send_output(&self, chunk: &OutputChunk) -> Result<(), ChannelError> {
        let chat_id = TelegramChannel::parse_chat_id(&chunk.thread_id)?;
        send::send_response(&self.inner.bot, chat_id, &chunk.text).await?;
        Ok(())
    }

    async fn notify(&self, notification: &Notification) -> Result<(), ChannelError> {
        let chat_id = TelegramChannel::parse_chat_id(&notification.thread_id)?;
        let prefix = match notification.level {
            NotifyLevel::Info => "",
            NotifyLevel::Warning => "\u{26a0}\u{fe0f} ",
            NotifyLevel::Error => "\u{1f6ab} ",
        };
        let text = format!("{prefix}{}", notification.text);
        send::send_response(&self.inner.bot, chat_id, &text).await?;
        Ok(())
    }

    async fn receive_replies(&self) -> Result<Vec<Reply>, ChannelError> {
        let mut inbox = self.inner.inbox.lock().unwrap_or_else(|p| p.into_inner());
        Ok(inbox.drain(..).collect())
    }

    fn is_allowed(&self, identity: &str) -> bool {
        allow::is_allowed(&self.inner.allow_users, identity, identity)
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

/// Registered in the teloxide `Dispatcher`. Resolves an incoming message to
/// a [`Reply`] against whatever session/prompt is currently bound to its
/// chat, then queues it for [`Channel::receive_replies`] to drain.
async fn handle_update(msg: Message, inner: Arc<Inner>) -> ResponseResult<()> {
    if msg.from.as_ref().map(|u| u.is_bot).unwrap_or(false) {
        return Ok(());
    }
    let Some(from) = msg.from.as_ref() else {
        return Ok(());
    };
    let username = from.username.as_deref().unwrap_or("");
    let user_id = from.id.0.to_string();
    if !allow::is_allowed(&inner.allow_users, username, &user_id) {
        return Ok(());
    }

    let Some(text) = msg.text().map(|t| t.to_string()) else {
        return Ok(());
    };

    let chat_id = msg.chat.id.0;
    let binding = inner.bindings.lock().unwrap_or_else(|p| p.into_inner()).get(&chat_id).cloned();
    let Some(binding) = binding else {
        warn!(chat_id, "telegram: message from unbound chat, dropping");
        return Ok(());
    };

    let identity = ChannelIdentity::new("telegram", &user_id);
    let thread_id = Some(chat_id.to_string());
    let reply = match binding.prompt_id {
        Some(prompt_id) => Reply::new_for_prompt(prompt_id, binding.session_id, text, identity, thread_id),
        None => Reply::new_chat_turn(binding.session_id, text, identity, thread_id),
    };

    inner.inbox.lock().unwrap_or_else(|p| p.into_inner()).push_back(reply);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn render_prompt_without_choices_is_bare_excerpt() {
        assert_eq!(render_prompt("Continue?", None), "Continue?");
    }

    #[test]
    fn render_prompt_with_choices_lists_options() {
        let choices = vec!["yes".to_string(), "no".to_string()];
        let rendered = render_prompt("Pick one", Some(&choices));
        assert!(rendered.contains("Options: yes, no"));
    }

    #[test]
    fn parse_chat_id_rejects_non_numeric_thread() {
        assert!(TelegramChannel::parse_chat_id(&Some("not-a-number".to_string())).is_err());
    }

    #[test]
    fn parse_chat_id_rejects_missing_thread() {
        assert!(TelegramChannel::parse_chat_id(&None).is_err());
    }

    #[test]
    fn parse_chat_id_accepts_numeric_thread() {
        let chat_id = TelegramChannel::parse_chat_id(&Some("-100123".to_string())).unwrap();
        assert_eq!(chat_id.0, -100123);
    }
}
