use std::sync::Arc;

use futures_util::future::join_all;
use tracing::warn;

use relaybridge_core::reply::Reply;

use crate::{
    channel::Channel,
    error::ChannelError,
    types::{Notification, PromptDelivery, SentMessageRef},
};

/// Fans sends out to every registered channel concurrently and merges their
/// reply streams, for lifecycle events and polling loops that don't care
/// which specific adapter a session is bound to.
pub struct MultiChannel {
    channels: Vec<Arc<dyn Channel + Send + Sync>>,
}

impl MultiChannel {
    pub fn new(channels: Vec<Arc<dyn Channel + Send + Sync>>) -> Self {
        Self { channels }
    }

    /// Send `notification` to every channel concurrently. Per-channel
    /// failures are logged and do not prevent delivery to the others; the
    /// returned vec carries one result per channel in registration order.
    pub async fn broadcast(&self, notification: &Notification) -> Vec<Result<(), ChannelError>> {
        let sends = self.channels.iter().map(|channel| async move {
            let result = channel.notify(notification).await;
            if let Err(e) = &result {
                warn!(channel = channel.name(), error = %e, "broadcast notify failed on channel");
            }
            result
        });
        join_all(sends).await
    }

    /// Send `prompt` to every channel concurrently, prefixing each returned
    /// message id as `"{channel}:{inner_id}"` so a later `edit_prompt_message`
    /// dispatch can recover which adapter owns it.
    pub async fn send_prompt_to_all(&self, prompt: &PromptDelivery) -> Vec<Result<SentMessageRef, ChannelError>> {
        let sends = self.channels.iter().map(|channel| async move {
            channel.send_prompt(prompt).await.map(|mut sent| {
                sent.message_id = format!("{}:{}", channel.name(), sent.message_id);
                sent
            })
        });
        join_all(sends).await
    }

    /// Poll every channel concurrently and merge their pending replies into
    /// one vec. A failing channel's poll is logged and contributes nothing
    /// rather than aborting the merge.
    pub async fn receive_all_replies(&self) -> Vec<Reply> {
        let polls = self.channels.iter().map(|channel| async move {
            match channel.receive_replies().await {
                Ok(replies) => replies,
                Err(e) => {
                    warn!(channel = channel.name(), error = %e, "receive_replies failed on channel");
                    Vec::new()
                }
            }
        });
        join_all(polls).await.into_iter().flatten().collect()
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use relaybridge_core::reply::Reply;

    use super::*;
    use crate::types::{ChannelStatus, NotifyLevel, OutputChunk, PromptDelivery, SentMessageRef};

    struct StubChannel {
        name: &'static str,
        fail: bool,
    }

    #[async_trait]
    impl Channel for StubChannel {
        fn name(&self) -> &str {
            self.name
        }

        async fn connect(&mut self) -> Result<(), ChannelError> {
            Ok(())
        }

        async fn disconnect(&mut self) -> Result<(), ChannelError> {
            Ok(())
        }

        async fn send_prompt(&self, prompt: &PromptDelivery) -> Result<SentMessageRef, ChannelError> {
            if self.fail {
                return Err(ChannelError::SendFailed("stub failure".to_string()));
            }
            Ok(SentMessageRef {
                channel: self.name.to_string(),
                message_id: "42".to_string(),
                thread_id: prompt.thread_id.clone(),
            })
        }

        async fn edit_prompt_message(&self, _message_ref: &SentMessageRef, _text: &str) -> Result<(), ChannelError> {
            unimplemented!()
        }

        async fn send_output(&self, _chunk: &OutputChunk) -> Result<(), ChannelError> {
            unimplemented!()
        }

        async fn notify(&self, _notification: &Notification) -> Result<(), ChannelError> {
            if self.fail {
                Err(ChannelError::SendFailed("stub failure".to_string()))
            } else {
                Ok(())
            }
        }

        async fn receive_replies(&self) -> Result<Vec<Reply>, ChannelError> {
            Ok(Vec::new())
        }

        fn is_allowed(&self, _identity: &str) -> bool {
            true
        }

        fn status(&self) -> ChannelStatus {
            ChannelStatus::Connected
        }
    }

    fn notification() -> Notification {
        Notification {
            session_id: None,
            channel: "broadcast".to_string(),
            thread_id: None,
            level: NotifyLevel::Info,
            text: "daemon restarted".to_string(),
        }
    }

    fn prompt_delivery() -> PromptDelivery {
        use relaybridge_core::ids::SessionId;
        use relaybridge_core::prompt::{Confidence, PromptEvent, PromptType};

        PromptDelivery {
            session_id: SessionId::new(),
            channel: "broadcast".to_string(),
            thread_id: Some("thread-1".to_string()),
            prompt: PromptEvent::new(SessionId::new(), PromptType::YesNo, Confidence::High, "continue?", None, 60),
        }
    }

    #[tokio::test]
    async fn broadcasts_to_every_channel() {
        let multi = MultiChannel::new(vec![
            Arc::new(StubChannel { name: "telegram", fail: false }),
            Arc::new(StubChannel { name: "slack", fail: false }),
        ]);
        let results = multi.broadcast(&notification()).await;
        assert_eq!(results.len(), 2);
        assert!(results.iter().all(|r| r.is_ok()));
    }

    #[tokio::test]
    async fn one_failing_channel_does_not_block_the_others() {
        let multi = MultiChannel::new(vec![
            Arc::new(StubChannel { name: "telegram", fail: true }),
            Arc::new(StubChannel { name: "slack", fail: false }),
        ]);
        let results = multi.broadcast(&notification()).await;
        assert!(results[0].is_err());
        assert!(results[1].is_ok());
    }

    #[tokio::test]
    async fn send_prompt_to_all_prefixes_message_ids_by_channel() {
        let multi = MultiChannel::new(vec![
            Arc::new(StubChannel { name: "telegram", fail: false }),
            Arc::new(StubChannel { name: "slack", fail: false }),
        ]);
        let results = multi.send_prompt_to_all(&prompt_delivery()).await;
        let ids: Vec<String> = results.into_iter().map(|r| r.unwrap().message_id).collect();
        assert_eq!(ids, vec!["telegram:42".to_string(), "slack:42".to_string()]);
    }

    #[tokio::test]
    async fn receive_all_replies_merges_across_channels() {
        let multi = MultiChannel::new(vec![
            Arc::new(StubChannel { name: "telegram", fail: false }),
            Arc::new(StubChannel { name: "slack", fail: false }),
        ]);
        let replies = multi.receive_all_replies().await;
        assert!(replies.is_empty());
    }
}
