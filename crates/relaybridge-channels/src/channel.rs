use async_trait::async_trait;

use relaybridge_core::reply::Reply;

use crate::{
    error::ChannelError,
    types::{ChannelStatus, Notification, OutputChunk, PromptDelivery, SentMessageRef},
};

/// Common interface implemented by every channel adapter (Telegram, Slack, …).
///
/// Implementations must be `Send + Sync` so they can be stored in a
/// [`crate::manager::ChannelManager`] and driven from multiple Tokio tasks.
#[async_trait]
pub trait Channel: Send + Sync {
    /// Stable lowercase identifier for this channel (e.g. `"telegram"`).
    ///
    /// The name is used as the key inside [`ChannelManager`](crate::manager::ChannelManager)
    /// and must be unique across all registered adapters.
    fn name(&self) -> &str;

    /// Establish the connection to the external service.
    ///
    /// Implementations should transition their internal state to
    /// [`ChannelStatus::Connected`] on success.
    async fn connect(&mut self) -> Result<(), ChannelError>;

    /// Gracefully close the connection.
    ///
    /// Implementations should transition their internal state to
    /// [`ChannelStatus::Disconnected`] on success.
    async fn disconnect(&mut self) -> Result<(), ChannelError>;

    /// Render a detected prompt as a new message and return a reference to it.
    ///
    /// The returned [`SentMessageRef`] is kept so the prompt can later be
    /// edited in place once it resolves.
    async fn send_prompt(&self, prompt: &PromptDelivery) -> Result<SentMessageRef, ChannelError>;

    /// Update a previously sent prompt message (e.g. to show the accepted
    /// reply or mark it expired).
    async fn edit_prompt_message(&self, message_ref: &SentMessageRef, text: &str) -> Result<(), ChannelError>;

    /// Stream a chunk of raw supervised-process output outside the
    /// prompt-routing path.
    async fn send_output(&self, chunk: &OutputChunk) -> Result<(), ChannelError>;

    /// Deliver an out-of-band notice that expects no reply.
    async fn notify(&self, notification: &Notification) -> Result<(), ChannelError>;

    /// Drain any replies the adapter has received since the last poll.
    ///
    /// Adapters that push (webhooks) rather than poll may always return an
    /// empty vec here and feed replies through a separate channel instead;
    /// this method exists for the polling adapters (Telegram long-poll).
    async fn receive_replies(&self) -> Result<Vec<Reply>, ChannelError>;

    /// Whether `identity` (a platform-native user id, not a `channel:user_id`
    /// string) is on this adapter's allowlist.
    fn is_allowed(&self, identity: &str) -> bool;

    /// Return the current runtime status without blocking.
    fn status(&self) -> ChannelStatus;
}
