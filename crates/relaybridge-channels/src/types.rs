use serde::{Deserialize, Serialize};

use relaybridge_core::ids::SessionId;
use relaybridge_core::prompt::PromptEvent;

/// A detected prompt addressed to a specific channel thread, ready to render.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromptDelivery {
    pub session_id: SessionId,
    pub channel: String,
    pub thread_id: Option<String>,
    pub prompt: PromptEvent,
}

/// Reference to a previously sent prompt message, kept so the adapter can
/// edit it in place once a reply resolves the prompt (e.g. to strike through
/// the question and show the answer that was accepted).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SentMessageRef {
    pub channel: String,
    pub message_id: String,
    pub thread_id: Option<String>,
}

/// A tail of raw supervised-process output, streamed to a channel outside the
/// prompt-routing path (e.g. live log tailing in a thread).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputChunk {
    pub session_id: SessionId,
    pub channel: String,
    pub thread_id: Option<String>,
    pub text: String,
}

/// Severity of a [`Notification`] — lets an adapter choose formatting
/// (e.g. a warning emoji) without the caller knowing platform specifics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotifyLevel {
    Info,
    Warning,
    Error,
}

/// An out-of-band lifecycle notice (session started/ended, channel degraded, …)
/// that isn't a prompt and expects no reply.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notification {
    pub session_id: Option<SessionId>,
    pub channel: String,
    pub thread_id: Option<String>,
    pub level: NotifyLevel,
    pub text: String,
}

/// Runtime connection state of a channel adapter.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelStatus {
    /// Fully connected and ready to send/receive.
    Connected,

    /// Attempting to establish or re-establish the connection.
    Connecting,

    /// Cleanly disconnected (not an error condition).
    Disconnected,

    /// An unrecoverable (or pre-retry) error occurred.
    Error(String),
}
