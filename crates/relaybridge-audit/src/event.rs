use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use relaybridge_core::ids::{AuditEventId, PromptId, SessionId};

/// One step of an agent's System-of-Record trace: planning, taking a turn,
/// making a decision, running a tool, or recording its outcome. These share
/// the audit chain rather than a table of their own — they are just another
/// kind of event, ordered and tamper-evident the same way.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentSorKind {
    Turn,
    Plan,
    Decision,
    ToolRun,
    Outcome,
}

/// The full audit event taxonomy. Tagged so the `event_type` column and the
/// JSON payload column both fall out of one serialization.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AuditAction {
    SessionStarted {
        tool: String,
        argv: Vec<String>,
        cwd: String,
    },
    SessionEnded {
        reason: String,
        exit_code: Option<i32>,
    },
    PromptDetected {
        prompt_type: String,
        confidence: String,
        excerpt: String,
    },
    PromptRouted {
        channel: String,
        policy_hash: String,
        decision: String,
    },
    PromptExpired {
        timeout_secs: u64,
    },
    ReplyReceived {
        channel: String,
        identity: String,
    },
    ResponseInjected {
        bytes_written: usize,
    },
    DuplicateCallbackIgnored {
        nonce: String,
    },
    LateReplyRejected {
        prompt_id: String,
    },
    InvalidCallback {
        reason: String,
    },
    ChannelPollingFailed {
        channel: String,
        error: String,
    },
    ChannelMessageAccepted {
        channel: String,
        identity: String,
    },
    ChannelMessageRejected {
        channel: String,
        identity: String,
        reason: String,
    },
    DaemonRestarted {
        previous_pid: Option<u32>,
    },
    AgentSor {
        kind: AgentSorKind,
        detail: serde_json::Value,
    },
}

impl AuditAction {
    pub fn kind(&self) -> &'static str {
        match self {
            AuditAction::SessionStarted { .. } => "session_started",
            AuditAction::SessionEnded { .. } => "session_ended",
            AuditAction::PromptDetected { .. } => "prompt_detected",
            AuditAction::PromptRouted { .. } => "prompt_routed",
            AuditAction::PromptExpired { .. } => "prompt_expired",
            AuditAction::ReplyReceived { .. } => "reply_received",
            AuditAction::ResponseInjected { .. } => "response_injected",
            AuditAction::DuplicateCallbackIgnored { .. } => "duplicate_callback_ignored",
            AuditAction::LateReplyRejected { .. } => "late_reply_rejected",
            AuditAction::InvalidCallback { .. } => "invalid_callback",
            AuditAction::ChannelPollingFailed { .. } => "channel_polling_failed",
            AuditAction::ChannelMessageAccepted { .. } => "channel_message_accepted",
            AuditAction::ChannelMessageRejected { .. } => "channel_message_rejected",
            AuditAction::DaemonRestarted { .. } => "daemon_restarted",
            AuditAction::AgentSor { .. } => "agent_sor",
        }
    }
}

/// One row of the hash chain, as returned by readers. Writers never
/// construct this directly — see [`crate::writer::AuditWriter`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEvent {
    pub event_id: AuditEventId,
    pub session_id: Option<SessionId>,
    pub prompt_id: Option<PromptId>,
    pub action: AuditAction,
    pub created_at: DateTime<Utc>,
    pub prev_hash: Option<String>,
    pub hash: String,
}

/// The exact shape hashed into the chain: every field of [`AuditEvent`]
/// except `hash` itself, under canonical (sorted-key) serialization.
#[derive(Serialize)]
pub(crate) struct HashableEvent<'a> {
    pub event_id: &'a str,
    pub session_id: Option<&'a str>,
    pub prompt_id: Option<&'a str>,
    pub event_type: &'a str,
    pub payload: &'a serde_json::Value,
    pub created_at: String,
    pub prev_hash: Option<&'a str>,
}
