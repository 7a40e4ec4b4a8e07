use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{CoreError, Result};
use crate::ids::{PromptId, SessionId};

pub const DEFAULT_PROMPT_EXCERPT_MAX_BYTES: usize = 200;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PromptType {
    YesNo,
    ConfirmEnter,
    MultipleChoice,
    FreeText,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Confidence {
    Low,
    Medium,
    High,
}

/// Lifecycle of one detected prompt, from detection to resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PromptStatus {
    Detected,
    Routed,
    AwaitingReply,
    ReplyReceived,
    Injected,
    Resolved,
    Expired,
    Failed,
}

impl PromptStatus {
    pub fn can_transition_to(self, next: PromptStatus) -> bool {
        use PromptStatus::*;
        match (self, next) {
            (Detected, Routed | Expired | Failed) => true,
            (Routed, AwaitingReply | Expired | Failed) => true,
            (AwaitingReply, ReplyReceived | Expired | Failed) => true,
            (ReplyReceived, Injected | Failed) => true,
            (Injected, Resolved | Failed) => true,
            _ => false,
        }
    }
}

/// One question the supervised process is blocked on, as inferred by the detector.
/// Immutable once created — lifecycle state lives alongside it, not inside it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromptEvent {
    pub prompt_id: PromptId,
    pub session_id: SessionId,
    pub prompt_type: PromptType,
    pub confidence: Confidence,
    /// Cleaned output tail, truncated to `DEFAULT_PROMPT_EXCERPT_MAX_BYTES`.
    pub excerpt: String,
    pub choices: Option<Vec<String>>,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl PromptEvent {
    pub fn new(
        session_id: SessionId,
        prompt_type: PromptType,
        confidence: Confidence,
        excerpt: &str,
        choices: Option<Vec<String>>,
        timeout_seconds: i64,
    ) -> Self {
        let now = Utc::now();
        let mut truncated = excerpt.to_string();
        truncated.truncate(DEFAULT_PROMPT_EXCERPT_MAX_BYTES);
        Self {
            prompt_id: PromptId::new(),
            session_id,
            prompt_type,
            confidence,
            excerpt: truncated,
            choices,
            created_at: now,
            expires_at: now + Duration::seconds(timeout_seconds),
        }
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

/// Tracks a single [`PromptEvent`] through its state machine. Kept separate
/// from the immutable event so replaying history never rewrites the original.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromptStateMachine {
    pub prompt_id: PromptId,
    pub status: PromptStatus,
}

impl PromptStateMachine {
    pub fn new(prompt_id: PromptId) -> Self {
        Self {
            prompt_id,
            status: PromptStatus::Detected,
        }
    }

    pub fn transition(&mut self, next: PromptStatus) -> Result<()> {
        if !self.status.can_transition_to(next) {
            return Err(CoreError::InvalidTransition {
                from: format!("{:?}", self.status),
                to: format!("{next:?}"),
            });
        }
        self.status = next;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn excerpt_is_truncated() {
        let long = "x".repeat(500);
        let event = PromptEvent::new(
            SessionId::new(),
            PromptType::FreeText,
            Confidence::Medium,
            &long,
            None,
            300,
        );
        assert_eq!(event.excerpt.len(), DEFAULT_PROMPT_EXCERPT_MAX_BYTES);
    }

    #[test]
    fn happy_path_transitions() {
        let mut sm = PromptStateMachine::new(PromptId::new());
        sm.transition(PromptStatus::Routed).unwrap();
        sm.transition(PromptStatus::AwaitingReply).unwrap();
        sm.transition(PromptStatus::ReplyReceived).unwrap();
        sm.transition(PromptStatus::Injected).unwrap();
        sm.transition(PromptStatus::Resolved).unwrap();
    }

    #[test]
    fn resolved_is_terminal() {
        let mut sm = PromptStateMachine::new(PromptId::new());
        sm.transition(PromptStatus::Routed).unwrap();
        sm.transition(PromptStatus::AwaitingReply).unwrap();
        sm.transition(PromptStatus::ReplyReceived).unwrap();
        sm.transition(PromptStatus::Injected).unwrap();
        sm.transition(PromptStatus::Resolved).unwrap();
        assert!(sm.transition(PromptStatus::Failed).is_err());
    }

    #[test]
    fn expiry_is_time_based() {
        let event = PromptEvent::new(
            SessionId::new(),
            PromptType::YesNo,
            Confidence::High,
            "proceed? [y/n]",
            Some(vec!["y".into(), "n".into()]),
            30,
        );
        assert!(!event.is_expired(event.created_at));
        assert!(event.is_expired(event.created_at + Duration::seconds(31)));
    }
}
