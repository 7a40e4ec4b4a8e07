use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{CoreError, Result};
use crate::ids::{PromptId, SessionId};

/// Lifecycle status of a supervised child process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Starting,
    Running,
    AwaitingReply,
    Paused,
    Completed,
    Crashed,
    Canceled,
}

impl SessionStatus {
    /// Whether `self -> next` is a legal transition. Mirrors the PTY supervisor's
    /// own lifecycle — there is no going back to `Starting`, and terminal states
    /// (`Completed`/`Crashed`/`Canceled`) never move again.
    pub fn can_transition_to(self, next: SessionStatus) -> bool {
        use SessionStatus::*;
        match (self, next) {
            (Starting, Running | Crashed | Canceled) => true,
            (Running, AwaitingReply | Paused | Completed | Crashed | Canceled) => true,
            (AwaitingReply, Running | Paused | Completed | Crashed | Canceled) => true,
            (Paused, Running | Completed | Crashed | Canceled) => true,
            _ => false,
        }
    }
}

/// Identity and lifecycle state of one supervised child-process run.
///
/// Owned exclusively by the session manager for the lifetime of the child.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub session_id: SessionId,
    pub tool: String,
    pub argv: Vec<String>,
    pub cwd: String,
    pub label: Option<String>,
    pub pid: Option<u32>,
    pub status: SessionStatus,
    pub active_prompt_id: Option<PromptId>,
    /// `prompt_id` -> channel message handle (e.g. `"telegram:123456"`), so a
    /// resolved or expired prompt can edit the original message in place.
    pub channel_message_ids: HashMap<String, String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Session {
    pub fn new(tool: impl Into<String>, argv: Vec<String>, cwd: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            session_id: SessionId::new(),
            tool: tool.into(),
            argv,
            cwd: cwd.into(),
            label: None,
            pid: None,
            status: SessionStatus::Starting,
            active_prompt_id: None,
            channel_message_ids: HashMap::new(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn transition(&mut self, next: SessionStatus) -> Result<()> {
        if !self.status.can_transition_to(next) {
            return Err(CoreError::InvalidTransition {
                from: format!("{:?}", self.status),
                to: format!("{next:?}"),
            });
        }
        self.status = next;
        self.updated_at = Utc::now();
        Ok(())
    }

    /// A session may have at most one in-flight prompt at a time.
    pub fn bind_prompt(&mut self, prompt_id: PromptId) -> Result<()> {
        if self.active_prompt_id.is_some() {
            return Err(CoreError::Internal(
                "session already has an active prompt".to_string(),
            ));
        }
        self.active_prompt_id = Some(prompt_id);
        Ok(())
    }

    pub fn clear_active_prompt(&mut self) {
        self.active_prompt_id = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starting_cannot_return_to_itself() {
        assert!(!SessionStatus::Starting.can_transition_to(SessionStatus::Starting));
    }

    #[test]
    fn terminal_states_are_terminal() {
        assert!(!SessionStatus::Completed.can_transition_to(SessionStatus::Running));
        assert!(!SessionStatus::Crashed.can_transition_to(SessionStatus::Running));
        assert!(!SessionStatus::Canceled.can_transition_to(SessionStatus::Running));
    }

    #[test]
    fn active_prompt_is_exclusive() {
        let mut s = Session::new("claude", vec!["claude".into()], "/tmp");
        s.bind_prompt(PromptId::new()).unwrap();
        assert!(s.bind_prompt(PromptId::new()).is_err());
    }
}
