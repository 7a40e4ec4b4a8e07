use serde::{Deserialize, Serialize};

use relaybridge_core::prompt::Confidence;

/// Default operating posture when no rule names one explicitly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AutonomyMode {
    /// Never auto-reply; every prompt still reaches a human regardless of rule actions.
    Observe,
    /// Auto-reply rules fire; anything unmatched falls back to a human.
    Assist,
    /// Auto-reply rules fire with no additional human-in-the-loop safety net.
    Autonomous,
}

impl Default for AutonomyMode {
    fn default() -> Self {
        AutonomyMode::Assist
    }
}

/// Prompt-type filter used in match criteria — a superset of
/// `relaybridge_core::prompt::PromptType` with an explicit wildcard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PromptTypeFilter {
    Any,
    YesNo,
    ConfirmEnter,
    MultipleChoice,
    FreeText,
}

/// Tagged action a matching rule produces.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PolicyAction {
    AutoReply { value: String },
    RequireHuman { message: Option<String> },
    Deny { reason: Option<String> },
    NotifyOnly { message: Option<String> },
}

impl PolicyAction {
    pub fn kind(&self) -> &'static str {
        match self {
            PolicyAction::AutoReply { .. } => "auto_reply",
            PolicyAction::RequireHuman { .. } => "require_human",
            PolicyAction::Deny { .. } => "deny",
            PolicyAction::NotifyOnly { .. } => "notify_only",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FallbackAction {
    RequireHuman,
    Deny,
    NotifyOnly,
}

impl Default for FallbackAction {
    fn default() -> Self {
        FallbackAction::RequireHuman
    }
}

/// What to do when no rule matches, or when confidence is LOW.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct PolicyDefaults {
    #[serde(default)]
    pub no_match: FallbackAction,
    #[serde(default)]
    pub low_confidence: FallbackAction,
}

/// v0 flat-AND match criteria. Frozen — v1 extends this shape but is a
/// standalone type, not a subtype, so v0 policies never see new fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MatchCriteria {
    #[serde(default = "wildcard")]
    pub tool_id: String,
    #[serde(default)]
    pub repo: Option<String>,
    #[serde(default)]
    pub prompt_type: Option<Vec<PromptTypeFilter>>,
    #[serde(default)]
    pub contains: Option<String>,
    #[serde(default)]
    pub contains_is_regex: bool,
    #[serde(default = "confidence_low")]
    pub min_confidence: Confidence,
}

fn confidence_low() -> Confidence {
    Confidence::Low
}

fn wildcard() -> String {
    "*".to_string()
}

impl Default for MatchCriteria {
    fn default() -> Self {
        Self {
            tool_id: wildcard(),
            repo: None,
            prompt_type: None,
            contains: None,
            contains_is_regex: false,
            min_confidence: Confidence::Low,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PolicyRule {
    pub id: String,
    #[serde(default)]
    pub description: String,
    #[serde(rename = "match")]
    pub match_criteria: MatchCriteria,
    pub action: PolicyAction,
}

/// Root v0 policy document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PolicyV0 {
    pub policy_version: String,
    #[serde(default = "default_name")]
    pub name: String,
    #[serde(default)]
    pub autonomy_mode: AutonomyMode,
    #[serde(default)]
    pub rules: Vec<PolicyRule>,
    #[serde(default)]
    pub defaults: PolicyDefaults,
}

pub(crate) fn default_name() -> String {
    "default".to_string()
}
