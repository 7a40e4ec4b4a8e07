use serde::{Deserialize, Serialize};

use relaybridge_core::prompt::Confidence;

use crate::error::{PolicyError, Result};
use crate::model::{
    default_name, AutonomyMode, MatchCriteria, PolicyAction, PolicyDefaults, PromptTypeFilter,
};

const VALID_SESSION_STATES: &[&str] = &["idle", "running", "streaming", "awaiting_input", "stopped"];
const VALID_INPUT_TYPES: &[&str] = &[
    "yes_no",
    "confirm_enter",
    "multiple_choice",
    "free_text",
    "password_input",
];

fn wildcard() -> String {
    "*".to_string()
}

/// v1 match criteria: v0's flat-AND fields plus `any_of`/`none_of` combinators,
/// `session_tag`, `session_state`, `channel_message`, `deny_input_types`,
/// `environment`, and an upper confidence bound.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct MatchCriteriaV1 {
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
    #[serde(default)]
    pub min_confidence: Option<Confidence>,
    #[serde(default)]
    pub max_confidence: Option<Confidence>,
    #[serde(default)]
    pub session_tag: Option<String>,
    #[serde(default)]
    pub session_state: Option<Vec<String>>,
    #[serde(default)]
    pub channel_message: Option<bool>,
    #[serde(default)]
    pub deny_input_types: Option<Vec<String>>,
    #[serde(default)]
    pub environment: Option<String>,
    #[serde(default)]
    pub any_of: Option<Vec<MatchCriteriaV1>>,
    #[serde(default)]
    pub none_of: Option<Vec<MatchCriteriaV1>>,
}

impl From<MatchCriteria> for MatchCriteriaV1 {
    fn from(v0: MatchCriteria) -> Self {
        Self {
            tool_id: v0.tool_id,
            repo: v0.repo,
            prompt_type: v0.prompt_type,
            contains: v0.contains,
            contains_is_regex: v0.contains_is_regex,
            min_confidence: Some(v0.min_confidence),
            ..Default::default()
        }
    }
}

impl MatchCriteriaV1 {
    pub fn min_confidence_or_low(&self) -> Confidence {
        self.min_confidence.unwrap_or(Confidence::Low)
    }

    pub fn max_confidence_or_high(&self) -> Confidence {
        self.max_confidence.unwrap_or(Confidence::High)
    }

    fn has_flat_criteria(&self) -> bool {
        self.tool_id != "*"
            || self.repo.is_some()
            || self.prompt_type.is_some()
            || self.contains.is_some()
            || self.session_tag.is_some()
            || self.max_confidence.is_some()
            || self.min_confidence.is_some()
            || self.session_state.is_some()
            || self.channel_message.is_some()
            || self.deny_input_types.is_some()
    }

    pub fn validate(&self, path: String) -> Result<()> {
        if self.any_of.is_some() && self.has_flat_criteria() {
            return Err(PolicyError::Validation {
                path,
                message: "any_of and flat match criteria are mutually exclusive on the same block"
                    .to_string(),
            });
        }
        if self.contains_is_regex {
            if let Some(pattern) = &self.contains {
                if pattern.len() > 200 {
                    return Err(PolicyError::Validation {
                        path: format!("{path}.contains"),
                        message: format!("contains regex too long ({} chars, max 200)", pattern.len()),
                    });
                }
                let compiled = regex::RegexBuilder::new(pattern)
                    .case_insensitive(true)
                    .build()
                    .map_err(|e| PolicyError::Validation {
                        path: format!("{path}.contains"),
                        message: format!("invalid regex: {e}"),
                    })?;
                if compiled.is_match("") {
                    return Err(PolicyError::Validation {
                        path: format!("{path}.contains"),
                        message: format!("regex {pattern:?} matches empty string — too broad"),
                    });
                }
            }
        }
        if let Some(states) = &self.session_state {
            for state in states {
                if !VALID_SESSION_STATES.contains(&state.as_str()) {
                    return Err(PolicyError::Validation {
                        path: format!("{path}.session_state"),
                        message: format!("unknown session_state {state:?}"),
                    });
                }
            }
        }
        if let Some(types) = &self.deny_input_types {
            for t in types {
                if !VALID_INPUT_TYPES.contains(&t.as_str()) {
                    return Err(PolicyError::Validation {
                        path: format!("{path}.deny_input_types"),
                        message: format!("unknown deny_input_type {t:?}"),
                    });
                }
            }
        }
        if let Some(sub_blocks) = &self.any_of {
            for (i, sub) in sub_blocks.iter().enumerate() {
                sub.validate(format!("{path}.any_of[{i}]"))?;
            }
        }
        if let Some(sub_blocks) = &self.none_of {
            for (i, sub) in sub_blocks.iter().enumerate() {
                sub.validate(format!("{path}.none_of[{i}]"))?;
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PolicyRuleV1 {
    pub id: String,
    #[serde(default)]
    pub description: String,
    #[serde(rename = "match")]
    pub match_criteria: MatchCriteriaV1,
    pub action: PolicyAction,
    #[serde(default)]
    pub max_auto_replies: Option<u32>,
}

impl From<crate::model::PolicyRule> for PolicyRuleV1 {
    fn from(v0: crate::model::PolicyRule) -> Self {
        Self {
            id: v0.id,
            description: v0.description,
            match_criteria: v0.match_criteria.into(),
            action: v0.action,
            max_auto_replies: None,
        }
    }
}

/// Root v1 policy document. `extends` is resolved at load time in `parser.rs`;
/// this struct always holds the fully-merged rule list once parsing is done.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PolicyV1 {
    pub policy_version: String,
    #[serde(default = "default_name")]
    pub name: String,
    #[serde(default)]
    pub autonomy_mode: AutonomyMode,
    #[serde(default)]
    pub rules: Vec<PolicyRuleV1>,
    #[serde(default)]
    pub defaults: PolicyDefaults,
    #[serde(default)]
    pub extends: Option<String>,
}

impl PolicyV1 {
    pub fn validate(&self) -> Result<()> {
        if self.policy_version != "1" {
            return Err(PolicyError::Validation {
                path: "policy_version".to_string(),
                message: format!("expected \"1\", got {:?}", self.policy_version),
            });
        }
        let mut seen = std::collections::HashSet::new();
        for rule in &self.rules {
            if !seen.insert(rule.id.clone()) {
                return Err(PolicyError::Validation {
                    path: "rules".to_string(),
                    message: format!("duplicate rule id {:?}", rule.id),
                });
            }
        }
        for (i, rule) in self.rules.iter().enumerate() {
            rule.match_criteria.validate(format!("rules[{i}].match"))?;
        }
        Ok(())
    }

    /// Stable SHA-256 hash of this policy's canonical JSON form, first 16 hex chars.
    pub fn content_hash(&self) -> Result<String> {
        use sha2::{Digest, Sha256};
        let serialized = serde_json::to_vec(self)?;
        let digest = Sha256::digest(&serialized);
        Ok(digest.iter().take(8).map(|b| format!("{b:02x}")).collect())
    }
}
