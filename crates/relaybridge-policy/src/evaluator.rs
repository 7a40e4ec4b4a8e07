use serde::Serialize;

use relaybridge_core::prompt::{Confidence, PromptType};

use crate::error::Result;
use crate::model::{AutonomyMode, FallbackAction, PolicyAction, PromptTypeFilter};
use crate::model_v1::{MatchCriteriaV1, PolicyRuleV1};
use crate::parser::Policy;

/// The properties of a detected prompt the evaluator needs, independent of
/// the concrete `PromptEvent`/`Session` types owned by other crates.
#[derive(Debug, Clone)]
pub struct EvalEvent<'a> {
    pub tool_id: &'a str,
    pub cwd: &'a str,
    pub prompt_type: PromptType,
    pub confidence: Confidence,
    pub excerpt: &'a str,
    pub session_tag: Option<&'a str>,
    pub session_state: Option<&'a str>,
    pub channel_message: bool,
    pub environment: Option<&'a str>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PolicyDecision {
    pub action: PolicyAction,
    pub matched_rule_id: Option<String>,
    pub explanation: String,
    pub policy_hash: String,
    pub confidence: Confidence,
    pub autonomy_mode: AutonomyMode,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RuleTrace {
    pub rule_id: String,
    pub matched: bool,
}

/// FIRST-MATCH-WINS evaluation. `Observe` autonomy forces every `auto_reply`
/// action down to `require_human` regardless of which rule matched — the
/// whole point of Observe mode is "never let the agent act unsupervised".
pub fn evaluate(policy: &Policy, event: &EvalEvent<'_>) -> Result<PolicyDecision> {
    let policy_hash = policy.content_hash()?;
    let autonomy_mode = policy.autonomy_mode();
    let rules = policy.rules();

    for rule in &rules {
        if matches(&rule.match_criteria, event) {
            return Ok(build_decision(rule, autonomy_mode, policy_hash, event.confidence));
        }
    }

    let fallback = if event.confidence == Confidence::Low {
        policy.defaults().low_confidence
    } else {
        policy.defaults().no_match
    };

    Ok(PolicyDecision {
        action: fallback_to_action(fallback),
        matched_rule_id: None,
        explanation: "no rule matched; applied policy default".to_string(),
        policy_hash,
        confidence: event.confidence,
        autonomy_mode,
    })
}

/// Alias of `evaluate` — "explain" mode short-circuits identically to normal
/// evaluation; it differs only in how a caller renders the result.
pub fn explain(policy: &Policy, event: &EvalEvent<'_>) -> Result<PolicyDecision> {
    evaluate(policy, event)
}

/// Evaluates every rule independently, without short-circuiting, so a caller
/// can see why later rules would or would not have matched. The winning rule
/// is still whichever one `evaluate` would have picked.
pub fn debug_evaluate(policy: &Policy, event: &EvalEvent<'_>) -> Vec<RuleTrace> {
    policy
        .rules()
        .iter()
        .map(|rule| RuleTrace {
            rule_id: rule.id.clone(),
            matched: matches(&rule.match_criteria, event),
        })
        .collect()
}

fn build_decision(rule: &PolicyRuleV1, autonomy_mode: AutonomyMode, policy_hash: String, confidence: Confidence) -> PolicyDecision {
    let action = match (&rule.action, autonomy_mode) {
        (PolicyAction::AutoReply { .. }, AutonomyMode::Observe) => PolicyAction::RequireHuman {
            message: Some("autonomy mode is observe-only; auto_reply downgraded".to_string()),
        },
        (action, _) => action.clone(),
    };
    PolicyDecision {
        explanation: format!("matched rule {:?} ({})", rule.id, action.kind()),
        action,
        matched_rule_id: Some(rule.id.clone()),
        policy_hash,
        confidence,
        autonomy_mode,
    }
}

fn fallback_to_action(fallback: FallbackAction) -> PolicyAction {
    match fallback {
        FallbackAction::RequireHuman => PolicyAction::RequireHuman { message: None },
        FallbackAction::Deny => PolicyAction::Deny { reason: None },
        FallbackAction::NotifyOnly => PolicyAction::NotifyOnly { message: None },
    }
}

fn matches(criteria: &MatchCriteriaV1, event: &EvalEvent<'_>) -> bool {
    if let Some(any_of) = &criteria.any_of {
        return any_of.iter().any(|sub| matches(sub, event));
    }

    if criteria.tool_id != "*" && criteria.tool_id != event.tool_id {
        return false;
    }
    if let Some(repo) = &criteria.repo {
        if !event.cwd.starts_with(repo.as_str()) {
            return false;
        }
    }
    if let Some(types) = &criteria.prompt_type {
        if !types.contains(&PromptTypeFilter::Any) && !types.iter().any(|t| prompt_type_matches(*t, event.prompt_type)) {
            return false;
        }
    }
    if let Some(pattern) = &criteria.contains {
        let hit = if criteria.contains_is_regex {
            regex::RegexBuilder::new(pattern)
                .case_insensitive(true)
                .build()
                .map(|re| re.is_match(event.excerpt))
                .unwrap_or(false)
        } else {
            event.excerpt.to_lowercase().contains(&pattern.to_lowercase())
        };
        if !hit {
            return false;
        }
    }
    if event.confidence < criteria.min_confidence_or_low() || event.confidence > criteria.max_confidence_or_high() {
        return false;
    }
    if let Some(tag) = &criteria.session_tag {
        if Some(tag.as_str()) != event.session_tag {
            return false;
        }
    }
    if let Some(states) = &criteria.session_state {
        if !event.session_state.map(|s| states.iter().any(|x| x == s)).unwrap_or(false) {
            return false;
        }
    }
    if let Some(cm) = criteria.channel_message {
        if cm != event.channel_message {
            return false;
        }
    }
    if let Some(deny_types) = &criteria.deny_input_types {
        if !deny_types.iter().any(|t| t == prompt_type_name(event.prompt_type)) {
            return false;
        }
    }
    if let Some(env) = &criteria.environment {
        if Some(env.as_str()) != event.environment {
            return false;
        }
    }
    if let Some(none_of) = &criteria.none_of {
        if none_of.iter().any(|sub| matches(sub, event)) {
            return false;
        }
    }
    true
}

fn prompt_type_matches(filter: PromptTypeFilter, actual: PromptType) -> bool {
    matches!(
        (filter, actual),
        (PromptTypeFilter::Any, _)
            | (PromptTypeFilter::YesNo, PromptType::YesNo)
            | (PromptTypeFilter::ConfirmEnter, PromptType::ConfirmEnter)
            | (PromptTypeFilter::MultipleChoice, PromptType::MultipleChoice)
            | (PromptTypeFilter::FreeText, PromptType::FreeText)
    )
}

fn prompt_type_name(t: PromptType) -> &'static str {
    match t {
        PromptType::YesNo => "yes_no",
        PromptType::ConfirmEnter => "confirm_enter",
        PromptType::MultipleChoice => "multiple_choice",
        PromptType::FreeText => "free_text",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::{default_policy, parse_policy};

    fn event<'a>() -> EvalEvent<'a> {
        EvalEvent {
            tool_id: "claude",
            cwd: "/home/user/project",
            prompt_type: PromptType::YesNo,
            confidence: Confidence::High,
            excerpt: "Proceed? [y/n]",
            session_tag: None,
            session_state: None,
            channel_message: true,
            environment: None,
        }
    }

    #[test]
    fn default_policy_always_requires_human() {
        let policy = default_policy();
        let decision = evaluate(&policy, &event()).unwrap();
        assert_eq!(decision.action.kind(), "require_human");
        assert_eq!(decision.matched_rule_id.as_deref(), Some("default-require-human"));
    }

    #[test]
    fn first_match_wins_over_later_rule() {
        let yaml = r#"
policy_version: "1"
name: test
rules:
  - id: specific
    match: {tool_id: claude, prompt_type: [yes_no]}
    action: {type: auto_reply, value: "y"}
  - id: catch_all
    match: {}
    action: {type: require_human}
"#;
        let policy = parse_policy(yaml, "<string>").unwrap();
        let decision = evaluate(&policy, &event()).unwrap();
        assert_eq!(decision.matched_rule_id.as_deref(), Some("specific"));
        assert_eq!(decision.action.kind(), "auto_reply");
    }

    #[test]
    fn observe_mode_downgrades_auto_reply() {
        let yaml = r#"
policy_version: "1"
name: test
autonomy_mode: observe
rules:
  - id: specific
    match: {tool_id: claude}
    action: {type: auto_reply, value: "y"}
"#;
        let policy = parse_policy(yaml, "<string>").unwrap();
        let decision = evaluate(&policy, &event()).unwrap();
        assert_eq!(decision.action.kind(), "require_human");
    }

    #[test]
    fn no_match_falls_back_to_defaults() {
        let yaml = r#"
policy_version: "1"
name: test
rules:
  - id: only
    match: {tool_id: codex}
    action: {type: auto_reply, value: "y"}
defaults:
  no_match: deny
"#;
        let policy = parse_policy(yaml, "<string>").unwrap();
        let decision = evaluate(&policy, &event()).unwrap();
        assert!(decision.matched_rule_id.is_none());
        assert_eq!(decision.action.kind(), "deny");
    }

    #[test]
    fn debug_evaluate_checks_every_rule() {
        let yaml = r#"
policy_version: "1"
name: test
rules:
  - id: a
    match: {tool_id: codex}
    action: {type: deny}
  - id: b
    match: {tool_id: claude}
    action: {type: require_human}
"#;
        let policy = parse_policy(yaml, "<string>").unwrap();
        let trace = debug_evaluate(&policy, &event());
        assert_eq!(trace.len(), 2);
        assert!(!trace[0].matched);
        assert!(trace[1].matched);
    }
}
