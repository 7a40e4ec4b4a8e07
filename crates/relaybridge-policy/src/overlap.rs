use serde::Serialize;

use relaybridge_core::prompt::Confidence;

use crate::model::PromptTypeFilter;
use crate::model_v1::{MatchCriteriaV1, PolicyRuleV1};
use crate::parser::Policy;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OverlapWarning {
    pub rule_a_id: String,
    pub rule_b_id: String,
    pub overlap_reason: String,
}

impl std::fmt::Display for OverlapWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Rules {:?} and {:?} may overlap: {}",
            self.rule_a_id, self.rule_b_id, self.overlap_reason
        )
    }
}

/// Pairwise static analysis for rule shadowing. `any_of` blocks are skipped —
/// too complex to reason about statically without expanding them, and
/// expansion risks combinatorial blowup on deeply nested policies.
pub fn detect_overlaps(policy: &Policy) -> Vec<OverlapWarning> {
    let rules = policy.rules();
    let mut warnings = Vec::new();

    for i in 0..rules.len() {
        for j in (i + 1)..rules.len() {
            let rule_a = &rules[i];
            let rule_b = &rules[j];

            if rule_a.match_criteria.any_of.is_some() || rule_b.match_criteria.any_of.is_some() {
                continue;
            }

            if let Some(reason) = check_criteria_overlap(rule_a, rule_b) {
                warnings.push(OverlapWarning {
                    rule_a_id: rule_a.id.clone(),
                    rule_b_id: rule_b.id.clone(),
                    overlap_reason: reason,
                });
            }
        }
    }

    warnings
}

fn check_criteria_overlap(rule_a: &PolicyRuleV1, rule_b: &PolicyRuleV1) -> Option<String> {
    let a = &rule_a.match_criteria;
    let b = &rule_b.match_criteria;

    if a.tool_id != "*" && b.tool_id != "*" && a.tool_id != b.tool_id {
        return None;
    }

    if !prompt_types_overlap(a.prompt_type.as_deref(), b.prompt_type.as_deref()) {
        return None;
    }

    let min_a = a.min_confidence_or_low();
    let max_a = a.max_confidence_or_high();
    let min_b = b.min_confidence_or_low();
    let max_b = b.max_confidence_or_high();
    if !confidence_ranges_overlap(min_a, max_a, min_b, max_b) {
        return None;
    }

    if let (Some(repo_a), Some(repo_b)) = (&a.repo, &b.repo) {
        if !repo_a.starts_with(repo_b.as_str()) && !repo_b.starts_with(repo_a.as_str()) {
            return None;
        }
    }

    let mut parts = Vec::new();
    parts.push(describe_type_overlap(a.prompt_type.as_deref(), b.prompt_type.as_deref()));
    parts.push(format!(
        "confidence ranges overlap: [{min_a:?}..{max_a:?}] and [{min_b:?}..{max_b:?}]"
    ));
    Some(parts.join("; "))
}

fn prompt_types_overlap(a: Option<&[PromptTypeFilter]>, b: Option<&[PromptTypeFilter]>) -> bool {
    match (a, b) {
        (None, _) | (_, None) => true,
        (Some(a), Some(b)) => {
            if a.contains(&PromptTypeFilter::Any) || b.contains(&PromptTypeFilter::Any) {
                return true;
            }
            a.iter().any(|x| b.contains(x))
        }
    }
}

fn confidence_ranges_overlap(min_a: Confidence, max_a: Confidence, min_b: Confidence, max_b: Confidence) -> bool {
    min_a <= max_b && min_b <= max_a
}

fn describe_type_overlap(a: Option<&[PromptTypeFilter]>, b: Option<&[PromptTypeFilter]>) -> String {
    match (a, b) {
        (None, None) => "both match any prompt type".to_string(),
        (None, Some(_)) => "first rule matches any prompt type".to_string(),
        (Some(_), None) => "second rule matches any prompt type".to_string(),
        (Some(a), Some(b)) => {
            if a.contains(&PromptTypeFilter::Any) {
                return "first rule matches any prompt type".to_string();
            }
            if b.contains(&PromptTypeFilter::Any) {
                return "second rule matches any prompt type".to_string();
            }
            let shared: Vec<String> = a.iter().filter(|x| b.contains(x)).map(|x| format!("{x:?}")).collect();
            format!("shared prompt types: {shared:?}")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_policy;

    #[test]
    fn overlapping_catch_alls_are_flagged() {
        let yaml = r#"
policy_version: "1"
name: test
rules:
  - id: a
    match: {}
    action: {type: require_human}
  - id: b
    match: {}
    action: {type: deny}
"#;
        let policy = parse_policy(yaml, "<string>").unwrap();
        let warnings = detect_overlaps(&policy);
        assert_eq!(warnings.len(), 1);
        assert_eq!(warnings[0].rule_a_id, "a");
        assert_eq!(warnings[0].rule_b_id, "b");
    }

    #[test]
    fn different_tool_ids_do_not_overlap() {
        let yaml = r#"
policy_version: "1"
name: test
rules:
  - id: a
    match: {tool_id: claude}
    action: {type: require_human}
  - id: b
    match: {tool_id: codex}
    action: {type: deny}
"#;
        let policy = parse_policy(yaml, "<string>").unwrap();
        assert!(detect_overlaps(&policy).is_empty());
    }

    #[test]
    fn any_of_rules_are_skipped() {
        let yaml = r#"
policy_version: "1"
name: test
rules:
  - id: a
    match:
      any_of:
        - tool_id: claude
    action: {type: require_human}
  - id: b
    match: {}
    action: {type: deny}
"#;
        let policy = parse_policy(yaml, "<string>").unwrap();
        assert!(detect_overlaps(&policy).is_empty());
    }
}
