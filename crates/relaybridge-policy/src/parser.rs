use std::collections::HashSet;
use std::path::{Path, PathBuf};

use crate::error::{PolicyError, Result};
use crate::model::{
    AutonomyMode, MatchCriteria, PolicyAction, PolicyDefaults, PolicyRule, PolicyV0,
};
use crate::model_v1::{PolicyRuleV1, PolicyV1};

/// A loaded and validated policy, either DSL version. The evaluator only
/// ever sees the unified `rules()`/`defaults()` view — it does not care
/// which version it came from.
#[derive(Debug, Clone, PartialEq)]
pub enum Policy {
    V0(PolicyV0),
    V1(PolicyV1),
}

impl Policy {
    pub fn name(&self) -> &str {
        match self {
            Policy::V0(p) => &p.name,
            Policy::V1(p) => &p.name,
        }
    }

    pub fn autonomy_mode(&self) -> AutonomyMode {
        match self {
            Policy::V0(p) => p.autonomy_mode,
            Policy::V1(p) => p.autonomy_mode,
        }
    }

    pub fn defaults(&self) -> PolicyDefaults {
        match self {
            Policy::V0(p) => p.defaults,
            Policy::V1(p) => p.defaults,
        }
    }

    /// Rules normalized to the v1 shape, in declaration order.
    pub fn rules(&self) -> Vec<PolicyRuleV1> {
        match self {
            Policy::V0(p) => p.rules.iter().cloned().map(PolicyRuleV1::from).collect(),
            Policy::V1(p) => p.rules.clone(),
        }
    }

    pub fn content_hash(&self) -> Result<String> {
        match self {
            Policy::V0(p) => {
                use sha2::{Digest, Sha256};
                let serialized = serde_json::to_vec(p)?;
                let digest = Sha256::digest(&serialized);
                Ok(digest.iter().take(8).map(|b| format!("{b:02x}")).collect())
            }
            Policy::V1(p) => p.content_hash(),
        }
    }
}

pub fn load_policy(path: impl AsRef<Path>) -> Result<Policy> {
    load_policy_visited(path.as_ref(), &HashSet::new())
}

fn load_policy_visited(path: &Path, visited: &HashSet<PathBuf>) -> Result<Policy> {
    if !path.exists() {
        return Err(PolicyError::NotFound(path.display().to_string()));
    }
    let content = std::fs::read_to_string(path).map_err(|source| PolicyError::Io {
        path: path.display().to_string(),
        source,
    })?;
    parse_policy_visited(&content, &path.display().to_string(), visited)
}

pub fn parse_policy(yaml_text: &str, source: &str) -> Result<Policy> {
    parse_policy_visited(yaml_text, source, &HashSet::new())
}

fn parse_policy_visited(yaml_text: &str, source: &str, visited: &HashSet<PathBuf>) -> Result<Policy> {
    let data: serde_yaml::Value = serde_yaml::from_str(yaml_text).map_err(|e| PolicyError::Yaml {
        source_label: source.to_string(),
        message: e.to_string(),
    })?;

    let version = data
        .get("policy_version")
        .and_then(|v| v.as_str().map(str::to_string).or_else(|| v.as_i64().map(|n| n.to_string())))
        .unwrap_or_default();

    match version.as_str() {
        "0" => parse_v0(yaml_text, source).map(Policy::V0),
        "1" => parse_v1(yaml_text, source, visited).map(Policy::V1),
        other => Err(PolicyError::UnsupportedVersion(other.to_string())),
    }
}

fn parse_v0(yaml_text: &str, source: &str) -> Result<PolicyV0> {
    let policy: PolicyV0 = serde_yaml::from_str(yaml_text).map_err(|e| PolicyError::Yaml {
        source_label: source.to_string(),
        message: e.to_string(),
    })?;
    let mut seen = HashSet::new();
    for rule in &policy.rules {
        if !seen.insert(rule.id.clone()) {
            return Err(PolicyError::Validation {
                path: "rules".to_string(),
                message: format!("duplicate rule id {:?}", rule.id),
            });
        }
    }
    Ok(policy)
}

fn parse_v1(yaml_text: &str, source: &str, visited: &HashSet<PathBuf>) -> Result<PolicyV1> {
    let mut child: PolicyV1 = serde_yaml::from_str(yaml_text).map_err(|e| PolicyError::Yaml {
        source_label: source.to_string(),
        message: e.to_string(),
    })?;
    child.validate()?;

    if let Some(extends_raw) = child.extends.clone() {
        let extends_path = resolve_extends_path(&extends_raw, source);
        if visited.contains(&extends_path) {
            let chain: Vec<String> = visited.iter().map(|p| p.display().to_string()).collect();
            return Err(PolicyError::CircularExtends {
                chain: format!("{} -> {} (visited: {})", source, extends_path.display(), chain.join(", ")),
            });
        }
        let mut next_visited = visited.clone();
        next_visited.insert(PathBuf::from(source));

        let base = load_policy_visited(&extends_path, &next_visited)?;
        let base_v1 = match base {
            Policy::V1(p) => p,
            Policy::V0(_) => {
                return Err(PolicyError::ExtendsNotV1(extends_path.display().to_string()));
            }
        };

        let child_ids: HashSet<&str> = child.rules.iter().map(|r| r.id.as_str()).collect();
        let mut merged_rules = child.rules.clone();
        merged_rules.extend(base_v1.rules.into_iter().filter(|r| !child_ids.contains(r.id.as_str())));

        let default_defaults = PolicyDefaults::default();
        let merged_defaults = if child.defaults == default_defaults {
            base_v1.defaults
        } else {
            child.defaults
        };

        child.rules = merged_rules;
        child.defaults = merged_defaults;
    }

    Ok(child)
}

fn resolve_extends_path(extends_raw: &str, source: &str) -> PathBuf {
    let raw = PathBuf::from(shellexpand_home(extends_raw));
    if raw.is_absolute() || source == "<string>" {
        return raw;
    }
    Path::new(source)
        .parent()
        .map(|parent| parent.join(&raw))
        .unwrap_or(raw)
}

fn shellexpand_home(path: &str) -> String {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Ok(home) = std::env::var("HOME") {
            return format!("{home}/{rest}");
        }
    }
    path.to_string()
}

/// The built-in safe-default policy: every prompt requires a human.
pub fn default_policy() -> Policy {
    Policy::V0(PolicyV0 {
        policy_version: "0".to_string(),
        name: "safe-default".to_string(),
        autonomy_mode: AutonomyMode::Assist,
        rules: vec![PolicyRule {
            id: "default-require-human".to_string(),
            description: "Catch-all: route every prompt to the human operator.".to_string(),
            match_criteria: MatchCriteria::default(),
            action: PolicyAction::RequireHuman {
                message: Some("No policy file configured — all prompts require human input.".to_string()),
            },
        }],
        defaults: PolicyDefaults {
            no_match: crate::model::FallbackAction::RequireHuman,
            low_confidence: crate::model::FallbackAction::RequireHuman,
        },
    })
}

pub fn validate_policy_file(path: impl AsRef<Path>) -> Vec<String> {
    match load_policy(path) {
        Ok(_) => Vec::new(),
        Err(e) => vec![e.to_string()],
    }
}

/// Rewrite a v0 policy's `policy_version` line to `"1"`, operating on raw
/// text so YAML comments and formatting survive unchanged. The result is
/// re-parsed to confirm it validates as v1.
#[allow(clippy::unwrap_used)]
static POLICY_VERSION_LINE: std::sync::LazyLock<regex::Regex> = std::sync::LazyLock::new(|| {
    regex::Regex::new(r#"(?m)^(\s*policy_version\s*:\s*)(['"]?)0(['"]?)(\s*(#.*)?)$"#).unwrap()
});

pub fn migrate_v0_to_v1(yaml_text: &str) -> Result<String> {
    let replaced = POLICY_VERSION_LINE.replace(yaml_text, |caps: &regex::Captures| {
        format!("{}{}1{}{}", &caps[1], &caps[2], &caps[3], &caps[4])
    });
    let migrated = replaced.into_owned();
    parse_policy(&migrated, "<migrated>")?;
    Ok(migrated)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_policy_requires_human() {
        let policy = default_policy();
        assert_eq!(policy.rules().len(), 1);
        assert_eq!(policy.rules()[0].action.kind(), "require_human");
    }

    #[test]
    fn v0_parses_and_rejects_duplicate_ids() {
        let yaml = r#"
policy_version: "0"
name: test
rules:
  - id: r1
    match: {}
    action: {type: require_human}
  - id: r1
    match: {}
    action: {type: require_human}
"#;
        let err = parse_policy(yaml, "<string>").unwrap_err();
        assert!(err.to_string().contains("duplicate"));
    }

    #[test]
    fn v1_any_of_and_flat_mutually_exclusive() {
        let yaml = r#"
policy_version: "1"
name: test
rules:
  - id: r1
    match:
      tool_id: claude
      any_of:
        - tool_id: codex
    action: {type: require_human}
"#;
        assert!(parse_policy(yaml, "<string>").is_err());
    }

    #[test]
    fn migrate_preserves_comments() {
        let yaml = "# my policy\npolicy_version: \"0\"\nname: test\nrules: []\n";
        let migrated = migrate_v0_to_v1(yaml).unwrap();
        assert!(migrated.contains("# my policy"));
        assert!(migrated.contains("policy_version: \"1\""));
    }

    #[test]
    fn content_hash_is_stable() {
        let policy = default_policy();
        let a = policy.content_hash().unwrap();
        let b = policy.content_hash().unwrap();
        assert_eq!(a, b);
        assert_eq!(a.len(), 16);
    }
}
