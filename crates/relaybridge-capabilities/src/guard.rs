use crate::edition::{AuthorityMode, Edition};
use crate::registry::{CapabilityDecision, FeatureRegistry};

/// Raised by [`require_capability`] on any non-allowed decision. Carries the
/// full decision so a caller can render the exact reason without re-querying
/// the registry.
#[derive(Debug, Clone)]
pub struct FeatureUnavailableError {
    pub decision: CapabilityDecision,
    pub capability_id: String,
}

impl std::fmt::Display for FeatureUnavailableError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "capability {:?} unavailable: {}",
            self.capability_id,
            self.decision.reason_code.as_str()
        )
    }
}

impl std::error::Error for FeatureUnavailableError {}

/// The guard every route/handler calls before doing gated work. On deny,
/// invokes `audit_callback` with `("capability.denied", payload)` before
/// raising — never on allow, so the audit log only records friction.
pub fn require_capability(
    edition: Edition,
    mode: AuthorityMode,
    capability_id: &str,
    audit_callback: Option<&mut dyn FnMut(&str, serde_json::Value)>,
) -> Result<CapabilityDecision, FeatureUnavailableError> {
    let decision = FeatureRegistry::is_allowed(edition, mode, capability_id);
    if decision.allowed {
        return Ok(decision);
    }

    if let Some(cb) = audit_callback {
        let mut payload = decision.to_json();
        if let serde_json::Value::Object(map) = &mut payload {
            map.insert("capability_id".to_string(), serde_json::Value::String(capability_id.to_string()));
            map.insert("edition".to_string(), serde_json::Value::String(edition.as_str().to_string()));
            map.insert("authority_mode".to_string(), serde_json::Value::String(mode.as_str().to_string()));
        }
        cb("capability.denied", payload);
    }

    Err(FeatureUnavailableError {
        decision,
        capability_id: capability_id.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allow_returns_decision_without_audit_callback() {
        let mut calls = Vec::new();
        let mut cb = |event_type: &str, payload: serde_json::Value| calls.push((event_type.to_string(), payload));
        let decision = require_capability(Edition::Core, AuthorityMode::Readonly, "tooling.risk_classifier", Some(&mut cb)).unwrap();
        assert!(decision.allowed);
        assert!(calls.is_empty());
    }

    #[test]
    fn deny_invokes_audit_callback_with_required_fields() {
        let mut calls = Vec::new();
        let mut cb = |event_type: &str, payload: serde_json::Value| calls.push((event_type.to_string(), payload));
        let err = require_capability(Edition::Core, AuthorityMode::Readonly, "authority.rbac", Some(&mut cb)).unwrap_err();
        assert_eq!(err.capability_id, "authority.rbac");

        assert_eq!(calls.len(), 1);
        let (event_type, payload) = &calls[0];
        assert_eq!(event_type, "capability.denied");
        assert_eq!(payload["capability_id"], "authority.rbac");
        assert_eq!(payload["edition"], "core");
        assert_eq!(payload["authority_mode"], "readonly");
        assert!(payload.get("decision_fingerprint").is_some());
    }

    #[test]
    fn error_message_contains_capability_id() {
        let err = require_capability(Edition::Core, AuthorityMode::Readonly, "authority.rbac", None).unwrap_err();
        assert!(err.to_string().contains("authority.rbac"));
    }
}
