use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::capability::{CapabilityClass, CAPABILITIES};
use crate::edition::{AuthorityMode, Edition};

pub const REGISTRY_VERSION: &str = "1.0.0";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReasonCode {
    Allowed,
    EditionDeny,
    AuthorityModeRequired,
    UnknownCapability,
}

impl ReasonCode {
    pub fn as_str(self) -> &'static str {
        match self {
            ReasonCode::Allowed => "ALLOWED",
            ReasonCode::EditionDeny => "EDITION_DENY",
            ReasonCode::AuthorityModeRequired => "AUTHORITY_MODE_REQUIRED",
            ReasonCode::UnknownCapability => "UNKNOWN_CAPABILITY",
        }
    }
}

impl std::fmt::Display for ReasonCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A single enforcement decision — the only shape a guard, a route, or the
/// dashboard ever needs to reason about a capability.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapabilityDecision {
    pub allowed: bool,
    pub reason_code: ReasonCode,
    pub capability_class: String,
    pub decision_fingerprint: String,
    pub guard_location: String,
    pub test_requirement: String,
}

impl CapabilityDecision {
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::json!({
            "allowed": self.allowed,
            "reason_code": self.reason_code,
            "capability_class": self.capability_class,
            "decision_fingerprint": self.decision_fingerprint,
            "guard_location": self.guard_location,
            "test_requirement": self.test_requirement,
        })
    }
}

fn fingerprint(edition: Edition, mode: AuthorityMode, cap_id: &str, allowed: bool, reason: ReasonCode) -> String {
    let material = format!("{}|{}|{}|{}|{}", edition.as_str(), mode.as_str(), cap_id, allowed, reason.as_str());
    hex::encode(Sha256::digest(material.as_bytes()))
}

/// The single enforcement point for gated functionality. Every authority
/// capability is denied unless both the edition *and* the authority mode
/// allow it — edition is checked first, so `Core` + `WriteEnabled` still
/// denies on `EDITION_DENY`, never `AUTHORITY_MODE_REQUIRED`.
pub struct FeatureRegistry;

impl FeatureRegistry {
    pub fn is_allowed(edition: Edition, mode: AuthorityMode, cap_id: &str) -> CapabilityDecision {
        let Some(spec) = CAPABILITIES.get(cap_id) else {
            return CapabilityDecision {
                allowed: false,
                reason_code: ReasonCode::UnknownCapability,
                capability_class: "unknown".to_string(),
                decision_fingerprint: fingerprint(edition, mode, cap_id, false, ReasonCode::UnknownCapability),
                guard_location: String::new(),
                test_requirement: String::new(),
            };
        };

        if !spec.edition_allowed.contains(&edition) {
            return CapabilityDecision {
                allowed: false,
                reason_code: ReasonCode::EditionDeny,
                capability_class: spec.capability_class.as_str().to_string(),
                decision_fingerprint: fingerprint(edition, mode, cap_id, false, ReasonCode::EditionDeny),
                guard_location: spec.guard_location.to_string(),
                test_requirement: spec.test_requirement.to_string(),
            };
        }

        if spec.capability_class == CapabilityClass::Authority && mode != AuthorityMode::WriteEnabled {
            return CapabilityDecision {
                allowed: false,
                reason_code: ReasonCode::AuthorityModeRequired,
                capability_class: spec.capability_class.as_str().to_string(),
                decision_fingerprint: fingerprint(edition, mode, cap_id, false, ReasonCode::AuthorityModeRequired),
                guard_location: spec.guard_location.to_string(),
                test_requirement: spec.test_requirement.to_string(),
            };
        }

        CapabilityDecision {
            allowed: true,
            reason_code: ReasonCode::Allowed,
            capability_class: spec.capability_class.as_str().to_string(),
            decision_fingerprint: fingerprint(edition, mode, cap_id, true, ReasonCode::Allowed),
            guard_location: spec.guard_location.to_string(),
            test_requirement: spec.test_requirement.to_string(),
        }
    }

    pub fn list_capabilities(edition: Edition, mode: AuthorityMode) -> BTreeMap<String, CapabilityDecision> {
        CAPABILITIES
            .keys()
            .map(|&cap_id| (cap_id.to_string(), Self::is_allowed(edition, mode, cap_id)))
            .collect()
    }

    pub fn capabilities_hash(edition: Edition, mode: AuthorityMode) -> String {
        let caps = Self::list_capabilities(edition, mode);
        let canonical: Vec<(String, bool, &'static str)> = caps
            .into_iter()
            .map(|(id, d)| (id, d.allowed, d.reason_code.as_str()))
            .collect();
        let bytes = serde_json::to_vec(&canonical).unwrap_or_default();
        hex::encode(Sha256::digest(bytes))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EXPECTED_CAPABILITY_COUNT: usize = 14;

    #[test]
    fn capability_count_is_frozen() {
        assert_eq!(CAPABILITIES.len(), EXPECTED_CAPABILITY_COUNT);
    }

    #[test]
    fn tooling_always_allowed() {
        for (&cap_id, spec) in CAPABILITIES.iter() {
            if spec.capability_class == CapabilityClass::Tooling {
                for edition in [Edition::Core, Edition::Enterprise] {
                    for mode in [AuthorityMode::Readonly, AuthorityMode::WriteEnabled] {
                        let decision = FeatureRegistry::is_allowed(edition, mode, cap_id);
                        assert!(decision.allowed, "{cap_id} should be allowed for {edition:?}/{mode:?}");
                    }
                }
            }
        }
    }

    #[test]
    fn authority_denied_on_core_write_enabled_with_edition_deny() {
        let decision = FeatureRegistry::is_allowed(Edition::Core, AuthorityMode::WriteEnabled, "authority.rbac");
        assert!(!decision.allowed);
        assert_eq!(decision.reason_code, ReasonCode::EditionDeny);
    }

    #[test]
    fn authority_denied_on_enterprise_readonly_with_mode_required() {
        let decision = FeatureRegistry::is_allowed(Edition::Enterprise, AuthorityMode::Readonly, "authority.rbac");
        assert!(!decision.allowed);
        assert_eq!(decision.reason_code, ReasonCode::AuthorityModeRequired);
    }

    #[test]
    fn authority_allowed_on_enterprise_write_enabled() {
        let decision = FeatureRegistry::is_allowed(Edition::Enterprise, AuthorityMode::WriteEnabled, "authority.rbac");
        assert!(decision.allowed);
        assert_eq!(decision.reason_code, ReasonCode::Allowed);
    }

    #[test]
    fn unknown_capability_is_denied() {
        let decision = FeatureRegistry::is_allowed(Edition::Core, AuthorityMode::Readonly, "nonexistent.cap");
        assert!(!decision.allowed);
        assert_eq!(decision.reason_code, ReasonCode::UnknownCapability);
        assert_eq!(decision.capability_class, "unknown");
    }

    #[test]
    fn fingerprint_is_deterministic_and_input_sensitive() {
        let a = FeatureRegistry::is_allowed(Edition::Core, AuthorityMode::Readonly, "tooling.risk_classifier");
        let b = FeatureRegistry::is_allowed(Edition::Core, AuthorityMode::Readonly, "tooling.risk_classifier");
        assert_eq!(a.decision_fingerprint, b.decision_fingerprint);
        assert_eq!(a.decision_fingerprint.len(), 64);

        let c = FeatureRegistry::is_allowed(Edition::Enterprise, AuthorityMode::Readonly, "tooling.risk_classifier");
        assert_ne!(a.decision_fingerprint, c.decision_fingerprint);
    }

    #[test]
    fn list_capabilities_is_sorted_and_complete() {
        let caps = FeatureRegistry::list_capabilities(Edition::Core, AuthorityMode::Readonly);
        assert_eq!(caps.len(), CAPABILITIES.len());
        let keys: Vec<&String> = caps.keys().collect();
        let mut sorted = keys.clone();
        sorted.sort();
        assert_eq!(keys, sorted);
    }

    #[test]
    fn capabilities_hash_is_stable_and_edition_sensitive() {
        let h1 = FeatureRegistry::capabilities_hash(Edition::Core, AuthorityMode::Readonly);
        let h2 = FeatureRegistry::capabilities_hash(Edition::Core, AuthorityMode::Readonly);
        assert_eq!(h1, h2);
        let h3 = FeatureRegistry::capabilities_hash(Edition::Enterprise, AuthorityMode::WriteEnabled);
        assert_ne!(h1, h3);
    }
}
