use std::collections::HashMap;
use std::sync::LazyLock;

use serde::{Deserialize, Serialize};

use crate::edition::Edition;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CapabilityClass {
    /// Always allowed, any edition, any authority mode.
    Tooling,
    /// Allowed only for `Edition::Enterprise` + `AuthorityMode::WriteEnabled`.
    Authority,
}

impl CapabilityClass {
    pub fn as_str(self) -> &'static str {
        match self {
            CapabilityClass::Tooling => "tooling",
            CapabilityClass::Authority => "authority",
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct CapabilitySpec {
    pub capability_class: CapabilityClass,
    pub edition_allowed: &'static [Edition],
    pub guard_location: &'static str,
    pub test_requirement: &'static str,
}

const CORE_AND_ENTERPRISE: &[Edition] = &[Edition::Core, Edition::Enterprise];
const ENTERPRISE_ONLY: &[Edition] = &[Edition::Enterprise];

/// The frozen capability table. Update `EXPECTED_CAPABILITY_COUNT` in this
/// crate's tests deliberately whenever a capability is added or removed —
/// this table is not meant to drift silently.
#[allow(clippy::unwrap_used)]
pub static CAPABILITIES: LazyLock<HashMap<&'static str, CapabilitySpec>> = LazyLock::new(|| {
    HashMap::from([
        (
            "tooling.dashboard_read",
            CapabilitySpec {
                capability_class: CapabilityClass::Tooling,
                edition_allowed: CORE_AND_ENTERPRISE,
                guard_location: "router_mount",
                test_requirement: "dashboard route integration tests",
            },
        ),
        (
            "tooling.risk_classifier",
            CapabilitySpec {
                capability_class: CapabilityClass::Tooling,
                edition_allowed: CORE_AND_ENTERPRISE,
                guard_location: "route_handler",
                test_requirement: "prompt confidence scoring tests",
            },
        ),
        (
            "tooling.policy_lint",
            CapabilitySpec {
                capability_class: CapabilityClass::Tooling,
                edition_allowed: CORE_AND_ENTERPRISE,
                guard_location: "route_handler",
                test_requirement: "policy parser validation tests",
            },
        ),
        (
            "tooling.session_list",
            CapabilitySpec {
                capability_class: CapabilityClass::Tooling,
                edition_allowed: CORE_AND_ENTERPRISE,
                guard_location: "router_mount",
                test_requirement: "session manager list_active tests",
            },
        ),
        (
            "tooling.audit_read",
            CapabilitySpec {
                capability_class: CapabilityClass::Tooling,
                edition_allowed: CORE_AND_ENTERPRISE,
                guard_location: "router_mount",
                test_requirement: "audit chain verification tests",
            },
        ),
        (
            "tooling.overlap_detector",
            CapabilitySpec {
                capability_class: CapabilityClass::Tooling,
                edition_allowed: CORE_AND_ENTERPRISE,
                guard_location: "route_handler",
                test_requirement: "policy overlap detector tests",
            },
        ),
        (
            "tooling.channel_status",
            CapabilitySpec {
                capability_class: CapabilityClass::Tooling,
                edition_allowed: CORE_AND_ENTERPRISE,
                guard_location: "router_mount",
                test_requirement: "channel healthcheck tests",
            },
        ),
        (
            "tooling.debug_bundle_export",
            CapabilitySpec {
                capability_class: CapabilityClass::Tooling,
                edition_allowed: CORE_AND_ENTERPRISE,
                guard_location: "route_handler",
                test_requirement: "debug bundle redaction tests",
            },
        ),
        (
            "authority.rbac",
            CapabilitySpec {
                capability_class: CapabilityClass::Authority,
                edition_allowed: ENTERPRISE_ONLY,
                guard_location: "router_mount",
                test_requirement: "RBAC integration tests",
            },
        ),
        (
            "authority.enterprise_settings",
            CapabilitySpec {
                capability_class: CapabilityClass::Authority,
                edition_allowed: ENTERPRISE_ONLY,
                guard_location: "router_mount",
                test_requirement: "enterprise settings admin tests",
            },
        ),
        (
            "authority.policy_write",
            CapabilitySpec {
                capability_class: CapabilityClass::Authority,
                edition_allowed: ENTERPRISE_ONLY,
                guard_location: "route_handler",
                test_requirement: "policy write-path integration tests",
            },
        ),
        (
            "authority.workspace_trust_admin",
            CapabilitySpec {
                capability_class: CapabilityClass::Authority,
                edition_allowed: ENTERPRISE_ONLY,
                guard_location: "route_handler",
                test_requirement: "workspace trust grant/revoke tests",
            },
        ),
        (
            "authority.provider_key_rotate",
            CapabilitySpec {
                capability_class: CapabilityClass::Authority,
                edition_allowed: ENTERPRISE_ONLY,
                guard_location: "route_handler",
                test_requirement: "provider credential rotation tests",
            },
        ),
        (
            "authority.non_loopback_bind",
            CapabilitySpec {
                capability_class: CapabilityClass::Authority,
                edition_allowed: ENTERPRISE_ONLY,
                guard_location: "cli_flag",
                test_requirement: "dashboard non-loopback bind gating tests",
            },
        ),
    ])
});
