#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

//! The enterprise capability registry: a frozen table of tooling/authority
//! capabilities, `FeatureRegistry::is_allowed` as the single enforcement
//! point, and the `require_capability` guard routes call before gated work.

pub mod capability;
pub mod edition;
pub mod guard;
pub mod registry;

pub use capability::{CapabilityClass, CapabilitySpec, CAPABILITIES};
pub use edition::{AuthorityMode, Edition};
pub use guard::{require_capability, FeatureUnavailableError};
pub use registry::{CapabilityDecision, FeatureRegistry, ReasonCode, REGISTRY_VERSION};
