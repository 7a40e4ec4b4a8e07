//! Optional ML-assisted classification, gated by the capability registry.
//! The deterministic path never depends on this — a fuser can only promote
//! confidence or flag disagreement, never inject without a deterministic
//! HIGH-confidence equivalent.

use relaybridge_core::prompt::Confidence;

use crate::classify::InteractionClass;

#[derive(Debug, Clone, PartialEq)]
pub struct FusedClassification {
    pub class: InteractionClass,
    pub confidence: Confidence,
    pub disagreement: bool,
}

pub trait Fuser: Send + Sync {
    /// Combine the deterministic classification with an optional ML opinion.
    /// `ml_class`/`ml_confidence` are `None` when no ML classifier is
    /// configured or it returned no opinion — that degenerates to passing
    /// the deterministic result through unchanged.
    fn fuse(
        &self,
        deterministic_class: InteractionClass,
        deterministic_confidence: Confidence,
        ml_class: Option<InteractionClass>,
        ml_confidence: Option<Confidence>,
    ) -> FusedClassification;
}

/// Default fuser: implements the fixed fusion rules against whatever ML
/// opinion (if any) the caller supplies. With no ML classifier wired in,
/// every call degenerates to passing the deterministic result through
/// unchanged — hence "noop" when the ML capability is disabled.
#[derive(Debug, Default)]
pub struct NoopFuser;

impl Fuser for NoopFuser {
    fn fuse(
        &self,
        deterministic_class: InteractionClass,
        deterministic_confidence: Confidence,
        ml_class: Option<InteractionClass>,
        ml_confidence: Option<Confidence>,
    ) -> FusedClassification {
        let passthrough = || FusedClassification {
            class: deterministic_class,
            confidence: deterministic_confidence,
            disagreement: false,
        };

        // No ML opinion at all — nothing to fuse.
        let Some(ml_class) = ml_class else {
            return passthrough();
        };

        // Deterministic HIGH always wins, regardless of what ML says.
        if deterministic_confidence == Confidence::High {
            return passthrough();
        }

        // ML-only types have no deterministic equivalent, so a deterministic
        // MED/LOW result never actually agrees or disagrees with one of
        // these — ML overrides outright.
        if matches!(ml_class, InteractionClass::FolderTrust | InteractionClass::RawTerminal) {
            return FusedClassification {
                class: ml_class,
                confidence: ml_confidence.unwrap_or(Confidence::Medium),
                disagreement: false,
            };
        }

        match deterministic_confidence {
            Confidence::Medium if ml_class == deterministic_class => FusedClassification {
                class: deterministic_class,
                confidence: Confidence::High,
                disagreement: false,
            },
            Confidence::Medium => FusedClassification {
                class: deterministic_class,
                confidence: Confidence::Low,
                disagreement: true,
            },
            _ => passthrough(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_ml_opinion_passes_through() {
        let fuser = NoopFuser;
        let result = fuser.fuse(InteractionClass::YesNo, Confidence::Medium, None, None);
        assert_eq!(result.class, InteractionClass::YesNo);
        assert_eq!(result.confidence, Confidence::Medium);
        assert!(!result.disagreement);
    }

    #[test]
    fn deterministic_high_always_wins() {
        let fuser = NoopFuser;
        let result = fuser.fuse(
            InteractionClass::YesNo,
            Confidence::High,
            Some(InteractionClass::NumberedChoice),
            Some(Confidence::High),
        );
        assert_eq!(result.class, InteractionClass::YesNo);
        assert_eq!(result.confidence, Confidence::High);
        assert!(!result.disagreement);
    }

    #[test]
    fn medium_agreement_boosts_to_high() {
        let fuser = NoopFuser;
        let result = fuser.fuse(
            InteractionClass::YesNo,
            Confidence::Medium,
            Some(InteractionClass::YesNo),
            Some(Confidence::Medium),
        );
        assert_eq!(result.class, InteractionClass::YesNo);
        assert_eq!(result.confidence, Confidence::High);
        assert!(!result.disagreement);
    }

    #[test]
    fn medium_disagreement_downgrades_to_low_and_flags() {
        let fuser = NoopFuser;
        let result = fuser.fuse(
            InteractionClass::YesNo,
            Confidence::Medium,
            Some(InteractionClass::FreeText),
            Some(Confidence::Medium),
        );
        assert_eq!(result.class, InteractionClass::YesNo);
        assert_eq!(result.confidence, Confidence::Low);
        assert!(result.disagreement);
    }

    #[test]
    fn ml_only_type_overrides_medium_deterministic() {
        let fuser = NoopFuser;
        let result = fuser.fuse(
            InteractionClass::NumberedChoice,
            Confidence::Medium,
            Some(InteractionClass::FolderTrust),
            Some(Confidence::Medium),
        );
        assert_eq!(result.class, InteractionClass::FolderTrust);
        assert!(!result.disagreement);
    }

    #[test]
    fn ml_only_type_never_overrides_deterministic_high() {
        let fuser = NoopFuser;
        let result = fuser.fuse(
            InteractionClass::NumberedChoice,
            Confidence::High,
            Some(InteractionClass::RawTerminal),
            Some(Confidence::Medium),
        );
        assert_eq!(result.class, InteractionClass::NumberedChoice);
        assert_eq!(result.confidence, Confidence::High);
    }
}
