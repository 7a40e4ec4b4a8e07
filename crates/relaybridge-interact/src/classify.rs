//! Pure classifier: maps a detected prompt to the interaction strategy used
//! to answer it.

use relaybridge_core::prompt::{Confidence, PromptEvent, PromptType};

use crate::fuser::{FusedClassification, Fuser};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InteractionClass {
    YesNo,
    ConfirmEnter,
    NumberedChoice,
    FreeText,
    PasswordInput,
    FolderTrust,
    RawTerminal,
    /// No active prompt — free conversation forwarded straight to stdin.
    ChatInput,
}

const PASSWORD_WORDS: &[&str] = &["password", "token", "api key", "apikey", "secret", "passphrase", "credential"];

/// Pure function: `PromptEvent -> InteractionClass`. `None` active prompt
/// means free chat — callers pass that case through [`InteractionClass::ChatInput`]
/// directly rather than calling this function.
pub fn classify(event: &PromptEvent) -> InteractionClass {
    let excerpt_lower = event.excerpt.to_lowercase();

    match event.prompt_type {
        PromptType::YesNo => InteractionClass::YesNo,
        PromptType::ConfirmEnter => InteractionClass::ConfirmEnter,
        PromptType::MultipleChoice => {
            if excerpt_lower.contains("trust") && excerpt_lower.contains("folder") {
                InteractionClass::FolderTrust
            } else {
                InteractionClass::NumberedChoice
            }
        }
        PromptType::FreeText => {
            if PASSWORD_WORDS.iter().any(|w| excerpt_lower.contains(w)) {
                InteractionClass::PasswordInput
            } else {
                InteractionClass::FreeText
            }
        }
    }
}

/// Runs the deterministic classifier, then fuses its result with an optional
/// ML opinion `(class, confidence)` through `fuser`. Pass `ml_opinion: None`
/// when no ML classifier is configured — `fuser.fuse` degenerates to the
/// deterministic result unchanged in that case.
pub fn classify_fused(
    event: &PromptEvent,
    fuser: &dyn Fuser,
    ml_opinion: Option<(InteractionClass, Confidence)>,
) -> FusedClassification {
    let (ml_class, ml_confidence) = match ml_opinion {
        Some((class, confidence)) => (Some(class), Some(confidence)),
        None => (None, None),
    };
    fuser.fuse(classify(event), event.confidence, ml_class, ml_confidence)
}

#[cfg(test)]
mod tests {
    use super::*;
    use relaybridge_core::prompt::Confidence;
    use relaybridge_core::ids::SessionId;

    fn event(prompt_type: PromptType, excerpt: &str) -> PromptEvent {
        PromptEvent::new(SessionId::new(), prompt_type, Confidence::High, excerpt, None, 300)
    }

    #[test]
    fn password_wording_overrides_free_text() {
        let e = event(PromptType::FreeText, "Enter your API key:");
        assert_eq!(classify(&e), InteractionClass::PasswordInput);
    }

    #[test]
    fn plain_free_text_stays_free_text() {
        let e = event(PromptType::FreeText, "Enter your branch name:");
        assert_eq!(classify(&e), InteractionClass::FreeText);
    }

    #[test]
    fn folder_trust_detected_from_excerpt() {
        let e = event(PromptType::MultipleChoice, "Do you trust this folder?\n1) Yes\n2) No");
        assert_eq!(classify(&e), InteractionClass::FolderTrust);
    }
}
