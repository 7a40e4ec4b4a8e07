//! Immutable per-class interaction strategy.

use crate::classify::InteractionClass;

#[derive(Debug, Clone, PartialEq)]
pub struct InteractionPlan {
    pub interaction_class: InteractionClass,
    pub append_cr: bool,
    pub suppress_value: bool,
    pub max_retries: u32,
    pub retry_delay_s: f64,
    pub escalate_on_exhaustion: bool,
    pub verify_advance: bool,
    pub advance_timeout_s: f64,
    pub display_template: String,
    pub feedback_on_advance: String,
    pub feedback_on_stall: String,
    pub escalation_template: String,
    pub button_layout: String,
}

impl Default for InteractionPlan {
    fn default() -> Self {
        Self {
            interaction_class: InteractionClass::FreeText,
            append_cr: true,
            suppress_value: false,
            max_retries: 1,
            retry_delay_s: 2.0,
            escalate_on_exhaustion: true,
            verify_advance: true,
            advance_timeout_s: 5.0,
            display_template: String::new(),
            feedback_on_advance: String::new(),
            feedback_on_stall: String::new(),
            escalation_template:
                "The agent did not respond to this input. Please check the session directly."
                    .to_string(),
            button_layout: String::new(),
        }
    }
}

/// Pure match over [`InteractionClass`] producing the strategy for that class.
pub fn build_plan(class: InteractionClass) -> InteractionPlan {
    let base = InteractionPlan {
        interaction_class: class,
        ..Default::default()
    };

    match class {
        InteractionClass::YesNo => InteractionPlan {
            max_retries: 1,
            advance_timeout_s: 3.0,
            button_layout: "yes_no".to_string(),
            ..base
        },
        InteractionClass::ConfirmEnter => InteractionPlan {
            max_retries: 1,
            advance_timeout_s: 3.0,
            button_layout: "confirm_enter".to_string(),
            ..base
        },
        InteractionClass::NumberedChoice => InteractionPlan {
            max_retries: 1,
            advance_timeout_s: 5.0,
            button_layout: "numbered".to_string(),
            ..base
        },
        InteractionClass::FreeText => InteractionPlan {
            max_retries: 0,
            advance_timeout_s: 5.0,
            button_layout: "none".to_string(),
            ..base
        },
        InteractionClass::PasswordInput => InteractionPlan {
            suppress_value: true,
            max_retries: 0,
            display_template: "Sent: [REDACTED] + Enter".to_string(),
            button_layout: "none".to_string(),
            ..base
        },
        InteractionClass::FolderTrust => InteractionPlan {
            max_retries: 1,
            button_layout: "trust_folder".to_string(),
            ..base
        },
        InteractionClass::RawTerminal => InteractionPlan {
            append_cr: false,
            verify_advance: false,
            advance_timeout_s: 0.0,
            escalate_on_exhaustion: true,
            display_template: "This prompt could not be handled remotely.".to_string(),
            button_layout: "none".to_string(),
            ..base
        },
        InteractionClass::ChatInput => InteractionPlan {
            max_retries: 0,
            verify_advance: false,
            escalate_on_exhaustion: false,
            display_template: "Sent: \"{value}\"".to_string(),
            button_layout: "none".to_string(),
            ..base
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn password_input_suppresses_value() {
        let plan = build_plan(InteractionClass::PasswordInput);
        assert!(plan.suppress_value);
        assert_eq!(plan.max_retries, 0);
    }

    #[test]
    fn chat_input_never_verifies_or_escalates() {
        let plan = build_plan(InteractionClass::ChatInput);
        assert!(!plan.verify_advance);
        assert!(!plan.escalate_on_exhaustion);
    }

    #[test]
    fn raw_terminal_never_appends_cr() {
        let plan = build_plan(InteractionClass::RawTerminal);
        assert!(!plan.append_cr);
    }
}
