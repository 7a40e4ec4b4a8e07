//! Pure channel-gate evaluation: `GateContext -> GateDecision`.
//!
//! Evaluated on every inbound channel message before any injection or
//! routing happens. The evaluation order below is fixed and load-bearing —
//! reordering these checks changes which rejection a caller sees for the
//! same input.

use relaybridge_core::conversation::ConversationState;
use relaybridge_interact::InteractionClass;

/// What an accepted message should be treated as.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateAction {
    /// A reply to the session's currently outstanding prompt.
    Reply,
    /// Free-form input forwarded straight to stdin; no prompt is outstanding.
    ChatTurn,
    /// The session is mid-run, but policy permits interrupting it anyway.
    Interrupt,
}

/// Why an inbound message was rejected. `code()` gives the stable
/// machine-readable string a caller renders or logs; `message()` and
/// `next_action_hint()` give the user-facing text — neither ever leaks an
/// internal id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateRejectReason {
    RateLimited,
    IdentityNotAllowlisted,
    NoActiveSession,
    BusyStreaming,
    BusyRunning,
    NotAwaitingInput,
    TtlExpired,
    UnsafeInputType,
    ChatTurnsDisabled,
}

impl GateRejectReason {
    pub fn code(self) -> &'static str {
        use GateRejectReason::*;
        match self {
            RateLimited => "reject_rate_limited",
            IdentityNotAllowlisted => "reject_identity_not_allowlisted",
            NoActiveSession => "reject_no_active_session",
            BusyStreaming => "reject_busy_streaming",
            BusyRunning => "reject_busy_running",
            NotAwaitingInput => "reject_not_awaiting_input",
            TtlExpired => "reject_ttl_expired",
            UnsafeInputType => "reject_unsafe_input_type",
            ChatTurnsDisabled => "reject_chat_turns_disabled",
        }
    }

    pub fn message(self) -> &'static str {
        use GateRejectReason::*;
        match self {
            RateLimited => "You're sending messages too quickly. Please wait a moment.",
            IdentityNotAllowlisted => "You're not authorized to interact with this bot.",
            NoActiveSession => "There's no active session for this conversation.",
            BusyStreaming => "The session is currently streaming output and can't accept input.",
            BusyRunning => "The session is busy running and isn't waiting on you right now.",
            NotAwaitingInput => "There's no question currently waiting for your answer.",
            TtlExpired => "That prompt has expired and can no longer be answered.",
            UnsafeInputType => "This looks like a password or secret prompt — type it directly in the terminal, not here.",
            ChatTurnsDisabled => "Free-form chat messages aren't enabled for this session.",
        }
    }

    pub fn next_action_hint(self) -> &'static str {
        use GateRejectReason::*;
        match self {
            RateLimited => "Wait a few seconds and try again.",
            IdentityNotAllowlisted => "Ask an operator to add your account to the allowlist.",
            NoActiveSession => "Start a session first, then reply from its thread.",
            BusyStreaming | BusyRunning => "Wait for the current step to finish, or ask an operator to interrupt it.",
            NotAwaitingInput => "Wait for the next prompt before replying.",
            TtlExpired => "Check the session for a fresh prompt.",
            UnsafeInputType => "Switch to the terminal to enter this value.",
            ChatTurnsDisabled => "Wait for a prompt to answer, or ask an operator to enable chat turns.",
        }
    }
}

/// Frozen decision record. Never carries an internal id in a user-visible string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GateDecision {
    pub outcome: Result<GateAction, GateRejectReason>,
}

impl GateDecision {
    fn accept(action: GateAction) -> Self {
        Self { outcome: Ok(action) }
    }

    fn reject(reason: GateRejectReason) -> Self {
        Self { outcome: Err(reason) }
    }

    pub fn is_accepted(&self) -> bool {
        self.outcome.is_ok()
    }
}

/// Everything [`evaluate_gate`] needs to make its decision, collected by the
/// caller from the conversation registry, session manager, and policy.
#[derive(Debug, Clone)]
pub struct GateContext {
    pub allowlisted: bool,
    pub session_bound: bool,
    pub conversation_state: Option<ConversationState>,
    pub policy_allows_interrupt: bool,
    pub has_active_prompt: bool,
    pub prompt_expired: bool,
    pub interaction_class: Option<InteractionClass>,
    pub policy_allows_chat_turns: bool,
}

/// Fixed six-step evaluation order from identity through to the idle
/// chat-turn path. Each step either returns a decision immediately or falls
/// through to the next.
pub fn evaluate_gate(ctx: &GateContext) -> GateDecision {
    // 1. Identity allowlist.
    if !ctx.allowlisted {
        return GateDecision::reject(GateRejectReason::IdentityNotAllowlisted);
    }

    // 2. Session existence.
    if !ctx.session_bound {
        return GateDecision::reject(GateRejectReason::NoActiveSession);
    }

    // 3. Conversation state.
    match ctx.conversation_state {
        Some(ConversationState::Streaming) => return GateDecision::reject(GateRejectReason::BusyStreaming),
        Some(ConversationState::Running) => {
            if ctx.policy_allows_interrupt {
                return GateDecision::accept(GateAction::Interrupt);
            }
            return GateDecision::reject(GateRejectReason::BusyRunning);
        }
        Some(ConversationState::Stopped) => return GateDecision::reject(GateRejectReason::NoActiveSession),
        _ => {}
    }

    // 4. awaiting_input path.
    if ctx.conversation_state == Some(ConversationState::AwaitingInput) {
        if !ctx.has_active_prompt {
            return GateDecision::reject(GateRejectReason::NotAwaitingInput);
        }
        if ctx.prompt_expired {
            return GateDecision::reject(GateRejectReason::TtlExpired);
        }
        if ctx.interaction_class == Some(InteractionClass::PasswordInput) {
            return GateDecision::reject(GateRejectReason::UnsafeInputType);
        }
        return GateDecision::accept(GateAction::Reply);
    }

    // 5. idle path.
    if ctx.conversation_state == Some(ConversationState::Idle) {
        if ctx.policy_allows_chat_turns {
            return GateDecision::accept(GateAction::ChatTurn);
        }
        return GateDecision::reject(GateRejectReason::ChatTurnsDisabled);
    }

    // 6. Default reject.
    GateDecision::reject(GateRejectReason::NoActiveSession)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_ctx() -> GateContext {
        GateContext {
            allowlisted: true,
            session_bound: true,
            conversation_state: Some(ConversationState::AwaitingInput),
            policy_allows_interrupt: false,
            has_active_prompt: true,
            prompt_expired: false,
            interaction_class: Some(InteractionClass::YesNo),
            policy_allows_chat_turns: true,
        }
    }

    #[test]
    fn identity_check_wins_over_everything_else() {
        let mut ctx = base_ctx();
        ctx.allowlisted = false;
        let decision = evaluate_gate(&ctx);
        assert_eq!(decision.outcome, Err(GateRejectReason::IdentityNotAllowlisted));
    }

    #[test]
    fn no_bound_session_is_rejected() {
        let mut ctx = base_ctx();
        ctx.session_bound = false;
        let decision = evaluate_gate(&ctx);
        assert_eq!(decision.outcome, Err(GateRejectReason::NoActiveSession));
    }

    #[test]
    fn streaming_rejects_unconditionally() {
        let mut ctx = base_ctx();
        ctx.conversation_state = Some(ConversationState::Streaming);
        let decision = evaluate_gate(&ctx);
        assert_eq!(decision.outcome, Err(GateRejectReason::BusyStreaming));
    }

    #[test]
    fn running_rejects_without_interrupt_policy() {
        let mut ctx = base_ctx();
        ctx.conversation_state = Some(ConversationState::Running);
        let decision = evaluate_gate(&ctx);
        assert_eq!(decision.outcome, Err(GateRejectReason::BusyRunning));
    }

    #[test]
    fn running_accepts_as_interrupt_when_policy_allows() {
        let mut ctx = base_ctx();
        ctx.conversation_state = Some(ConversationState::Running);
        ctx.policy_allows_interrupt = true;
        let decision = evaluate_gate(&ctx);
        assert_eq!(decision.outcome, Ok(GateAction::Interrupt));
    }

    #[test]
    fn stopped_session_is_rejected() {
        let mut ctx = base_ctx();
        ctx.conversation_state = Some(ConversationState::Stopped);
        let decision = evaluate_gate(&ctx);
        assert_eq!(decision.outcome, Err(GateRejectReason::NoActiveSession));
    }

    #[test]
    fn awaiting_input_without_prompt_is_rejected() {
        let mut ctx = base_ctx();
        ctx.has_active_prompt = false;
        let decision = evaluate_gate(&ctx);
        assert_eq!(decision.outcome, Err(GateRejectReason::NotAwaitingInput));
    }

    #[test]
    fn expired_prompt_is_rejected() {
        let mut ctx = base_ctx();
        ctx.prompt_expired = true;
        let decision = evaluate_gate(&ctx);
        assert_eq!(decision.outcome, Err(GateRejectReason::TtlExpired));
    }

    #[test]
    fn password_prompts_reject_channel_replies() {
        let mut ctx = base_ctx();
        ctx.interaction_class = Some(InteractionClass::PasswordInput);
        let decision = evaluate_gate(&ctx);
        assert_eq!(decision.outcome, Err(GateRejectReason::UnsafeInputType));
    }

    #[test]
    fn awaiting_input_happy_path_accepts_as_reply() {
        let decision = evaluate_gate(&base_ctx());
        assert_eq!(decision.outcome, Ok(GateAction::Reply));
    }

    #[test]
    fn idle_accepts_chat_turn_when_policy_allows() {
        let mut ctx = base_ctx();
        ctx.conversation_state = Some(ConversationState::Idle);
        let decision = evaluate_gate(&ctx);
        assert_eq!(decision.outcome, Ok(GateAction::ChatTurn));
    }

    #[test]
    fn idle_rejects_chat_turn_when_policy_forbids() {
        let mut ctx = base_ctx();
        ctx.conversation_state = Some(ConversationState::Idle);
        ctx.policy_allows_chat_turns = false;
        let decision = evaluate_gate(&ctx);
        assert_eq!(decision.outcome, Err(GateRejectReason::ChatTurnsDisabled));
    }

    #[test]
    fn decision_code_and_hint_never_mention_internal_ids() {
        let reason = GateRejectReason::TtlExpired;
        assert_eq!(reason.code(), "reject_ttl_expired");
        assert!(!reason.message().contains("prompt_id"));
        assert!(!reason.next_action_hint().contains("session_id"));
    }
}
