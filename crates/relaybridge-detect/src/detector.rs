//! Tri-signal prompt detector: pattern match, TTY-blocked inference, and
//! silence fallback. Same buffer and clock inputs always yield the same
//! event — the detector holds no hidden randomness.

use std::time::{Duration, Instant};

use relaybridge_core::prompt::{Confidence, PromptType};

use crate::patterns::{extract_numbered_choices, CONFIRM_ENTER, FREE_TEXT, MULTIPLE_CHOICE, YES_NO};
use crate::sanitize::{is_meaningful, sanitize};

pub const ECHO_SUPPRESS_MS: u64 = 500;
pub const DEFAULT_SILENCE_THRESHOLD_SECS: f64 = 3.0;
const PATTERN_TAIL_BYTES: usize = 2000;

#[derive(Debug, Clone, PartialEq)]
pub struct DetectionSignal {
    pub prompt_type: PromptType,
    pub confidence: Confidence,
    pub excerpt: String,
    pub choices: Option<Vec<String>>,
}

/// Per-session mutable detector state. One instance lives alongside each
/// `PtySupervisor`.
pub struct PromptDetector {
    last_output_time: Instant,
    injection_time: Option<Instant>,
    stable_excerpt: String,
    silence_threshold: Duration,
}

impl Default for PromptDetector {
    fn default() -> Self {
        Self::new()
    }
}

impl PromptDetector {
    pub fn new() -> Self {
        Self {
            last_output_time: Instant::now(),
            injection_time: None,
            stable_excerpt: String::new(),
            silence_threshold: Duration::from_secs_f64(DEFAULT_SILENCE_THRESHOLD_SECS),
        }
    }

    fn in_echo_window(&self, now: Instant) -> bool {
        match self.injection_time {
            Some(t) => now.duration_since(t) < Duration::from_millis(ECHO_SUPPRESS_MS),
            None => false,
        }
    }

    /// Call after every injected write — opens the echo-suppression window.
    pub fn mark_injected(&mut self) {
        self.injection_time = Some(Instant::now());
    }

    /// Analyze one raw output chunk. Returns `None` during the echo window or
    /// when nothing meaningfully new is present.
    pub fn analyse(&mut self, raw: &[u8], tty_blocked: bool) -> Option<DetectionSignal> {
        self.analyse_at(raw, tty_blocked, Instant::now())
    }

    fn analyse_at(&mut self, raw: &[u8], tty_blocked: bool, now: Instant) -> Option<DetectionSignal> {
        self.last_output_time = now;
        if self.in_echo_window(now) {
            return None;
        }

        let text = sanitize(raw);
        if is_meaningful(&text) {
            self.stable_excerpt = text.clone();
        }

        if let Some(signal) = self.pattern_match(&text) {
            return Some(signal);
        }

        if tty_blocked {
            return Some(DetectionSignal {
                prompt_type: PromptType::FreeText,
                confidence: Confidence::Medium,
                excerpt: tail(&self.stable_excerpt),
                choices: None,
            });
        }

        None
    }

    fn pattern_match(&self, text: &str) -> Option<DetectionSignal> {
        let window = tail(text);

        if YES_NO.iter().any(|r| r.is_match(&window)) {
            return Some(DetectionSignal {
                prompt_type: PromptType::YesNo,
                confidence: Confidence::High,
                excerpt: window,
                choices: Some(vec!["y".into(), "n".into()]),
            });
        }

        if CONFIRM_ENTER.iter().any(|r| r.is_match(&window)) {
            return Some(DetectionSignal {
                prompt_type: PromptType::ConfirmEnter,
                confidence: Confidence::High,
                excerpt: window,
                choices: Some(vec!["\n".into()]),
            });
        }

        // Menus can span chunks, so also try the accumulated stable excerpt
        // combined with the newest text.
        let combined = format!("{}{}", self.stable_excerpt, text);
        for candidate in [&window, &combined] {
            if MULTIPLE_CHOICE.iter().any(|r| r.is_match(candidate)) {
                let choices = extract_numbered_choices(candidate);
                return Some(DetectionSignal {
                    prompt_type: PromptType::MultipleChoice,
                    confidence: Confidence::High,
                    excerpt: tail(candidate),
                    choices,
                });
            }
        }

        if FREE_TEXT.iter().any(|r| r.is_match(&window)) {
            return Some(DetectionSignal {
                prompt_type: PromptType::FreeText,
                confidence: Confidence::Medium,
                excerpt: window,
                choices: None,
            });
        }

        None
    }

    /// Periodic tick (every ~1s from the stall watchdog). Emits a LOW-confidence
    /// "ambiguous" signal once the child has been silent past the threshold.
    pub fn check_silence(&self, process_running: bool) -> Option<DetectionSignal> {
        self.check_silence_at(process_running, Instant::now())
    }

    fn check_silence_at(&self, process_running: bool, now: Instant) -> Option<DetectionSignal> {
        if !process_running || self.in_echo_window(now) {
            return None;
        }
        if !is_meaningful(&self.stable_excerpt) {
            return None;
        }
        if now.duration_since(self.last_output_time) < self.silence_threshold {
            return None;
        }
        Some(DetectionSignal {
            prompt_type: PromptType::FreeText,
            confidence: Confidence::Low,
            excerpt: tail(&self.stable_excerpt),
            choices: None,
        })
    }
}

fn tail(text: &str) -> String {
    if text.len() <= PATTERN_TAIL_BYTES {
        text.to_string()
    } else {
        text[text.len() - PATTERN_TAIL_BYTES..].to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn yes_no_prompt_is_high_confidence() {
        let mut d = PromptDetector::new();
        let signal = d.analyse(b"Delete all files? [y/n]", false).unwrap();
        assert_eq!(signal.prompt_type, PromptType::YesNo);
        assert_eq!(signal.confidence, Confidence::High);
    }

    #[test]
    fn echo_window_suppresses_detection() {
        let mut d = PromptDetector::new();
        d.mark_injected();
        assert!(d.analyse(b"Delete all files? [y/n]", false).is_none());
    }

    #[test]
    fn tty_blocked_without_pattern_is_medium_free_text() {
        let mut d = PromptDetector::new();
        let signal = d.analyse(b"waiting for input", true).unwrap();
        assert_eq!(signal.prompt_type, PromptType::FreeText);
        assert_eq!(signal.confidence, Confidence::Medium);
    }

    #[test]
    fn silence_emits_low_confidence_once_threshold_passes() {
        let mut d = PromptDetector::new();
        d.analyse(b"still working on it...", false);
        let now = Instant::now() + Duration::from_secs(4);
        assert!(d.check_silence_at(true, now).is_some());
    }

    #[test]
    fn silence_suppressed_while_process_dead() {
        let mut d = PromptDetector::new();
        d.analyse(b"still working on it...", false);
        let now = Instant::now() + Duration::from_secs(4);
        assert!(d.check_silence_at(false, now).is_none());
    }
}
