//! Pre-compiled regex families for the pattern-match signal. Ported from the
//! interactive-prompt heuristics of agent-supervision tools that tail a PTY
//! and guess when the child is blocked on stdin.

use std::sync::LazyLock;

use regex::Regex;

#[allow(clippy::unwrap_used)]
pub static YES_NO: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    vec![
        Regex::new(r"(?i)(delete|remove|overwrite|destroy|drop|force[- ]push)\b.*\[y/n\]").unwrap(),
        Regex::new(r"(?i)\(y(?:es)?/n(?:o)?\)\s*[:>]?\s*$").unwrap(),
        Regex::new(r"(?i)\[y/n\]\s*:?\s*$").unwrap(),
        Regex::new(r"(?i)y/n\s*>\s*$").unwrap(),
        Regex::new(r"(?i)do you want to proceed\??\s*$").unwrap(),
    ]
});

#[allow(clippy::unwrap_used)]
pub static CONFIRM_ENTER: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    vec![
        Regex::new(r"(?i)press (enter|return) to continue").unwrap(),
        Regex::new(r"(?i)hit enter to continue").unwrap(),
        Regex::new(r"(?i)\[press enter\]").unwrap(),
        Regex::new(r"--more--").unwrap(),
    ]
});

#[allow(clippy::unwrap_used)]
pub static MULTIPLE_CHOICE: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    vec![
        Regex::new(r"(?i)(select|choose) (an? )?option").unwrap(),
        Regex::new(r"(?m)^\s*1\)\s").unwrap(),
        Regex::new(r"(?m)^\s*\[A\]\s").unwrap(),
        Regex::new(r"(?i)trust.*folder").unwrap(),
    ]
});

#[allow(clippy::unwrap_used)]
pub static FREE_TEXT: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    vec![
        Regex::new(r"(?i)(enter|type|provide|input)\s*:\s*$").unwrap(),
        Regex::new(r"(?i)(name|email|username|branch|message|description)\s*:\s*$").unwrap(),
        Regex::new(r"(?i)(password|token|api.?key)\s*:\s*$").unwrap(),
    ]
});

/// Extracts numbered-choice labels ("1) foo", "2) bar", ...) from a block of
/// text, returning `None` unless the numbers are consecutive starting at 1.
pub fn extract_numbered_choices(text: &str) -> Option<Vec<String>> {
    #[allow(clippy::unwrap_used)]
    static ITEM: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?m)^\s*(\d+)\)\s*(.+)$").unwrap());

    let mut choices = Vec::new();
    let mut expected = 1u32;
    for cap in ITEM.captures_iter(text) {
        let n: u32 = cap[1].parse().ok()?;
        if n != expected {
            return if choices.is_empty() { None } else { Some(choices) };
        }
        choices.push(cap[2].trim().to_string());
        expected += 1;
    }
    if choices.is_empty() {
        None
    } else {
        Some(choices)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn yes_no_matches_bracket_form() {
        assert!(YES_NO.iter().any(|r| r.is_match("Proceed? [y/n]")));
    }

    #[test]
    fn numbered_choices_must_be_consecutive() {
        let text = "1) apple\n2) banana\n3) cherry\n";
        assert_eq!(
            extract_numbered_choices(text),
            Some(vec!["apple".into(), "banana".into(), "cherry".into()])
        );
    }

    #[test]
    fn non_consecutive_numbers_rejected() {
        let text = "1) apple\n3) cherry\n";
        assert_eq!(extract_numbered_choices(text), None);
    }
}
