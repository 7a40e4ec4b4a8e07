//! Allowlist enforcement for the Slack adapter.
//!
//! Deny-by-default: an empty `allow_users` list means no one is allowed.
//! Wildcard `"*"` allows everyone. Slack has no separate username concept in
//! our config — entries are matched against the Slack member id (`U…`) only.

/// Returns `true` when the given Slack member is permitted to interact with the bot.
///
/// An empty `allow_users` slice always returns `false` (deny-by-default).
pub fn is_allowed(allow_users: &[String], user_id: &str) -> bool {
    if allow_users.is_empty() {
        return false;
    }
    allow_users.iter().any(|entry| entry == "*" || entry == user_id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_list_denies_all() {
        assert!(!is_allowed(&[], "U111"));
    }

    #[test]
    fn wildcard_allows_all() {
        let list = vec!["*".to_string()];
        assert!(is_allowed(&list, "U111"));
        assert!(is_allowed(&list, "U999"));
    }

    #[test]
    fn match_by_member_id() {
        let list = vec!["U123".to_string()];
        assert!(is_allowed(&list, "U123"));
        assert!(!is_allowed(&list, "U456"));
    }

    #[test]
    fn multiple_entries_any_match() {
        let list = vec!["U123".to_string(), "U456".to_string()];
        assert!(is_allowed(&list, "U123"));
        assert!(is_allowed(&list, "U456"));
        assert!(!is_allowed(&list, "U789"));
    }
}
