use std::sync::Mutex;
use std::time::{Duration, Instant};

use axum::{
    routing::{get, post},
    Router,
};
use rusqlite::Connection;

use relaybridge_capabilities::Edition;
use relaybridge_sessions::SessionManager;

/// Minimum time between accepted `/api/integrity/verify` calls.
pub const VERIFY_COOLDOWN: Duration = Duration::from_secs(10);

/// Central shared state for the read-only dashboard server.
///
/// `audit_db` is opened `mode=ro` — the dashboard never writes to the audit
/// chain, only the supervisor process does via `relaybridge_audit::AuditWriter`.
pub struct AppState {
    pub sessions: SessionManager,
    pub audit_db: Mutex<Connection>,
    pub edition: Edition,
    last_verify: Mutex<Option<Instant>>,
}

impl AppState {
    pub fn new(sessions: SessionManager, audit_db: Connection, edition: Edition) -> Self {
        Self {
            sessions,
            audit_db: Mutex::new(audit_db),
            edition,
            last_verify: Mutex::new(None),
        }
    }

    /// Throttles `/api/integrity/verify` to one call per [`VERIFY_COOLDOWN`].
    /// Returns the number of seconds the caller must still wait, or `None`
    /// if the call is accepted (and immediately starts a fresh cooldown).
    pub fn check_verify_cooldown(&self) -> Option<u64> {
        let mut last = self.last_verify.lock().unwrap_or_else(|p| p.into_inner());
        let now = Instant::now();
        if let Some(prev) = *last {
            let elapsed = now.duration_since(prev);
            if elapsed < VERIFY_COOLDOWN {
                return Some((VERIFY_COOLDOWN - elapsed).as_secs().max(1));
            }
        }
        *last = Some(now);
        None
    }
}

/// Assembles the dashboard's Axum router. Every route is read-only except
/// the single throttled `/api/integrity/verify`, per the edition gate.
pub fn build_router(state: std::sync::Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(crate::http::health::health_handler))
        .route("/api/sessions", get(crate::http::sessions::list_sessions))
        .route("/api/sessions/{id}", get(crate::http::sessions::get_session))
        .route("/api/integrity/verify", post(crate::http::integrity::verify_handler))
        .with_state(state)
        .layer(tower_http::trace::TraceLayer::new_for_http())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_state() -> AppState {
        AppState::new(
            SessionManager::new(Connection::open_in_memory().expect("open sessions db")).expect("init sessions"),
            Connection::open_in_memory().expect("open audit db"),
            Edition::Core,
        )
    }

    #[test]
    fn first_verify_call_is_accepted() {
        let state = test_state();
        assert_eq!(state.check_verify_cooldown(), None);
    }

    #[test]
    fn second_immediate_call_is_throttled() {
        let state = test_state();
        assert_eq!(state.check_verify_cooldown(), None);
        assert!(state.check_verify_cooldown().is_some());
    }
}
