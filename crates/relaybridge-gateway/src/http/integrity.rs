use std::sync::Arc;

use axum::extract::State;
use axum::Json;

use relaybridge_audit::{verify_audit_integrity, IntegrityReport};

use crate::app::AppState;
use crate::error::{GatewayError, Result};

/// POST /api/integrity/verify — the one mutating-looking route the dashboard
/// exposes; it mutates nothing, but walking the whole chain is not free, so
/// it is throttled per [`crate::app::VERIFY_COOLDOWN`].
pub async fn verify_handler(State(state): State<Arc<AppState>>) -> Result<Json<IntegrityReport>> {
    if let Some(retry_after_secs) = state.check_verify_cooldown() {
        return Err(GatewayError::VerifyCoolingDown { retry_after_secs });
    }
    let conn = state.audit_db.lock().unwrap_or_else(|p| p.into_inner());
    let report = verify_audit_integrity(&conn)?;
    Ok(Json(report))
}
