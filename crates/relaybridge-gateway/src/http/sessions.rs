use std::sync::Arc;

use axum::extract::{Path, State};
use axum::Json;
use serde_json::{json, Value};

use relaybridge_core::ids::SessionId;
use relaybridge_detect::redact;

use crate::app::AppState;
use crate::error::{GatewayError, Result};

fn session_to_json(session: &relaybridge_core::session::Session) -> Value {
    json!({
        "session_id": session.session_id.as_str(),
        "tool": redact(&session.tool),
        "argv": session.argv.iter().map(|a| redact(a)).collect::<Vec<_>>(),
        "cwd": redact(&session.cwd),
        "label": session.label.as_deref().map(redact),
        "pid": session.pid,
        "status": session.status,
        "active_prompt_id": session.active_prompt_id.as_ref().map(|p| p.as_str().to_string()),
        "created_at": session.created_at.to_rfc3339(),
        "updated_at": session.updated_at.to_rfc3339(),
    })
}

/// GET /api/sessions — active sessions, redacted for display.
pub async fn list_sessions(State(state): State<Arc<AppState>>) -> Result<Json<Value>> {
    let sessions = state.sessions.list_active()?;
    Ok(Json(json!({
        "sessions": sessions.iter().map(session_to_json).collect::<Vec<_>>(),
    })))
}

/// GET /api/sessions/{id} — a single session by id, redacted for display.
pub async fn get_session(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Value>> {
    let session = state
        .sessions
        .get(&SessionId::from(id.as_str()))
        .map_err(GatewayError::from)?;
    Ok(Json(session_to_json(&session)))
}
