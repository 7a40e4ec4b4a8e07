use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, GatewayError>;

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error(transparent)]
    Sessions(#[from] relaybridge_sessions::SessionsError),

    #[error(transparent)]
    Audit(#[from] relaybridge_audit::AuditError),

    #[error("integrity verification is cooling down, retry in {retry_after_secs}s")]
    VerifyCoolingDown { retry_after_secs: u64 },
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let (status, code) = match &self {
            GatewayError::Sessions(relaybridge_sessions::SessionsError::NotFound { .. }) => {
                (StatusCode::NOT_FOUND, "not_found")
            }
            GatewayError::Sessions(_) => (StatusCode::INTERNAL_SERVER_ERROR, "sessions_error"),
            GatewayError::Audit(_) => (StatusCode::INTERNAL_SERVER_ERROR, "audit_error"),
            GatewayError::VerifyCoolingDown { .. } => (StatusCode::TOO_MANY_REQUESTS, "cooling_down"),
        };
        (status, Json(json!({"error": code, "message": self.to_string()}))).into_response()
    }
}
