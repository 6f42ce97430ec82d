use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use lms_core::{DatabaseError, LmsError, TenantError};
use serde_json::{json, Value};

/// Malformed request input (unparseable body or path id).
#[derive(Debug, thiserror::Error)]
#[error("{message}")]
pub struct BadRequest {
    pub message: String,
    pub errors: Option<Value>,
}

impl BadRequest {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            errors: None,
        }
    }

    pub fn with_errors(mut self, errors: Value) -> Self {
        self.errors = Some(errors);
        self
    }
}

#[derive(Debug)]
pub struct LmsAxumError(pub anyhow::Error);

impl From<anyhow::Error> for LmsAxumError {
    fn from(e: anyhow::Error) -> Self {
        Self(e)
    }
}

impl From<LmsError> for LmsAxumError {
    fn from(e: LmsError) -> Self {
        Self(anyhow::Error::new(e))
    }
}

impl From<DatabaseError> for LmsAxumError {
    fn from(e: DatabaseError) -> Self {
        LmsError::from(e).into()
    }
}

impl From<TenantError> for LmsAxumError {
    fn from(e: TenantError) -> Self {
        LmsError::from(e).into()
    }
}

impl From<BadRequest> for LmsAxumError {
    fn from(e: BadRequest) -> Self {
        Self(anyhow::Error::new(e))
    }
}

impl IntoResponse for LmsAxumError {
    fn into_response(self) -> Response {
        // Look through anyhow contexts for a classified error first.
        if let Some(lms) = self.0.chain().find_map(|e| e.downcast_ref::<LmsError>()) {
            let status = StatusCode::from_u16(lms.status_code())
                .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
            return (status, Json(lms.to_json())).into_response();
        }

        if let Some(bad) = self.0.chain().find_map(|e| e.downcast_ref::<BadRequest>()) {
            let mut body = json!({
                "name": "BadRequest",
                "message": bad.message,
                "code": 400,
                "className": "bad-request",
            });
            if let Some(errors) = &bad.errors {
                body["errors"] = errors.clone();
            }
            return (StatusCode::BAD_REQUEST, Json(body)).into_response();
        }

        // Anything else stays server-side; the client only learns it failed.
        tracing::error!(error = ?self.0, "unhandled request error");
        let body = json!({
            "name": "GeneralError",
            "message": "Internal server error",
            "code": 500,
            "className": "general-error",
        });
        (StatusCode::INTERNAL_SERVER_ERROR, Json(body)).into_response()
    }
}
