use axum::{Json, http::StatusCode, response::IntoResponse};
use thiserror::Error;

use super::models::ErrorResponse;

#[derive(Debug, Error)]
pub enum HostError {
    #[error("no provider handled {0}")]
    NotFound(String),
    #[error("handler refused {0}")]
    Refused(String),
    #[error("internal error: {0}")]
    Internal(String),
}

impl HostError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            HostError::NotFound(_) => StatusCode::NOT_FOUND,
            HostError::Refused(_) => StatusCode::BAD_GATEWAY,
            HostError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            HostError::NotFound(_) => "NOT_FOUND",
            HostError::Refused(_) => "HANDLER_REFUSED",
            HostError::Internal(_) => "INTERNAL_ERROR",
        }
    }
}

impl IntoResponse for HostError {
    fn into_response(self) -> axum::response::Response {
        let status = self.status_code();
        let body = ErrorResponse {
            code: self.code(),
            message: self.to_string(),
        };

        (status, Json(body)).into_response()
    }
}

impl From<axum::http::Error> for HostError {
    fn from(value: axum::http::Error) -> Self {
        HostError::Internal(value.to_string())
    }
}
