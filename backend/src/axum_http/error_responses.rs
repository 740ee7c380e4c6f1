use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use tracing::error;

use crate::usecases::{
    orders::OrderError, payment_notifications::NotificationError,
    subscription_ledger::LedgerError,
};

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub code: u16,
    pub message: String,
}

impl ErrorResponse {
    pub fn into_response_with(status: StatusCode, message: String) -> Response {
        // Don't leak internal error detail to client
        let message = if status.is_server_error() {
            error!(status = status.as_u16(), error = %message, "request failed");
            "Internal server error".to_string()
        } else {
            message
        };

        let body = Json(ErrorResponse {
            code: status.as_u16(),
            message,
        });

        (status, body).into_response()
    }
}

impl IntoResponse for OrderError {
    fn into_response(self) -> Response {
        ErrorResponse::into_response_with(self.status_code(), self.to_string())
    }
}

impl IntoResponse for NotificationError {
    fn into_response(self) -> Response {
        ErrorResponse::into_response_with(self.status_code(), self.to_string())
    }
}

impl IntoResponse for LedgerError {
    fn into_response(self) -> Response {
        ErrorResponse::into_response_with(self.status_code(), self.to_string())
    }
}
