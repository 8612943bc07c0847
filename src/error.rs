use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Please select a pixel first")]
    NoPixelSelected,

    #[error("No wallet connected")]
    WalletNotConnected,

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Interaction is disabled while an action is in progress")]
    InteractionDisabled,

    #[error("Action already pending: {0}")]
    ActionPending(String),

    #[error("Transaction rejected: {0}")]
    TransactionRejected(String),

    #[error("Transaction reverted: {0}")]
    TransactionReverted(String),

    #[error("Transaction not confirmed within {0} ms")]
    ConfirmationTimeout(u64),

    #[error("Blockchain RPC error: {0}")]
    BlockchainRPC(String),

    #[error("Storage upload failed: {0}")]
    Storage(String),

    #[error("External API error: {0}")]
    ExternalAPI(String),

    #[error("Realtime channel error: {0}")]
    Realtime(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Errors raised before any network call; they never change state.
    pub fn is_user_error(&self) -> bool {
        matches!(
            self,
            AppError::NoPixelSelected
                | AppError::WalletNotConnected
                | AppError::InvalidInput(_)
                | AppError::InteractionDisabled
                | AppError::ActionPending(_)
        )
    }

    /// Failures of a submitted transaction: rejected, reverted or timed out.
    pub fn is_transaction_failure(&self) -> bool {
        matches!(
            self,
            AppError::TransactionRejected(_)
                | AppError::TransactionReverted(_)
                | AppError::ConfirmationTimeout(_)
        )
    }
}

#[derive(Serialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub error: ErrorDetail,
}

#[derive(Serialize)]
pub struct ErrorDetail {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code) = match self {
            AppError::NotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND"),
            AppError::BadRequest(_) | AppError::InvalidInput(_) => {
                (StatusCode::BAD_REQUEST, "BAD_REQUEST")
            }
            AppError::Realtime(_) => (StatusCode::SERVICE_UNAVAILABLE, "REALTIME_ERROR"),
            AppError::BlockchainRPC(_) | AppError::ExternalAPI(_) | AppError::Storage(_) => {
                (StatusCode::BAD_GATEWAY, "UPSTREAM_ERROR")
            }
            _ => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
        };

        let body = Json(ErrorResponse {
            success: false,
            error: ErrorDetail {
                code: code.to_string(),
                message: self.to_string(),
                details: None,
            },
        });

        (status, body).into_response()
    }
}

pub type Result<T> = std::result::Result<T, AppError>;
