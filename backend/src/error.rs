//! Error handling for the replenishment server
//!
//! Provides consistent error responses in English and Portuguese

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use shared::{CaptureError, ReconcileError, SourceError};
use thiserror::Error;

use crate::ledger::LedgerError;

/// Application error types
#[derive(Error, Debug)]
pub enum AppError {
    // Authorization errors
    #[error("Forbidden: {0}")]
    Forbidden(String),

    // Validation errors
    #[error("Validation error: {message}")]
    Validation {
        field: String,
        message: String,
        message_pt: String,
    },

    // Domain errors
    #[error("Snapshot unavailable: {0}")]
    Snapshot(#[from] SourceError),

    #[error("Reconciliation failed: {0}")]
    Reconcile(#[from] ReconcileError),

    #[error("Order capture failed: {0}")]
    Capture(#[from] CaptureError),

    // Persistence errors
    #[error("Ledger error: {0}")]
    Persistence(#[from] LedgerError),

    #[error("Database error: {0}")]
    DatabaseError(#[from] sqlx::Error),
}

/// Error response structure
#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: ErrorDetail,
}

#[derive(Serialize)]
pub struct ErrorDetail {
    pub code: String,
    pub message_en: String,
    pub message_pt: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
}

impl ErrorDetail {
    pub fn new(code: &str, message_en: impl Into<String>, message_pt: impl Into<String>) -> Self {
        Self {
            code: code.to_string(),
            message_en: message_en.into(),
            message_pt: message_pt.into(),
            field: None,
        }
    }
}

impl AppError {
    fn status_and_detail(&self) -> (StatusCode, ErrorDetail) {
        match self {
            AppError::Forbidden(msg) => (
                StatusCode::FORBIDDEN,
                ErrorDetail::new(
                    "FORBIDDEN",
                    msg.clone(),
                    "Você não tem permissão para executar esta ação",
                ),
            ),
            AppError::Validation {
                field,
                message,
                message_pt,
            } => (
                StatusCode::BAD_REQUEST,
                ErrorDetail {
                    field: Some(field.clone()),
                    ..ErrorDetail::new("VALIDATION_ERROR", message.clone(), message_pt.clone())
                },
            ),
            AppError::Snapshot(err) => (
                StatusCode::SERVICE_UNAVAILABLE,
                ErrorDetail::new(
                    "SNAPSHOT_UNAVAILABLE",
                    err.to_string(),
                    format!("Arquivo de dados indisponível: {}", err.kind()),
                ),
            ),
            AppError::Reconcile(err) => match err {
                ReconcileError::ProductNotFound(code) => (
                    StatusCode::NOT_FOUND,
                    ErrorDetail::new(
                        "PRODUCT_NOT_FOUND",
                        err.to_string(),
                        format!("Produto {} não encontrado no mix", code),
                    ),
                ),
                ReconcileError::NoStores => (
                    StatusCode::FORBIDDEN,
                    ErrorDetail::new("NO_STORES", err.to_string(), "Usuário sem lojas liberadas"),
                ),
            },
            AppError::Capture(err) => match err {
                CaptureError::ProductNotFound(code) => (
                    StatusCode::NOT_FOUND,
                    ErrorDetail::new(
                        "PRODUCT_NOT_FOUND",
                        err.to_string(),
                        format!("Produto {} não encontrado no mix", code),
                    ),
                ),
                CaptureError::StoreNotAuthorized { store } => (
                    StatusCode::FORBIDDEN,
                    ErrorDetail {
                        field: Some(store.to_string()),
                        ..ErrorDetail::new(
                            "STORE_NOT_AUTHORIZED",
                            err.to_string(),
                            format!("Loja {} não liberada para este usuário", store),
                        )
                    },
                ),
                CaptureError::UnknownStore { store } => (
                    StatusCode::BAD_REQUEST,
                    ErrorDetail {
                        field: Some(store.to_string()),
                        ..ErrorDetail::new(
                            "UNKNOWN_STORE",
                            err.to_string(),
                            format!("Loja {} não existe no pedido consolidado", store),
                        )
                    },
                ),
                CaptureError::QuantityOutOfRange(_) => (
                    StatusCode::BAD_REQUEST,
                    ErrorDetail::new(
                        "QUANTITY_OUT_OF_RANGE",
                        err.to_string(),
                        "Quantidade acima do limite permitido",
                    ),
                ),
                CaptureError::EmptyLine(_) | CaptureError::EmptyBatch => (
                    StatusCode::BAD_REQUEST,
                    ErrorDetail::new(
                        "EMPTY_ORDER",
                        err.to_string(),
                        "Nenhuma quantidade informada",
                    ),
                ),
            },
            AppError::Persistence(LedgerError::InvalidLine(msg)) => (
                StatusCode::BAD_REQUEST,
                ErrorDetail::new(
                    "INVALID_ORDER_LINE",
                    msg.clone(),
                    format!("Linha de pedido inválida: {}", msg),
                ),
            ),
            AppError::Persistence(_) | AppError::DatabaseError(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ErrorDetail::new(
                    "PERSISTENCE_ERROR",
                    "The order ledger could not be updated; nothing was saved",
                    "Não foi possível gravar no banco; nada foi salvo",
                ),
            ),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_detail) = self.status_and_detail();

        // Log the error for debugging
        tracing::error!("Error: {:?}", self);

        (status, Json(ErrorResponse { error: error_detail })).into_response()
    }
}

/// Result type alias for handlers
pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;
    use shared::StoreCode;

    #[test]
    fn test_unauthorized_store_is_forbidden() {
        let store: StoreCode = "007".parse().unwrap();
        let err = AppError::from(CaptureError::StoreNotAuthorized { store });
        let (status, detail) = err.status_and_detail();
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(detail.field.as_deref(), Some("007"));
    }

    #[test]
    fn test_unknown_product_is_not_found() {
        let err = AppError::from(ReconcileError::ProductNotFound(1));
        let (status, detail) = err.status_and_detail();
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(detail.code, "PRODUCT_NOT_FOUND");
    }

    #[test]
    fn test_oversized_quantity_is_a_bad_request() {
        let (status, detail) =
            AppError::from(CaptureError::QuantityOutOfRange(12345)).status_and_detail();
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(detail.code, "QUANTITY_OUT_OF_RANGE");
    }

    #[test]
    fn test_ledger_failures_hide_details() {
        let err = AppError::from(LedgerError::Unavailable("lock poisoned".to_string()));
        let (status, detail) = err.status_and_detail();
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(!detail.message_en.contains("poisoned"));
    }
}
